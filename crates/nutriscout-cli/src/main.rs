use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use nutriscout_api::CatalogClient;
use nutriscout_cache::{HistoryFilter, ProductStore, ScanSource, SqliteStore};
use nutriscout_core::{
    CacheCoordinator, CatalogSource, Config, RefreshEvent, RefreshKey, RefreshStatus, ScanService,
};
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod output;

#[derive(Parser)]
#[command(name = "nutriscout")]
#[command(version, about = "Food product health scores that keep working offline", long_about = None)]
struct Cli {
    /// Product database file
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Catalog API base URL
    #[arg(long, global = true, env = "NUTRISCOUT_API_URL")]
    api_url: Option<String>,

    /// Seconds to wait for a background refresh before printing
    #[arg(long, global = true, default_value_t = 5)]
    wait: u64,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// List cached products and refresh the first page
    List,
    /// Show one product with its score breakdown
    Show {
        /// Catalog product id
        id: String,
    },
    /// Look up a barcode and add it to scan history
    Scan {
        barcode: String,
        /// Where the product came from (local, openfoodfacts)
        #[arg(long, default_value = "local", value_parser = parse_source)]
        source: ScanSource,
    },
    /// Search the catalog (never cached)
    Search { query: String },
    /// Healthier alternatives for a product
    Alternatives { id: String },
    /// Scan history, newest first
    History {
        /// Only favorites
        #[arg(long)]
        favorites: bool,
    },
    /// Mark a history record as favorite
    Favorite {
        id: i64,
        /// Remove the mark instead
        #[arg(long)]
        unset: bool,
    },
    /// Delete a history record
    Delete { id: i64 },
    /// Delete every history record that isn't a favorite
    Prune,
}

fn parse_source(raw: &str) -> Result<ScanSource, String> {
    ScanSource::parse(raw).ok_or_else(|| format!("unknown source '{}'", raw))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging - helps when things go sideways
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nutriscout=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("No command specified. Try --help");
        return Ok(());
    };

    let mut config = Config::load().context("Failed to load config")?;
    if let Some(url) = cli.api_url {
        config.catalog.base_url = url;
    }
    if let Some(db) = cli.db {
        config.cache.db_path = Some(db);
    }

    let db_path = config.db_path()?;
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    tracing::debug!(db = %db_path.display(), api = %config.catalog.base_url, "Starting");

    let store: Arc<dyn ProductStore> = SqliteStore::shared(&db_path)
        .with_context(|| format!("Failed to open {}", db_path.display()))?;
    let catalog: Arc<dyn CatalogSource> = Arc::new(CatalogClient::with_timeout(
        config.catalog.base_url.clone(),
        Duration::from_secs(config.catalog.timeout_secs),
    )?);

    let coordinator = CacheCoordinator::new(
        Arc::clone(&catalog),
        Arc::clone(&store),
        tokio::runtime::Handle::current(),
    )
    .with_page_size(config.cache.page_size);
    let scanner = ScanService::new(catalog, store);
    let wait = Duration::from_secs(cli.wait);

    match command {
        Commands::List => {
            let mut events = coordinator.subscribe_status();
            let view = coordinator.products()?;
            let key = RefreshKey::Listing {
                limit: coordinator.page_size(),
                offset: 0,
            };
            report(settle(&mut events, &key, wait).await);

            let products = view.borrow().clone();
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&products)?);
            } else if products.is_empty() {
                println!("No products cached yet");
            } else {
                for product in &products {
                    println!("{}", output::product_line(product));
                }
            }
        }
        Commands::Show { id } => {
            let mut events = coordinator.subscribe_status();
            let view = coordinator.get(&id)?;
            report(settle(&mut events, &RefreshKey::Product(id.clone()), wait).await);

            let product = view.borrow().clone();
            match product {
                Some(product) if cli.json => {
                    println!("{}", serde_json::to_string_pretty(&product)?)
                }
                Some(product) => print!("{}", output::product_details(&product)),
                None => anyhow::bail!("Product {} is not cached and could not be fetched", id),
            }
        }
        Commands::Scan { barcode, source } => {
            let outcome = scanner.scan(&barcode, source).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&outcome.product)?);
            } else {
                print!("{}", output::product_details(&outcome.product));
                println!("\nSaved to history as #{}", outcome.record.id);
            }
        }
        Commands::Search { query } => {
            print_products(&coordinator.search(&query).await, cli.json)?;
        }
        Commands::Alternatives { id } => {
            print_products(&coordinator.alternatives(&id).await, cli.json)?;
        }
        Commands::History { favorites } => {
            let filter = if favorites {
                HistoryFilter::FavoritesOnly
            } else {
                HistoryFilter::All
            };
            let records = scanner.history().list(filter)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else if records.is_empty() {
                println!("No scans yet");
            } else {
                for record in &records {
                    println!("{}", output::history_line(record));
                }
            }
        }
        Commands::Favorite { id, unset } => {
            scanner.history().toggle_favorite(id, !unset)?;
            println!("#{} {}", id, if unset { "unstarred" } else { "starred" });
        }
        Commands::Delete { id } => {
            scanner.history().delete(id)?;
            println!("Deleted #{}", id);
        }
        Commands::Prune => {
            let removed = scanner.history().prune()?;
            println!("Removed {} scans", removed);
        }
    }

    Ok(())
}

/// Wait up to `wait` for the refresh of `key` to finish
///
/// None when it didn't finish in time; the view then shows cached data.
async fn settle(
    events: &mut broadcast::Receiver<RefreshEvent>,
    key: &RefreshKey,
    wait: Duration,
) -> Option<RefreshStatus> {
    let finished = async {
        loop {
            match events.recv().await {
                Ok(event) if &event.key == key && event.status != RefreshStatus::Started => {
                    return Some(event.status);
                }
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    };

    tokio::time::timeout(wait, finished).await.ok().flatten()
}

fn report(status: Option<RefreshStatus>) {
    match status {
        Some(RefreshStatus::Failed { reason }) => {
            eprintln!("Could not refresh, showing cached data ({})", reason)
        }
        None => eprintln!("Still refreshing, showing cached data"),
        Some(_) => {}
    }
}

fn print_products(products: &[nutriscout_core::Product], json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(products)?);
    } else if products.is_empty() {
        println!("Nothing found");
    } else {
        for product in products {
            println!("{}", output::product_line(product));
        }
    }
    Ok(())
}

// Plain-text rendering for the terminal
use nutriscout_core::health::{classify_product, HealthCalculator};
use nutriscout_core::indicators::{additive_risk_color, nutri_score_color};
use nutriscout_core::{Nutrient, Product, ScanHistoryRecord};

/// One line per product for listings
pub fn product_line(product: &Product) -> String {
    let classification = classify_product(product);
    let brand = product
        .brand
        .as_deref()
        .map(|b| format!(" ({})", b))
        .unwrap_or_default();

    format!(
        "{:>6}  {:>3} {:<9}  {}{}",
        product.id,
        classification.score,
        classification.label,
        product.display_name(),
        brand
    )
}

pub fn product_details(product: &Product) -> String {
    let mut out = String::new();
    let classification = classify_product(product);

    out.push_str(product.display_name());
    if let Some(brand) = &product.brand {
        out.push_str(&format!(" - {}", brand));
    }
    out.push('\n');

    out.push_str(&format!("Id:           {}\n", product.id));
    if let Some(barcode) = &product.barcode {
        out.push_str(&format!("Barcode:      {}\n", barcode));
    }
    out.push_str(&format!(
        "Health score: {} {} ({})\n",
        classification.score, classification.label, classification.color
    ));
    out.push_str(&format!("              {}\n", classification.explanation));

    let grade = product.display_grade();
    out.push_str(&format!(
        "Nutri-Score:  {} ({})\n",
        grade.unwrap_or("-"),
        nutri_score_color(grade)
    ));
    out.push_str(&format!(
        "Organic:      {}\n",
        if product.is_organic { "yes" } else { "no" }
    ));

    if let Some(nutrition) = &product.nutrition {
        out.push_str("\nNutrition per 100g:\n");
        for nutrient in Nutrient::all() {
            let value = nutrient.value(nutrition);
            out.push_str(&format!(
                "  {:<14} {:>8.1} {:<4} {}\n",
                nutrient.label(),
                value,
                nutrient.unit(),
                nutrient.indicator_color(value)
            ));
        }
    }

    if !product.additives.is_empty() {
        out.push_str("\nAdditives:\n");
        for additive in &product.additives {
            out.push_str(&format!(
                "  {:<6} {:<28} {:<9} {}\n",
                additive.code,
                additive.name.as_deref().unwrap_or(""),
                additive.risk_level,
                additive_risk_color(additive.risk_level)
            ));
        }
    }

    let breakdown = HealthCalculator::calculate(product);
    out.push_str(&format!(
        "\nLocal estimate: {} (grade {}) = nutrition {:.1} - additives {} + organic {}\n",
        breakdown.score,
        breakdown.grade,
        breakdown.nutritional,
        breakdown.additive_penalty,
        breakdown.organic_bonus
    ));

    out
}

pub fn history_line(record: &ScanHistoryRecord) -> String {
    let star = if record.is_favorite { "*" } else { " " };
    let name = record
        .snapshot
        .product_name
        .as_deref()
        .unwrap_or("Unknown product");

    format!(
        "{:>4} {} {}  {:<14} {:>3}  {:<2} {}",
        record.id,
        star,
        record.scanned_at.format("%Y-%m-%d %H:%M"),
        record.barcode,
        record.snapshot.health_score,
        record.snapshot.nutri_score_grade.as_deref().unwrap_or("-"),
        name
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use nutriscout_core::{Additive, Nutrition, RiskLevel};

    fn cola() -> Product {
        let mut product = Product::new("42");
        product.name = Some("Cola".into());
        product.brand = Some("Fizz Co".into());
        product.barcode = Some("5000112611878".into());
        product.calculated_score = 30;
        product.nutri_score_grade = Some("E".into());
        product
    }

    #[test]
    fn test_product_line() {
        let line = product_line(&cola());
        assert!(line.contains("42"));
        assert!(line.contains("Poor"));
        assert!(line.contains("Cola (Fizz Co)"));
    }

    #[test]
    fn test_details_include_indicators() {
        let mut product = cola();
        product.nutrition = Some(Nutrition {
            sugar: 35.0,
            ..Nutrition::default()
        });
        product.additives = vec![Additive {
            id: None,
            code: "E150d".into(),
            name: Some("Sulphite ammonia caramel".into()),
            risk_level: RiskLevel::Moderate,
            description: None,
        }];

        let details = product_details(&product);
        assert!(details.contains("Health score: 30 Poor (#FF9800)"));
        assert!(details.contains("Nutri-Score:  E (#E63E11)"));
        // 35g sugar is 70% of the daily reference
        assert!(details.contains("Sugar"));
        assert!(details.contains("#F44336"));
        assert!(details.contains("E150d"));
        assert!(details.contains("Local estimate"));
    }

    #[test]
    fn test_details_without_nutrition() {
        let details = product_details(&Product::new("1"));
        assert!(details.starts_with("Unknown product"));
        assert!(!details.contains("Nutrition per 100g"));
        assert!(details.contains("Nutri-Score:  - (#9E9E9E)"));
    }
}

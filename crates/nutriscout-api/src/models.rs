use serde::{Deserialize, Deserializer, Serialize};

/// Product model - the star of the show
///
/// The catalog is the only authority over these fields. We never edit a
/// product locally, we just replace the whole thing on every refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Catalog-assigned id. Some catalog builds send it as a number, others as a string.
    #[serde(alias = "_id", deserialize_with = "id_from_string_or_number")]
    pub id: String,
    #[serde(default)]
    pub barcode: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub ingredients: Option<String>,
    /// Raw catalog score
    #[serde(default)]
    pub score: f32,
    /// Score the catalog computed on its side, 0 when it didn't send one
    #[serde(default)]
    pub calculated_score: i32,
    #[serde(default)]
    pub is_organic: bool,
    /// Legacy grade field, older catalog builds only send this one
    #[serde(default)]
    pub nutri_score: Option<String>,
    #[serde(default)]
    pub nutri_score_grade: Option<String>,
    #[serde(default, alias = "Nutrition")]
    pub nutrition: Option<Nutrition>,
    #[serde(default, alias = "Additives")]
    pub additives: Vec<Additive>,
    #[serde(default)]
    pub score_category: Option<ScoreCategory>,
}

impl Product {
    /// A bare product with only its id set
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            barcode: None,
            name: None,
            brand: None,
            image_url: None,
            ingredients: None,
            score: 0.0,
            calculated_score: 0,
            is_organic: false,
            nutri_score: None,
            nutri_score_grade: None,
            nutrition: None,
            additives: Vec::new(),
            score_category: None,
        }
    }

    /// Grade to show on the badge, falling back to the legacy field
    pub fn display_grade(&self) -> Option<&str> {
        self.nutri_score_grade
            .as_deref()
            .or(self.nutri_score.as_deref())
            .filter(|g| !g.trim().is_empty())
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Unknown product")
    }
}

/// Nutrition facts per 100g (or per serving when the catalog says so)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Nutrition {
    pub calories: f64,
    pub sugar: f64,
    pub fat: f64,
    pub saturated_fat: f64,
    pub salt: f64,
    pub protein: f64,
    pub fiber: f64,
    pub serving_size: f64,
    pub serving_unit: Option<String>,
}

/// Food additive attached to a product snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Additive {
    #[serde(default)]
    pub id: Option<i64>,
    /// E-number, e.g. "E330"
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub description: Option<String>,
}

/// Catalog-assigned hazard tier for an additive
///
/// Anything we don't recognise (including null) is treated as `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "Option<String>")]
pub enum RiskLevel {
    #[default]
    None,
    Limited,
    Moderate,
    Hazardous,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::None => "none",
            RiskLevel::Limited => "limited",
            RiskLevel::Moderate => "moderate",
            RiskLevel::Hazardous => "hazardous",
        }
    }

    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "limited" => RiskLevel::Limited,
            "moderate" => RiskLevel::Moderate,
            "hazardous" => RiskLevel::Hazardous,
            _ => RiskLevel::None,
        }
    }
}

impl From<Option<String>> for RiskLevel {
    fn from(raw: Option<String>) -> Self {
        raw.as_deref().map(RiskLevel::parse).unwrap_or_default()
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Label + hex color the catalog may attach to override our own classification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreCategory {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

/// One page of the product listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPage {
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default)]
    pub total: u32,
    #[serde(default)]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
    #[serde(default)]
    pub has_more: bool,
}

fn id_from_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(i64),
        Text(String),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Number(n) => n.to_string(),
        RawId::Text(s) => s,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_from_catalog_json() {
        let json = r##"{
            "id": 42,
            "barcode": "5000112611878",
            "name": "Cola",
            "brand": "Fizz Co",
            "score": 31.7,
            "calculatedScore": 30,
            "isOrganic": false,
            "nutriScoreGrade": "c",
            "Nutrition": {"calories": 180, "sugar": 10.6, "servingUnit": "ml"},
            "Additives": [
                {"id": 1, "code": "E150d", "name": "Caramel", "riskLevel": "moderate"},
                {"code": "E338", "riskLevel": null}
            ],
            "scoreCategory": {"label": "Poor", "color": "#FF9800"}
        }"##;

        let product: Product = serde_json::from_str(json).unwrap();
        assert_eq!(product.id, "42");
        assert_eq!(product.calculated_score, 30);
        assert_eq!(product.display_grade(), Some("c"));

        let nutrition = product.nutrition.unwrap();
        assert_eq!(nutrition.sugar, 10.6);
        assert_eq!(nutrition.fat, 0.0);
        assert_eq!(nutrition.serving_unit.as_deref(), Some("ml"));

        assert_eq!(product.additives.len(), 2);
        assert_eq!(product.additives[0].risk_level, RiskLevel::Moderate);
        assert_eq!(product.additives[1].risk_level, RiskLevel::None);
    }

    #[test]
    fn test_product_accepts_mongo_style_id() {
        let product: Product =
            serde_json::from_str(r#"{"_id": "65a1f0c2", "name": "Oat Milk"}"#).unwrap();
        assert_eq!(product.id, "65a1f0c2");
        assert!(product.additives.is_empty());
        assert!(product.nutrition.is_none());
    }

    #[test]
    fn test_display_grade_falls_back_to_legacy_field() {
        let mut product = Product::new("1");
        assert_eq!(product.display_grade(), None);

        product.nutri_score = Some("B".into());
        assert_eq!(product.display_grade(), Some("B"));

        product.nutri_score_grade = Some("A".into());
        assert_eq!(product.display_grade(), Some("A"));
    }

    #[test]
    fn test_risk_level_parsing_is_lenient() {
        assert_eq!(RiskLevel::parse("HAZARDOUS"), RiskLevel::Hazardous);
        assert_eq!(RiskLevel::parse(" limited "), RiskLevel::Limited);
        assert_eq!(RiskLevel::parse("spicy"), RiskLevel::None);
        assert_eq!(RiskLevel::from(None), RiskLevel::None);
    }

    #[test]
    fn test_product_page() {
        let page: ProductPage = serde_json::from_str(
            r#"{"products": [{"id": 1}, {"id": 2}], "total": 57, "limit": 2, "offset": 0, "hasMore": true}"#,
        )
        .unwrap();
        assert_eq!(page.products.len(), 2);
        assert_eq!(page.total, 57);
        assert!(page.has_more);
    }
}

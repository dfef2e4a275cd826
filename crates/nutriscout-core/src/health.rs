use nutriscout_api::{Additive, Nutrition, Product, RiskLevel};
use serde::{Deserialize, Serialize};

use crate::color::Rgb;
use crate::indicators::NutriGrade;

/// Overall health categories
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum HealthCategory {
    /// Score 75-100
    Excellent,
    /// Score 50-74
    Good,
    /// Score 25-49
    Poor,
    /// Score 0-24
    Bad,
}

impl HealthCategory {
    /// Total over every integer: below 0 is Bad, above 100 is Excellent
    pub fn from_score(score: i32) -> Self {
        match score {
            s if s >= 75 => HealthCategory::Excellent,
            50..=74 => HealthCategory::Good,
            25..=49 => HealthCategory::Poor,
            _ => HealthCategory::Bad,
        }
    }

    pub fn color(&self) -> Rgb {
        match self {
            HealthCategory::Excellent => Rgb::GREEN,
            HealthCategory::Good => Rgb::LIGHT_GREEN,
            HealthCategory::Poor => Rgb::ORANGE,
            HealthCategory::Bad => Rgb::RED,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            HealthCategory::Excellent => "Excellent",
            HealthCategory::Good => "Good",
            HealthCategory::Poor => "Poor",
            HealthCategory::Bad => "Bad",
        }
    }
}

/// What the score badge shows: label, color and one line of explanation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub score: i32,
    pub label: String,
    pub color: Rgb,
    pub explanation: &'static str,
}

/// Label and color for a bare 0-100 score
pub fn classify_health_score(score: i32) -> (&'static str, Rgb) {
    let category = HealthCategory::from_score(score);
    (category.label(), category.color())
}

/// Full classification for a product
///
/// A catalog-supplied category with a non-empty label wins over ours. Its
/// color falls back to green when it doesn't parse.
pub fn classify_product(product: &Product) -> Classification {
    let score = effective_score(product);

    let (label, color) = match product
        .score_category
        .as_ref()
        .and_then(|c| c.label.as_deref().filter(|l| !l.trim().is_empty()).map(|l| (l, c)))
    {
        Some((label, category)) => {
            let color = category
                .color
                .as_deref()
                .and_then(Rgb::from_hex)
                .unwrap_or(Rgb::GREEN);
            (label.to_string(), color)
        }
        None => {
            let (label, color) = classify_health_score(score);
            (label.to_string(), color)
        }
    };

    Classification {
        explanation: explanation_for(&label),
        score,
        label,
        color,
    }
}

/// One-line explanation for a category label, case-insensitive
pub fn explanation_for(label: &str) -> &'static str {
    match label.trim().to_ascii_lowercase().as_str() {
        "excellent" => "This product has an excellent nutritional profile",
        "good" => "This product has a good nutritional profile",
        "poor" => "This product has some nutritional concerns",
        _ => "This product has significant nutritional concerns",
    }
}

/// The score we show for a product
///
/// `calculated_score` when it's nonzero, otherwise the raw score truncated
/// toward zero. A calculated score of exactly 0 is indistinguishable from a
/// missing one here.
pub fn effective_score(product: &Product) -> i32 {
    if product.calculated_score != 0 {
        product.calculated_score
    } else {
        // `as` saturates and maps NaN to 0
        product.score.trunc() as i32
    }
}

/// Points breakdown of a locally computed health score
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoreBreakdown {
    /// Final score (0-100)
    pub score: i32,
    /// Nutritional quality (0-60)
    pub nutritional: f64,
    /// Additive penalty (0-30), already subtracted
    pub additive_penalty: u32,
    /// Organic bonus (0 or 10), already added
    pub organic_bonus: u32,
    pub grade: NutriGrade,
}

// Negative points thresholds (per 100g)
const CALORIE_THRESHOLDS: [f64; 10] = [
    335.0, 670.0, 1005.0, 1340.0, 1675.0, 2010.0, 2345.0, 2680.0, 3015.0, 3350.0,
];
const SUGAR_THRESHOLDS: [f64; 10] = [4.5, 9.0, 13.5, 18.0, 22.5, 27.0, 31.0, 36.0, 40.0, 45.0];
const SATURATED_FAT_THRESHOLDS: [f64; 10] = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0];
const SALT_THRESHOLDS: [f64; 10] = [0.09, 0.18, 0.27, 0.36, 0.45, 0.54, 0.63, 0.72, 0.81, 0.9];

// Positive points thresholds (per 100g)
const PROTEIN_THRESHOLDS: [f64; 5] = [1.6, 3.2, 4.8, 6.4, 8.0];
const FIBER_THRESHOLDS: [f64; 5] = [0.9, 1.9, 2.8, 3.7, 4.7];

const MAX_NEGATIVE_POINTS: f64 = 40.0;
const POINTS_SPAN: f64 = 53.0;
const NUTRITIONAL_MAX: f64 = 60.0;
const ADDITIVE_PENALTY_CAP: u32 = 30;
const ORGANIC_BONUS: u32 = 10;

/// Local health score, the same recipe the catalog uses
///
/// Composition (0-100):
/// - Nutritional quality: 60
/// - Additives: up to 30 deducted
/// - Organic: 10 bonus
pub struct HealthCalculator;

impl HealthCalculator {
    pub fn calculate(product: &Product) -> ScoreBreakdown {
        let nutritional = Self::nutritional_score(product.nutrition.as_ref());
        let additive_penalty = Self::additive_penalty(&product.additives);
        let organic_bonus = if product.is_organic { ORGANIC_BONUS } else { 0 };

        let raw = nutritional - additive_penalty as f64 + organic_bonus as f64;
        let score = raw.round().clamp(0.0, 100.0) as i32;

        ScoreBreakdown {
            score,
            nutritional,
            additive_penalty,
            organic_bonus,
            grade: Self::grade_for_score(score),
        }
    }

    /// Nutritional quality (0-60). No data sits in the middle at 30.
    pub fn nutritional_score(nutrition: Option<&Nutrition>) -> f64 {
        let Some(n) = nutrition else {
            return NUTRITIONAL_MAX / 2.0;
        };

        let negative = points(n.calories, &CALORIE_THRESHOLDS)
            + points(n.sugar, &SUGAR_THRESHOLDS)
            + points(n.saturated_fat, &SATURATED_FAT_THRESHOLDS)
            + points(n.salt, &SALT_THRESHOLDS);
        let positive = points(n.protein, &PROTEIN_THRESHOLDS) + points(n.fiber, &FIBER_THRESHOLDS);

        // Max negative = 40, max positive = 13, higher is better
        let raw = positive as f64 - negative as f64;
        let normalized = (raw + MAX_NEGATIVE_POINTS) / POINTS_SPAN * NUTRITIONAL_MAX;

        normalized.clamp(0.0, NUTRITIONAL_MAX)
    }

    /// Additive penalty (0-30)
    pub fn additive_penalty(additives: &[Additive]) -> u32 {
        let total: u32 = additives
            .iter()
            .map(|a| match a.risk_level {
                RiskLevel::None => 0,
                RiskLevel::Limited => 5,
                RiskLevel::Moderate => 15,
                RiskLevel::Hazardous => 30,
            })
            .sum();

        total.min(ADDITIVE_PENALTY_CAP)
    }

    pub fn grade_for_score(score: i32) -> NutriGrade {
        match score {
            s if s >= 75 => NutriGrade::A,
            50..=74 => NutriGrade::B,
            25..=49 => NutriGrade::C,
            10..=24 => NutriGrade::D,
            _ => NutriGrade::E,
        }
    }
}

/// Index of the first threshold the value doesn't exceed
fn points(value: f64, thresholds: &[f64]) -> u32 {
    thresholds
        .iter()
        .position(|t| value <= *t)
        .unwrap_or(thresholds.len()) as u32
}

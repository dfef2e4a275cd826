use nutriscout_api::RiskLevel;
use serde::{Deserialize, Serialize};

use crate::color::Rgb;

/// Nutri-Score letter
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum NutriGrade {
    A,
    B,
    C,
    D,
    E,
}

impl NutriGrade {
    /// Case-insensitive; anything else is None
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "A" => Some(NutriGrade::A),
            "B" => Some(NutriGrade::B),
            "C" => Some(NutriGrade::C),
            "D" => Some(NutriGrade::D),
            "E" => Some(NutriGrade::E),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NutriGrade::A => "A",
            NutriGrade::B => "B",
            NutriGrade::C => "C",
            NutriGrade::D => "D",
            NutriGrade::E => "E",
        }
    }

    pub fn color(&self) -> Rgb {
        match self {
            NutriGrade::A => Rgb::NUTRI_A,
            NutriGrade::B => Rgb::NUTRI_B,
            NutriGrade::C => Rgb::NUTRI_C,
            NutriGrade::D => Rgb::NUTRI_D,
            NutriGrade::E => Rgb::NUTRI_E,
        }
    }
}

impl std::fmt::Display for NutriGrade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Badge color for a raw grade string; grey for missing or unknown grades
pub fn nutri_score_color(grade: Option<&str>) -> Rgb {
    grade
        .and_then(NutriGrade::parse)
        .map(|g| g.color())
        .unwrap_or(Rgb::GREY)
}

pub fn additive_risk_color(risk: RiskLevel) -> Rgb {
    match risk {
        RiskLevel::Hazardous => Rgb::RED,
        RiskLevel::Moderate => Rgb::ORANGE,
        RiskLevel::Limited => Rgb::YELLOW,
        RiskLevel::None => Rgb::GREEN,
    }
}

/// Traffic-light color for one nutrient against its daily reference
///
/// Negative indicators ("less is better"): under 30% green, under 60%
/// orange, otherwise red. Positive ones ("more is better"): over 30% green,
/// over 10% orange, otherwise red. A reference that isn't positive, or a
/// value that isn't a number, gets neutral grey.
pub fn nutrient_indicator_color(value: f64, max_value: f64, negative_indicator: bool) -> Rgb {
    if max_value.is_nan() || max_value <= 0.0 {
        return Rgb::GREY;
    }

    let percentage = value / max_value * 100.0;
    if !percentage.is_finite() {
        return Rgb::GREY;
    }

    if negative_indicator {
        if percentage < 30.0 {
            Rgb::GREEN
        } else if percentage < 60.0 {
            Rgb::ORANGE
        } else {
            Rgb::RED
        }
    } else if percentage > 30.0 {
        Rgb::GREEN
    } else if percentage > 10.0 {
        Rgb::ORANGE
    } else {
        Rgb::RED
    }
}

/// The nutrients we show a row for, in display order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Nutrient {
    Calories,
    Sugar,
    Fat,
    SaturatedFat,
    Salt,
    Protein,
    Fiber,
}

impl Nutrient {
    pub fn all() -> [Nutrient; 7] {
        [
            Nutrient::Calories,
            Nutrient::Sugar,
            Nutrient::Fat,
            Nutrient::SaturatedFat,
            Nutrient::Salt,
            Nutrient::Protein,
            Nutrient::Fiber,
        ]
    }

    pub fn label(&self) -> &'static str {
        match self {
            Nutrient::Calories => "Calories",
            Nutrient::Sugar => "Sugar",
            Nutrient::Fat => "Fat",
            Nutrient::SaturatedFat => "Saturated Fat",
            Nutrient::Salt => "Salt",
            Nutrient::Protein => "Protein",
            Nutrient::Fiber => "Fiber",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            Nutrient::Calories => "kcal",
            _ => "g",
        }
    }

    /// Daily reference amount
    pub fn daily_reference(&self) -> f64 {
        match self {
            Nutrient::Calories => 2000.0,
            Nutrient::Sugar => 50.0,
            Nutrient::Fat => 70.0,
            Nutrient::SaturatedFat => 20.0,
            Nutrient::Salt => 6.0,
            Nutrient::Protein => 50.0,
            Nutrient::Fiber => 25.0,
        }
    }

    /// "Less is better" nutrients. Calories are scored like protein and fiber.
    pub fn is_negative(&self) -> bool {
        matches!(
            self,
            Nutrient::Sugar | Nutrient::Fat | Nutrient::SaturatedFat | Nutrient::Salt
        )
    }

    pub fn value(&self, nutrition: &nutriscout_api::Nutrition) -> f64 {
        match self {
            Nutrient::Calories => nutrition.calories,
            Nutrient::Sugar => nutrition.sugar,
            Nutrient::Fat => nutrition.fat,
            Nutrient::SaturatedFat => nutrition.saturated_fat,
            Nutrient::Salt => nutrition.salt,
            Nutrient::Protein => nutrition.protein,
            Nutrient::Fiber => nutrition.fiber,
        }
    }

    pub fn indicator_color(&self, value: f64) -> Rgb {
        nutrient_indicator_color(value, self.daily_reference(), self.is_negative())
    }
}

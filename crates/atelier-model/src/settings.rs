use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Workshop-wide pricing settings, read-only for one recomputation batch.
///
/// Missing keys read as `0`, except the subcontracting coefficient which defaults to `1` (sell at
/// cost).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Billed labor rate, per hour.
    #[serde(alias = "taux_horaire", alias = "hourlyRate")]
    pub hourly_rate: f64,
    /// Cost of one technician night away.
    #[serde(alias = "cout_nuit", alias = "nightCost")]
    pub night_cost: f64,
    /// Cost of one technician meal.
    #[serde(alias = "cout_repas", alias = "mealCost")]
    pub meal_cost: f64,
    /// Multiplier applied to subcontracted labor buy cost to get its sell price.
    #[serde(alias = "coef_sous_traitance", alias = "subcontractingCoefficient")]
    pub subcontracting_coefficient: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            hourly_rate: 0.0,
            night_cost: 0.0,
            meal_cost: 0.0,
            subcontracting_coefficient: 1.0,
        }
    }
}

impl Settings {
    /// Build from the settings store's flat key -> number map. Unknown keys and non-finite values
    /// are ignored.
    pub fn from_map(map: &HashMap<String, f64>) -> Self {
        let mut settings = Self::default();
        for (key, value) in map {
            if !value.is_finite() {
                continue;
            }
            match key.as_str() {
                "taux_horaire" | "hourly_rate" | "hourlyRate" => settings.hourly_rate = *value,
                "cout_nuit" | "night_cost" | "nightCost" => settings.night_cost = *value,
                "cout_repas" | "meal_cost" | "mealCost" => settings.meal_cost = *value,
                "coef_sous_traitance" | "subcontracting_coefficient"
                | "subcontractingCoefficient" => settings.subcontracting_coefficient = *value,
                _ => {}
            }
        }
        settings
    }
}

/// How the formula pass treats fields that depend on each other in a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IterationSettings {
    /// Re-evaluate cyclic fields until they settle. When disabled, cyclic fields are evaluated
    /// once, in schema order.
    pub enabled: bool,
    pub max_iterations: u32,
    /// Convergence tolerance: iteration stops once no field moves by more than this.
    pub max_change: f64,
}

impl Default for IterationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            max_iterations: 100,
            max_change: 0.001,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn from_map_reads_store_keys_and_defaults_the_rest() {
        let map = HashMap::from([
            ("taux_horaire".to_string(), 45.0),
            ("cout_repas".to_string(), 18.5),
            ("unrelated".to_string(), 3.0),
            ("cout_nuit".to_string(), f64::NAN),
        ]);
        let settings = Settings::from_map(&map);
        assert_eq!(
            settings,
            Settings {
                hourly_rate: 45.0,
                night_cost: 0.0,
                meal_cost: 18.5,
                subcontracting_coefficient: 1.0,
            }
        );
    }

    #[test]
    fn deserializes_with_aliases_and_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{"taux_horaire": 50, "coef_sous_traitance": 1.3}"#).unwrap();
        assert_eq!(settings.hourly_rate, 50.0);
        assert_eq!(settings.subcontracting_coefficient, 1.3);
        assert_eq!(settings.night_cost, 0.0);

        let empty: Settings = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, Settings::default());
    }
}

use crate::{FieldValue, ModelResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Stable identifier of a grid line. The engine never creates or deletes rows, it only carries
/// the id through so reports can point back at the source line.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowId(pub String);

impl From<&str> for RowId {
    fn from(value: &str) -> Self {
        RowId(value.to_string())
    }
}

impl From<String> for RowId {
    fn from(value: String) -> Self {
        RowId(value)
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One line of a quote / production grid.
///
/// Serializes to the grid's JSON shape: `{"id": …, "cellFormulas": {…}, "<field>": …}`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub id: RowId,
    /// Per-cell formula overrides (field key -> formula). They take precedence over the schema's
    /// default formula for that field on this row only.
    #[serde(
        rename = "cellFormulas",
        default,
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub cell_formulas: BTreeMap<String, String>,
    #[serde(flatten)]
    fields: BTreeMap<String, FieldValue>,
}

impl Row {
    pub fn new(id: impl Into<RowId>) -> Self {
        Self {
            id: id.into(),
            cell_formulas: BTreeMap::new(),
            fields: BTreeMap::new(),
        }
    }

    pub fn from_json_str(json: &str) -> ModelResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_string(&self) -> ModelResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Builder-style setter, mostly useful in tests and fixtures.
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<FieldValue>) -> Self {
        self.set(key, value);
        self
    }

    #[must_use]
    pub fn with_formula(mut self, key: &str, formula: &str) -> Self {
        self.set_formula_override(key, formula);
        self
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn set(&mut self, key: &str, value: impl Into<FieldValue>) {
        self.fields.insert(key.to_string(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<FieldValue> {
        self.fields.remove(key)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Text content of a field, or `""` when the field is missing or not text.
    pub fn text(&self, key: &str) -> &str {
        self.get(key).and_then(FieldValue::as_str).unwrap_or("")
    }

    /// Checkbox-style reading of a field: booleans as-is, `"oui"`/`"true"`/`"1"` text, non-zero
    /// numbers.
    pub fn flag(&self, key: &str) -> bool {
        match self.get(key) {
            Some(FieldValue::Bool(b)) => *b,
            Some(FieldValue::Number(n)) => *n != 0.0,
            Some(FieldValue::Text(s)) => {
                let s = s.trim();
                s.eq_ignore_ascii_case("oui") || s.eq_ignore_ascii_case("true") || s == "1"
            }
            _ => false,
        }
    }

    /// Non-blank override formula for `key`, if any.
    pub fn formula_override(&self, key: &str) -> Option<&str> {
        self.cell_formulas
            .get(key)
            .map(String::as_str)
            .filter(|f| !f.trim().is_empty())
    }

    pub fn set_formula_override(&mut self, key: &str, formula: &str) {
        self.cell_formulas
            .insert(key.to_string(), formula.to_string());
    }

    pub fn clear_formula_override(&mut self, key: &str) -> Option<String> {
        self.cell_formulas.remove(key)
    }
}

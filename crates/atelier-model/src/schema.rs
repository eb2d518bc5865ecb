use crate::{ModelError, ModelResult, Row};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Editor / display kind of a grid column.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    #[default]
    Text,
    Number,
    Formula,
    Select,
    Boolean,
    Photo,
    Button,
    Date,
    /// Column types the engine does not know about; they are carried through untouched.
    #[serde(other)]
    Other,
}

/// One column descriptor of a grid schema.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub key: String,
    #[serde(rename = "type", default)]
    pub column_type: ColumnType,
    /// Default formula, used for every row without a per-cell override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
    #[serde(rename = "readOnly", default)]
    pub read_only: bool,
    /// Row-dependent read-only predicate. Only configurable from code.
    #[serde(skip)]
    pub read_only_when: Option<fn(&Row) -> bool>,
}

impl ColumnSpec {
    pub fn new(key: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            key: key.into(),
            column_type,
            formula: None,
            read_only: false,
            read_only_when: None,
        }
    }

    /// A computed column: `formula` type, read-only, carrying `formula` as its default.
    pub fn computed(key: impl Into<String>, formula: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            column_type: ColumnType::Formula,
            formula: Some(formula.into()),
            read_only: true,
            read_only_when: None,
        }
    }

    /// An editable column that still carries a default formula the user may overwrite.
    #[must_use]
    pub fn with_formula(mut self, formula: impl Into<String>) -> Self {
        self.formula = Some(formula.into());
        self
    }

    #[must_use]
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    #[must_use]
    pub fn read_only_when(mut self, predicate: fn(&Row) -> bool) -> Self {
        self.read_only_when = Some(predicate);
        self
    }

    pub fn is_read_only(&self, row: &Row) -> bool {
        self.read_only || self.read_only_when.is_some_and(|pred| pred(row))
    }

    /// The default formula, ignoring blank strings.
    pub fn default_formula(&self) -> Option<&str> {
        self.formula.as_deref().filter(|f| !f.trim().is_empty())
    }
}

/// Ordered column set of one grid (curtains, blinds, bed-covers, other, travel).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Schema {
    pub name: String,
    pub columns: Vec<ColumnSpec>,
}

impl Schema {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnSpec>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }

    /// Parse a schema from the UI configuration JSON, rejecting duplicate keys.
    pub fn from_json_str(json: &str) -> ModelResult<Self> {
        let schema: Schema = serde_json::from_str(json)?;
        schema.check_unique_keys()?;
        Ok(schema)
    }

    pub fn check_unique_keys(&self) -> ModelResult<()> {
        let mut seen = HashSet::new();
        for column in &self.columns {
            if !seen.insert(column.key.as_str()) {
                return Err(ModelError::DuplicateColumn {
                    schema: self.name.clone(),
                    column: column.key.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn column(&self, key: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.key == key)
    }

    /// Formula that applies to `key` on `row`: the per-cell override first, then the column's
    /// default formula.
    pub fn effective_formula<'a>(&'a self, row: &'a Row, key: &str) -> Option<&'a str> {
        row.formula_override(key)
            .or_else(|| self.column(key).and_then(ColumnSpec::default_formula))
    }
}

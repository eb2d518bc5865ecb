use crate::ModelResult;
use serde::{Deserialize, Serialize};

/// A purchasable raw material or component (fabric, lining, rail, trim).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CatalogItem {
    /// Immutable identifier. Rows resolve references through it before falling back to `name`.
    pub id: String,
    /// Display name, unique within a catalog.
    pub name: String,
    pub category: String,
    pub buy_price: f64,
    pub sell_price: f64,
    /// Roll width (laize), in cm.
    pub width: f64,
    pub pattern_repeat_v: f64,
    pub pattern_repeat_h: f64,
    pub has_pattern: bool,
    /// Declared physical dimension (rails: profile / section).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimension: Option<String>,
}

impl CatalogItem {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_prices(mut self, buy: f64, sell: f64) -> Self {
        self.buy_price = buy;
        self.sell_price = sell;
        self
    }
}

/// Exact, case-sensitive lookup by display name.
pub fn find_by_name<'a>(items: &'a [CatalogItem], name: &str) -> Option<&'a CatalogItem> {
    if name.is_empty() {
        return None;
    }
    items.iter().find(|item| item.name == name)
}

/// Read-only product catalog supplied by the catalog store.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Catalog {
    items: Vec<CatalogItem>,
}

impl Catalog {
    pub fn new(items: Vec<CatalogItem>) -> Self {
        Self { items }
    }

    pub fn from_json_str(json: &str) -> ModelResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn items(&self) -> &[CatalogItem] {
        &self.items
    }

    pub fn find_by_name(&self, name: &str) -> Option<&CatalogItem> {
        find_by_name(&self.items, name)
    }

    pub fn find_by_id(&self, id: &str) -> Option<&CatalogItem> {
        if id.is_empty() {
            return None;
        }
        self.items.iter().find(|item| item.id == id)
    }

    /// Resolve a stored reference from the row's display name and recorded id.
    ///
    /// An empty name resolves to nothing whatever the id says. The id wins while it still
    /// points at the named item, or when the name matches no other item (the item was renamed
    /// in the catalog). A name that matches a different item means the user picked another one.
    pub fn resolve(&self, id: Option<&str>, name: &str) -> Option<&CatalogItem> {
        if name.is_empty() {
            return None;
        }
        let by_id = id.and_then(|id| self.find_by_id(id));
        match by_id {
            Some(item) if item.name == name => Some(item),
            _ => self.find_by_name(name).or(by_id),
        }
    }
}

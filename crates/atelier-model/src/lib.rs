//! `atelier-model` defines the plain data handed to the computation engine.
//!
//! Rows are JSON-shaped records (field key -> value) exactly as the grid UI produces them; the
//! schema, catalog and settings types are read-only context for one recomputation pass.

mod catalog;
mod error;
pub mod fields;
pub mod product;
mod row;
mod schema;
pub mod schemas;
mod settings;
mod value;

pub use catalog::{find_by_name, Catalog, CatalogItem};
pub use error::{ModelError, ModelResult};
pub use row::{Row, RowId};
pub use schema::{ColumnSpec, ColumnType, Schema};
pub use settings::{IterationSettings, Settings};
pub use value::FieldValue;

//! Row recomputation, purchase aggregation and profitability roll-up.
//!
//! Everything here is synchronous and pure: rows, schema, catalog and settings come in, updated
//! rows and reports go out. Nothing touches storage, UI or network.

mod batch;
mod context;
mod error;
mod export;
mod graph;
mod parallel;
mod profitability;
mod purchases;
mod recompute;
mod rules;

pub use crate::batch::{recompute_all, recompute_project, Project, ProjectGrid};
pub use crate::context::RecomputeContext;
pub use crate::error::{EngineError, EngineResult};
pub use crate::export::export_purchases_csv;
pub use crate::graph::{analyze_schema, EvaluationPlan};
pub use crate::profitability::{
    compute_profitability, target_revenue_for_hourly_contribution, Breakdowns, ChargeBucket,
    ChargeSource, Kpis, Profitability, ProfitabilityError,
};
pub use crate::purchases::{
    aggregate_purchases, purchase_slots, AggregationGroup, CostBasis, MaterialFamily,
    PurchaseSlot, PurchaseSummary, SourceRow,
};
pub use crate::recompute::{
    recompute, recompute_in_place, select_catalog_item, select_mechanism_model, CycleReport,
    FormulaFailure, RecomputeReport,
};

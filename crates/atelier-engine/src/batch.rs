use crate::context::RecomputeContext;
use crate::parallel;
use crate::profitability::{compute_profitability, Profitability};
use crate::purchases::{aggregate_purchases, PurchaseSummary};
use crate::recompute::{recompute_in_place, RecomputeReport};
use crate::rules::number;
use atelier_model::{fields, schemas, Row, Schema};

/// Recompute every row of one grid. Rows are independent; reports come back in row order.
pub fn recompute_all(
    rows: &mut [Row],
    schema: &Schema,
    ctx: &RecomputeContext<'_>,
) -> Vec<RecomputeReport> {
    log::trace!("recomputing {} rows of {}", rows.len(), schema.name);
    parallel::map_rows(rows, |row| recompute_in_place(row, schema, ctx))
}

/// Rows of one grid together with the schema that shapes them.
#[derive(Clone, Debug)]
pub struct ProjectGrid {
    pub schema: Schema,
    pub rows: Vec<Row>,
}

impl ProjectGrid {
    pub fn new(schema: Schema, rows: Vec<Row>) -> Self {
        Self { schema, rows }
    }
}

/// Every grid of one customer project.
#[derive(Clone, Debug)]
pub struct Project {
    /// Product grids (curtains, blinds, bed covers, ...); their totals are the project revenue.
    pub product_grids: Vec<ProjectGrid>,
    pub travel: ProjectGrid,
    /// Free-form expense lines, commissions included.
    pub expenses: ProjectGrid,
}

impl Default for Project {
    fn default() -> Self {
        Self {
            product_grids: Vec::new(),
            travel: ProjectGrid::new(schemas::travel(), Vec::new()),
            expenses: ProjectGrid::new(schemas::other(), Vec::new()),
        }
    }
}

impl Project {
    pub fn product_rows(&self) -> impl Iterator<Item = &Row> {
        self.product_grids.iter().flat_map(|grid| grid.rows.iter())
    }

    /// Sum of the product rows' total prices.
    pub fn revenue(&self) -> f64 {
        self.product_rows()
            .map(|row| number(row, fields::TOTAL_PRICE))
            .sum()
    }

    pub fn purchases(&self) -> PurchaseSummary {
        let rows: Vec<Row> = self.product_rows().cloned().collect();
        aggregate_purchases(&rows)
    }

    pub fn profitability(&self) -> Profitability {
        let rows: Vec<Row> = self.product_rows().cloned().collect();
        compute_profitability(&rows, &self.travel.rows, &self.expenses.rows)
    }
}

/// Recompute a whole project: product and travel grids first, then expense grids against the
/// resulting revenue so commission rows are up to date.
pub fn recompute_project(
    project: &mut Project,
    ctx: &RecomputeContext<'_>,
) -> Vec<RecomputeReport> {
    let mut reports = Vec::new();
    for grid in &mut project.product_grids {
        reports.extend(recompute_all(&mut grid.rows, &grid.schema, ctx));
    }
    reports.extend(recompute_all(
        &mut project.travel.rows,
        &project.travel.schema,
        ctx,
    ));

    let revenue_ctx = ctx.with_total_revenue(project.revenue());
    reports.extend(recompute_all(
        &mut project.expenses.rows,
        &project.expenses.schema,
        &revenue_ctx,
    ));
    reports
}

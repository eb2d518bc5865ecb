//! Project profitability and the inverse solver.
//!
//! Revenue is what product rows bill. Material purchases are the fixed cost; subcontracting,
//! travel and expense rows are variable charges. Hours and subcontracting costs are summed as
//! the rows store them.

use crate::purchases::{aggregate_purchases, PurchaseSummary};
use crate::rules::number;
use atelier_model::{fields, product, Row, RowId};
use serde::Serialize;

/// Denominator below which no revenue can reach a contribution target.
const MIN_MARGIN_SHARE: f64 = 0.01;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProfitabilityError {
    /// Commissions eat (nearly) all of any extra revenue.
    #[error("target is unreachable: commissions take {:.1}% of revenue", .commission_rate * 100.0)]
    Infeasible { commission_rate: f64 },

    #[error("invalid hourly contribution target: {0}")]
    InvalidTarget(f64),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargeSource {
    pub row_id: RowId,
    pub label: String,
    pub amount: f64,
}

/// One variable-charge line with the rows it comes from.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargeBucket {
    pub total: f64,
    pub sources: Vec<ChargeSource>,
}

impl ChargeBucket {
    fn add(&mut self, row: &Row, amount: f64) {
        if amount == 0.0 {
            return;
        }
        self.total += amount;
        self.sources.push(ChargeSource {
            row_id: row.id.clone(),
            label: describe(row),
            amount,
        });
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Breakdowns {
    pub purchases: PurchaseSummary,
    pub subcontracted_installation: ChargeBucket,
    pub subcontracted_assembly: ChargeBucket,
    pub travel: ChargeBucket,
    pub commissions: ChargeBucket,
    pub other_expenses: ChargeBucket,
}

impl Breakdowns {
    fn variable_charges(&self) -> f64 {
        self.subcontracted_installation.total
            + self.subcontracted_assembly.total
            + self.travel.total
            + self.commissions.total
            + self.other_expenses.total
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Kpis {
    #[serde(rename = "caTotal")]
    pub revenue: f64,
    pub fixed_material_cost: f64,
    pub variable_charges: f64,
    pub commission_total: f64,
    pub gross_margin: f64,
    pub contribution: f64,
    pub total_hours: f64,
    pub hourly_contribution: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Profitability {
    pub kpis: Kpis,
    pub breakdowns: Breakdowns,
}

impl Profitability {
    /// See [`target_revenue_for_hourly_contribution`].
    pub fn target_revenue_for(&self, hourly_contribution: f64) -> Result<f64, ProfitabilityError> {
        target_revenue_for_hourly_contribution(hourly_contribution, self)
    }
}

fn describe(row: &Row) -> String {
    let parts: Vec<&str> = [
        fields::PRODUCT,
        fields::TRAVEL_KIND,
        fields::EXPENSE_CATEGORY,
        "libelle",
        fields::ZONE,
        fields::ROOM,
    ]
    .into_iter()
    .map(|key| row.text(key).trim())
    .filter(|part| !part.is_empty())
    .collect();
    if parts.is_empty() {
        row.id.to_string()
    } else {
        parts.join(" - ")
    }
}

/// Roll up a project: product rows, travel rows and expense rows, all already recomputed.
pub fn compute_profitability(
    rows: &[Row],
    travel_rows: &[Row],
    expense_rows: &[Row],
) -> Profitability {
    let mut breakdowns = Breakdowns {
        purchases: aggregate_purchases(rows),
        ..Breakdowns::default()
    };

    let mut revenue = 0.0;
    let mut total_hours = 0.0;
    for row in rows {
        revenue += number(row, fields::TOTAL_PRICE);
        total_hours += number(row, fields::HOURS_PREP)
            + number(row, fields::HOURS_ASSEMBLY)
            + number(row, fields::HOURS_INSTALL);
        breakdowns
            .subcontracted_installation
            .add(row, number(row, fields::SUBCONTRACT_INSTALL_BUY));
        breakdowns
            .subcontracted_assembly
            .add(row, number(row, fields::SUBCONTRACT_ASSEMBLY_BUY));
    }

    for row in travel_rows {
        breakdowns.travel.add(row, number(row, fields::TOTAL_PRICE));
    }

    for row in expense_rows {
        let amount = number(row, fields::TOTAL_PRICE);
        if product::is_commission_category(row.text(fields::EXPENSE_CATEGORY)) {
            breakdowns.commissions.add(row, amount);
        } else {
            breakdowns.other_expenses.add(row, amount);
        }
    }

    let fixed_material_cost = breakdowns.purchases.total_cost();
    let variable_charges = breakdowns.variable_charges();
    let gross_margin = revenue - fixed_material_cost;
    let contribution = gross_margin - variable_charges;
    let hourly_contribution = if total_hours > 0.0 {
        contribution / total_hours
    } else {
        0.0
    };
    log::trace!(
        "profitability: revenue {revenue:.2}, contribution {contribution:.2} over {total_hours:.2}h"
    );

    Profitability {
        kpis: Kpis {
            revenue,
            fixed_material_cost,
            variable_charges,
            commission_total: breakdowns.commissions.total,
            gross_margin,
            contribution,
            total_hours,
            hourly_contribution,
        },
        breakdowns,
    }
}

/// Revenue needed to earn `hourly_contribution` per labor hour, everything else equal.
///
/// Commissions scale with revenue at the project's current rate `r`; every other cost is held
/// fixed at `F`. Solves `revenue * (1 - r) = hourly_contribution * hours + F`.
pub fn target_revenue_for_hourly_contribution(
    hourly_contribution: f64,
    current: &Profitability,
) -> Result<f64, ProfitabilityError> {
    if !hourly_contribution.is_finite() {
        return Err(ProfitabilityError::InvalidTarget(hourly_contribution));
    }
    let kpis = &current.kpis;
    let commission_rate = if kpis.revenue == 0.0 {
        0.0
    } else {
        kpis.commission_total / kpis.revenue
    };
    let margin_share = 1.0 - commission_rate;
    if margin_share <= MIN_MARGIN_SHARE {
        return Err(ProfitabilityError::Infeasible { commission_rate });
    }
    let fixed = kpis.fixed_material_cost + (kpis.variable_charges - kpis.commission_total);
    Ok((hourly_contribution * kpis.total_hours + fixed) / margin_share)
}

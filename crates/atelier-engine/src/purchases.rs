//! Procurement totals per raw-material reference.
//!
//! Material slots do not all store their cost the same way. The table in [`purchase_slots`]
//! records, per slot, whether the row's buy field is already a line total, a cost per unit of
//! the row, or a price per linear meter. Do not collapse it into one rule.

use crate::rules::number;
use atelier_model::fields::{self, DECO_1, DECO_2, INTERLINING, LINING, TRIM_1, TRIM_2};
use atelier_model::{product, Row, RowId};
use serde::Serialize;
use std::collections::BTreeMap;

/// Output list a slot feeds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MaterialFamily {
    /// Decorative fabrics and trims.
    Fabric,
    /// Linings and interlinings.
    Lining,
    Rail,
}

/// How a slot's buy field relates to the purchased quantity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CostBasis {
    /// Already the cost of the whole line; summed as-is.
    LineTotal,
    /// Cost of one unit of the row; multiplied by the quantity.
    PerUnit,
    /// Price of one linear meter; multiplied by the meters and the quantity.
    PerMeter,
}

/// One material slot of a row, as the purchase report reads it.
#[derive(Clone, Copy, Debug)]
pub struct PurchaseSlot {
    /// Label of the material kind, as printed in the report.
    pub kind: &'static str,
    pub family: MaterialFamily,
    pub reference: &'static str,
    pub meters: &'static str,
    /// Divides the meters field (rail lengths are stored in cm).
    pub meters_divisor: f64,
    pub cost: &'static str,
    pub basis: CostBasis,
    pub pattern: Option<&'static str>,
    /// Extra condition for the slot to count.
    pub applies: fn(&Row) -> bool,
}

fn always(_: &Row) -> bool {
    true
}

fn has_rail(row: &Row) -> bool {
    row.text(fields::MECHANISM_TYPE).trim() == product::MECHANISM_RAIL
}

const fn material(
    kind: &'static str,
    family: MaterialFamily,
    slot: fields::MaterialSlot,
    basis: CostBasis,
    with_pattern: bool,
) -> PurchaseSlot {
    PurchaseSlot {
        kind,
        family,
        reference: slot.reference,
        meters: slot.meters,
        meters_divisor: 1.0,
        cost: slot.buy,
        basis,
        pattern: if with_pattern { Some(slot.pattern) } else { None },
        applies: always,
    }
}

const PURCHASE_SLOTS: [PurchaseSlot; 7] = [
    material("Tissu", MaterialFamily::Fabric, DECO_1, CostBasis::LineTotal, true),
    material("Tissu", MaterialFamily::Fabric, DECO_2, CostBasis::LineTotal, true),
    material("Doublure", MaterialFamily::Lining, LINING, CostBasis::PerUnit, false),
    material("Interdoublure", MaterialFamily::Lining, INTERLINING, CostBasis::PerUnit, false),
    material("Passementerie", MaterialFamily::Fabric, TRIM_1, CostBasis::PerMeter, false),
    material("Passementerie", MaterialFamily::Fabric, TRIM_2, CostBasis::PerMeter, false),
    PurchaseSlot {
        kind: "Rail",
        family: MaterialFamily::Rail,
        reference: fields::MECHANISM_MODEL,
        meters: fields::MECHANISM_WIDTH,
        meters_divisor: 100.0,
        cost: fields::MECHANISM_BUY,
        basis: CostBasis::PerUnit,
        pattern: None,
        applies: has_rail,
    },
];

/// The per-slot purchase table.
pub fn purchase_slots() -> &'static [PurchaseSlot] {
    &PURCHASE_SLOTS
}

/// A row's contribution to a group, for drill-down.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceRow {
    pub row_id: RowId,
    pub zone: String,
    pub room: String,
    pub product: String,
    /// `"<width> x <height>"`.
    pub dimensions: String,
    pub quantity: f64,
    pub linear_meters: f64,
    pub cost: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationGroup {
    pub kind: String,
    pub reference: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    /// `"<reference> (<pattern>)"`, or the reference alone.
    pub label: String,
    pub total_linear_meters: f64,
    pub total_cost: f64,
    pub source_rows: Vec<SourceRow>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct PurchaseSummary {
    #[serde(rename = "tissus")]
    pub fabrics: Vec<AggregationGroup>,
    #[serde(rename = "doublures")]
    pub linings: Vec<AggregationGroup>,
    pub rails: Vec<AggregationGroup>,
}

impl PurchaseSummary {
    pub fn groups(&self) -> impl Iterator<Item = &AggregationGroup> {
        self.fabrics.iter().chain(&self.linings).chain(&self.rails)
    }

    /// Buy cost of every material, the fixed material cost of the project.
    pub fn total_cost(&self) -> f64 {
        self.groups().map(|g| g.total_cost).sum()
    }

    pub fn find(&self, label: &str) -> Option<&AggregationGroup> {
        self.groups().find(|g| g.label == label)
    }
}

fn quantity(row: &Row) -> f64 {
    number(row, fields::QUANTITY).max(1.0)
}

fn format_dimension(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value}")
    }
}

/// Group the material use of `rows` by (kind, reference, pattern).
pub fn aggregate_purchases(rows: &[Row]) -> PurchaseSummary {
    let mut groups: BTreeMap<(MaterialFamily, &'static str, String, String), AggregationGroup> =
        BTreeMap::new();

    for row in rows {
        let quantity = quantity(row);
        for slot in purchase_slots() {
            if !(slot.applies)(row) {
                continue;
            }
            let reference = row.text(slot.reference).trim();
            let meters = number(row, slot.meters) / slot.meters_divisor;
            if reference.is_empty() || meters <= 0.0 {
                continue;
            }
            let pattern = slot
                .pattern
                .map(|key| row.text(key).trim())
                .filter(|p| !p.is_empty());

            let recorded = number(row, slot.cost);
            let cost = match slot.basis {
                CostBasis::LineTotal => recorded,
                CostBasis::PerUnit => recorded * quantity,
                CostBasis::PerMeter => recorded * meters * quantity,
            };
            let line_meters = meters * quantity;

            let key = (
                slot.family,
                slot.kind,
                reference.to_string(),
                pattern.unwrap_or_default().to_string(),
            );
            let group = groups.entry(key).or_insert_with(|| AggregationGroup {
                kind: slot.kind.to_string(),
                reference: reference.to_string(),
                pattern: pattern.map(str::to_string),
                label: match pattern {
                    Some(pattern) => format!("{reference} ({pattern})"),
                    None => reference.to_string(),
                },
                total_linear_meters: 0.0,
                total_cost: 0.0,
                source_rows: Vec::new(),
            });
            group.total_linear_meters += line_meters;
            group.total_cost += cost;
            group.source_rows.push(SourceRow {
                row_id: row.id.clone(),
                zone: row.text(fields::ZONE).to_string(),
                room: row.text(fields::ROOM).to_string(),
                product: row.text(fields::PRODUCT).to_string(),
                dimensions: format!(
                    "{} x {}",
                    format_dimension(number(row, fields::WIDTH)),
                    format_dimension(number(row, fields::HEIGHT))
                ),
                quantity,
                linear_meters: line_meters,
                cost,
            });
        }
    }

    let mut summary = PurchaseSummary::default();
    for ((family, ..), group) in groups {
        match family {
            MaterialFamily::Fabric => summary.fabrics.push(group),
            MaterialFamily::Lining => summary.linings.push(group),
            MaterialFamily::Rail => summary.rails.push(group),
        }
    }
    for list in [
        &mut summary.fabrics,
        &mut summary.linings,
        &mut summary.rails,
    ] {
        list.sort_by(|a, b| a.label.cmp(&b.label).then_with(|| a.kind.cmp(&b.kind)));
    }
    summary
}

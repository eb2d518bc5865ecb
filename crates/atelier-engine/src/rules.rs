//! Product-specific passes run after the formula pass.
//!
//! Each pass reads fields through the normalizer and only writes the fields it owns. Missing
//! catalog items and settings leave the row as it was.

use crate::context::RecomputeContext;
use atelier_formula::normalize;
use atelier_model::fields::{self, MaterialSlot, FABRIC_SLOTS};
use atelier_model::{product, CatalogItem, Row};

pub(crate) fn number(row: &Row, key: &str) -> f64 {
    row.get(key).map_or(0.0, normalize)
}

fn optional_text<'r>(row: &'r Row, key: &str) -> Option<&'r str> {
    Some(row.text(key).trim()).filter(|s| !s.is_empty())
}

/// Re-derive the cost of every fabric slot that references a catalog item from the freshly
/// computed yardage. Returns the reference fields that named an unknown item.
pub(crate) fn apply_catalog_fabrics(row: &mut Row, ctx: &RecomputeContext<'_>) -> Vec<String> {
    let mut unresolved = Vec::new();
    for slot in FABRIC_SLOTS {
        if !price_slot_from_catalog(row, &slot, ctx) {
            unresolved.push(slot.reference.to_string());
        }
    }
    unresolved
}

/// Buy and sell prices of a slot from its yardage and a catalog item. Sell is per unit of the
/// row; buy follows the slot's convention.
pub(crate) fn write_slot_prices(row: &mut Row, slot: &MaterialSlot, item: &CatalogItem) {
    let meters = number(row, slot.meters);
    let mut buy = meters * item.buy_price;
    if slot.buy_is_line_total {
        buy *= number(row, fields::QUANTITY).max(1.0);
    }
    row.set(slot.buy, buy);
    row.set(slot.sell, meters * item.sell_price);
}

enum Reference<'c> {
    /// No name and no id: the slot is not catalog-priced.
    Empty,
    /// The name was cleared on a slot that pointed at a catalog item.
    Cleared,
    Found(&'c CatalogItem),
    Unknown,
}

/// Resolve a catalog reference and keep the recorded id in step with the display name.
fn resolve_reference<'c>(
    row: &mut Row,
    ctx: &RecomputeContext<'c>,
    name_key: &str,
    id_key: &str,
) -> Reference<'c> {
    let name = row.text(name_key).trim().to_string();
    let id = optional_text(row, id_key).map(str::to_string);
    if name.is_empty() {
        if id.is_none() {
            return Reference::Empty;
        }
        row.remove(id_key);
        return Reference::Cleared;
    }
    let Some(item) = ctx.catalog.resolve(id.as_deref(), &name) else {
        log::warn!("row {}: {name_key} references unknown catalog item {name:?}", row.id);
        return Reference::Unknown;
    };
    if !item.id.is_empty() && id.as_deref() != Some(item.id.as_str()) {
        row.set(id_key, item.id.as_str());
    }
    Reference::Found(item)
}

/// `false` only when the slot names an item the catalog does not know.
fn price_slot_from_catalog(row: &mut Row, slot: &MaterialSlot, ctx: &RecomputeContext<'_>) -> bool {
    match resolve_reference(row, ctx, slot.reference, slot.reference_id) {
        Reference::Found(item) => write_slot_prices(row, slot, item),
        Reference::Cleared => {
            row.set(slot.buy, 0.0);
            row.set(slot.sell, 0.0);
        }
        Reference::Empty => {}
        Reference::Unknown => return false,
    }
    true
}

/// Rail pricing from the catalog, cleared dimension for blinds, nothing for manual rods.
/// Returns `false` when a rail model could not be resolved.
pub(crate) fn apply_mechanism(row: &mut Row, ctx: &RecomputeContext<'_>) -> bool {
    let mechanism_type = row.text(fields::MECHANISM_TYPE).trim().to_string();
    if mechanism_type == product::MECHANISM_RAIL {
        let item = match resolve_reference(
            row,
            ctx,
            fields::MECHANISM_MODEL,
            fields::MECHANISM_MODEL_ID,
        ) {
            Reference::Found(item) => item,
            Reference::Cleared => {
                row.set(fields::MECHANISM_BUY, 0.0);
                row.set(fields::MECHANISM_SELL, 0.0);
                return true;
            }
            Reference::Empty => return true,
            Reference::Unknown => return false,
        };
        if let Some(dimension) = &item.dimension {
            row.set(fields::MECHANISM_DIMENSION, dimension.as_str());
        }
        // Mechanism length is in cm, catalog prices are per meter.
        let meters = number(row, fields::MECHANISM_WIDTH) / 100.0;
        row.set(fields::MECHANISM_BUY, meters * item.buy_price);
        row.set(fields::MECHANISM_SELL, meters * item.sell_price);
    } else if product::is_blind_mechanism(&mechanism_type) {
        row.set(fields::MECHANISM_DIMENSION, "");
    }
    true
}

const LABOR_LINES: [(&str, &str); 3] = [
    (fields::HOURS_PREP, fields::SELL_PREP),
    (fields::HOURS_ASSEMBLY, fields::SELL_ASSEMBLY),
    (fields::HOURS_INSTALL, fields::SELL_INSTALL),
];

const SUBCONTRACT_LINES: [(&str, &str); 2] = [
    (fields::SUBCONTRACT_ASSEMBLY_BUY, fields::SUBCONTRACT_ASSEMBLY_SELL),
    (fields::SUBCONTRACT_INSTALL_BUY, fields::SUBCONTRACT_INSTALL_SELL),
];

/// Labor sell prices from hours and the hourly rate, subcontracting sell prices from cost and
/// the margin coefficient. Zero hours or cost leave the sell field alone.
pub(crate) fn apply_settings(row: &mut Row, ctx: &RecomputeContext<'_>) {
    if !product::is_labor_billed(row.text(fields::PRODUCT)) {
        return;
    }
    let settings = ctx.settings;
    for (hours_key, sell_key) in LABOR_LINES {
        let hours = number(row, hours_key);
        if hours > 0.0 {
            row.set(sell_key, hours * settings.hourly_rate);
        }
    }
    for (buy_key, sell_key) in SUBCONTRACT_LINES {
        let buy = number(row, buy_key);
        if buy > 0.0 {
            row.set(sell_key, buy * settings.subcontracting_coefficient);
        }
    }
}

/// Hours billed for a trip: half a day up to four hours, a full day beyond.
pub(crate) fn billed_hours(raw_hours: f64) -> f64 {
    if raw_hours <= 4.0 {
        4.0
    } else {
        8.0
    }
}

/// Travel rows: billed hours, nights, meals and total from trip data and settings.
pub(crate) fn apply_travel(row: &mut Row, ctx: &RecomputeContext<'_>) {
    if !product::is_site_survey(row.text(fields::TRAVEL_KIND)) {
        row.set(fields::ON_SITE_HOURS, 0.0);
    }
    let raw_hours = number(row, fields::TRIP_TIME) * number(row, fields::TRIP_COUNT)
        + number(row, fields::ON_SITE_HOURS);
    let billed = billed_hours(raw_hours);

    let technicians = number(row, fields::TECHNICIANS).max(1.0);
    let overnight = row.flag(fields::OVERNIGHT);
    let nights = if overnight { technicians } else { 0.0 };
    let meals = technicians * if overnight { 2.0 } else { 1.0 };

    let settings = ctx.settings;
    let total = billed * technicians * settings.hourly_rate
        + nights * settings.night_cost
        + meals * settings.meal_cost;

    row.set(fields::BILLED_HOURS, billed);
    row.set(fields::NIGHTS, nights);
    row.set(fields::MEALS, meals);
    row.set(fields::TOTAL_PRICE, total);
}

/// Commission rows: a percentage of the project revenue.
pub(crate) fn apply_commission(row: &mut Row, ctx: &RecomputeContext<'_>) {
    let percentage = number(row, fields::PERCENTAGE);
    let revenue = ctx.total_revenue.unwrap_or(0.0);
    row.set(fields::TOTAL_PRICE, percentage * revenue / 100.0);
}

//! Row recomputation.
//!
//! One call runs the passes below in order, each reading what earlier passes wrote:
//!
//! 1. formulas (per-cell override, else column default), in dependency order;
//! 2. fabric costs from the catalog and the fresh yardage;
//! 3. mechanism pricing;
//! 4. labor and subcontracting sell prices from the settings;
//! 5. travel rows: trip billing, then stop;
//! 6. commission rows: share of the project revenue;
//! 7. unit and total price formulas once more, since passes 2 to 4 moved their inputs.
//!
//! Nothing here fails. Formula errors display as `0` and are listed in the [`RecomputeReport`]
//! together with unresolved catalog references and formula cycles.

use crate::context::RecomputeContext;
use crate::graph::EvaluationPlan;
use crate::rules;
use atelier_formula::{EvalContext, Formula, FormulaError};
use atelier_model::fields::{self, MaterialSlot, MANUAL_YARDAGE_FIELDS};
use atelier_model::{product, CatalogItem, FieldValue, Row, RowId, Schema};

/// A formula that could not be parsed or evaluated. The field was set to `0`.
#[derive(Clone, Debug, PartialEq)]
pub struct FormulaFailure {
    pub field: String,
    pub formula: String,
    pub error: FormulaError,
}

/// Formula fields that depend on each other in a cycle.
#[derive(Clone, Debug, PartialEq)]
pub struct CycleReport {
    pub fields: Vec<String>,
    /// Evaluation sweeps over the cyclic block.
    pub iterations: u32,
    /// Whether the last sweep moved no field by more than the tolerance.
    pub converged: bool,
}

/// What went wrong while recomputing one row, for callers that want to log or surface it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RecomputeReport {
    pub row_id: RowId,
    pub failures: Vec<FormulaFailure>,
    /// Reference fields naming catalog items the catalog does not know.
    pub unresolved_references: Vec<String>,
    pub cycle: Option<CycleReport>,
}

impl RecomputeReport {
    fn new(row_id: RowId) -> Self {
        Self {
            row_id,
            ..Self::default()
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.unresolved_references.is_empty() && self.cycle.is_none()
    }

    fn record_failure(&mut self, field: &str, formula: &str, error: FormulaError) {
        if self.failures.iter().any(|f| f.field == field) {
            return;
        }
        log::debug!("row {}: {field} = {formula:?} failed: {error}", self.row_id);
        self.failures.push(FormulaFailure {
            field: field.to_string(),
            formula: formula.to_string(),
            error,
        });
    }
}

/// Recompute `row` against `schema`, returning the updated copy.
pub fn recompute(row: &Row, schema: &Schema, ctx: &RecomputeContext<'_>) -> Row {
    let mut updated = row.clone();
    recompute_in_place(&mut updated, schema, ctx);
    updated
}

/// Recompute `row` in place and report what could not be computed.
pub fn recompute_in_place(
    row: &mut Row,
    schema: &Schema,
    ctx: &RecomputeContext<'_>,
) -> RecomputeReport {
    let mut report = RecomputeReport::new(row.id.clone());
    let eval = ctx.eval_context();

    formula_pass(row, schema, ctx, &eval, &mut report);

    report
        .unresolved_references
        .extend(rules::apply_catalog_fabrics(row, ctx));
    if !rules::apply_mechanism(row, ctx) {
        report
            .unresolved_references
            .push(fields::MECHANISM_MODEL.to_string());
    }
    rules::apply_settings(row, ctx);

    if product::is_travel(row) {
        log::trace!("row {}: travel rules", row.id);
        rules::apply_travel(row, ctx);
        return report;
    }

    let commission = product::is_commission(row);
    if commission {
        rules::apply_commission(row, ctx);
    }

    // The commission total replaces whatever the total price formula says.
    for key in [fields::UNIT_PRICE, fields::TOTAL_PRICE] {
        if commission && key == fields::TOTAL_PRICE {
            continue;
        }
        let Some(source) = schema.effective_formula(row, key).map(str::to_string) else {
            continue;
        };
        match Formula::parse(&source) {
            Ok(formula) => {
                evaluate_into(row, key, &formula, &eval, &mut report);
            }
            Err(err) => {
                report.record_failure(key, &source, err);
                row.set(key, 0.0);
            }
        }
    }

    report
}

fn formula_pass(
    row: &mut Row,
    schema: &Schema,
    ctx: &RecomputeContext<'_>,
    eval: &EvalContext<'_>,
    report: &mut RecomputeReport,
) {
    let manual_yardage = product::is_manual_yardage(row.text(fields::PRODUCT));

    let mut parsed: Vec<(String, Formula)> = Vec::new();
    for column in &schema.columns {
        if manual_yardage && MANUAL_YARDAGE_FIELDS.contains(&column.key.as_str()) {
            continue;
        }
        let Some(source) = schema.effective_formula(row, &column.key).map(str::to_string) else {
            continue;
        };
        match Formula::parse(&source) {
            Ok(formula) => parsed.push((column.key.clone(), formula)),
            Err(err) => {
                report.record_failure(&column.key, &source, err);
                row.set(&column.key, 0.0);
            }
        }
    }

    let formulas: Vec<(&str, &Formula)> = parsed.iter().map(|(k, f)| (k.as_str(), f)).collect();
    let plan = EvaluationPlan::build(&formulas);
    log::trace!(
        "row {}: {} formula fields, {} in cycles",
        row.id,
        formulas.len(),
        plan.blocked().len()
    );

    for &idx in plan.order() {
        let (key, formula) = formulas[idx];
        evaluate_into(row, key, formula, eval, report);
    }

    if plan.is_acyclic() {
        return;
    }

    log::warn!(
        "row {}: formula cycle between {}",
        row.id,
        plan.cycle().join(", ")
    );
    let settings = ctx.iteration;
    let sweep = |row: &mut Row, report: &mut RecomputeReport| {
        plan.blocked()
            .iter()
            .map(|&idx| {
                let (key, formula) = formulas[idx];
                evaluate_into(row, key, formula, eval, report)
            })
            .fold(0.0_f64, f64::max)
    };

    let mut iterations = 1;
    let mut change = sweep(row, report);
    if settings.enabled {
        while change > settings.max_change && iterations < settings.max_iterations {
            change = sweep(row, report);
            iterations += 1;
        }
    }
    report.cycle = Some(CycleReport {
        fields: plan.cycle().to_vec(),
        iterations,
        converged: change <= settings.max_change,
    });
}

/// Evaluate `formula` into `key`, returning how far the field moved.
fn evaluate_into(
    row: &mut Row,
    key: &str,
    formula: &Formula,
    eval: &EvalContext<'_>,
    report: &mut RecomputeReport,
) -> f64 {
    let value = match formula.evaluate(row, eval) {
        Ok(value) => value.into_field_value(),
        Err(err) => {
            report.record_failure(key, formula.source(), err);
            FieldValue::Number(0.0)
        }
    };
    let change = match (row.get(key), &value) {
        (Some(FieldValue::Number(old)), FieldValue::Number(new)) => (new - old).abs(),
        (Some(old), new) if old == new => 0.0,
        _ => f64::INFINITY,
    };
    row.set(key, value);
    change
}

/// Point a material slot at a catalog item: the id for later resolution, the name for display,
/// the roll width and pattern repeats, and costs for the current yardage.
pub fn select_catalog_item(row: &mut Row, slot: &MaterialSlot, item: &CatalogItem) {
    row.set(slot.reference_id, item.id.as_str());
    row.set(slot.reference, item.name.as_str());
    row.set(slot.width, item.width);
    let (repeat_v, repeat_h) = if item.has_pattern {
        (item.pattern_repeat_v, item.pattern_repeat_h)
    } else {
        (0.0, 0.0)
    };
    row.set(slot.repeat_v, repeat_v);
    row.set(slot.repeat_h, repeat_h);

    rules::write_slot_prices(row, slot, item);
}

/// Point the mechanism at a catalog model. Pricing follows on the next recomputation.
pub fn select_mechanism_model(row: &mut Row, item: &CatalogItem) {
    row.set(fields::MECHANISM_MODEL_ID, item.id.as_str());
    row.set(fields::MECHANISM_MODEL, item.name.as_str());
    if let Some(dimension) = &item.dimension {
        row.set(fields::MECHANISM_DIMENSION, dimension.as_str());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atelier_model::{schemas, Catalog, ColumnSpec, ColumnType, IterationSettings, Settings};
    use pretty_assertions::assert_eq;

    fn num(row: &Row, key: &str) -> f64 {
        rules::number(row, key)
    }

    fn curtain() -> Row {
        Row::new("r1")
            .with(fields::PRODUCT, "Rideau")
            .with(fields::QUANTITY, 2)
            .with(fields::WIDTH, 200)
            .with(fields::HEIGHT, 250)
            .with(fields::FULLNESS, 2)
            .with(fields::DECO_1.reference, "Lin Naturel")
    }

    fn catalog() -> Catalog {
        let mut lin = atelier_model::CatalogItem::new("f-1", "Lin Naturel").with_prices(12.0, 30.0);
        lin.width = 140.0;
        Catalog::new(vec![lin])
    }

    #[test]
    fn curtain_row_flows_through_every_pass() {
        let catalog = catalog();
        let settings = Settings {
            hourly_rate: 40.0,
            ..Settings::default()
        };
        let ctx = RecomputeContext::new(&catalog, &settings);
        let mut row = curtain();
        let report = recompute_in_place(&mut row, &schemas::curtains(), &ctx);

        assert!(report.is_clean(), "{report:?}");
        // 200 * 2 / 140 = 2.86 -> 3 widths
        assert_eq!(num(&row, fields::WIDTH_COUNT), 3.0);
        // 3 * (250 + 30) / 100
        assert_eq!(num(&row, fields::DECO_1.meters), 8.4);
        // Decorative buy is the whole line: quantity 2.
        assert!((num(&row, fields::DECO_1.buy) - 8.4 * 12.0 * 2.0).abs() < 1e-9);
        assert!((num(&row, fields::DECO_1.sell) - 8.4 * 30.0).abs() < 1e-9);
        assert_eq!(num(&row, fields::MECHANISM_WIDTH), 210.0);
        // 0.25 + 0.3 hours of prep at 40/h
        assert!((num(&row, fields::SELL_PREP) - 22.0).abs() < 1e-9);

        assert!((num(&row, fields::SELL_ASSEMBLY) - 90.0).abs() < 1e-9);
        assert!(
            (num(&row, fields::SELL_INSTALL) - num(&row, fields::HOURS_INSTALL) * 40.0).abs()
                < 1e-9
        );

        // Unit price was re-evaluated after the settings pass filled the labor prices.
        let unit = num(&row, fields::UNIT_PRICE);
        let expected_unit = num(&row, fields::DECO_1.sell)
            + num(&row, fields::SELL_PREP)
            + num(&row, fields::SELL_ASSEMBLY)
            + num(&row, fields::SELL_INSTALL);
        assert!((unit - expected_unit).abs() < 0.01, "unit = {unit}");
        assert!((num(&row, fields::TOTAL_PRICE) - unit * 2.0).abs() < 0.01);
    }

    #[test]
    fn input_row_is_not_mutated() {
        let catalog = catalog();
        let settings = Settings::default();
        let ctx = RecomputeContext::new(&catalog, &settings);
        let row = curtain();
        let updated = recompute(&row, &schemas::curtains(), &ctx);
        assert_eq!(row, curtain());
        assert_ne!(updated, row);
    }

    #[test]
    fn broken_override_reads_as_zero_and_is_reported() {
        let catalog = Catalog::default();
        let settings = Settings::default();
        let ctx = RecomputeContext::new(&catalog, &settings);
        let mut row = curtain().with_formula(fields::MECHANISM_WIDTH, "largeur + + (");
        let report = recompute_in_place(&mut row, &schemas::curtains(), &ctx);

        assert_eq!(num(&row, fields::MECHANISM_WIDTH), 0.0);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].field, fields::MECHANISM_WIDTH);
        assert!(matches!(report.failures[0].error, FormulaError::Parse(_)));
    }

    #[test]
    fn unknown_catalog_reference_is_reported() {
        let catalog = Catalog::default();
        let settings = Settings::default();
        let ctx = RecomputeContext::new(&catalog, &settings);
        let mut row = curtain();
        let report = recompute_in_place(&mut row, &schemas::curtains(), &ctx);
        assert_eq!(
            report.unresolved_references,
            vec![fields::DECO_1.reference.to_string()]
        );
    }

    fn cyclic_schema() -> Schema {
        Schema::new(
            "cycle",
            vec![
                ColumnSpec::new("base", ColumnType::Number),
                // x = base + x / 2 settles at x = 2 * base.
                ColumnSpec::computed("x", "{base} + {y}"),
                ColumnSpec::computed("y", "{x} / 2"),
            ],
        )
    }

    #[test]
    fn cycles_iterate_to_convergence() {
        let catalog = Catalog::default();
        let settings = Settings::default();
        let ctx = RecomputeContext::new(&catalog, &settings);
        let mut row = Row::new("c").with("base", 10);
        let report = recompute_in_place(&mut row, &cyclic_schema(), &ctx);

        let cycle = report.cycle.unwrap();
        assert_eq!(cycle.fields, vec!["x", "y"]);
        assert!(cycle.converged);
        assert!(cycle.iterations > 1 && cycle.iterations <= 100);
        assert!((num(&row, "x") - 20.0).abs() < 0.01);
    }

    #[test]
    fn cycles_run_once_without_iteration() {
        let catalog = Catalog::default();
        let settings = Settings::default();
        let ctx = RecomputeContext::new(&catalog, &settings).with_iteration(IterationSettings {
            enabled: false,
            ..IterationSettings::default()
        });
        let mut row = Row::new("c").with("base", 10);
        let report = recompute_in_place(&mut row, &cyclic_schema(), &ctx);

        let cycle = report.cycle.unwrap();
        assert_eq!(cycle.iterations, 1);
        assert!(!cycle.converged);
        // Schema order: x = 10 + 0, then y = 10 / 2.
        assert_eq!(num(&row, "x"), 10.0);
        assert_eq!(num(&row, "y"), 5.0);
    }

    #[test]
    fn selecting_a_fabric_records_id_and_attributes() {
        let mut item =
            atelier_model::CatalogItem::new("f-9", "Toile de Jouy").with_prices(20.0, 45.0);
        item.width = 280.0;
        item.has_pattern = true;
        item.pattern_repeat_v = 64.0;
        item.pattern_repeat_h = 32.0;

        let mut row = Row::new("r").with(fields::DECO_1.meters, 2);
        select_catalog_item(&mut row, &fields::DECO_1, &item);

        assert_eq!(row.text(fields::DECO_1.reference_id), "f-9");
        assert_eq!(row.text(fields::DECO_1.reference), "Toile de Jouy");
        assert_eq!(num(&row, fields::DECO_1.width), 280.0);
        assert_eq!(num(&row, fields::DECO_1.repeat_v), 64.0);
        assert_eq!(num(&row, fields::DECO_1.repeat_h), 32.0);
        assert_eq!(num(&row, fields::DECO_1.buy), 40.0);
        assert_eq!(num(&row, fields::DECO_1.sell), 90.0);
    }

    #[test]
    fn renamed_catalog_item_still_resolves_by_id() {
        let item = atelier_model::CatalogItem::new("f-1", "Lin Naturel").with_prices(12.0, 30.0);
        let mut row = Row::new("r")
            .with(fields::PRODUCT, "Rideau")
            .with(fields::DECO_1.meters, 3);
        select_catalog_item(&mut row, &fields::DECO_1, &item);

        let renamed =
            atelier_model::CatalogItem::new("f-1", "Lin Naturel Lavé").with_prices(14.0, 32.0);
        let catalog = Catalog::new(vec![renamed]);
        let settings = Settings::default();
        let ctx = RecomputeContext::new(&catalog, &settings);
        let schema = Schema::new("plain", vec![]);
        let report = recompute_in_place(&mut row, &schema, &ctx);

        assert!(report.unresolved_references.is_empty());
        assert_eq!(num(&row, fields::DECO_1.buy), 42.0);
    }

    #[test]
    fn selecting_a_mechanism_keeps_its_dimension() {
        let mut rail = atelier_model::CatalogItem::new("m-1", "Rail KS");
        rail.dimension = Some("20 x 15".to_string());
        let mut row = Row::new("r");
        select_mechanism_model(&mut row, &rail);
        assert_eq!(row.text(fields::MECHANISM_MODEL_ID), "m-1");
        assert_eq!(row.text(fields::MECHANISM_MODEL), "Rail KS");
        assert_eq!(row.text(fields::MECHANISM_DIMENSION), "20 x 15");
    }
}

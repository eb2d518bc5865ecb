//! Default column sets of the workshop grids.
//!
//! Formulas read optional inputs through braces (`{laize_tissu_deco1}`) so a row that never set
//! the field still evaluates, with the field reading as empty.

use crate::fields::{self, DECO_1, DECO_2, INTERLINING, LINING, TRIM_1};
use crate::{product, ColumnSpec, ColumnType, Row, Schema};

fn text(key: &str) -> ColumnSpec {
    ColumnSpec::new(key, ColumnType::Text)
}

fn select(key: &str) -> ColumnSpec {
    ColumnSpec::new(key, ColumnType::Select)
}

fn number(key: &str) -> ColumnSpec {
    ColumnSpec::new(key, ColumnType::Number)
}

fn boolean(key: &str) -> ColumnSpec {
    ColumnSpec::new(key, ColumnType::Boolean)
}

fn computed(key: &str, formula: &str) -> ColumnSpec {
    ColumnSpec::computed(key, formula)
}

fn identity_columns() -> Vec<ColumnSpec> {
    vec![
        text(fields::ZONE),
        text(fields::ROOM),
        select(fields::PRODUCT),
        number(fields::QUANTITY),
        number(fields::WIDTH),
        number(fields::HEIGHT),
    ]
}

fn fabric_columns(slot: fields::MaterialSlot, yardage: Option<&str>) -> Vec<ColumnSpec> {
    let meters = match yardage {
        Some(formula) => number(slot.meters).with_formula(formula),
        None => number(slot.meters),
    };
    vec![
        select(slot.reference),
        number(slot.width),
        number(slot.repeat_v),
        meters,
        number(slot.buy).read_only(),
        number(slot.sell).read_only(),
    ]
}

fn labor_columns(install_hours: &str) -> Vec<ColumnSpec> {
    vec![
        number(fields::HOURS_PREP).with_formula("ROUND(0.25 + {nb_les} * 0.1, 2)"),
        number(fields::HOURS_ASSEMBLY).with_formula("ROUND({nb_les} * 0.75, 2)"),
        number(fields::HOURS_INSTALL).with_formula(install_hours),
        number(fields::SELL_PREP).read_only(),
        number(fields::SELL_ASSEMBLY).read_only(),
        number(fields::SELL_INSTALL).read_only(),
        number(fields::SUBCONTRACT_ASSEMBLY_BUY),
        number(fields::SUBCONTRACT_ASSEMBLY_SELL).read_only(),
        number(fields::SUBCONTRACT_INSTALL_BUY),
        number(fields::SUBCONTRACT_INSTALL_SELL).read_only(),
    ]
}

/// Rail prices come from the catalog; other mechanisms are priced by hand.
fn has_rail(row: &Row) -> bool {
    row.text(fields::MECHANISM_TYPE).trim() == product::MECHANISM_RAIL
}

fn mechanism_columns(width_formula: &str) -> Vec<ColumnSpec> {
    vec![
        select(fields::MECHANISM_TYPE),
        select(fields::MECHANISM_MODEL),
        number(fields::MECHANISM_WIDTH).with_formula(width_formula),
        text(fields::MECHANISM_DIMENSION),
        number(fields::MECHANISM_BUY).read_only_when(has_rail),
        number(fields::MECHANISM_SELL).read_only_when(has_rail),
    ]
}

fn price_columns(unit_price: &str) -> Vec<ColumnSpec> {
    vec![
        computed(fields::UNIT_PRICE, unit_price),
        computed(
            fields::TOTAL_PRICE,
            "ROUND({prix_unitaire} * MAX(1, {quantite}), 2)",
        ),
    ]
}

const LABOR_AND_MECHANISM_SELL: &str =
    "{pv_mecanisme} + {pv_prepa} + {pv_confection} + {pv_pose} + {pv_st_confection} + {pv_st_pose}";

/// Made-to-measure curtains and sheers.
pub fn curtains() -> Schema {
    let mut columns = identity_columns();
    columns.push(number(fields::FULLNESS));
    columns.push(computed(
        fields::WIDTH_COUNT,
        "ROUNDUP({largeur} * NVL({ampleur}, 2) / NVL({laize_tissu_deco1}, 140))",
    ));
    columns.extend(fabric_columns(
        DECO_1,
        Some("ROUND({nb_les} * ({hauteur} + 30 + NVL({raccord_v_tissu_deco1}, 0)) / 100, 2)"),
    ));
    columns.extend(fabric_columns(DECO_2, None));
    columns.extend(fabric_columns(
        LINING,
        Some("ROUND({nb_les} * ({hauteur} + 20) / 100, 2)"),
    ));
    columns.extend(fabric_columns(
        INTERLINING,
        Some("ROUND({nb_les} * ({hauteur} + 20) / 100, 2)"),
    ));
    columns.extend(mechanism_columns("{largeur} + 10"));
    columns.extend(labor_columns("ROUND(0.5 + {largeur_mecanisme} / 400, 2)"));
    columns.extend(price_columns(&format!(
        "ROUND({{pv_tissu_deco1}} + {{pv_tissu_deco2}} + {{pv_doublure}} + {{pv_interdoublure}} + {LABOR_AND_MECHANISM_SELL}, 2)"
    )));
    Schema::new("rideaux", columns)
}

/// Blinds: yardage is typed by hand, the default formula only pre-fills new rows. Hours are per
/// blind.
pub fn blinds() -> Schema {
    let mut columns = identity_columns();
    columns.extend(fabric_columns(
        DECO_1,
        Some("ROUND(({largeur} + 10) * ({hauteur} + 30) / 10000, 2)"),
    ));
    columns.extend(mechanism_columns("{largeur}"));
    columns.push(computed(fields::WIDTH_COUNT, "1"));
    columns.extend(labor_columns("0.75"));
    columns.extend(price_columns(&format!(
        "ROUND({{pv_tissu_deco1}} + {LABOR_AND_MECHANISM_SELL}, 2)"
    )));
    Schema::new("stores", columns)
}

/// Bed covers, headboards, cushions.
pub fn bed_covers() -> Schema {
    let mut columns = identity_columns();
    columns.push(computed(fields::WIDTH_COUNT, "1"));
    columns.extend(fabric_columns(DECO_1, None));
    columns.extend(fabric_columns(DECO_2, None));
    columns.extend(fabric_columns(LINING, None));
    columns.push(select(TRIM_1.reference));
    columns.push(computed(
        TRIM_1.meters,
        "ROUND(({largeur} + 2 * {hauteur}) / 100, 2)",
    ));
    columns.push(number(TRIM_1.buy));
    columns.push(number(TRIM_1.sell));
    columns.extend(labor_columns("0"));
    columns.extend(price_columns(&format!(
        "ROUND({{pv_tissu_deco1}} + {{pv_tissu_deco2}} + {{pv_doublure}} + {{ml_passementerie1}} * {{pv_passementerie1}} + {LABOR_AND_MECHANISM_SELL}, 2)"
    )));
    Schema::new("decors_lit", columns)
}

/// Free-form lines: supplies, commissions, miscellaneous expenses.
pub fn other() -> Schema {
    let mut columns = vec![
        select(fields::PRODUCT),
        select(fields::EXPENSE_CATEGORY),
        text("libelle"),
        number(fields::QUANTITY),
        number(fields::PERCENTAGE),
        number(fields::AMOUNT),
    ];
    columns.extend(price_columns("{montant}"));
    if let Some(total) = columns.iter_mut().find(|c| c.key == fields::TOTAL_PRICE) {
        // Commission totals are derived from the project revenue.
        total.read_only_when = Some(product::is_commission);
        total.read_only = false;
    }
    Schema::new("autres", columns)
}

/// Technician trips. Every derived field comes from the travel rules, not from formulas.
pub fn travel() -> Schema {
    Schema::new(
        "deplacements",
        vec![
            select(fields::PRODUCT),
            select(fields::TRAVEL_KIND),
            number(fields::TRIP_TIME),
            number(fields::TRIP_COUNT),
            number(fields::ON_SITE_HOURS),
            number(fields::TECHNICIANS),
            boolean(fields::OVERNIGHT),
            number(fields::BILLED_HOURS).read_only(),
            number(fields::NIGHTS).read_only(),
            number(fields::MEALS).read_only(),
            number(fields::TOTAL_PRICE).read_only(),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn built_in_schemas_have_unique_keys() {
        for schema in [curtains(), blinds(), bed_covers(), other(), travel()] {
            schema.check_unique_keys().unwrap();
        }
    }

    #[test]
    fn price_columns_carry_formulas() {
        let schema = curtains();
        let unit = schema.column(fields::UNIT_PRICE).unwrap();
        assert!(unit.default_formula().unwrap().contains("{pv_tissu_deco1}"));
        assert!(schema.column(fields::TOTAL_PRICE).unwrap().read_only);
    }

    #[test]
    fn read_only_depends_on_the_row() {
        let curtains = curtains();
        let buy = curtains.column(fields::MECHANISM_BUY).unwrap();
        assert!(buy.is_read_only(&Row::new("a").with(fields::MECHANISM_TYPE, "Rail")));
        assert!(!buy.is_read_only(&Row::new("b").with(fields::MECHANISM_TYPE, "Tringle")));

        let other = other();
        let total = other.column(fields::TOTAL_PRICE).unwrap();
        let commission = Row::new("c")
            .with(fields::PRODUCT, product::OTHER_EXPENSE)
            .with(fields::EXPENSE_CATEGORY, "Commission");
        assert!(total.is_read_only(&commission));
        assert!(!total.is_read_only(&Row::new("d").with(fields::PRODUCT, product::OTHER_EXPENSE)));
    }
}

use atelier_engine::{
    aggregate_purchases, compute_profitability, export_purchases_csv, recompute_all,
    target_revenue_for_hourly_contribution, ProfitabilityError, RecomputeContext,
};
use atelier_model::fields::{self, DECO_1, LINING};
use atelier_model::{product, schemas, Catalog, CatalogItem, Row, Settings};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn linen_row(id: &str, meters: f64) -> Row {
    Row::new(id)
        .with(fields::PRODUCT, "Rideau")
        .with(fields::QUANTITY, 1)
        .with(DECO_1.reference, "Lin Naturel")
        .with(DECO_1.meters, meters)
}

#[test]
fn same_fabric_rows_are_grouped() {
    let summary = aggregate_purchases(&[linen_row("a", 2.0), linen_row("b", 3.0)]);
    assert_eq!(summary.fabrics.len(), 1);
    assert_eq!(summary.fabrics[0].label, "Lin Naturel");
    assert_eq!(summary.fabrics[0].total_linear_meters, 5.0);
    let ids: Vec<String> = summary.fabrics[0]
        .source_rows
        .iter()
        .map(|r| r.row_id.to_string())
        .collect();
    assert_eq!(ids, vec!["a", "b"]);
}

#[test]
fn recomputed_project_feeds_purchases_and_csv() {
    let mut linen = CatalogItem::new("f-1", "Lin Naturel").with_prices(12.0, 30.0);
    linen.width = 140.0;
    let satin = CatalogItem::new("d-1", "Satin; Ivoire").with_prices(6.0, 14.0);
    let catalog = Catalog::new(vec![linen, satin]);
    let settings = Settings::default();
    let ctx = RecomputeContext::new(&catalog, &settings);

    let mut rows = vec![
        Row::new("r1")
            .with(fields::PRODUCT, "Rideau")
            .with(fields::QUANTITY, 2)
            .with(fields::WIDTH, 140)
            .with(fields::HEIGHT, 170)
            .with(DECO_1.reference, "Lin Naturel")
            .with(LINING.reference, "Satin; Ivoire"),
    ];
    let reports = recompute_all(&mut rows, &schemas::curtains(), &ctx);
    assert!(reports[0].unresolved_references.is_empty());

    // 140 * 2 / 140 = 2 widths; deco 2 * 200 / 100 = 4 ml, lining 2 * 190 / 100 = 3.8 ml.
    let summary = aggregate_purchases(&rows);
    let linen = summary.find("Lin Naturel").unwrap();
    assert_eq!(linen.total_linear_meters, 8.0);
    // 8 ml at 12 per ml.
    assert_eq!(linen.total_cost, 96.0);
    let lining = summary.find("Satin; Ivoire").unwrap();
    assert!((lining.total_linear_meters - 7.6).abs() < 1e-9);
    assert!((lining.total_cost - 45.6).abs() < 1e-9);

    let csv = export_purchases_csv(&summary).unwrap();
    assert_eq!(
        csv,
        "Famille;Référence;Total ML;Total PA\n\
         Tissu;Lin Naturel;8.00;96.00\n\
         Doublure;\"Satin; Ivoire\";7.60;45.60\n"
    );
}

#[test]
fn decorative_fabric_cost_scales_with_quantity() {
    let catalog = Catalog::new(vec![
        CatalogItem::new("f-1", "Lin Naturel").with_prices(12.0, 30.0)
    ]);
    let settings = Settings::default();
    let ctx = RecomputeContext::new(&catalog, &settings);
    let row = |id: &str, quantity: f64| {
        Row::new(id)
            .with(fields::PRODUCT, "Coussin")
            .with(fields::QUANTITY, quantity)
            .with(DECO_1.reference, "Lin Naturel")
            .with(DECO_1.meters, 4)
    };
    let schema = atelier_model::Schema::new("plain", vec![]);

    for quantity in [1.0, 2.0] {
        let mut rows = vec![row("r", quantity)];
        recompute_all(&mut rows, &schema, &ctx);
        let summary = aggregate_purchases(&rows);
        let linen = summary.find("Lin Naturel").unwrap();
        assert_eq!(linen.total_linear_meters, 4.0 * quantity);
        assert_eq!(linen.total_cost, 48.0 * quantity);
        assert_eq!(summary.total_cost(), 12.0 * linen.total_linear_meters);
    }
}

fn workshop_project(commission: f64) -> (Vec<Row>, Vec<Row>, Vec<Row>) {
    let rows = vec![
        linen_row("p1", 6.0)
            .with(DECO_1.buy, 72)
            .with(fields::TOTAL_PRICE, 1450)
            .with(fields::HOURS_PREP, 1.5)
            .with(fields::HOURS_ASSEMBLY, 4)
            .with(fields::HOURS_INSTALL, 2)
            .with(fields::SUBCONTRACT_ASSEMBLY_BUY, 80),
        linen_row("p2", 3.0)
            .with(DECO_1.buy, 36)
            .with(fields::TOTAL_PRICE, 640)
            .with(fields::HOURS_ASSEMBLY, 2.5),
    ];
    let travel = vec![Row::new("t1")
        .with(fields::PRODUCT, product::TRAVEL)
        .with(fields::TOTAL_PRICE, 215)];
    let expenses = vec![Row::new("e1")
        .with(fields::PRODUCT, product::OTHER_EXPENSE)
        .with(fields::EXPENSE_CATEGORY, "Commission")
        .with(fields::TOTAL_PRICE, commission)];
    (rows, travel, expenses)
}

#[test]
fn solving_for_the_current_rate_recovers_current_revenue() {
    let (rows, travel, expenses) = workshop_project(0.0);
    let current = compute_profitability(&rows, &travel, &expenses);
    assert_eq!(current.kpis.revenue, 2090.0);
    assert_eq!(current.kpis.total_hours, 10.0);

    let target =
        target_revenue_for_hourly_contribution(current.kpis.hourly_contribution, &current).unwrap();
    assert!((target - current.kpis.revenue).abs() < 1e-6, "target = {target}");
}

#[test]
fn near_total_commission_is_infeasible() {
    let (rows, travel, expenses) = workshop_project(2080.0);
    let current = compute_profitability(&rows, &travel, &expenses);
    let result = target_revenue_for_hourly_contribution(40.0, &current);
    match result {
        Err(ProfitabilityError::Infeasible { commission_rate }) => {
            assert!(commission_rate > 0.99, "rate = {commission_rate}")
        }
        other => panic!("expected infeasible, got {other:?}"),
    }
}

proptest! {
    #[test]
    fn solver_round_trips_any_commission_rate(
        commission_share in 0.0f64..0.9,
        extra_hours in 0.0f64..40.0,
    ) {
        let (mut rows, travel, _) = workshop_project(0.0);
        rows[1].set(fields::HOURS_INSTALL, extra_hours);
        let revenue = 2090.0;
        let expenses = vec![Row::new("e1")
            .with(fields::EXPENSE_CATEGORY, "commission")
            .with(fields::TOTAL_PRICE, revenue * commission_share)];

        let current = compute_profitability(&rows, &travel, &expenses);
        let target = target_revenue_for_hourly_contribution(
            current.kpis.hourly_contribution,
            &current,
        )
        .unwrap();
        prop_assert!((target - current.kpis.revenue).abs() < 1e-6 * revenue);
    }
}

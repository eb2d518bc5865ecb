use atelier_model::{Catalog, ColumnType, FieldValue, Row, Schema, Settings};
use pretty_assertions::assert_eq;
use std::collections::HashMap;

#[test]
fn grid_payloads_deserialize() {
    let schema = Schema::from_json_str(
        r#"{
            "name": "rideaux",
            "columns": [
                { "key": "produit", "type": "select" },
                { "key": "largeur", "type": "number" },
                { "key": "largeur_mecanisme", "type": "formula", "formula": "{largeur} + 10", "readOnly": true },
                { "key": "photos", "type": "photo" },
                { "key": "actions", "type": "button" },
                { "key": "livraison", "type": "date_picker" }
            ]
        }"#,
    )
    .unwrap();
    let types: Vec<ColumnType> = schema.columns.iter().map(|c| c.column_type).collect();
    assert_eq!(
        types,
        vec![
            ColumnType::Select,
            ColumnType::Number,
            ColumnType::Formula,
            ColumnType::Photo,
            ColumnType::Button,
            ColumnType::Other,
        ]
    );

    let row = Row::from_json_str(
        r#"{
            "id": "r1",
            "produit": "Rideau",
            "largeur": "1 200,5",
            "decouchage": true,
            "photos": [{ "url": "a.jpg" }],
            "cellFormulas": { "largeur_mecanisme": "{largeur} + 20" }
        }"#,
    )
    .unwrap();
    assert_eq!(
        schema.effective_formula(&row, "largeur_mecanisme"),
        Some("{largeur} + 20")
    );
    assert!(row.flag("decouchage"));
    assert!(matches!(row.get("photos"), Some(FieldValue::List(items)) if items.len() == 1));

    let catalog = Catalog::from_json_str(
        r#"[
            { "id": "f-1", "name": "Lin Naturel", "category": "Tissu", "buyPrice": 12, "sellPrice": 30, "width": 140 },
            { "id": "r-1", "name": "Rail KS", "category": "Rail", "buyPrice": 8.5, "dimension": "20 x 15" }
        ]"#,
    )
    .unwrap();
    let rail = catalog.resolve(Some("r-1"), "Rail KS").unwrap();
    assert_eq!(rail.dimension.as_deref(), Some("20 x 15"));
    assert_eq!(catalog.resolve(None, "Lin Naturel").unwrap().width, 140.0);
}

#[test]
fn settings_from_store_map_and_json() {
    let map: HashMap<String, f64> = [
        ("taux_horaire".to_string(), 48.0),
        ("cout_repas".to_string(), 16.5),
        ("inconnu".to_string(), 3.0),
    ]
    .into_iter()
    .collect();
    let from_map = Settings::from_map(&map);
    assert_eq!(from_map.hourly_rate, 48.0);
    assert_eq!(from_map.meal_cost, 16.5);
    assert_eq!(from_map.subcontracting_coefficient, 1.0);

    let from_json: Settings =
        serde_json::from_str(r#"{ "taux_horaire": 48, "cout_repas": 16.5 }"#).unwrap();
    assert_eq!(from_json, from_map);
}

//! Canonical field keys shared by the grids and the engine.
//!
//! The keys are the ones persisted in existing quotes, so they stay in French.

pub const PRODUCT: &str = "produit";
pub const ZONE: &str = "zone";
pub const ROOM: &str = "piece";
pub const WIDTH: &str = "largeur";
pub const HEIGHT: &str = "hauteur";
pub const QUANTITY: &str = "quantite";
pub const FULLNESS: &str = "ampleur";
pub const WIDTH_COUNT: &str = "nb_les";

pub const MECHANISM_TYPE: &str = "type_mecanisme";
pub const MECHANISM_MODEL: &str = "modele_mecanisme";
pub const MECHANISM_MODEL_ID: &str = "modele_mecanisme_id";
/// Mechanism length, in cm.
pub const MECHANISM_WIDTH: &str = "largeur_mecanisme";
pub const MECHANISM_DIMENSION: &str = "dimension_mecanisme";
pub const MECHANISM_BUY: &str = "pa_mecanisme";
pub const MECHANISM_SELL: &str = "pv_mecanisme";

pub const HOURS_PREP: &str = "heures_prepa";
pub const HOURS_ASSEMBLY: &str = "heures_confection";
pub const HOURS_INSTALL: &str = "heures_pose";
pub const SELL_PREP: &str = "pv_prepa";
pub const SELL_ASSEMBLY: &str = "pv_confection";
pub const SELL_INSTALL: &str = "pv_pose";

pub const SUBCONTRACT_ASSEMBLY_BUY: &str = "pa_st_confection";
pub const SUBCONTRACT_ASSEMBLY_SELL: &str = "pv_st_confection";
pub const SUBCONTRACT_INSTALL_BUY: &str = "pa_st_pose";
pub const SUBCONTRACT_INSTALL_SELL: &str = "pv_st_pose";

pub const UNIT_PRICE: &str = "prix_unitaire";
pub const TOTAL_PRICE: &str = "prix_total";

pub const TRAVEL_KIND: &str = "type_deplacement";
pub const TRIP_TIME: &str = "temps_trajet";
pub const TRIP_COUNT: &str = "nb_trajets";
pub const ON_SITE_HOURS: &str = "heures_sur_place";
pub const BILLED_HOURS: &str = "nb_heures";
pub const TECHNICIANS: &str = "nb_techniciens";
pub const OVERNIGHT: &str = "decouchage";
pub const NIGHTS: &str = "nb_nuits";
pub const MEALS: &str = "nb_repas";

pub const EXPENSE_CATEGORY: &str = "categorie";
pub const PERCENTAGE: &str = "pourcentage";
pub const AMOUNT: &str = "montant";

/// Field keys of one raw-material slot on a row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MaterialSlot {
    /// Catalog reference, by display name.
    pub reference: &'static str,
    /// Catalog reference, by immutable id (written on selection).
    pub reference_id: &'static str,
    /// Linear meters consumed by one unit of the row.
    pub meters: &'static str,
    pub buy: &'static str,
    pub sell: &'static str,
    /// Roll width, in cm.
    pub width: &'static str,
    pub repeat_v: &'static str,
    pub repeat_h: &'static str,
    pub pattern: &'static str,
    /// The buy field holds the cost of the whole line (already scaled by the quantity) rather
    /// than the cost of one unit of the row.
    pub buy_is_line_total: bool,
}

macro_rules! material_slot {
    ($name:literal) => {
        material_slot!($name, false)
    };
    ($name:literal, $line_total:literal) => {
        MaterialSlot {
            reference: $name,
            reference_id: concat!($name, "_id"),
            meters: concat!("ml_", $name),
            buy: concat!("pa_", $name),
            sell: concat!("pv_", $name),
            width: concat!("laize_", $name),
            repeat_v: concat!("raccord_v_", $name),
            repeat_h: concat!("raccord_h_", $name),
            pattern: concat!("motif_", $name),
            buy_is_line_total: $line_total,
        }
    };
}

pub const DECO_1: MaterialSlot = material_slot!("tissu_deco1", true);
pub const DECO_2: MaterialSlot = material_slot!("tissu_deco2", true);
pub const LINING: MaterialSlot = material_slot!("doublure");
pub const INTERLINING: MaterialSlot = material_slot!("interdoublure");
pub const TRIM_1: MaterialSlot = material_slot!("passementerie1");
pub const TRIM_2: MaterialSlot = material_slot!("passementerie2");

/// Slots whose cost is re-derived from the catalog after the formula pass.
pub const FABRIC_SLOTS: [MaterialSlot; 4] = [DECO_1, DECO_2, LINING, INTERLINING];

/// Yardage fields left to the user on manual-yardage products.
pub const MANUAL_YARDAGE_FIELDS: [&str; 4] = [
    DECO_1.meters,
    DECO_2.meters,
    LINING.meters,
    INTERLINING.meters,
];

//! Product-family classification of rows.
//!
//! Product names are free text picked from select lists, so matching is case-insensitive and
//! tolerant of accents where the lists historically disagreed.

use crate::{fields, Row};
use regex::Regex;
use std::sync::OnceLock;

pub const TRAVEL: &str = "Déplacement";
pub const OTHER_EXPENSE: &str = "Autre dépense";

pub const MECHANISM_RAIL: &str = "Rail";
pub const MECHANISM_ROD: &str = "Tringle";

/// Products whose yardage is typed by the user: decorative items, bed covers, blinds.
pub fn is_manual_yardage(product: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"(?i)d[ée]co|lit|store|plaid|coussin|canishade").expect("valid regex")
    });
    re.is_match(product)
}

/// Products billed by labor hours.
pub fn is_labor_billed(product: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"(?i)rideau|voilage|store|canishade|d[ée]cor|lit|coussin|plaid|cantonni[èe]re")
            .expect("valid regex")
    });
    re.is_match(product)
}

/// Blind / shade mechanism variants (no rail dimension, manual pricing).
pub fn is_blind_mechanism(mechanism_type: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"(?i)store|canishade|shade").expect("valid regex"));
    re.is_match(mechanism_type)
}

pub fn is_travel(row: &Row) -> bool {
    row.text(fields::PRODUCT).trim() == TRAVEL
}

pub fn is_other_expense(row: &Row) -> bool {
    row.text(fields::PRODUCT)
        .trim()
        .eq_ignore_ascii_case(OTHER_EXPENSE)
}

/// An "other expense" row booked as a sales commission.
pub fn is_commission(row: &Row) -> bool {
    is_other_expense(row) && is_commission_category(row.text(fields::EXPENSE_CATEGORY))
}

pub fn is_commission_category(category: &str) -> bool {
    category.to_lowercase().contains("commission")
}

/// Travel sub-type for which on-site hours are billable.
pub fn is_site_survey(travel_kind: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*(m[ée]tr[ée]|prise de cotes|relev[ée])\s*$").expect("valid regex")
    });
    re.is_match(travel_kind)
}

//! Alias tables: lowercase request spelling -> trained class value.

use crate::domain::CategoryField;

const COUNTRY_ALIASES: &[(&str, &str)] = &[
    ("syria", "Syrian Arab Rep."),
    ("syrian", "Syrian Arab Rep."),
    ("syrian arab republic", "Syrian Arab Rep."),
    ("usa", "United States of America"),
    ("us", "United States of America"),
    ("uk", "United Kingdom"),
    ("drc", "Dem. Rep. of the Congo"),
];

// Procedure codes are "<level> / <type>"; AR is the most common type per level.
const PROCEDURE_ALIASES: &[(&str, &str)] = &[
    ("government", "G / AR"),
    ("unhcr", "U / AR"),
    ("joint", "J / AR"),
    ("unknown", "U / AR"),
];

pub(super) fn for_field(field: CategoryField) -> &'static [(&'static str, &'static str)] {
    match field {
        CategoryField::Origin | CategoryField::Asylum => COUNTRY_ALIASES,
        CategoryField::Procedure => PROCEDURE_ALIASES,
    }
}

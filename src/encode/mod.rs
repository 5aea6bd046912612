//! Categorical encoders.
//!
//! The training step persists one label encoder per categorical column: a
//! sorted list of the class values seen in training, where a value's code is
//! its position in the list. Request values go through a resolution ladder
//! (exact, case-insensitive, alias, containment) so common spellings still
//! land on a trained class; dataset rows use strict exact lookups.

use std::collections::HashMap;

use serde::Deserialize;

use crate::domain::CategoryField;

mod aliases;

/// Values shorter than this never take the containment step.
const MIN_PARTIAL_LEN: usize = 3;

/// A single fitted label encoder.
#[derive(Debug, Clone)]
pub struct LabelEncoder {
    classes: Vec<String>,
    index: HashMap<String, u32>,
}

impl LabelEncoder {
    /// Build an encoder from its class list. Duplicate classes are rejected.
    pub fn new(classes: Vec<String>) -> Result<Self, String> {
        let mut index = HashMap::with_capacity(classes.len());
        for (code, class) in classes.iter().enumerate() {
            if index.insert(class.clone(), code as u32).is_some() {
                return Err(format!("duplicate class '{class}'"));
            }
        }
        Ok(Self { classes, index })
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Exact lookup.
    pub fn code(&self, value: &str) -> Option<u32> {
        self.index.get(value).copied()
    }

    /// Resolve a user-supplied value, trying progressively looser matches.
    pub fn resolve(&self, value: &str, aliases: &[(&str, &str)]) -> Option<u32> {
        let value = value.trim();
        if let Some(code) = self.code(value) {
            return Some(code);
        }

        let lower = value.to_lowercase();
        if let Some(code) = self.position(|class| class.to_lowercase() == lower) {
            return Some(code);
        }

        if let Some(code) = aliases
            .iter()
            .find(|(alias, _)| *alias == lower)
            .and_then(|(_, target)| self.code(target))
        {
            return Some(code);
        }

        if lower.chars().count() < MIN_PARTIAL_LEN {
            return None;
        }
        self.position(|class| class.to_lowercase().starts_with(&lower))
            .or_else(|| {
                self.position(|class| {
                    let class = class.to_lowercase();
                    class.contains(&lower) || lower.contains(&class)
                })
            })
    }

    fn position(&self, pred: impl Fn(&str) -> bool) -> Option<u32> {
        self.classes
            .iter()
            .position(|c| pred(c))
            .map(|idx| idx as u32)
    }
}

/// On-disk shape of `label_encoders.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct EncoderFile {
    #[serde(alias = "asylum")]
    pub country: Vec<String>,
    pub origin: Vec<String>,
    pub procedure: Vec<String>,
}

/// Encoders for every categorical feature.
#[derive(Debug, Clone)]
pub struct EncoderTable {
    country: LabelEncoder,
    origin: LabelEncoder,
    procedure: LabelEncoder,
}

impl EncoderTable {
    pub fn new(country: LabelEncoder, origin: LabelEncoder, procedure: LabelEncoder) -> Self {
        Self {
            country,
            origin,
            procedure,
        }
    }

    /// Validate and index a parsed encoder file.
    pub fn from_file(file: EncoderFile) -> Result<Self, String> {
        let build = |name: &str, classes: Vec<String>| {
            if classes.is_empty() {
                return Err(format!("encoder '{name}' has no classes"));
            }
            LabelEncoder::new(classes).map_err(|e| format!("encoder '{name}': {e}"))
        };
        Ok(Self::new(
            build("country", file.country)?,
            build("origin", file.origin)?,
            build("procedure", file.procedure)?,
        ))
    }

    pub fn encoder(&self, field: CategoryField) -> &LabelEncoder {
        match field {
            CategoryField::Origin => &self.origin,
            CategoryField::Asylum => &self.country,
            CategoryField::Procedure => &self.procedure,
        }
    }

    /// Resolve a request value for `field` through the full ladder.
    pub fn resolve(&self, field: CategoryField, value: &str) -> Option<u32> {
        self.encoder(field).resolve(value, aliases::for_field(field))
    }

    /// Strict lookup, used for raw dataset rows.
    pub fn code(&self, field: CategoryField, value: &str) -> Option<u32> {
        self.encoder(field).code(value)
    }
}

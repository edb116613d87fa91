use serde::{Deserialize, Serialize};

/// Options passed in for translation, used throughout the translator and the
/// write path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslatorOptions {
    /// The store understands `$literal`; without it projected constants and
    /// `$`-prefixed strings cannot be expressed.
    pub supports_literal_expression: bool,
    /// Wrap single-argument date functions so that a missing or null input
    /// yields null instead of an error.
    pub null_guard_date_functions: bool,
    /// Delete nested rows with a native `$pull` when the predicate only touches
    /// the nested row's own columns.
    pub pull_fast_path: bool,
    /// Patch denormalized copies after writes to an embeddable table.
    pub propagate_copies: bool,
    /// Where BLOB, CLOB and XML content is kept.
    pub large_object_collection: String,
}

impl Default for TranslatorOptions {
    fn default() -> Self {
        Self {
            supports_literal_expression: true,
            null_guard_date_functions: true,
            pull_fast_path: true,
            propagate_copies: true,
            large_object_collection: "__lobs".to_string(),
        }
    }
}

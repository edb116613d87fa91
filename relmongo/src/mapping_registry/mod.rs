use bson::Bson;
use linked_hash_map::LinkedHashMap;

#[cfg(test)]
mod test;

/// What the translator knows about one logical value of a query.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDetail {
    /// Output names the value is projected under, in the order they were added.
    pub aliases: Vec<String>,
    /// The store expression computing the value from the source document.
    pub expression: Bson,
    /// The stored field holding the value, when it is not computed.
    pub field_path: Option<String>,
    /// Where the value can be read after the `$group` stage, when it is a
    /// grouping key or an accumulator.
    pub grouped_path: Option<String>,
}

impl ColumnDetail {
    pub fn new(expression: Bson) -> Self {
        let field_path = match &expression {
            Bson::String(s) if s.starts_with('$') && !s.starts_with("$$") => {
                Some(s[1..].to_string())
            }
            _ => None,
        };
        Self {
            aliases: vec![],
            expression,
            field_path,
            grouped_path: None,
        }
    }

    pub fn has_alias(&self, alias: &str) -> bool {
        self.aliases.iter().any(|a| a.eq_ignore_ascii_case(alias))
    }
}

/// Column details keyed by the structural fingerprint of the expression they
/// were translated from, in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnRegistry(LinkedHashMap<String, ColumnDetail>);

impl ColumnRegistry {
    pub fn new() -> Self {
        ColumnRegistry(LinkedHashMap::new())
    }

    pub fn get(&self, fingerprint: &str) -> Option<&ColumnDetail> {
        self.0.get(fingerprint)
    }

    /// Registers `detail` unless the fingerprint is already known, and returns
    /// the registered entry.
    pub fn register(&mut self, fingerprint: impl Into<String>, detail: ColumnDetail) -> &mut ColumnDetail {
        self.0.entry(fingerprint.into()).or_insert(detail)
    }

    /// Adds an output name to an existing entry; returns false when the
    /// fingerprint is unknown.
    pub fn add_alias(&mut self, fingerprint: &str, alias: impl Into<String>) -> bool {
        match self.0.get_mut(fingerprint) {
            Some(detail) => {
                let alias = alias.into();
                if !detail.has_alias(&alias) {
                    detail.aliases.push(alias);
                }
                true
            }
            None => false,
        }
    }

    pub fn field_paths(&self) -> impl Iterator<Item = &str> {
        self.0.values().filter_map(|d| d.field_path.as_deref())
    }
}

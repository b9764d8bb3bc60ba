use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use kvtab_types::TypeError;

/// Declared storage type of one column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Integer,
    Float,
    Boolean,
    /// Nested value stored as JSON text.
    Json,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::Text => "text",
            FieldType::Integer => "integer",
            FieldType::Float => "float",
            FieldType::Boolean => "boolean",
            FieldType::Json => "json",
        };
        f.write_str(name)
    }
}

impl FromStr for FieldType {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "string" => Ok(FieldType::Text),
            "integer" | "int" => Ok(FieldType::Integer),
            "float" | "double" => Ok(FieldType::Float),
            "boolean" | "bool" => Ok(FieldType::Boolean),
            "json" => Ok(FieldType::Json),
            other => Err(TypeError::UnknownVariant {
                kind: "field type",
                value: other.to_string(),
            }),
        }
    }
}

/// Column name → declared type, for one table.
pub type TableHints = BTreeMap<String, FieldType>;

/// Per-store type hints, keyed by `(database, table)`.
///
/// Hints override what the codec would infer from a row type's default
/// value. Each store owns its registry; nothing is shared process-wide.
#[derive(Default)]
pub struct TypeHintRegistry {
    tables: RwLock<HashMap<(String, String), TableHints>>,
}

impl TypeHintRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare the type of one column. Returns the previous hint.
    pub fn save(&self, database: &str, table: &str, field: &str, ty: FieldType) -> Option<FieldType> {
        self.tables
            .write()
            .expect("lock poisoned")
            .entry((database.to_string(), table.to_string()))
            .or_default()
            .insert(field.to_string(), ty)
    }

    /// Hints of a table; empty if none were declared.
    pub fn get(&self, database: &str, table: &str) -> TableHints {
        self.tables
            .read()
            .expect("lock poisoned")
            .get(&(database.to_string(), table.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    pub fn get_field(&self, database: &str, table: &str, field: &str) -> Option<FieldType> {
        self.tables
            .read()
            .expect("lock poisoned")
            .get(&(database.to_string(), table.to_string()))
            .and_then(|hints| hints.get(field).copied())
    }

    pub fn remove(&self, database: &str, table: &str, field: &str) -> Option<FieldType> {
        let mut tables = self.tables.write().expect("lock poisoned");
        let key = (database.to_string(), table.to_string());
        let hints = tables.get_mut(&key)?;
        let removed = hints.remove(field);
        if hints.is_empty() {
            tables.remove(&key);
        }
        removed
    }

    /// Forget every hint of a table. Returns `true` if there were any.
    pub fn remove_table(&self, database: &str, table: &str) -> bool {
        self.tables
            .write()
            .expect("lock poisoned")
            .remove(&(database.to_string(), table.to_string()))
            .is_some()
    }

    pub fn clear(&self) {
        self.tables.write().expect("lock poisoned").clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_get_remove() {
        let registry = TypeHintRegistry::new();
        assert_eq!(registry.save("shop", "orders", "qty", FieldType::Integer), None);
        assert_eq!(
            registry.save("shop", "orders", "qty", FieldType::Float),
            Some(FieldType::Integer)
        );
        assert_eq!(
            registry.get_field("shop", "orders", "qty"),
            Some(FieldType::Float)
        );
        assert_eq!(registry.get("shop", "orders").len(), 1);

        assert_eq!(registry.remove("shop", "orders", "qty"), Some(FieldType::Float));
        assert!(registry.get("shop", "orders").is_empty());
        assert!(!registry.remove_table("shop", "orders"));
    }

    #[test]
    fn registries_are_independent() {
        let a = TypeHintRegistry::new();
        let b = TypeHintRegistry::new();
        a.save("db", "t", "f", FieldType::Boolean);
        assert!(b.get("db", "t").is_empty());
    }

    #[test]
    fn tables_are_scoped_by_database() {
        let registry = TypeHintRegistry::new();
        registry.save("a", "t", "f", FieldType::Json);
        assert_eq!(registry.get_field("b", "t", "f"), None);
        registry.clear();
        assert_eq!(registry.get_field("a", "t", "f"), None);
    }

    #[test]
    fn field_type_parsing() {
        assert_eq!("INT".parse::<FieldType>().unwrap(), FieldType::Integer);
        assert_eq!("text".parse::<FieldType>().unwrap(), FieldType::Text);
        assert!("blob".parse::<FieldType>().is_err());
        assert_eq!(FieldType::Boolean.to_string(), "boolean");
    }
}

//! The [`FieldKey`] identifier.

use std::fmt;

/// Identifies a raw or derived field as `(category, name)`.
///
/// Categories group fields by what they sample: `gas` for cell data,
/// `all` or a particle type for particle data, `index` for geometry.
/// A key with an empty category is *bare*; registries promote bare keys
/// to a default category when a field is registered.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldKey {
    category: String,
    name: String,
}

impl FieldKey {
    /// Create a namespaced key.
    pub fn new(category: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            name: name.into(),
        }
    }

    /// Create a bare key with no category.
    pub fn bare(name: impl Into<String>) -> Self {
        Self::new(String::new(), name)
    }

    /// The category (empty for bare keys).
    pub fn category(&self) -> &str {
        &self.category
    }

    /// The short name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the key has no category.
    pub fn is_bare(&self) -> bool {
        self.category.is_empty()
    }

    /// Same name under another category.
    pub fn with_category(&self, category: impl Into<String>) -> Self {
        Self::new(category, self.name.clone())
    }

    /// Same category with another name.
    pub fn with_name(&self, name: impl Into<String>) -> Self {
        Self::new(self.category.clone(), name)
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_bare() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "({}, {})", self.category, self.name)
        }
    }
}

impl From<(&str, &str)> for FieldKey {
    fn from((category, name): (&str, &str)) -> Self {
        Self::new(category, name)
    }
}

impl From<&str> for FieldKey {
    fn from(name: &str) -> Self {
        Self::bare(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_forms() {
        assert_eq!(FieldKey::new("gas", "density").to_string(), "(gas, density)");
        assert_eq!(FieldKey::bare("density").to_string(), "density");
    }

    #[test]
    fn ordering_is_category_then_name() {
        let mut keys = vec![
            FieldKey::new("gas", "z"),
            FieldKey::new("all", "mass"),
            FieldKey::new("gas", "a"),
        ];
        keys.sort();
        assert_eq!(keys[0], FieldKey::new("all", "mass"));
        assert_eq!(keys[1], FieldKey::new("gas", "a"));
    }

    #[test]
    fn conversions() {
        let k: FieldKey = ("gas", "density").into();
        assert!(!k.is_bare());
        let b: FieldKey = "density".into();
        assert!(b.is_bare());
        assert_eq!(b.with_category("gas"), k);
        assert_eq!(k.with_name("pressure").name(), "pressure");
    }
}

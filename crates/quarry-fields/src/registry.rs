//! The field registry: key → specification, with lazy alias synthesis.

use std::collections::BTreeSet;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use quarry_core::{FieldContext, FieldError, FieldKey, FieldValue};
use tracing::debug;

use crate::alias::AliasKind;
use crate::config::{ConfigError, RegistryConfig};
use crate::detector::FieldDetector;
use crate::spec::{ConvertFn, DerivedField, FieldKind, FieldMetadata, FieldOptions, UnitsDecl};

/// Maps field keys to derived field specifications.
///
/// Each dataset owns a registry. A standard registry is built once and
/// cloned per dataset, which then registers its own fields on top;
/// registering under an existing key replaces the previous entry.
///
/// Alias keys (`density_abs`, `density_code`, ...) are declared when
/// their base is registered and synthesized on first [`resolve`]. The
/// synthesized cache sits behind a lock so resolution only needs `&self`
/// and the registry can be shared across threads.
///
/// [`resolve`]: FieldRegistry::resolve
pub struct FieldRegistry {
    config: RegistryConfig,
    fields: IndexMap<FieldKey, Arc<DerivedField>>,
    /// Bare name → canonical key (last registration wins).
    names: IndexMap<String, FieldKey>,
    /// Declared alias key → (kind, base key).
    aliases: IndexMap<FieldKey, (AliasKind, FieldKey)>,
    synthesized: RwLock<IndexMap<FieldKey, Arc<DerivedField>>>,
}

impl FieldRegistry {
    /// An empty registry with the default configuration.
    pub fn new() -> Self {
        Self::empty(RegistryConfig::default())
    }

    /// An empty registry with a validated configuration.
    pub fn with_config(config: RegistryConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::empty(config))
    }

    fn empty(config: RegistryConfig) -> Self {
        Self {
            config,
            fields: IndexMap::new(),
            names: IndexMap::new(),
            aliases: IndexMap::new(),
            synthesized: RwLock::new(IndexMap::new()),
        }
    }

    /// The configuration.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    // ── Registration ───────────────────────────────────────────────

    /// Register `field`, replacing any entry under the same key.
    ///
    /// Bare keys are promoted to the default cell or particle category.
    /// Returns the key the field was stored under.
    pub fn register(&mut self, field: DerivedField) -> FieldKey {
        let key = self.promote(field.key(), field.is_particle());
        let field = field.rekeyed(key.clone());
        if self.fields.contains_key(&key) {
            debug!(field = %key, "replacing registered field");
        }

        // An explicit registration takes precedence over an alias.
        self.aliases.shift_remove(&key);
        let synthesized = self.synthesized.get_mut();
        synthesized.shift_remove(&key);

        for kind in &self.config.alias_kinds {
            let alias = kind.alias_key(&key);
            synthesized.shift_remove(&alias);
            if self.fields.contains_key(&alias) {
                continue;
            }
            self.names
                .entry(alias.name().to_string())
                .or_insert_with(|| alias.clone());
            self.aliases.insert(alias, (*kind, key.clone()));
        }

        self.names.insert(key.name().to_string(), key.clone());
        self.fields.insert(key.clone(), Arc::new(field));
        key
    }

    /// Build a [`DerivedField`] and register it. Returns its canonical key.
    pub fn add_field<F>(&mut self, key: impl Into<FieldKey>, compute: F, options: FieldOptions) -> FieldKey
    where
        F: Fn(&DerivedField, &mut dyn FieldContext) -> Result<FieldValue, FieldError>
            + Send
            + Sync
            + 'static,
    {
        self.register(DerivedField::new(key, compute, options))
    }

    fn promote(&self, key: &FieldKey, particle: bool) -> FieldKey {
        if !key.is_bare() {
            return key.clone();
        }
        let category = if particle {
            &self.config.default_particle_category
        } else {
            &self.config.default_cell_category
        };
        key.with_category(category.as_str())
    }

    // ── Lookup ─────────────────────────────────────────────────────

    /// The namespaced key `key` refers to, if any.
    ///
    /// Namespaced keys are returned unchanged; bare keys go through the
    /// name index.
    pub fn canonical_key(&self, key: &FieldKey) -> Option<FieldKey> {
        if key.is_bare() {
            self.names.get(key.name()).cloned()
        } else {
            Some(key.clone())
        }
    }

    /// Whether `key` names a registered field or a declared alias.
    pub fn contains(&self, key: &FieldKey) -> bool {
        self.canonical_key(key)
            .is_some_and(|k| self.fields.contains_key(&k) || self.aliases.contains_key(&k))
    }

    /// Look up a field, synthesizing and caching a declared alias on first use.
    pub fn resolve(&self, key: &FieldKey) -> Result<Arc<DerivedField>, FieldError> {
        let not_found = || FieldError::FieldNotFound { key: key.clone() };
        let key = self.canonical_key(key).ok_or_else(not_found)?;
        if let Some(field) = self.fields.get(&key) {
            return Ok(Arc::clone(field));
        }
        if let Some(field) = self.synthesized.read().get(&key) {
            return Ok(Arc::clone(field));
        }
        let (kind, base_key) = self.aliases.get(&key).ok_or_else(not_found)?;
        let base = self.fields.get(base_key).ok_or_else(not_found)?;

        let mut cache = self.synthesized.write();
        // Another thread may have synthesized it between the locks.
        if let Some(field) = cache.get(&key) {
            return Ok(Arc::clone(field));
        }
        let alias = Arc::new(kind.synthesize(base));
        debug!(alias = %key, base = %base_key, "synthesized alias field");
        cache.insert(key, Arc::clone(&alias));
        Ok(alias)
    }

    /// Like [`resolve`](Self::resolve) but never caches a synthesized alias.
    pub fn peek(&self, key: &FieldKey) -> Option<Arc<DerivedField>> {
        let key = self.canonical_key(key)?;
        if let Some(field) = self.fields.get(&key) {
            return Some(Arc::clone(field));
        }
        if let Some(field) = self.synthesized.read().get(&key) {
            return Some(Arc::clone(field));
        }
        let (kind, base_key) = self.aliases.get(&key)?;
        let base = self.fields.get(base_key)?;
        Some(Arc::new(kind.synthesize(base)))
    }

    /// Registered keys in registration order. Aliases are not included.
    pub fn keys(&self) -> impl Iterator<Item = &FieldKey> {
        self.fields.keys()
    }

    /// Registered keys, sorted.
    pub fn derived_field_list(&self) -> Vec<FieldKey> {
        let mut keys: Vec<FieldKey> = self.fields.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Number of registered (non-alias) fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether no fields are registered.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Number of aliases synthesized so far.
    pub fn synthesized_count(&self) -> usize {
        self.synthesized.read().len()
    }

    // ── Dependency detection ───────────────────────────────────────

    /// The raw fields `key` ultimately reads.
    pub fn get_dependencies(&self, key: &FieldKey) -> Result<BTreeSet<FieldKey>, FieldError> {
        let field = self
            .peek(key)
            .ok_or_else(|| FieldError::FieldNotFound { key: key.clone() })?;
        FieldDetector::new(self).detect(&field)
    }

    /// Run dependency detection over every registered field.
    ///
    /// Returns the fields whose detection failed, with the error.
    pub fn check_derived_fields(&self) -> Vec<(FieldKey, FieldError)> {
        self.fields
            .keys()
            .filter_map(|key| self.get_dependencies(key).err().map(|e| (key.clone(), e)))
            .collect()
    }

    // ── One-time overrides ─────────────────────────────────────────

    /// Replace the declared units of a registered field.
    pub fn override_units(&mut self, key: &FieldKey, units: UnitsDecl) -> Result<(), FieldError> {
        self.patch(key, |field| field.set_units(units))
    }

    /// Replace the legacy convert routine of a registered field.
    pub fn override_convert(&mut self, key: &FieldKey, convert: ConvertFn) -> Result<(), FieldError> {
        self.patch(key, |field| field.set_convert(Some(convert)))
    }

    /// Edit the display metadata of a registered field.
    pub fn override_metadata(
        &mut self,
        key: &FieldKey,
        edit: impl FnOnce(&mut FieldMetadata),
    ) -> Result<(), FieldError> {
        self.patch(key, |field| edit(field.metadata_mut()))
    }

    fn patch(&mut self, key: &FieldKey, edit: impl FnOnce(&mut DerivedField)) -> Result<(), FieldError> {
        let canonical = self
            .canonical_key(key)
            .filter(|k| self.fields.contains_key(k))
            .ok_or_else(|| FieldError::FieldNotFound { key: key.clone() })?;
        let Some(slot) = self.fields.get_mut(&canonical) else {
            return Err(FieldError::FieldNotFound { key: key.clone() });
        };
        let mut patched = DerivedField::clone(slot);
        edit(&mut patched);
        *slot = Arc::new(patched);
        // Cached aliases were built from the old specification.
        self.synthesized.get_mut().retain(|_, alias| {
            !matches!(alias.kind(), FieldKind::Alias { base, .. } if *base == canonical)
        });
        debug!(field = %canonical, "patched registered field");
        Ok(())
    }
}

impl Default for FieldRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for FieldRegistry {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            fields: self.fields.clone(),
            names: self.names.clone(),
            aliases: self.aliases.clone(),
            synthesized: RwLock::new(self.synthesized.read().clone()),
        }
    }
}

impl std::fmt::Debug for FieldRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldRegistry")
            .field("config", &self.config)
            .field("fields", &self.fields.len())
            .field("aliases", &self.aliases.len())
            .field("synthesized", &self.synthesized.read().len())
            .finish()
    }
}

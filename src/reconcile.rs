//! Reconciliation: writing flat-map values into a metadata tree.

use std::collections::BTreeSet;

use tracing::{debug, warn};

use crate::coerce::ConfigValue;
use crate::error::{ConfigError, ConfigResult};
use crate::flat_map::{FlatMap, KEY_SEPARATOR};
use crate::meta::{Binding, ConfigItemMeta, MapField};

/// What to do when a value cannot be coerced into its field type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Coercion {
    /// Fail the load with [`ConfigError::InvalidValue`].
    #[default]
    Strict,
    /// Assign the zero value, log a warning and continue.
    Lenient,
}

/// Walks a metadata tree depth-first, filling fields from a flat map.
#[derive(Debug, Clone, Copy)]
pub struct Reconciler<'m> {
    source: &'m FlatMap,
    coercion: Coercion,
}

impl<'m> Reconciler<'m> {
    pub fn new(source: &'m FlatMap) -> Self {
        Self {
            source,
            coercion: Coercion::default(),
        }
    }

    pub fn coercion(mut self, coercion: Coercion) -> Self {
        self.coercion = coercion;
        self
    }

    /// Reconcile a root node. Its own name is not part of any key.
    pub fn reconcile(&self, root: ConfigItemMeta<'_>) -> ConfigResult<()> {
        match root.binding {
            Binding::Struct(children) => self.reconcile_items(children, ""),
            binding => self.reconcile_item(
                ConfigItemMeta {
                    binding,
                    ..root
                },
                "",
            ),
        }
    }

    fn reconcile_items(&self, items: Vec<ConfigItemMeta<'_>>, prefix: &str) -> ConfigResult<()> {
        for item in items {
            self.reconcile_item(item, prefix)?;
        }
        Ok(())
    }

    fn reconcile_item(&self, item: ConfigItemMeta<'_>, prefix: &str) -> ConfigResult<()> {
        let key = format!("{prefix}{}", item.name);
        match item.binding {
            Binding::Struct(children) => {
                self.reconcile_items(children, &format!("{key}{KEY_SEPARATOR}"))
            }
            Binding::Map(map) => self.reconcile_map(map, &key),
            Binding::Value(mut value) => self.reconcile_value(
                &mut *value,
                &key,
                item.type_name,
                item.is_required,
                item.default_value.as_deref(),
            ),
        }
    }

    fn reconcile_value(
        &self,
        value: &mut (dyn ConfigValue + '_),
        key: &str,
        type_name: &'static str,
        is_required: bool,
        default_value: Option<&str>,
    ) -> ConfigResult<()> {
        if let Some(raw) = self.source.get(key) {
            return self.assign(value, key, type_name, raw);
        }

        if let Some(default_value) = default_value {
            debug!(key, default = default_value, "using default configuration value");
            return self.assign(value, key, type_name, default_value);
        }

        if is_required {
            return Err(ConfigError::MissingRequired {
                key: key.to_string(),
                type_name,
            });
        }

        Ok(())
    }

    fn assign(
        &self,
        value: &mut (dyn ConfigValue + '_),
        key: &str,
        type_name: &'static str,
        raw: &str,
    ) -> ConfigResult<()> {
        let Err(e) = value.assign(raw) else {
            return Ok(());
        };

        match self.coercion {
            Coercion::Strict => Err(ConfigError::InvalidValue {
                key: key.to_string(),
                type_name,
                value: raw.to_string(),
                reason: e.to_string(),
            }),
            Coercion::Lenient => {
                warn!(key, type_name, error = %e, "invalid configuration value, using zero value");
                value.assign_zero();
                Ok(())
            }
        }
    }

    /// Rebuild a map from every key under `<key>__`.
    fn reconcile_map(&self, map: &mut (dyn MapField + '_), key: &str) -> ConfigResult<()> {
        let prefix = format!("{key}{KEY_SEPARATOR}");
        let leaf_entries = map.entry_kind().is_leaf();

        let discovered: BTreeSet<&str> = self
            .source
            .entries_under(&prefix)
            .into_iter()
            .filter_map(|(rest, _)| match rest.split_once(KEY_SEPARATOR) {
                None if leaf_entries => Some(rest),
                Some((segment, _)) if !leaf_entries => Some(segment),
                _ => None,
            })
            .filter(|segment| !segment.is_empty())
            .collect();

        map.clear_entries();
        let type_name = map.entry_type_name();
        for segment in discovered {
            let entry = ConfigItemMeta::new(segment, type_name, map.bind_entry(segment.to_string()));
            self.reconcile_item(entry, &prefix)?;
        }

        debug!(key, entries = map.entry_count(), "configuration map reconciled");
        Ok(())
    }
}

/// Reconcile `root` against `source` with strict coercion.
pub fn reconcile(root: ConfigItemMeta<'_>, source: &FlatMap) -> ConfigResult<()> {
    Reconciler::new(source).reconcile(root)
}

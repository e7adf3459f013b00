//! Metadata tree describing a configuration target.
//!
//! A target implements [`Configurable`] (normally through `#[derive(Config)]`)
//! and hands out one [`ConfigItemMeta`] per keyed field. Each node owns a
//! mutable borrow of exactly one field, so reconciliation writes straight into
//! the caller's struct without copying it.

use std::collections::{BTreeMap, HashMap};

use crate::coerce::{ConfigValue, ValueKind};

/// Key segment used for the tree root.
pub const ROOT_NAME: &str = "root";

/// A struct whose fields can be described as configuration items.
pub trait Configurable {
    /// Describe the keyed fields, in declaration order, with flattened
    /// structs spliced in place.
    fn describe(&mut self) -> Vec<ConfigItemMeta<'_>>;
}

/// A type that can appear as a keyed field.
pub trait ConfigField {
    fn bind(&mut self) -> Binding<'_>;
}

/// Write access into one field of the live target.
pub enum Binding<'a> {
    /// Leaf slot, assigned from a single flat-map value.
    Value(Box<dyn ConfigValue + 'a>),
    /// Nested struct; its fields live under `<key>__`.
    Struct(Vec<ConfigItemMeta<'a>>),
    /// String-keyed map; entries are discovered from keys under `<key>__`.
    Map(&'a mut dyn MapField),
}

impl Binding<'_> {
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Value(value) => value.kind(),
            Self::Struct(_) => ValueKind::Struct,
            Self::Map(_) => ValueKind::Map,
        }
    }
}

impl std::fmt::Debug for Binding<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Value(value) => f
                .debug_tuple("Value")
                .field(&value.type_name())
                .finish(),
            Self::Struct(children) => f.debug_tuple("Struct").field(children).finish(),
            Self::Map(map) => f.debug_tuple("Map").field(&map.entry_type_name()).finish(),
        }
    }
}

/// One addressable configuration field.
#[derive(Debug)]
pub struct ConfigItemMeta<'a> {
    pub name: String,
    pub type_name: &'static str,
    pub is_required: bool,
    pub default_value: Option<String>,
    pub binding: Binding<'a>,
}

impl<'a> ConfigItemMeta<'a> {
    pub fn new(name: impl Into<String>, type_name: &'static str, binding: Binding<'a>) -> Self {
        Self {
            name: name.into(),
            type_name,
            is_required: false,
            default_value: None,
            binding,
        }
    }

    /// Root node wrapping the top-level fields of `T`.
    pub fn root<T: Configurable + ?Sized>(target: &'a mut T) -> Self {
        Self::new(
            ROOT_NAME,
            std::any::type_name::<T>(),
            Binding::Struct(target.describe()),
        )
    }

    pub fn required(mut self) -> Self {
        self.is_required = true;
        self
    }

    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn has_default_value(&self) -> bool {
        self.default_value.is_some()
    }

    pub fn kind(&self) -> ValueKind {
        self.binding.kind()
    }

    /// Children of a struct node; `None` for leaves and maps.
    pub fn children(&self) -> Option<&[ConfigItemMeta<'a>]> {
        match &self.binding {
            Binding::Struct(children) => Some(children),
            _ => None,
        }
    }

    /// Find a descendant by flattened key, e.g. `database__pool__size`.
    pub fn find(&self, key: &str) -> Option<&ConfigItemMeta<'a>> {
        let (head, rest) = match key.split_once(crate::KEY_SEPARATOR) {
            Some((head, rest)) => (head, Some(rest)),
            None => (key, None),
        };
        let child = self.children()?.iter().find(|child| child.name == head)?;
        match rest {
            Some(rest) => child.find(rest),
            None => Some(child),
        }
    }

    /// Flattened keys of every leaf and map reachable from this node.
    pub fn keys(&self) -> Vec<String> {
        let mut keys = Vec::new();
        if let Some(children) = self.children() {
            for child in children {
                child.collect_keys("", &mut keys);
            }
        }
        keys
    }

    fn collect_keys(&self, prefix: &str, keys: &mut Vec<String>) {
        let key = format!("{prefix}{}", self.name);
        match &self.binding {
            Binding::Struct(children) => {
                let nested = format!("{key}{}", crate::KEY_SEPARATOR);
                for child in children {
                    child.collect_keys(&nested, keys);
                }
            }
            _ => keys.push(key),
        }
    }
}

/// A string-keyed map whose entries are created during reconciliation.
pub trait MapField {
    fn entry_kind(&self) -> ValueKind;

    fn entry_type_name(&self) -> &'static str;

    fn clear_entries(&mut self);

    /// Insert a default entry under `key` and bind it.
    fn bind_entry(&mut self, key: String) -> Binding<'_>;

    fn entry_count(&self) -> usize;
}

macro_rules! impl_map_field {
    ($map:ident) => {
        impl<V: ConfigField + Default> MapField for $map<String, V> {
            fn entry_kind(&self) -> ValueKind {
                V::default().bind().kind()
            }

            fn entry_type_name(&self) -> &'static str {
                std::any::type_name::<V>()
            }

            fn clear_entries(&mut self) {
                self.clear();
            }

            fn bind_entry(&mut self, key: String) -> Binding<'_> {
                self.entry(key).or_default().bind()
            }

            fn entry_count(&self) -> usize {
                self.len()
            }
        }

        impl<V: ConfigField + Default> ConfigField for $map<String, V> {
            fn bind(&mut self) -> Binding<'_> {
                Binding::Map(self)
            }
        }
    };
}

impl_map_field!(HashMap);
impl_map_field!(BTreeMap);

//! Value coercion: turning a string token into a typed field value.
//!
//! Every leaf field bound into the metadata tree is reached through the
//! [`ConfigValue`] trait. Scalars, durations, paths, `Option<T>` and `Vec<T>`
//! are covered here; other types opt in through [`FromStrValue`] (the
//! `from_str` field attribute) or by implementing the trait themselves.

use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::CoerceError;
use crate::meta::{Binding, ConfigField};

/// Semantic type of a configuration node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Text,
    Integer,
    Unsigned,
    Float,
    Bool,
    Duration,
    Slice,
    Custom,
    Struct,
    Map,
}

impl ValueKind {
    /// Leaves are looked up directly; structs and maps only extend the key prefix.
    pub fn is_leaf(self) -> bool {
        !matches!(self, Self::Struct | Self::Map)
    }
}

/// A leaf slot that can be assigned from configuration text.
pub trait ConfigValue {
    fn kind(&self) -> ValueKind;

    fn type_name(&self) -> &'static str;

    /// Parse `raw` and store the result. On error the slot is left unchanged
    /// (except for `Option<T>`, which is already allocated).
    fn assign(&mut self, raw: &str) -> Result<(), CoerceError>;

    /// Reset to the type's zero value.
    fn assign_zero(&mut self);
}

impl<T: ConfigValue + ?Sized> ConfigValue for &mut T {
    fn kind(&self) -> ValueKind {
        (**self).kind()
    }

    fn type_name(&self) -> &'static str {
        (**self).type_name()
    }

    fn assign(&mut self, raw: &str) -> Result<(), CoerceError> {
        (**self).assign(raw)
    }

    fn assign_zero(&mut self) {
        (**self).assign_zero()
    }
}

macro_rules! impl_parsed_value {
    ($kind:expr => $($ty:ty),+ $(,)?) => {
        $(
            impl ConfigValue for $ty {
                fn kind(&self) -> ValueKind {
                    $kind
                }

                fn type_name(&self) -> &'static str {
                    std::any::type_name::<$ty>()
                }

                fn assign(&mut self, raw: &str) -> Result<(), CoerceError> {
                    *self = raw.trim().parse::<$ty>().map_err(CoerceError::new)?;
                    Ok(())
                }

                fn assign_zero(&mut self) {
                    *self = <$ty>::default();
                }
            }

            impl ConfigField for $ty {
                fn bind(&mut self) -> Binding<'_> {
                    Binding::Value(Box::new(self))
                }
            }
        )+
    };
}

impl_parsed_value!(ValueKind::Integer => i8, i16, i32, i64, i128, isize);
impl_parsed_value!(ValueKind::Unsigned => u8, u16, u32, u64, u128, usize);
impl_parsed_value!(ValueKind::Float => f32, f64);

macro_rules! impl_leaf_field {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl ConfigField for $ty {
                fn bind(&mut self) -> Binding<'_> {
                    Binding::Value(Box::new(self))
                }
            }
        )+
    };
}

impl_leaf_field!(String, bool, Duration, PathBuf);

impl ConfigValue for String {
    fn kind(&self) -> ValueKind {
        ValueKind::Text
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<String>()
    }

    fn assign(&mut self, raw: &str) -> Result<(), CoerceError> {
        raw.clone_into(self);
        Ok(())
    }

    fn assign_zero(&mut self) {
        self.clear();
    }
}

impl ConfigValue for PathBuf {
    fn kind(&self) -> ValueKind {
        ValueKind::Text
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<PathBuf>()
    }

    fn assign(&mut self, raw: &str) -> Result<(), CoerceError> {
        *self = PathBuf::from(raw);
        Ok(())
    }

    fn assign_zero(&mut self) {
        *self = PathBuf::new();
    }
}

impl ConfigValue for bool {
    fn kind(&self) -> ValueKind {
        ValueKind::Bool
    }

    fn type_name(&self) -> &'static str {
        "bool"
    }

    fn assign(&mut self, raw: &str) -> Result<(), CoerceError> {
        *self = parse_bool(raw)?;
        Ok(())
    }

    fn assign_zero(&mut self) {
        *self = false;
    }
}

impl ConfigValue for Duration {
    fn kind(&self) -> ValueKind {
        ValueKind::Duration
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<Duration>()
    }

    fn assign(&mut self, raw: &str) -> Result<(), CoerceError> {
        *self = parse_duration(raw)?;
        Ok(())
    }

    fn assign_zero(&mut self) {
        *self = Duration::ZERO;
    }
}

impl<T: ConfigValue + Default> ConfigValue for Option<T> {
    fn kind(&self) -> ValueKind {
        match self {
            Some(inner) => inner.kind(),
            None => T::default().kind(),
        }
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<Option<T>>()
    }

    fn assign(&mut self, raw: &str) -> Result<(), CoerceError> {
        self.get_or_insert_with(T::default).assign(raw)
    }

    fn assign_zero(&mut self) {
        *self = Some(T::default());
    }
}

impl<T: ConfigValue + Default> ConfigField for Option<T> {
    fn bind(&mut self) -> Binding<'_> {
        Binding::Value(Box::new(self))
    }
}

impl<T: ConfigValue + Default> ConfigValue for Vec<T> {
    fn kind(&self) -> ValueKind {
        ValueKind::Slice
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<Vec<T>>()
    }

    fn assign(&mut self, raw: &str) -> Result<(), CoerceError> {
        let elements = split_list(raw)?;
        let mut parsed = Vec::with_capacity(elements.len());
        for (index, element) in elements.iter().enumerate() {
            let mut value = T::default();
            value
                .assign(element)
                .map_err(|e| CoerceError::new(format!("element {index}: {e}")))?;
            parsed.push(value);
        }
        *self = parsed;
        Ok(())
    }

    fn assign_zero(&mut self) {
        self.clear();
    }
}

impl<T: ConfigValue + Default> ConfigField for Vec<T> {
    fn bind(&mut self) -> Binding<'_> {
        Binding::Value(Box::new(self))
    }
}

/// Binds any `FromStr` type as a leaf.
///
/// Generated for fields marked `#[config(key = "...", from_str)]`.
pub struct FromStrValue<'a, T> {
    slot: &'a mut T,
}

impl<'a, T> FromStrValue<'a, T> {
    pub fn new(slot: &'a mut T) -> Self {
        Self { slot }
    }
}

impl<T> ConfigValue for FromStrValue<'_, T>
where
    T: FromStr + Default,
    T::Err: Display,
{
    fn kind(&self) -> ValueKind {
        ValueKind::Custom
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn assign(&mut self, raw: &str) -> Result<(), CoerceError> {
        *self.slot = raw.trim().parse::<T>().map_err(CoerceError::new)?;
        Ok(())
    }

    fn assign_zero(&mut self) {
        *self.slot = T::default();
    }
}

/// Parse a boolean token: `1/0`, `t/f`, `true/false`, `yes/no`, `on/off` in any case.
pub fn parse_bool(raw: &str) -> Result<bool, CoerceError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "t" | "true" | "yes" | "y" | "on" => Ok(true),
        "0" | "f" | "false" | "no" | "n" | "off" => Ok(false),
        other => Err(CoerceError::new(format!("invalid boolean: {other:?}"))),
    }
}

/// Parse a human-readable duration such as `30s`, `5m`, `1h30m` or `250ms`.
/// A bare `0` is the zero duration.
pub fn parse_duration(raw: &str) -> Result<Duration, CoerceError> {
    let trimmed = raw.trim();
    if trimmed == "0" {
        return Ok(Duration::ZERO);
    }
    humantime::parse_duration(trimmed).map_err(CoerceError::new)
}

/// Split list text into elements. Accepts a JSON array or a comma-separated list.
pub(crate) fn split_list(raw: &str) -> Result<Vec<String>, CoerceError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    if trimmed.starts_with('[') {
        let values: Vec<serde_json::Value> = serde_json::from_str(trimmed)
            .map_err(|e| CoerceError::new(format!("invalid list: {e}")))?;
        return Ok(values
            .into_iter()
            .map(|value| match value {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            })
            .collect());
    }

    Ok(trimmed
        .split(',')
        .map(|element| element.trim().trim_matches('"').to_string())
        .collect())
}

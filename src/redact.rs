//! Secret masking for dumped configuration.

use std::collections::BTreeMap;

/// Replacement text for masked values.
pub const REDACTED: &str = "[REDACTED]";

/// Key fragments that mark a value as secret.
const SECRET_KEYS: &[&str] = &[
    "password",
    "token",
    "secret",
    "private_key",
    "api_key",
    "credential",
];

/// Whether any segment of `key` looks like it holds a secret.
pub fn is_secret_key(key: &str) -> bool {
    let key_lower = key.to_ascii_lowercase();
    SECRET_KEYS.iter().any(|s| key_lower.contains(s))
}

/// Mask secret values in place, returning the redacted keys in order.
pub fn redact(entries: &mut BTreeMap<String, String>) -> Vec<String> {
    let mut redactions = Vec::new();
    for (key, value) in entries.iter_mut() {
        if is_secret_key(key) {
            *value = REDACTED.to_string();
            redactions.push(key.clone());
        }
    }
    redactions
}

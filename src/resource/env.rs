//! Process environment access and the system environment resource.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::debug;

use super::ConfigResource;
use crate::error::ConfigResult;
use crate::flat_map::{ConfigOrigin, FlatMap, SourceRecord};

/// Read access to an environment variable set.
pub trait EnvProvider: Send + Sync {
    fn var(&self, name: &str) -> Option<String>;

    fn vars(&self) -> Vec<(String, String)>;
}

/// The real process environment. Variables that are not valid Unicode are skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvProvider for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }

    fn vars(&self) -> Vec<(String, String)> {
        std::env::vars_os()
            .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
            .collect()
    }
}

/// A fixed variable set, for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct MapEnv {
    vars: BTreeMap<String, String>,
}

impl MapEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MapEnv {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }
}

impl EnvProvider for MapEnv {
    fn var(&self, name: &str) -> Option<String> {
        self.vars.get(name).cloned()
    }

    fn vars(&self) -> Vec<(String, String)> {
        self.vars
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}

/// Snapshots environment variables into the flat map.
#[derive(Clone)]
pub struct SystemEnv {
    env: Arc<dyn EnvProvider>,
    case_insensitive: bool,
    prefix: Option<String>,
}

impl SystemEnv {
    pub fn new() -> Self {
        Self {
            env: Arc::new(ProcessEnv),
            case_insensitive: false,
            prefix: None,
        }
    }

    /// Lower-case every key on insert and match it case-insensitively.
    pub fn case_insensitive(mut self, enabled: bool) -> Self {
        self.case_insensitive = enabled;
        self
    }

    /// Only take variables starting with `prefix`, stripping it from the key.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_env(mut self, env: impl EnvProvider + 'static) -> Self {
        self.env = Arc::new(env);
        self
    }

    fn strip<'k>(&self, key: &'k str) -> Option<&'k str> {
        let rest = match &self.prefix {
            None => Some(key),
            Some(prefix) if self.case_insensitive => {
                let head = key.get(..prefix.len())?;
                head.eq_ignore_ascii_case(prefix)
                    .then(|| &key[prefix.len()..])
            }
            Some(prefix) => key.strip_prefix(prefix.as_str()),
        };
        rest.filter(|rest| !rest.is_empty())
    }
}

impl Default for SystemEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SystemEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemEnv")
            .field("case_insensitive", &self.case_insensitive)
            .field("prefix", &self.prefix)
            .finish()
    }
}

impl ConfigResource for SystemEnv {
    fn describe(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("system environment ({prefix}*)"),
            None => "system environment".to_string(),
        }
    }

    fn load(&self, target: &mut FlatMap) -> ConfigResult<()> {
        let mut distinct = BTreeSet::new();
        for (key, value) in self.env.vars() {
            if let Some(key) = self.strip(&key) {
                target.insert_with_case(key, value, self.case_insensitive);
                distinct.insert(if self.case_insensitive {
                    key.to_lowercase()
                } else {
                    key.to_string()
                });
            }
        }
        let keys = distinct.len();

        debug!(keys, "system environment applied");
        target.record_source(SourceRecord {
            origin: ConfigOrigin::SystemEnv,
            path: None,
            digest: None,
            keys,
        });
        Ok(())
    }
}

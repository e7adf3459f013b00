//! Configuration resources: producers that merge keys into a [`FlatMap`].
//!
//! Resources run in caller order and later writes overwrite earlier ones, so
//! precedence is purely a function of ordering.
//!
//! File resources come in two flavours:
//! - direct: read exactly the named file
//! - environment-aware: read `base`, then `base` suffixed with the active
//!   environment, then the `local` suffix (`config.json`,
//!   `config.production.json`, `config.local.json`)

mod env;
mod files;
mod formats;

pub use env::{EnvProvider, MapEnv, ProcessEnv, SystemEnv};
pub use files::{FileReader, FsReader, MemoryFiles};
pub use formats::{flatten_document, FileFormat};

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::{debug, trace};

use crate::error::{ConfigError, ConfigResult};
use crate::flat_map::{FlatMap, SourceRecord};

/// Variable selecting the active environment name.
pub const ENVIRONMENT_VAR: &str = "ENV";

/// Environment used when [`ENVIRONMENT_VAR`] is unset or empty.
pub const DEFAULT_ENVIRONMENT: &str = "development";

/// Suffix of the machine-local override file.
pub const LOCAL_SUFFIX: &str = "local";

/// A source of flat configuration keys.
pub trait ConfigResource {
    /// Human-readable description, used for provenance and logs.
    fn describe(&self) -> String;

    fn load(&self, target: &mut FlatMap) -> ConfigResult<()>;
}

impl<F> ConfigResource for F
where
    F: Fn(&mut FlatMap) -> ConfigResult<()>,
{
    fn describe(&self) -> String {
        "custom resource".to_string()
    }

    fn load(&self, target: &mut FlatMap) -> ConfigResult<()> {
        self(target)
    }
}

/// A JSON, TOML or env file resource.
#[derive(Clone)]
pub struct FileSource {
    path: PathBuf,
    format: FileFormat,
    layered: bool,
    case_insensitive: bool,
    required: bool,
    environment: Option<String>,
    files: Arc<dyn FileReader>,
    env: Arc<dyn EnvProvider>,
}

impl FileSource {
    /// A direct (single file) resource reading from the filesystem.
    pub fn new(path: impl Into<PathBuf>, format: FileFormat) -> Self {
        Self {
            path: path.into(),
            format,
            layered: false,
            case_insensitive: false,
            required: false,
            environment: None,
            files: Arc::new(FsReader::new()),
            env: Arc::new(ProcessEnv),
        }
    }

    /// Read the environment-suffixed and local override files after the base file.
    pub fn layered(mut self, enabled: bool) -> Self {
        self.layered = enabled;
        self
    }

    /// Lower-case every key on insert and match it case-insensitively.
    pub fn case_insensitive(mut self, enabled: bool) -> Self {
        self.case_insensitive = enabled;
        self
    }

    /// Fail with [`ConfigError::NotFound`] when the base file is missing.
    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Use this environment name instead of reading [`ENVIRONMENT_VAR`].
    pub fn environment(mut self, name: impl Into<String>) -> Self {
        self.environment = Some(name.into());
        self
    }

    pub fn with_files(mut self, files: impl FileReader + 'static) -> Self {
        self.files = Arc::new(files);
        self
    }

    pub fn with_env(mut self, env: impl EnvProvider + 'static) -> Self {
        self.env = Arc::new(env);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> FileFormat {
        self.format
    }

    /// The active environment name for layered loading.
    pub fn active_environment(&self) -> String {
        self.environment
            .clone()
            .or_else(|| self.env.var(ENVIRONMENT_VAR).filter(|name| !name.is_empty()))
            .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string())
    }

    /// Files read by this resource, lowest precedence first.
    pub fn candidate_paths(&self) -> Vec<PathBuf> {
        if !self.layered {
            return vec![self.path.clone()];
        }

        let environment = self.active_environment();
        let mut paths = vec![self.path.clone()];
        for suffix in [environment.as_str(), LOCAL_SUFFIX] {
            let candidate = suffixed_path(&self.path, suffix);
            if !paths.contains(&candidate) {
                paths.push(candidate);
            }
        }
        paths
    }

    fn apply_file(&self, path: &Path, contents: &str, target: &mut FlatMap) -> ConfigResult<()> {
        let mut distinct = BTreeSet::new();
        for (key, value) in self.format.parse(path, contents)? {
            target.insert_with_case(&key, value, self.case_insensitive);
            distinct.insert(if self.case_insensitive {
                key.to_lowercase()
            } else {
                key
            });
        }
        let keys = distinct.len();

        debug!(path = %path.display(), keys, "{} applied", self.format.label());
        target.record_source(SourceRecord {
            origin: self.format.origin(),
            path: Some(path.display().to_string()),
            digest: Some(digest(contents.as_bytes())),
            keys,
        });
        Ok(())
    }
}

impl std::fmt::Debug for FileSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSource")
            .field("path", &self.path)
            .field("format", &self.format)
            .field("layered", &self.layered)
            .field("case_insensitive", &self.case_insensitive)
            .field("required", &self.required)
            .field("environment", &self.environment)
            .finish()
    }
}

impl ConfigResource for FileSource {
    fn describe(&self) -> String {
        format!("{} {}", self.format.label(), self.path.display())
    }

    fn load(&self, target: &mut FlatMap) -> ConfigResult<()> {
        for (index, path) in self.candidate_paths().iter().enumerate() {
            let contents = self.files.read(path).map_err(|source| ConfigError::Io {
                path: path.clone(),
                source,
            })?;

            match contents {
                Some(contents) => self.apply_file(path, &contents, target)?,
                None if index == 0 && self.required => {
                    return Err(ConfigError::NotFound { path: path.clone() })
                }
                None => trace!(path = %path.display(), "optional configuration file not found"),
            }
        }
        Ok(())
    }
}

/// Insert `suffix` before the extension (`config.json` -> `config.local.json`),
/// or append it for names without one (`.env` -> `.env.local`).
pub fn suffixed_path(path: &Path, suffix: &str) -> PathBuf {
    let name = match (path.file_stem(), path.extension()) {
        (Some(stem), Some(ext)) => format!(
            "{}.{suffix}.{}",
            stem.to_string_lossy(),
            ext.to_string_lossy()
        ),
        _ => format!(
            "{}.{suffix}",
            path.file_name().unwrap_or_default().to_string_lossy()
        ),
    };
    path.with_file_name(name)
}

fn digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Environment-aware JSON file resource.
pub fn json_file(path: impl Into<PathBuf>) -> FileSource {
    FileSource::new(path, FileFormat::Json).layered(true)
}

/// JSON file resource reading exactly `path`.
pub fn json_file_direct(path: impl Into<PathBuf>) -> FileSource {
    FileSource::new(path, FileFormat::Json)
}

/// Environment-aware TOML file resource.
pub fn toml_file(path: impl Into<PathBuf>) -> FileSource {
    FileSource::new(path, FileFormat::Toml).layered(true)
}

/// TOML file resource reading exactly `path`.
pub fn toml_file_direct(path: impl Into<PathBuf>) -> FileSource {
    FileSource::new(path, FileFormat::Toml)
}

/// Environment-aware env file resource (`.env`, `.env.{environment}`, `.env.local`).
pub fn env_file(path: impl Into<PathBuf>) -> FileSource {
    FileSource::new(path, FileFormat::Dotenv).layered(true)
}

/// Env file resource reading exactly `path`.
pub fn env_file_direct(path: impl Into<PathBuf>) -> FileSource {
    FileSource::new(path, FileFormat::Dotenv)
}

/// Process environment resource.
pub fn system_env() -> SystemEnv {
    SystemEnv::new()
}

//! configfx - layered, attribute-driven configuration loading
//!
//! A target struct describes its configuration keys with `#[derive(Config)]`.
//! Resources (JSON, TOML and env files, the process environment, closures)
//! are replayed in order into a single [`FlatMap`] keyed by `__`-joined
//! segments, and the map is then reconciled into the target: present keys
//! win, then declared defaults, then required fields fail the load.
//!
//! ```ignore
//! use configfx::{json_file, load, system_env, Config};
//!
//! #[derive(Config, Default)]
//! struct Settings {
//!     #[config(key = "host", default = "localhost")]
//!     host: String,
//!     #[config(key = "port", default = "8080")]
//!     port: u16,
//! }
//!
//! let mut settings = Settings::default();
//! load(&mut settings, &[&json_file("config.json"), &system_env()])?;
//! ```

extern crate self as configfx;

pub mod coerce;
pub mod error;
pub mod flat_map;
pub mod loader;
pub mod meta;
pub mod reconcile;
pub mod redact;
pub mod resource;

pub use configfx_derive::Config;

pub use coerce::{parse_bool, parse_duration, ConfigValue, FromStrValue, ValueKind};
pub use error::{CoerceError, ConfigError, ConfigResult};
pub use flat_map::{join_key, ConfigOrigin, FlatMap, SourceRecord, KEY_SEPARATOR};
pub use loader::{load, load_defaults, load_map, load_meta, Loader};
pub use meta::{Binding, ConfigField, ConfigItemMeta, Configurable, MapField};
pub use reconcile::{reconcile, Coercion, Reconciler};
pub use resource::{
    env_file, env_file_direct, json_file, json_file_direct, system_env, toml_file,
    toml_file_direct, ConfigResource, EnvProvider, FileFormat, FileReader, FileSource, FsReader,
    MapEnv, MemoryFiles, ProcessEnv, SystemEnv,
};

//! Derive Macro Tests
//!
//! Exercises `#[derive(Config)]` end to end: keyed fields, defaults, required
//! fields, nested structs, flattening, maps, lists and `from_str` coercion.

use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use std::time::Duration;

use configfx::{
    load, load_map, load_meta, reconcile, Coercion, Config, ConfigError, ConfigResource,
    ConfigResult, FlatMap, Loader, ValueKind,
};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum Mode {
    #[default]
    Standalone,
    Cluster,
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "standalone" => Ok(Self::Standalone),
            "cluster" => Ok(Self::Cluster),
            other => Err(format!("unknown mode '{other}'")),
        }
    }
}

#[derive(Debug, Default, Config)]
struct Common {
    #[config(key = "log_level", default = "info")]
    log_level: String,
    #[config(key = "verbose")]
    verbose: bool,
}

#[derive(Debug, Default, Config)]
struct Database {
    #[config(key = "url", required)]
    url: String,
    #[config(key = "pool_size", default = "4")]
    pool_size: u32,
    #[config(key = "timeout", default = "5s")]
    timeout: Duration,
}

#[derive(Debug, Default, Config)]
struct Settings {
    #[config(key = "host", default = "localhost")]
    host: String,
    #[config(key = "port", default = "8080")]
    port: u16,
    #[config(key = "database")]
    database: Database,
    #[config(flatten)]
    common: Common,
    #[config(key = "labels")]
    labels: HashMap<String, String>,
    #[config(key = "replicas")]
    replicas: BTreeMap<String, Database>,
    #[config(key = "tags")]
    tags: Vec<String>,
    #[config(key = "max_body")]
    max_body: Option<u64>,
    #[config(key = "mode", from_str)]
    mode: Mode,
    cache_hits: u64,
}

fn pairs(entries: &'static [(&'static str, &'static str)]) -> impl Fn(&mut FlatMap) -> ConfigResult<()> {
    move |map: &mut FlatMap| {
        for (key, value) in entries {
            map.insert(*key, *value);
        }
        Ok(())
    }
}

const DATABASE_URL: &[(&str, &str)] = &[("database__url", "postgres://db")];

// =============================================================================
// Defaults and precedence
// =============================================================================

#[test]
fn test_defaults_apply_without_sources() {
    let url = pairs(DATABASE_URL);
    let mut settings = Settings::default();
    load(&mut settings, &[&url]).unwrap();

    assert_eq!(settings.host, "localhost");
    assert_eq!(settings.port, 8080);
    assert_eq!(settings.database.pool_size, 4);
    assert_eq!(settings.database.timeout, Duration::from_secs(5));
    assert_eq!(settings.common.log_level, "info");
    assert!(!settings.common.verbose);
    assert_eq!(settings.max_body, None);
    assert_eq!(settings.mode, Mode::Standalone);
}

#[test]
fn test_latest_resource_wins() {
    let url = pairs(DATABASE_URL);
    let first = pairs(&[("port", "1000"), ("host", "first")]);
    let second = pairs(&[("port", "2000")]);

    let mut settings = Settings::default();
    load(&mut settings, &[&url, &first, &second]).unwrap();

    assert_eq!(settings.port, 2000);
    assert_eq!(settings.host, "first");
}

#[test]
fn test_unkeyed_field_is_untouched() {
    let url = pairs(DATABASE_URL);
    let noise = pairs(&[("cache_hits", "99")]);

    let mut settings = Settings {
        cache_hits: 7,
        ..Settings::default()
    };
    load(&mut settings, &[&url, &noise]).unwrap();

    assert_eq!(settings.cache_hits, 7);
}

#[derive(Debug, Default, Config)]
struct Listener {
    #[config(key = "Port")]
    port: String,
}

#[test]
fn test_folded_entry_survives_later_exact_lowercase_write() {
    let env = |map: &mut FlatMap| -> ConfigResult<()> {
        map.insert_folded("PORT", "folded");
        Ok(())
    };
    let file = pairs(&[("port", "exact-lower")]);

    let mut listener = Listener::default();
    load(&mut listener, &[&env, &file]).unwrap();

    assert_eq!(listener.port, "folded");
}

// =============================================================================
// Required fields
// =============================================================================

#[test]
fn test_missing_required_names_full_key() {
    let mut settings = Settings::default();
    let err = load(&mut settings, &[]).unwrap_err();

    match err {
        ConfigError::MissingRequired { key, .. } => assert_eq!(key, "database__url"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_required_map_entries_are_checked() {
    let url = pairs(DATABASE_URL);
    let replica = pairs(&[("replicas__east__pool_size", "2")]);

    let mut settings = Settings::default();
    let err = load(&mut settings, &[&url, &replica]).unwrap_err();
    assert_eq!(err.key(), Some("replicas__east__url"));
}

// =============================================================================
// Nesting, flattening and maps
// =============================================================================

#[test]
fn test_flattened_fields_live_at_parent_level() {
    let url = pairs(DATABASE_URL);
    let common = pairs(&[("log_level", "debug"), ("verbose", "yes"), ("common__verbose", "no")]);

    let mut settings = Settings::default();
    load(&mut settings, &[&url, &common]).unwrap();

    assert_eq!(settings.common.log_level, "debug");
    assert!(settings.common.verbose);
}

#[test]
fn test_nested_struct_keys() {
    let database = pairs(&[
        ("database__url", "postgres://primary"),
        ("database__pool_size", "32"),
        ("database__timeout", "1m 30s"),
    ]);

    let mut settings = Settings::default();
    load(&mut settings, &[&database]).unwrap();

    assert_eq!(settings.database.url, "postgres://primary");
    assert_eq!(settings.database.pool_size, 32);
    assert_eq!(settings.database.timeout, Duration::from_secs(90));
}

#[test]
fn test_scalar_map_has_exactly_discovered_entries() {
    let url = pairs(DATABASE_URL);
    let labels = pairs(&[("labels__key", "value"), ("labels__key2", "value2")]);

    let mut settings = Settings::default();
    load(&mut settings, &[&url, &labels]).unwrap();

    assert_eq!(settings.labels.len(), 2);
    assert_eq!(settings.labels["key"], "value");
    assert_eq!(settings.labels["key2"], "value2");
}

#[test]
fn test_struct_map_entries_get_defaults() {
    let replicas = pairs(&[
        ("database__url", "postgres://primary"),
        ("replicas__east__url", "postgres://east"),
        ("replicas__west__url", "postgres://west"),
        ("replicas__west__pool_size", "1"),
    ]);

    let mut settings = Settings::default();
    load(&mut settings, &[&replicas]).unwrap();

    assert_eq!(settings.replicas.len(), 2);
    assert_eq!(settings.replicas["east"].url, "postgres://east");
    assert_eq!(settings.replicas["east"].pool_size, 4);
    assert_eq!(settings.replicas["west"].pool_size, 1);
}

// =============================================================================
// Coercion
// =============================================================================

#[test]
fn test_lists_options_and_from_str() {
    let values = pairs(&[
        ("database__url", "postgres://db"),
        ("tags", "api, edge,internal"),
        ("max_body", "1048576"),
        ("mode", "Cluster"),
    ]);

    let mut settings = Settings::default();
    load(&mut settings, &[&values]).unwrap();

    assert_eq!(settings.tags, vec!["api", "edge", "internal"]);
    assert_eq!(settings.max_body, Some(1_048_576));
    assert_eq!(settings.mode, Mode::Cluster);
}

#[test]
fn test_json_array_list() {
    let values = pairs(&[("database__url", "postgres://db"), ("tags", r#"["a", "b"]"#)]);

    let mut settings = Settings::default();
    load(&mut settings, &[&values]).unwrap();
    assert_eq!(settings.tags, vec!["a", "b"]);
}

#[test]
fn test_strict_coercion_reports_key_and_value() {
    let values = pairs(&[("database__url", "postgres://db"), ("mode", "mesh")]);

    let mut settings = Settings::default();
    let err = load(&mut settings, &[&values]).unwrap_err();

    match err {
        ConfigError::InvalidValue { key, value, reason, .. } => {
            assert_eq!(key, "mode");
            assert_eq!(value, "mesh");
            assert!(reason.contains("unknown mode"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_lenient_coercion_uses_zero_value() {
    let values = pairs(&[
        ("database__url", "postgres://db"),
        ("port", "http"),
        ("database__pool_size", "-1"),
    ]);

    let mut settings = Settings::default();
    Loader::new()
        .with_resource(values)
        .coercion(Coercion::Lenient)
        .load(&mut settings)
        .unwrap();

    assert_eq!(settings.port, 0);
    assert_eq!(settings.database.pool_size, 0);
    assert_eq!(settings.database.url, "postgres://db");
}

// =============================================================================
// Metadata tree
// =============================================================================

#[test]
fn test_meta_tree_shape() {
    let mut settings = Settings::default();
    let meta = load_meta(&mut settings);

    assert_eq!(meta.kind(), ValueKind::Struct);
    let keys = meta.keys();
    assert!(keys.contains(&"database__url".to_string()));
    assert!(keys.contains(&"log_level".to_string()));
    assert!(!keys.iter().any(|key| key.starts_with("common")));
    assert!(!keys.contains(&"cache_hits".to_string()));

    let url = meta.find("database__url").unwrap();
    assert!(url.is_required);
    assert!(!url.has_default_value());

    let port = meta.find("port").unwrap();
    assert_eq!(port.default_value.as_deref(), Some("8080"));
    assert_eq!(port.kind(), ValueKind::Unsigned);

    assert_eq!(meta.find("labels").unwrap().kind(), ValueKind::Map);
    assert_eq!(meta.find("tags").unwrap().kind(), ValueKind::Slice);
    assert_eq!(meta.find("mode").unwrap().kind(), ValueKind::Custom);
}

#[test]
fn test_meta_and_reconcile_match_load() {
    let values = pairs(&[
        ("database__url", "postgres://db"),
        ("port", "9999"),
        ("labels__team", "core"),
    ]);
    let resources: [&dyn ConfigResource; 1] = [&values];

    let mut loaded = Settings::default();
    load(&mut loaded, &resources).unwrap();

    let mut manual = Settings::default();
    let map = load_map(&resources).unwrap();
    reconcile(load_meta(&mut manual), &map).unwrap();

    assert_eq!(format!("{loaded:?}"), format!("{manual:?}"));
}

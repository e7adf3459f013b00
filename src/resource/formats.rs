//! Parsers turning file contents into flat key/value pairs.
//!
//! Nested objects become `__`-joined key segments; arrays stay a single leaf
//! holding their JSON text; `null` values are dropped. Env files never
//! expand `$VAR` references: a `$` is kept as written.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ConfigError, ConfigResult};
use crate::flat_map::{ConfigOrigin, KEY_SEPARATOR};

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Json,
    Toml,
    Dotenv,
}

impl FileFormat {
    pub fn label(self) -> &'static str {
        match self {
            Self::Json => "JSON file",
            Self::Toml => "TOML file",
            Self::Dotenv => "env file",
        }
    }

    pub fn origin(self) -> ConfigOrigin {
        match self {
            Self::Json => ConfigOrigin::JsonFile,
            Self::Toml => ConfigOrigin::TomlFile,
            Self::Dotenv => ConfigOrigin::EnvFile,
        }
    }

    /// Parse `contents` read from `path` into flat pairs, in document order.
    pub fn parse(self, path: &Path, contents: &str) -> ConfigResult<Vec<(String, String)>> {
        match self {
            Self::Json => parse_json(path, contents),
            Self::Toml => parse_toml(path, contents),
            Self::Dotenv => parse_dotenv(path, contents),
        }
    }
}

fn parse_json(path: &Path, contents: &str) -> ConfigResult<Vec<(String, String)>> {
    if contents.trim().is_empty() {
        return Ok(Vec::new());
    }
    let value: Value = serde_json::from_str(contents).map_err(|source| ConfigError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    flatten_document(path, value)
}

fn parse_toml(path: &Path, contents: &str) -> ConfigResult<Vec<(String, String)>> {
    let table: toml::Table = toml::from_str(contents).map_err(|source| ConfigError::Toml {
        path: path.to_path_buf(),
        source,
    })?;
    flatten_document(path, toml_to_json(toml::Value::Table(table)))
}

fn parse_dotenv(path: &Path, contents: &str) -> ConfigResult<Vec<(String, String)>> {
    let literal = escape_expansions(contents);
    dotenvy::from_read_iter(literal.as_bytes())
        .map(|item| {
            item.map_err(|e| ConfigError::EnvFile {
                path: path.to_path_buf(),
                message: e.to_string(),
            })
        })
        .collect()
}

/// Quote state of env file text, tracked the way dotenvy splits logical lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EnvScan {
    Plain,
    Blank,
    Escape,
    Weak,
    WeakEscape,
    Strong,
    Comment,
}

/// Escape every `$` dotenvy would expand, so env file values are read
/// literally. dotenvy resolves `$VAR` against the process environment.
fn escape_expansions(contents: &str) -> String {
    let mut out = String::with_capacity(contents.len());
    let mut state = EnvScan::Plain;

    for line in contents.split_inclusive('\n') {
        if state == EnvScan::Plain && line.trim_start().starts_with('#') {
            out.push_str(line);
            continue;
        }

        for c in line.chars() {
            state = match (state, c) {
                (EnvScan::Comment, '\n') => EnvScan::Plain,
                (EnvScan::Comment, _) => EnvScan::Comment,
                (EnvScan::Blank, '#') => EnvScan::Comment,
                (EnvScan::Plain | EnvScan::Blank, '$') => {
                    out.push('\\');
                    EnvScan::Plain
                }
                (EnvScan::Plain | EnvScan::Blank, '\\') => EnvScan::Escape,
                (EnvScan::Plain | EnvScan::Blank, '"') => EnvScan::Weak,
                (EnvScan::Plain | EnvScan::Blank, '\'') => EnvScan::Strong,
                (EnvScan::Plain | EnvScan::Blank, c)
                    if c.is_whitespace() && c != '\n' && c != '\r' =>
                {
                    EnvScan::Blank
                }
                (EnvScan::Plain | EnvScan::Blank | EnvScan::Escape, _) => EnvScan::Plain,
                (EnvScan::Weak, '$') => {
                    out.push('\\');
                    EnvScan::Weak
                }
                (EnvScan::Weak, '\\') => EnvScan::WeakEscape,
                (EnvScan::Weak, '"') => EnvScan::Plain,
                (EnvScan::Weak | EnvScan::WeakEscape, _) => EnvScan::Weak,
                (EnvScan::Strong, '\'') => EnvScan::Plain,
                (EnvScan::Strong, _) => EnvScan::Strong,
            };
            out.push(c);
        }
    }
    out
}

/// Flatten a parsed document. The top level must be an object.
pub fn flatten_document(path: &Path, document: Value) -> ConfigResult<Vec<(String, String)>> {
    if !document.is_object() {
        return Err(ConfigError::JsonNotObject {
            path: path.to_path_buf(),
        });
    }
    let mut pairs = Vec::new();
    flatten_into("", document, &mut pairs);
    Ok(pairs)
}

fn flatten_into(prefix: &str, value: Value, pairs: &mut Vec<(String, String)>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let nested = if prefix.is_empty() {
                    key
                } else {
                    format!("{prefix}{KEY_SEPARATOR}{key}")
                };
                flatten_into(&nested, child, pairs);
            }
        }
        Value::Null => {}
        Value::String(text) => pairs.push((prefix.to_string(), text)),
        other => pairs.push((prefix.to_string(), other.to_string())),
    }
}

/// Convert TOML Value to JSON Value
fn toml_to_json(toml: toml::Value) -> Value {
    match toml {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::Number(i.into()),
        toml::Value::Float(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(f.to_string())),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(arr) => Value::Array(arr.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn parse(format: FileFormat, contents: &str) -> BTreeMap<String, String> {
        format
            .parse(Path::new("test"), contents)
            .unwrap()
            .into_iter()
            .collect()
    }

    #[test]
    fn test_json_nesting_becomes_segments() {
        let pairs = parse(
            FileFormat::Json,
            r#"{"server": {"host": "localhost", "port": 8080, "tls": {"enabled": true}}}"#,
        );

        assert_eq!(pairs["server__host"], "localhost");
        assert_eq!(pairs["server__port"], "8080");
        assert_eq!(pairs["server__tls__enabled"], "true");
    }

    #[test]
    fn test_json_arrays_stay_single_leaf() {
        let pairs = parse(FileFormat::Json, r#"{"hosts": ["a", "b"], "ports": [1, 2]}"#);

        assert_eq!(pairs["hosts"], r#"["a","b"]"#);
        assert_eq!(pairs["ports"], "[1,2]");
        assert_eq!(pairs.len(), 2);
    }

    #[test]
    fn test_json_null_is_dropped() {
        let pairs = parse(FileFormat::Json, r#"{"a": null, "b": 1.5}"#);

        assert!(!pairs.contains_key("a"));
        assert_eq!(pairs["b"], "1.5");
    }

    #[test]
    fn test_json_empty_document() {
        assert!(parse(FileFormat::Json, "  \n").is_empty());
    }

    #[test]
    fn test_json_top_level_must_be_object() {
        let err = FileFormat::Json
            .parse(Path::new("list.json"), "[1, 2]")
            .unwrap_err();
        assert!(matches!(err, ConfigError::JsonNotObject { .. }));
    }

    #[test]
    fn test_json_malformed() {
        let err = FileFormat::Json
            .parse(Path::new("broken.json"), "{\"port\": ")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Json { .. }));
        assert!(err.to_string().contains("broken.json"));
    }

    #[test]
    fn test_toml_tables() {
        let pairs = parse(
            FileFormat::Toml,
            "name = \"api\"\n[database]\nurl = \"postgres://db\"\npool = 4\nratio = 0.5\n",
        );

        assert_eq!(pairs["name"], "api");
        assert_eq!(pairs["database__url"], "postgres://db");
        assert_eq!(pairs["database__pool"], "4");
        assert_eq!(pairs["database__ratio"], "0.5");
    }

    #[test]
    fn test_toml_malformed() {
        let err = FileFormat::Toml
            .parse(Path::new("bad.toml"), "name = ")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Toml { .. }));
    }

    #[test]
    fn test_dotenv_lines() {
        let pairs = parse(
            FileFormat::Dotenv,
            "# comment\n\nserver__port=8080\nNAME=\"quoted value\"\nexport TOKEN=abc\n",
        );

        assert_eq!(pairs["server__port"], "8080");
        assert_eq!(pairs["NAME"], "quoted value");
        assert_eq!(pairs["TOKEN"], "abc");
        assert_eq!(pairs.len(), 3);
    }

    #[test]
    fn test_dotenv_dollar_is_literal() {
        let pairs = parse(
            FileFormat::Dotenv,
            "secret=abc$PATH\nweak=\"x ${HOME}\"\nstrong='lit $HOME'\nescaped=pre\\$post\n",
        );

        assert_eq!(pairs["secret"], "abc$PATH");
        assert_eq!(pairs["weak"], "x ${HOME}");
        assert_eq!(pairs["strong"], "lit $HOME");
        assert_eq!(pairs["escaped"], "pre$post");
    }

    #[test]
    fn test_dotenv_quotes_in_comments_do_not_leak() {
        let pairs = parse(
            FileFormat::Dotenv,
            "# don't expand\na=1 # it's fine\nb=$PATH\n",
        );

        assert_eq!(pairs["a"], "1");
        assert_eq!(pairs["b"], "$PATH");
    }

    #[test]
    fn test_escape_expansions() {
        assert_eq!(escape_expansions("a=$X\n"), "a=\\$X\n");
        assert_eq!(escape_expansions("a='$X'\n"), "a='$X'\n");
        assert_eq!(escape_expansions("a='\\'$X\n"), "a='\\'\\$X\n");
        assert_eq!(escape_expansions("a=\\$X\n"), "a=\\$X\n");
        assert_eq!(escape_expansions("# $X\n"), "# $X\n");
    }

    #[test]
    fn test_dotenv_malformed_line() {
        let err = FileFormat::Dotenv
            .parse(Path::new(".env"), "VALID=1\nthis line is broken\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::EnvFile { .. }));
    }

    #[test]
    fn test_format_origin() {
        assert_eq!(FileFormat::Dotenv.origin(), ConfigOrigin::EnvFile);
        assert_eq!(FileFormat::Json.label(), "JSON file");
    }
}

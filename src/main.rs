//! configfx CLI
//!
//! Entry point for the `configfx` command-line tool.

use std::collections::BTreeMap;
use std::error::Error;
use std::path::PathBuf;
use std::process;
use std::str::FromStr;

use clap::{Parser, Subcommand, ValueEnum};
use configfx::redact::redact;
use configfx::{system_env, FileFormat, FileSource, FlatMap, Loader};
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "configfx")]
#[command(about = "Inspect layered configuration sources", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the merged flat namespace
    Dump {
        /// Sources in ascending precedence: json:PATH, toml:PATH, env:PATH, system
        #[arg(required = true)]
        sources: Vec<SourceSpec>,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Env)]
        format: OutputFormat,

        #[command(flatten)]
        options: SourceOptions,

        /// Print secret-looking values instead of masking them
        #[arg(long)]
        show_secrets: bool,

        /// Annotate every key with the source that set it
        #[arg(long)]
        show_origin: bool,
    },

    /// Print the provenance records of the given sources as JSON
    Sources {
        /// Sources in ascending precedence: json:PATH, toml:PATH, env:PATH, system
        #[arg(required = true)]
        sources: Vec<SourceSpec>,

        #[command(flatten)]
        options: SourceOptions,
    },
}

#[derive(clap::Args)]
struct SourceOptions {
    /// Treat keys from every source case-insensitively
    #[arg(long)]
    ignore_case: bool,

    /// Read only the named files, without environment and local overrides
    #[arg(long)]
    direct: bool,

    /// Environment name for layered files (default: $ENV or "development")
    #[arg(long, short = 'e')]
    environment: Option<String>,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Env,
    Json,
}

/// One command-line source argument.
#[derive(Debug, Clone, PartialEq, Eq)]
enum SourceSpec {
    File(FileFormat, PathBuf),
    System,
}

impl FromStr for SourceSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "system" {
            return Ok(Self::System);
        }
        let (kind, path) = s
            .split_once(':')
            .ok_or_else(|| format!("expected json:PATH, toml:PATH, env:PATH or system, got '{s}'"))?;
        if path.is_empty() {
            return Err(format!("missing path in '{s}'"));
        }
        let format = match kind {
            "json" => FileFormat::Json,
            "toml" => FileFormat::Toml,
            "env" => FileFormat::Dotenv,
            other => return Err(format!("unknown source kind '{other}'")),
        };
        Ok(Self::File(format, PathBuf::from(path)))
    }
}

fn main() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("configfx=info")),
        )
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli.command) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(command: Commands) -> Result<(), Box<dyn Error>> {
    match command {
        Commands::Dump {
            sources,
            format,
            options,
            show_secrets,
            show_origin,
        } => {
            let map = build_loader(&sources, &options).load_map()?;
            let output = render_dump(&map, format, show_secrets, show_origin)?;
            print!("{}", output);
        }
        Commands::Sources { sources, options } => {
            let map = build_loader(&sources, &options).load_map()?;
            println!("{}", serde_json::to_string_pretty(map.sources())?);
        }
    }
    Ok(())
}

fn build_loader(sources: &[SourceSpec], options: &SourceOptions) -> Loader {
    let mut loader = Loader::new();
    for source in sources {
        match source {
            SourceSpec::System => {
                loader.push(system_env().case_insensitive(options.ignore_case));
            }
            SourceSpec::File(format, path) => {
                let mut file = FileSource::new(path.clone(), *format)
                    .layered(!options.direct)
                    .case_insensitive(options.ignore_case);
                if let Some(ref environment) = options.environment {
                    file = file.environment(environment.clone());
                }
                loader.push(file);
            }
        }
    }
    debug!(resources = ?loader.describe(), "sources resolved");
    loader
}

fn render_dump(
    map: &FlatMap,
    format: OutputFormat,
    show_secrets: bool,
    show_origin: bool,
) -> Result<String, serde_json::Error> {
    let mut entries = map.to_map();
    let redactions = if show_secrets {
        Vec::new()
    } else {
        redact(&mut entries)
    };
    if !redactions.is_empty() {
        debug!(count = redactions.len(), "secret values masked");
    }

    match format {
        OutputFormat::Env => Ok(render_env(map, &entries, show_origin)),
        OutputFormat::Json => render_json(map, &entries, show_origin),
    }
}

fn render_env(map: &FlatMap, entries: &BTreeMap<String, String>, show_origin: bool) -> String {
    let mut out = String::new();
    for (key, value) in entries {
        out.push_str(&format!("{}={}", key, quote_env_value(value)));
        if show_origin {
            if let Some(origin) = map.origin_of(key) {
                out.push_str(&format!("  # {}", origin));
            }
        }
        out.push('\n');
    }
    out
}

fn render_json(
    map: &FlatMap,
    entries: &BTreeMap<String, String>,
    show_origin: bool,
) -> Result<String, serde_json::Error> {
    let output: serde_json::Map<String, serde_json::Value> = entries
        .iter()
        .map(|(key, value)| {
            let rendered = if show_origin {
                serde_json::json!({
                    "value": value,
                    "origin": map.origin_of(key),
                })
            } else {
                serde_json::Value::String(value.clone())
            };
            (key.clone(), rendered)
        })
        .collect();
    let mut text = serde_json::to_string_pretty(&output)?;
    text.push('\n');
    Ok(text)
}

/// Double-quote values that would not survive a round trip through an env file.
fn quote_env_value(value: &str) -> String {
    let plain = !value.is_empty()
        && !value
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '"' | '\'' | '#' | '\\' | '$' | '`'));
    if plain {
        return value.to_string();
    }
    let escaped = value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('$', "\\$")
        .replace('\n', "\\n");
    format!("\"{}\"", escaped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_spec_parsing() {
        assert_eq!("system".parse::<SourceSpec>(), Ok(SourceSpec::System));
        assert_eq!(
            "json:conf/app.json".parse::<SourceSpec>(),
            Ok(SourceSpec::File(FileFormat::Json, PathBuf::from("conf/app.json")))
        );
        assert_eq!(
            "env:.env".parse::<SourceSpec>(),
            Ok(SourceSpec::File(FileFormat::Dotenv, PathBuf::from(".env")))
        );
        assert!("yaml:app.yaml".parse::<SourceSpec>().is_err());
        assert!("json:".parse::<SourceSpec>().is_err());
        assert!("app.json".parse::<SourceSpec>().is_err());
    }

    #[test]
    fn test_quote_env_value() {
        assert_eq!(quote_env_value("8080"), "8080");
        assert_eq!(quote_env_value(""), "\"\"");
        assert_eq!(quote_env_value("two words"), "\"two words\"");
        assert_eq!(quote_env_value("say \"hi\""), "\"say \\\"hi\\\"\"");
    }

    #[test]
    fn test_render_masks_secrets() {
        let map: FlatMap = [("db__password", "hunter2"), ("db__host", "localhost")]
            .into_iter()
            .collect();

        let masked = render_dump(&map, OutputFormat::Env, false, false).unwrap();
        assert_eq!(masked, "db__host=localhost\ndb__password=[REDACTED]\n");

        let shown = render_dump(&map, OutputFormat::Env, true, false).unwrap();
        assert!(shown.contains("db__password=hunter2"));
    }

    #[test]
    fn test_render_json_with_origin() {
        let mut map = FlatMap::new();
        map.set_origin(Some("JSON file config.json"));
        map.insert("port", "8080");
        map.set_origin(None);

        let text = render_dump(&map, OutputFormat::Json, false, true).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["port"]["value"], "8080");
        assert_eq!(value["port"]["origin"], "JSON file config.json");
    }

    #[test]
    fn test_cli_parses_dump_flags() {
        let cli = Cli::try_parse_from([
            "configfx",
            "dump",
            "json:config.json",
            "system",
            "--format",
            "json",
            "--ignore-case",
            "--environment",
            "production",
        ])
        .unwrap();

        match cli.command {
            Commands::Dump {
                sources,
                format,
                options,
                ..
            } => {
                assert_eq!(sources.len(), 2);
                assert!(format == OutputFormat::Json);
                assert!(options.ignore_case);
                assert_eq!(options.environment.as_deref(), Some("production"));
            }
            Commands::Sources { .. } => panic!("expected dump"),
        }
    }
}

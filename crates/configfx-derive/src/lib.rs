//! Derive macro for configfx configuration structs.
//!
//! `#[derive(Config)]` generates a `configfx::Configurable` implementation that
//! hands out one mutable binding per keyed field, plus a `configfx::ConfigField`
//! implementation so the struct can be nested inside other configurations or
//! used as a map value.
//!
//! # Field Attributes
//! - `#[config(key = "port")]` - Key segment for this field (used verbatim)
//! - `#[config(key = "port", default = "8080")]` - Fallback text when no source provides the key
//! - `#[config(key = "token", required)]` - Fail the load when neither a source nor a default provides a value. `required`, `flatten` and `from_str` are word-only flags
//! - `#[config(flatten)]` - Splice the fields of an embedded struct into the parent's key namespace
//! - `#[config(key = "level", from_str)]` - Coerce through the field type's `FromStr` implementation
//!
//! Fields without `key` or `flatten` are ignored.
//!
//! ```ignore
//! #[derive(Default, Config)]
//! pub struct HttpConfig {
//!     #[config(key = "host", default = "localhost")]
//!     pub host: String,
//!     #[config(key = "port", default = "8080")]
//!     pub port: u16,
//!     #[config(key = "database")]
//!     pub database: DatabaseConfig,   // database__url, database__pool_size, ...
//!     #[config(flatten)]
//!     pub common: CommonConfig,       // spliced in at this level
//! }
//! ```

mod config;

use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput};

#[proc_macro_derive(Config, attributes(config))]
pub fn derive_config(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    config::generate_impl(&input).into()
}

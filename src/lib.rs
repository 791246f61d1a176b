//! Hierarchical, typed property resolution with includes and live reload.
//!
//! Proptree loads named, versioned configurations from TOML sources into an
//! element tree, resolves colon-separated paths against it, evaluates
//! expressions and switches against a caller-supplied context, and swaps in
//! new versions when a source changes.
//!
//! ```ignore
//! let service = ConfigService::builder().build()?;
//! let app = service.load("file:/etc/myapp/app.toml")?;
//!
//! let port = app.integer_or("server:port", 8080)?;
//! let ctx = ContextMap::new().with("env", "prod");
//! let pool = app.integer_with(&ctx, "db:pool")?;
//! ```
//!
//! # Sources
//!
//! A configuration source is a TOML document:
//!
//! ```toml
//! name = "app"
//! version = "1.2.0"
//! include = ["file:/etc/myapp/defaults.toml"]
//!
//! [reload]
//! check-every = "30s"
//!
//! [metadata]
//! owner = "platform"
//!
//! [elements]
//! title = "Demo"
//! timeout = { value = "30", type = "long", description = "request timeout" }
//! pool = { switch = [
//!     { when = "env == 'prod'", value = 32 },
//!     { else = 4 },
//! ] }
//! workers = { expression = "cores * 2" }
//!
//! [elements.server]
//! host = "localhost"
//! port = 8080
//! ```
//!
//! See the [`parser`] module for every element form. Sources are addressed
//! by `prefix:path` locations. `file:` and `string:` are built in; register
//! more on the [`ResourceRegistry`].
//!
//! # Resolution
//!
//! `"server:port"`, `["server", "port"]` and `["server:port"]` are the same
//! [`Path`]. Each segment but the last must name a container (a set or a
//! pojo). When a configuration does not define a path, or the path evaluates
//! to nothing, its includes are consulted in declaration order and the first
//! one with a value wins. Included configurations are never merged.
//!
//! Absence is `Ok(None)`. A malformed path, a failing expression, or a value
//! of the wrong type for the accessor is an error: the accessors on
//! [`PropertySource`] never convert, except [`string`](PropertySource::string),
//! which renders any value.
//!
//! # Reload
//!
//! A configuration with a `[reload]` section is polled every `check-every`
//! by a background task on the current Tokio runtime. A changed source is
//! re-read with its includes and swapped into the [`ConfigHandle`] in one
//! step; readers see either the old or the new configuration, never a mix. A
//! failed reload is logged and the previous configuration stays in force.
//! Polling can be suspended and resumed per configuration or for all of them.
//! Build the service with [`no_reload()`](ConfigServiceBuilder::no_reload) to
//! use it without a runtime.
//!
//! # Service options
//!
//! The service's own settings are a confique struct, [`ServiceOptions`],
//! read from `PROPTREE_*` environment variables unless passed explicitly.
//!
//! # Clap adapter
//!
//! The `cli` module (behind the `clap` feature, on by default) provides
//! [`QueryArgs`], which gives an application `get <path> --ctx k=v` and
//! `list` subcommands routed through [`ConfigService::handle`].

pub mod element;
pub mod error;
pub mod expr;
pub mod parser;
pub mod resolve;
pub mod resource;
pub mod types;
pub mod value;

mod binding;
mod builder;
#[cfg(feature = "clap")]
mod cli;
mod configuration;
mod context;
mod flatten;
mod handle;
mod loader;
mod ops;
mod options;
mod path;
mod reload;
mod service;
mod validate;

#[cfg(test)]
mod fixtures;

pub use binding::{Binder, BindingTable, MethodBinding, ParamBinding};
pub use builder::ConfigurationBuilder;
#[cfg(feature = "clap")]
pub use cli::{QueryArgs, QuerySubcommand};
pub use configuration::{Configuration, PropertySource};
pub use context::{ContextMap, parse_context_value};
pub use element::{Element, ElementContainer, Elements, PojoBinding, PojoRegistry};
pub use error::ProptreeError;
pub use flatten::{PathEntry, flatten};
pub use handle::{ConfigHandle, HandleId};
pub use loader::Loader;
pub use ops::ConfigResult;
pub use options::ServiceOptions;
pub use parser::{ConfigurationParser, TomlParser};
pub use path::Path;
pub use reload::{ReloadService, ReloadState};
pub use resource::{FileResource, Resource, ResourceRegistry, StringResource};
pub use service::{ConfigService, ConfigServiceBuilder};
pub use types::{ConfigAction, PojoPolicy, ReloadPolicy, Version};
pub use value::{FromValue, Object, Value, ValueType, ValueTypeRegistry};

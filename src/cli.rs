//! Clap adapter for proptree queries.
//!
//! Compiled only with the `clap` Cargo feature (on by default). Provides
//! [`QueryArgs`] and [`QuerySubcommand`], clap derive types you embed in your
//! own CLI to get `get|list` subcommands over loaded configurations.
//!
//! The only bridge to the core is [`QueryArgs::into_action()`], which turns
//! parsed arguments into a [`ConfigAction`](crate::ConfigAction) for
//! [`ConfigService::handle()`](crate::ConfigService::handle). Without clap,
//! build `ConfigAction` values directly.

use clap::{Args, Subcommand};

use crate::types::ConfigAction;

/// Clap-derived args for a configuration query group.
///
/// ```ignore
/// #[derive(Subcommand)]
/// enum Commands {
///     Config(QueryArgs),
/// }
/// ```
#[derive(Debug, Args)]
pub struct QueryArgs {
    /// Name of the configuration to query. Defaults to the first loaded
    /// configuration by name.
    #[arg(long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub action: Option<QuerySubcommand>,
}

#[derive(Debug, Subcommand)]
pub enum QuerySubcommand {
    /// Show every addressable path with its element kind.
    List,
    /// Resolve a path and show its value.
    Get {
        /// Colon-separated path (e.g. "server:port").
        path: String,
        /// Context variable for expressions and switches, as name=value.
        #[arg(long = "ctx", value_parser = parse_pair)]
        context: Vec<(String, String)>,
    },
}

impl QueryArgs {
    /// Bare invocation and `list` both map to `ConfigAction::List`.
    pub fn into_action(self) -> ConfigAction {
        let configuration = self.config;
        match self.action {
            None | Some(QuerySubcommand::List) => ConfigAction::List { configuration },
            Some(QuerySubcommand::Get { path, context }) => ConfigAction::Get {
                configuration,
                path,
                context,
            },
        }
    }
}

fn parse_pair(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected name=value, got '{raw}'")),
    }
}

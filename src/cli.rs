//! CLI domain: parse, route and output only.
//! No domain orchestration; a single route table dispatches to the store and tree services.

mod output;
mod parse;
mod route;

pub use output::{format_diff_text, format_snapshot_text, map_error};
pub use parse::{Cli, Commands};
pub use route::RunContext;

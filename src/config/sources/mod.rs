//! Configuration sources, lowest precedence first.

pub mod global_file;
pub mod workspace_file;

use config::builder::DefaultState;
use config::{ConfigBuilder, Environment};

/// `KEYTREE_AUTO_SAVE__DELAY_MS=100` overrides `auto_save.delay_ms`.
pub fn add_environment(builder: ConfigBuilder<DefaultState>) -> ConfigBuilder<DefaultState> {
    builder.add_source(
        Environment::with_prefix("KEYTREE")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    )
}

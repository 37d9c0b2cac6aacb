//! Merge rules: defaults, override order, conflict handling.

use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    Config::builder()
        .set_default("store.backend", "json")?
        .set_default("store.path", ".keytree/store")?
        .set_default("store.handle", "default")?
        .set_default("auto_save.delay_ms", 500)?
        .set_default("auto_save.filter_enabled", false)?
        .set_default("auto_save.filters", Vec::<String>::new())?
        .set_default("auto_update.interval_ms", 1000)?
        .set_default("auto_update.can_add", false)?
        .set_default("auto_update.can_remove", false)
}

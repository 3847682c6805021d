//! Layered configuration.
//!
//! Tiers, lowest to highest, merged field-by-field:
//! 1. **Defaults** - built into [`Config::default`]
//! 2. **User** - `<config dir>/crossnote/config.yaml`
//! 3. **Explicit** - `--config PATH` or `CROSSNOTE_CONFIG_PATH`
//! 4. **Environment** - `CROSSNOTE_DB_PATH`, `CROSSNOTE_SYNC_INTERVAL_SECS`,
//!    `CROSSNOTE_STALE_AFTER_SECS`

mod loader;
mod merge;
mod types;

pub use loader::{
    ConfigLoader, ConfigPaths, ConfigTier, ENV_CONFIG_PATH, ENV_DB_PATH, ENV_STALE_AFTER,
    ENV_SYNC_INTERVAL,
};
pub use merge::{deep_merge, deep_merge_all};
pub use types::*;

mod settings;
mod shared;

pub use settings::{
    FixtureSettings, SettingsError, TomlServerSettings, TomlSettings, EXAMPLE_SETTINGS,
    SETTINGS_FILE,
};
pub use shared::{deep_merge, proxy_url_patch, ConfigStore, FixtureConfig};

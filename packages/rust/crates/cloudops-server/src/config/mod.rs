//! Settings files and their conversion into library configuration.

mod settings;

pub use settings::{
    BackendSettings, CloudOpsSettings, DEFAULT_BIND, ExecutorSettings, RemoteSettings,
    ServerSettings, StoreSettings, VetterSettings, load_settings, load_settings_from_paths,
    set_config_home_override, settings_paths,
};

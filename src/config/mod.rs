//! Configuration: TOML settings file plus environment overrides.

mod settings;

pub use settings::{
    expand_env_vars, InferenceSettings, IntrospectionSettings, SearchSettings, Settings,
    SettingsError, StoreSettings, DEFAULT_NAMESPACE,
};

pub mod capability_flags;
pub mod status_flags;
pub mod auth_plugin_names;

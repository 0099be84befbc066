#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthPlugin {
    MySqlNativePassword,
    CachingSha2Password,
}

impl AuthPlugin {
    pub fn from_name(name: &str) -> Self {
        match name {
            "caching_sha2_password" => AuthPlugin::CachingSha2Password,
            _ => AuthPlugin::MySqlNativePassword,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AuthPlugin::MySqlNativePassword => "mysql_native_password",
            AuthPlugin::CachingSha2Password => "caching_sha2_password",
        }
    }
}

/// Upstream target server this importer's backing connection authenticates
/// against (§4.7); also the credentials the proxy itself checks a connecting
/// client against, since it performs the handshake as if it were the target.
#[derive(Debug, Clone)]
pub struct TargetDbSettings {
    pub db_user: String,
    pub db_password: String,
    pub db_host: String,
    pub db_port: u16,
    pub db_name: String,
}

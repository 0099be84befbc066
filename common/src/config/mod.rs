mod config;
mod load_style;

use std::fs::File;
use std::io::Read;
use std::path::Path;

pub use config::{BaseConfig, FConfig, HttpConfig, RepConfig, StoreConfig};
pub use load_style::LoadStyle;

use crate::err::decode_error::ReError;

/// 读取指定路径下的配制文件信息
pub fn read_config<P: AsRef<Path>>(path: P) -> Result<RepConfig, ReError> {
    let mut file = File::open(path.as_ref())?;
    let mut s = String::new();

    let _ = file.read_to_string(&mut s);
    toml::from_str(s.as_str()).map_err(|e| ReError::ConfigFileParseErr(e.to_string()))
}

#[cfg(test)]
mod test {
    use super::RepConfig;

    #[test]
    fn default_config_round_trips_through_toml() {
        let cfg = RepConfig::default();
        let s = toml::to_string(&cfg).expect("serialize default config");
        let back: RepConfig = toml::from_str(&s).expect("deserialize default config");
        assert_eq!(cfg.http.port, back.http.port);
        assert_eq!(cfg.store.db_path, back.store.db_path);
    }
}

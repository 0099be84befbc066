use serde::{Deserialize, Serialize};

/// Connection endpoint for either the source or target MySQL server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointSettings {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub user: String,
    pub password: String,
    pub db_name: String,
}

fn default_port() -> u16 {
    3306
}

/// Where the proxy importer's own HTTP control surface lives, used by the exporter
/// to allocate and tear down proxy listeners.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyControlSettings {
    #[serde(default = "default_proxy_control_base_url")]
    pub base_url: String,
    #[serde(default = "default_listen_addr")]
    pub mysql_listen_addr: String,
}

fn default_proxy_control_base_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_listen_addr() -> String {
    "127.0.0.1".to_string()
}

impl Default for ProxyControlSettings {
    fn default() -> Self {
        Self {
            base_url: default_proxy_control_base_url(),
            mysql_listen_addr: default_listen_addr(),
        }
    }
}

/// Full settings for a single dump run, as delivered over `POST /sync/start` or read
/// from a file/stdin by the CLI front-end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DumpSettings {
    pub source: EndpointSettings,
    pub target: EndpointSettings,

    #[serde(default)]
    pub proxy: ProxyControlSettings,

    #[serde(default = "default_max_rows_per_statement")]
    pub max_rows_per_statement: usize,
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    #[serde(default)]
    pub without_proxy: bool,
    #[serde(default = "default_max_workers_on_last_table")]
    pub max_workers_on_last_table: usize,
    #[serde(default)]
    pub chunk_size: i64,

    #[serde(default)]
    pub add_drop_table: bool,
    #[serde(default)]
    pub add_drop_view: bool,
    #[serde(default)]
    pub add_drop_trigger: bool,
    #[serde(default)]
    pub add_drop_procedure: bool,

    #[serde(default)]
    pub no_data: bool,
    #[serde(default)]
    pub include_tables: Vec<String>,
    #[serde(default)]
    pub exclude_tables: Vec<String>,
    #[serde(default)]
    pub exclude_triggers: Vec<String>,
    #[serde(default)]
    pub no_views: bool,
    #[serde(default)]
    pub no_procedures: bool,
    #[serde(default)]
    pub no_lock_tables: bool,
    #[serde(default)]
    pub no_transaction: bool,
}

fn default_max_rows_per_statement() -> usize {
    2000
}

fn default_worker_count() -> usize {
    4
}

fn default_max_workers_on_last_table() -> usize {
    2
}

impl Default for DumpSettings {
    fn default() -> Self {
        Self {
            source: EndpointSettings {
                host: "127.0.0.1".to_string(),
                port: 3306,
                user: "root".to_string(),
                password: String::new(),
                db_name: String::new(),
            },
            target: EndpointSettings {
                host: "127.0.0.1".to_string(),
                port: 3306,
                user: "root".to_string(),
                password: String::new(),
                db_name: String::new(),
            },
            proxy: ProxyControlSettings::default(),
            max_rows_per_statement: default_max_rows_per_statement(),
            worker_count: default_worker_count(),
            without_proxy: false,
            max_workers_on_last_table: default_max_workers_on_last_table(),
            chunk_size: 0,
            add_drop_table: false,
            add_drop_view: false,
            add_drop_trigger: false,
            add_drop_procedure: false,
            no_data: false,
            include_tables: Vec::new(),
            exclude_tables: Vec::new(),
            exclude_triggers: Vec::new(),
            no_views: false,
            no_procedures: false,
            no_lock_tables: false,
            no_transaction: false,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_settings_round_trip_through_json() {
        let settings = DumpSettings::default();
        let s = serde_json::to_string(&settings).unwrap();
        let back: DumpSettings = serde_json::from_str(&s).unwrap();
        assert_eq!(back.worker_count, settings.worker_count);
        assert_eq!(back.proxy.base_url, settings.proxy.base_url);
    }

    #[test]
    fn minimal_json_fills_in_defaults() {
        let s = r#"{
            "source": {"host":"a","user":"u","password":"p","db_name":"d"},
            "target": {"host":"b","user":"u","password":"p","db_name":"d"}
        }"#;
        let settings: DumpSettings = serde_json::from_str(s).unwrap();
        assert_eq!(settings.worker_count, 4);
        assert_eq!(settings.max_rows_per_statement, 2000);
        assert_eq!(settings.source.port, 3306);
    }
}

use serde::{Deserialize, Serialize};

use crate::config::load_style::LoadStyle;

/// Top-level config envelope, mirroring how every config file this tool reads is wrapped:
/// the actual settings plus a marker for how the file was loaded.
#[derive(Debug, Serialize, Deserialize)]
pub struct FConfig {
    config: RepConfig,

    /// 配置的加载方式
    load_style: LoadStyle,
}

/// Process-wide settings: where the HTTP control surface listens, where the task store
/// lives, and the default dump options new `/sync/start` requests are merged against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepConfig {
    app_name: String,

    pub http: HttpConfig,
    pub store: StoreConfig,
    pub base: BaseConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// path to the embedded sqlite task-tracking database
    pub db_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseConfig {
    /// 日志输出路径
    log_dir: Option<String>,

    pub debug: bool,
}

impl Default for FConfig {
    fn default() -> Self {
        FConfig {
            config: RepConfig::default(),
            load_style: LoadStyle::DEFAULT,
        }
    }
}

impl Default for RepConfig {
    fn default() -> Self {
        RepConfig {
            app_name: String::from("mysql-sync"),
            base: BaseConfig::default(),
            http: HttpConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        HttpConfig {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            db_path: "./sync_task.db".to_string(),
        }
    }
}

impl Default for BaseConfig {
    fn default() -> Self {
        BaseConfig {
            log_dir: Some(String::from("/tmp/mysql-sync/logs")),
            debug: false,
        }
    }
}

impl FConfig {
    pub fn new(c: RepConfig) -> Self {
        FConfig {
            config: c,
            load_style: LoadStyle::YAML,
        }
    }

    pub fn get_config(self) -> RepConfig {
        self.config
    }

    pub fn get_load_style(self) -> LoadStyle {
        self.load_style.clone()
    }
}

impl BaseConfig {
    pub fn get_log_dir(&self) -> Option<String> {
        self.log_dir.clone()
    }
}

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use common::err::CResult;
use common::err::decode_error::ReError;

use crate::importer::MysqlProxyImporter;
use crate::settings::TargetDbSettings;

/// One allocation of listeners under a single id — the unit the HTTP control
/// surface starts and stops as a group (§6 `POST /proxy/start` / `DELETE /proxy/{id}/stop`).
struct ProxyGroup {
    importers: Vec<MysqlProxyImporter>,
    db_name: String,
}

/// Mutated only under an exclusive lock on start / stop / list (§5 shared-resource policy).
#[derive(Default)]
pub struct ProxyRegistry {
    groups: Mutex<HashMap<String, ProxyGroup>>,
}

#[derive(Debug, Clone)]
pub struct ProxyInfo {
    pub id: String,
    pub ports: Vec<u16>,
    pub db_name: String,
}

impl ProxyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates `count` listeners on `listen_addr`, each its own importer backed by
    /// its own connection to `settings`'s target, and registers them under a fresh id.
    pub async fn start(&self, settings: TargetDbSettings, count: usize, listen_addr: &str) -> CResult<ProxyInfo> {
        let id = uuid::Uuid::new_v4().to_string();

        let mut importers = Vec::with_capacity(count);
        for _ in 0..count {
            let importer = MysqlProxyImporter::start(listen_addr, 0, settings.clone()).await?;
            importers.push(importer);
        }

        let ports = importers.iter().map(|i| i.port()).collect();
        let db_name = settings.db_name.clone();

        self.groups.lock().await.insert(id.clone(), ProxyGroup { importers, db_name: db_name.clone() });

        Ok(ProxyInfo { id, ports, db_name })
    }

    pub async fn stop(&self, id: &str) -> CResult<()> {
        let group = self.groups.lock().await.remove(id);
        match group {
            Some(group) => {
                for importer in &group.importers {
                    importer.stop();
                }
                Ok(())
            }
            None => Err(ReError::String(format!("no proxy registered under id {}", id))),
        }
    }

    pub async fn list(&self) -> Vec<ProxyInfo> {
        self.groups
            .lock()
            .await
            .iter()
            .map(|(id, group)| ProxyInfo {
                id: id.clone(),
                ports: group.importers.iter().map(|i| i.port()).collect(),
                db_name: group.db_name.clone(),
            })
            .collect()
    }
}

/// Shared across the HTTP surface's app data so every route sees the same registry.
pub type SharedProxyRegistry = Arc<ProxyRegistry>;

use std::sync::Arc;

use mysql_async::prelude::*;
use mysql_async::{Conn, Opts, OptsBuilder};
use serde::{Deserialize, Serialize};

use common::err::CResult;
use common::err::decode_error::ReError;
use store::TaskStore;

use crate::chunk::calculate_chunks_for_table;
use crate::chunk_manager::ChunkManager;
use crate::inspector::Inspector;
use crate::job::Job;
use crate::pool::WorkerPool;
use crate::schema::Schema;
use crate::settings::DumpSettings;
use crate::worker::Worker;

fn source_opts(settings: &DumpSettings) -> Opts {
    OptsBuilder::default()
        .ip_or_hostname(settings.source.host.clone())
        .tcp_port(settings.source.port)
        .user(Some(settings.source.user.clone()))
        .pass(Some(settings.source.password.clone()))
        .db_name(Some(settings.source.db_name.clone()))
        .into()
}

#[derive(Serialize)]
struct ProxyStartRequest<'a> {
    #[serde(rename = "DbHost")]
    db_host: &'a str,
    #[serde(rename = "DbPort")]
    db_port: u16,
    #[serde(rename = "DbName")]
    db_name: &'a str,
    #[serde(rename = "DbUser")]
    db_user: &'a str,
    #[serde(rename = "DbPassword")]
    db_password: &'a str,
    #[serde(rename = "Count")]
    count: usize,
    #[serde(rename = "MysqlListenAddr")]
    mysql_listen_addr: &'a str,
}

#[derive(Deserialize)]
struct ProxyStartResponse {
    #[serde(rename = "Id")]
    id: String,
    #[serde(rename = "Ports")]
    ports: Vec<u16>,
}

struct ActiveProxy {
    id: String,
    ports: Vec<u16>,
}

/// Orchestrates one dump end to end (§4.6): schema discovery, optional proxy
/// allocation, table/view/routine export, and lifecycle reporting to the task store.
pub struct Exporter {
    settings: DumpSettings,
    task_id: i64,
    store: Arc<TaskStore>,
    http: reqwest::Client,
}

impl Exporter {
    pub fn new(settings: DumpSettings, task_id: i64, store: Arc<TaskStore>) -> Self {
        Self { settings, task_id, store, http: reqwest::Client::new() }
    }

    /// Reports `started`, then runs the dump, then reports the terminal `success` or
    /// `error` status — a caught failure anywhere below is translated here rather than
    /// left to unwind past the task store update.
    pub async fn run(&self) -> CResult<()> {
        let settings_json = serde_json::to_string(&self.settings)?;
        self.store.insert_started(self.task_id, &settings_json)?;

        match self.run_inner().await {
            Ok(()) => {
                self.store.mark_success(self.task_id)?;
                Ok(())
            }
            Err(err) => {
                let _ = self.store.mark_error(self.task_id, &err.to_string());
                Err(err)
            }
        }
    }

    async fn run_inner(&self) -> CResult<()> {
        let settings = &self.settings;

        let mut source_conn = Conn::new(source_opts(settings)).await?;
        let source_version: String = source_conn.query_first("SELECT VERSION()").await?.unwrap_or_default();
        tracing::info!(version = %source_version, "connected to source");

        let inspector = Inspector::new(settings.source.db_name.clone());
        let schema = self.load_schema(&inspector, &mut source_conn).await?;

        let proxy = if settings.without_proxy {
            None
        } else {
            Some(self.start_proxy(settings.worker_count).await?)
        };

        let connect_result = self.open_under_lock(&mut source_conn, &schema).await;

        let result = match connect_result {
            Ok(workers) => {
                let pool = WorkerPool::spawn(workers);
                let export_result = self.export_all(&pool, &schema).await;
                let close_result = pool.close().await;
                export_result.and(close_result)
            }
            Err(err) => Err(err),
        };

        if let Some(proxy) = &proxy {
            self.stop_proxy(&proxy.id).await;
        }

        result
    }

    /// Locks the source tables (unless disabled), opens every worker's source
    /// connection and consistent-snapshot transaction while the lock is held, then
    /// releases it — per §4.6 step 5, the lock must outlive worker connect, not data read.
    async fn open_under_lock(&self, source_conn: &mut Conn, schema: &Schema) -> CResult<Vec<Worker>> {
        let settings = &self.settings;
        let should_lock = !settings.no_lock_tables && !schema.tables.is_empty();

        if should_lock {
            let lock_clause = schema.tables.iter().map(|t| format!("`{}` READ LOCAL", t)).collect::<Vec<_>>().join(", ");
            source_conn.query_drop(format!("LOCK TABLES {}", lock_clause)).await?;
        }

        let workers = self.connect_workers().await;

        if should_lock {
            source_conn.query_drop("UNLOCK TABLES").await?;
        }

        workers
    }

    async fn connect_workers(&self) -> CResult<Vec<Worker>> {
        let settings = &self.settings;
        let with_transaction = !settings.no_transaction;

        let mut workers = Vec::with_capacity(settings.worker_count);
        for worker_index in 0..settings.worker_count {
            let worker = Worker::connect(
                &settings.source.host,
                settings.source.port,
                &settings.source.user,
                &settings.source.password,
                &settings.source.db_name,
                &settings.target.host,
                settings.target.port,
                &settings.target.user,
                &settings.target.password,
                &settings.target.db_name,
                with_transaction,
                true,
            )
            .await
            .map_err(|err| ReError::ConnectionError(format!("worker {} failed to connect: {}", worker_index, err)))?;
            workers.push(worker);
        }
        Ok(workers)
    }

    async fn load_schema(&self, inspector: &Inspector, conn: &mut Conn) -> CResult<Schema> {
        let settings = &self.settings;

        let all_tables = inspector.tables(conn).await?;
        let tables = if settings.include_tables.is_empty() {
            all_tables.into_iter().filter(|t| !settings.exclude_tables.contains(t)).collect()
        } else {
            all_tables.into_iter().filter(|t| settings.include_tables.contains(t)).collect::<Vec<_>>()
        };

        let views = if settings.no_views { Vec::new() } else { inspector.views(conn).await? };
        let triggers = inspector
            .triggers(conn)
            .await?
            .into_iter()
            .filter(|t| !settings.exclude_triggers.contains(t))
            .collect();
        let procedures = if settings.no_procedures { Vec::new() } else { inspector.procedures(conn).await? };

        let mut table_columns = std::collections::BTreeMap::new();
        for table in tables.iter().chain(views.iter()) {
            let columns = inspector.column_types(conn, table).await?;
            table_columns.insert(table.clone(), columns);
        }

        Ok(Schema { tables, views, triggers, procedures, table_columns })
    }

    async fn export_all(&self, pool: &WorkerPool, schema: &Schema) -> CResult<()> {
        self.export_tables(pool, schema).await?;
        self.export_views(pool, schema).await?;
        self.export_routines(pool, schema).await?;
        Ok(())
    }

    async fn export_tables(&self, pool: &WorkerPool, schema: &Schema) -> CResult<()> {
        let settings = &self.settings;

        for table in &schema.tables {
            pool.submit_and_wait(Job::CreateTable { table: table.clone(), with_drop: settings.add_drop_table }).await?;

            if settings.no_data {
                continue;
            }

            let columns = schema.table_columns.get(table).cloned().unwrap_or_default();
            let manager = ChunkManager::new(settings.worker_count.max(1), settings.max_workers_on_last_table.max(1));

            // chunk planning needs its own connection since every worker's source
            // connection is already committed to its own consistent-snapshot transaction
            let mut planning_conn = Conn::new(source_opts(settings)).await?;
            let chunks = calculate_chunks_for_table(
                &Inspector::new(settings.source.db_name.clone()),
                &mut planning_conn,
                table,
                settings.chunk_size,
            )
            .await?;
            planning_conn.disconnect().await?;

            let total = chunks.len();
            for chunk in chunks {
                manager.add_chunk(chunk);
            }

            let mut receivers = Vec::with_capacity(total);
            for _ in 0..total {
                let Some(chunk) = manager.get_next().await else { break };
                let job = Job::ExportChunk {
                    table: chunk.table_name.clone(),
                    condition: chunk.condition,
                    columns: columns.clone(),
                    rows_per_stmt: settings.max_rows_per_statement,
                };
                receivers.push((chunk.table_name, pool.submit(job).await?));
            }

            for (table_name, receiver) in receivers {
                let outcome = receiver.await.map_err(|_| ReError::String("worker dropped without responding".into()))?;
                manager.done(&table_name);
                outcome?;
            }
        }

        Ok(())
    }

    /// Placeholder-then-real-view sequencing (§4.6 step 7): every placeholder is
    /// created first so cross-referencing views resolve regardless of listing order.
    async fn export_views(&self, pool: &WorkerPool, schema: &Schema) -> CResult<()> {
        let settings = &self.settings;

        for view in &schema.views {
            let columns = schema.table_columns.get(view).cloned().unwrap_or_default();
            pool.submit_and_wait(Job::CreateViewPlaceholder {
                view: view.clone(),
                with_drop: settings.add_drop_view,
                columns,
            })
            .await?;
        }

        for view in &schema.views {
            pool.submit_and_wait(Job::CreateView { view: view.clone() }).await?;
        }

        Ok(())
    }

    async fn export_routines(&self, pool: &WorkerPool, schema: &Schema) -> CResult<()> {
        let settings = &self.settings;

        for trigger in &schema.triggers {
            pool.submit_and_wait(Job::CreateTrigger { trigger: trigger.clone(), with_drop: settings.add_drop_trigger }).await?;
        }

        for proc in &schema.procedures {
            pool.submit_and_wait(Job::CreateProcedure { proc: proc.clone(), with_drop: settings.add_drop_procedure }).await?;
        }

        Ok(())
    }

    async fn start_proxy(&self, worker_count: usize) -> CResult<ActiveProxy> {
        let settings = &self.settings;
        let request = ProxyStartRequest {
            db_host: &settings.target.host,
            db_port: settings.target.port,
            db_name: &settings.target.db_name,
            db_user: &settings.target.user,
            db_password: &settings.target.password,
            count: worker_count,
            mysql_listen_addr: &settings.proxy.mysql_listen_addr,
        };

        let url = format!("{}/proxy/start", settings.proxy.base_url);
        let response = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|err| ReError::ConnectionError(format!("proxy start request failed: {}", err)))?
            .error_for_status()
            .map_err(|err| ReError::ConnectionError(format!("proxy start returned an error status: {}", err)))?
            .json::<ProxyStartResponse>()
            .await
            .map_err(|err| ReError::ConnectionError(format!("proxy start response was not valid JSON: {}", err)))?;

        Ok(ActiveProxy { id: response.id, ports: response.ports })
    }

    /// Best-effort: proxy teardown failures are logged, never propagated, so a dump
    /// that already failed does not fail twice over on cleanup (§4.6 step 9).
    async fn stop_proxy(&self, id: &str) {
        let url = format!("{}/proxy/{}/stop", self.settings.proxy.base_url, id);
        if let Err(err) = self.http.delete(&url).send().await {
            tracing::warn!(proxy_id = %id, error = %err, "failed to stop proxy listeners");
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn proxy_start_request_serializes_with_pascal_case_fields() {
        let request = ProxyStartRequest {
            db_host: "127.0.0.1",
            db_port: 3306,
            db_name: "app",
            db_user: "root",
            db_password: "secret",
            count: 4,
            mysql_listen_addr: "0.0.0.0",
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"DbHost\":\"127.0.0.1\""));
        assert!(json.contains("\"Count\":4"));
    }

    #[test]
    fn proxy_start_response_parses_pascal_case_fields() {
        let json = r#"{"Id":"abc","Ports":[13001,13002]}"#;
        let response: ProxyStartResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.id, "abc");
        assert_eq!(response.ports, vec![13001, 13002]);
    }
}

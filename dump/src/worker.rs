use mysql_async::prelude::*;
use mysql_async::{Conn, Opts, OptsBuilder, Row, Value};

use common::err::CResult;

use crate::inspector::Inspector;
use crate::job::Job;
use crate::schema::ColumnMap;

/// Session parameters every target connection runs under for the life of the dump
/// (§4.5): no constraint checking, an effectively unbounded wait timeout, lenient
/// date handling, and binary-safe character set.
const TARGET_SESSION_SETUP: &[&str] = &[
    "SET UNIQUE_CHECKS=0",
    "SET FOREIGN_KEY_CHECKS=0",
    "SET WAIT_TIMEOUT=2147483",
    "SET sql_mode='ALLOW_INVALID_DATES,NO_AUTO_VALUE_ON_ZERO'",
    "SET NAMES binary",
];

fn target_opts(host: &str, port: u16, user: &str, password: &str, db_name: &str) -> Opts {
    OptsBuilder::default()
        .ip_or_hostname(host)
        .tcp_port(port)
        .user(Some(user))
        .pass(Some(password))
        .db_name(Some(db_name))
        .into()
}

/// Executes a bounded set of typed jobs (§4.5) against a dedicated source + target
/// connection pair. One worker belongs to exactly one pool slot.
pub struct Worker {
    source_conn: Conn,
    target_conn: Conn,
    inspector: Inspector,
    with_transaction: bool,
    transaction_opened: bool,
    packet_budget: i64,
    target_version: String,
}

/// Major version number parsed from a `VERSION()` string like `8.0.34` or `5.6.30-log`.
fn major_version(version: &str) -> u32 {
    version.split('.').next().and_then(|s| s.parse().ok()).unwrap_or(0)
}

impl Worker {
    pub async fn connect(
        source_host: &str,
        source_port: u16,
        source_user: &str,
        source_password: &str,
        source_db: &str,
        target_host: &str,
        target_port: u16,
        target_user: &str,
        target_password: &str,
        target_db: &str,
        with_transaction: bool,
        source_supports_transactions: bool,
    ) -> CResult<Self> {
        let source_opts = target_opts(source_host, source_port, source_user, source_password, source_db);
        let mut source_conn = Conn::new(source_opts).await?;

        let target_opts = target_opts(target_host, target_port, target_user, target_password, target_db);
        let mut target_conn = Conn::new(target_opts).await?;

        for stmt in TARGET_SESSION_SETUP {
            target_conn.query_drop(*stmt).await?;
        }

        let transaction_opened = if with_transaction && source_supports_transactions {
            source_conn.query_drop("SET SESSION TRANSACTION ISOLATION LEVEL REPEATABLE READ").await?;
            source_conn.query_drop("START TRANSACTION WITH CONSISTENT SNAPSHOT").await?;
            true
        } else {
            false
        };

        let max_allowed_packet: i64 = target_conn
            .query_first("SELECT @@max_allowed_packet")
            .await?
            .unwrap_or(4 * 1024 * 1024);
        let packet_budget = (max_allowed_packet as f64 * 0.9) as i64;

        let target_version: String = target_conn.query_first("SELECT VERSION()").await?.unwrap_or_default();

        Ok(Self {
            source_conn,
            target_conn,
            inspector: Inspector::new(source_db),
            with_transaction,
            transaction_opened,
            packet_budget,
            target_version,
        })
    }

    pub fn ready(&self) -> bool {
        true
    }

    pub fn packet_budget(&self) -> i64 {
        self.packet_budget
    }

    /// Commits the source-side consistent-snapshot transaction, if one was opened.
    /// The target is left on MySQL's default autocommit mode, so nothing needs
    /// committing there.
    pub async fn terminate(&mut self) -> CResult<()> {
        if self.transaction_opened {
            self.source_conn.query_drop("COMMIT").await?;
        } else {
            tracing::trace!("worker had no open source transaction to commit (with_transaction=false)");
        }
        Ok(())
    }

    pub async fn run(&mut self, job: Job) -> CResult<()> {
        match job {
            Job::CreateTable { table, with_drop } => self.create_table(&table, with_drop).await,
            Job::CreateViewPlaceholder { view, with_drop, columns } => {
                self.create_view_placeholder(&view, with_drop, &columns).await
            }
            Job::CreateView { view } => self.create_view(&view).await,
            Job::ExportChunk { table, condition, columns, rows_per_stmt } => {
                self.export_chunk(&table, &condition, &columns, rows_per_stmt).await
            }
            Job::CreateTrigger { trigger, with_drop } => self.create_trigger(&trigger, with_drop).await,
            Job::CreateProcedure { proc, with_drop } => self.create_procedure(&proc, with_drop).await,
        }
    }

    async fn create_table(&mut self, table: &str, with_drop: bool) -> CResult<()> {
        if with_drop {
            self.target_conn.query_drop(Inspector::drop_table_query(table)).await?;
        }
        let ddl = self.inspector.show_create_table(&mut self.source_conn, table).await?;
        self.target_conn.query_drop(ddl).await?;
        Ok(())
    }

    async fn create_view_placeholder(&mut self, view: &str, with_drop: bool, columns: &ColumnMap) -> CResult<()> {
        if with_drop {
            self.target_conn.query_drop(Inspector::drop_table_query(view)).await?;
            self.target_conn.query_drop(Inspector::drop_view_query(view)).await?;
        }
        let stub = Inspector::make_create_table_query(view, columns);
        self.target_conn.query_drop(stub).await?;
        Ok(())
    }

    async fn create_view(&mut self, view: &str) -> CResult<()> {
        if major_version(&self.target_version) < 5 {
            tracing::warn!("skipping view {} on target version {}", view, self.target_version);
            return Ok(());
        }

        self.target_conn.query_drop(Inspector::drop_table_query(view)).await?;
        self.target_conn.query_drop(Inspector::drop_view_query(view)).await?;

        let ddl = self.inspector.show_create_view(&mut self.source_conn, view).await?;
        self.target_conn.query_drop(ddl).await?;
        Ok(())
    }

    async fn create_trigger(&mut self, trigger: &str, with_drop: bool) -> CResult<()> {
        if with_drop {
            self.target_conn.query_drop(Inspector::drop_trigger_query(trigger)).await?;
        }
        match self.inspector.show_create_trigger(&mut self.source_conn, trigger).await {
            Ok(ddl) => {
                if let Err(err) = self.target_conn.query_drop(ddl).await {
                    tracing::error!("failed to create trigger {}: {}", trigger, err);
                }
            }
            Err(err) => tracing::error!("failed to read trigger DDL for {}: {}", trigger, err),
        }
        Ok(())
    }

    async fn create_procedure(&mut self, proc: &str, with_drop: bool) -> CResult<()> {
        if major_version(&self.target_version) < 5 {
            tracing::warn!("skipping procedure {} on target version {}", proc, self.target_version);
            return Ok(());
        }

        if with_drop {
            self.target_conn.query_drop(Inspector::drop_procedure_query(proc)).await?;
        }
        let ddl = self.inspector.show_create_procedure(&mut self.source_conn, proc).await?;
        self.target_conn.query_drop(ddl).await?;
        Ok(())
    }

    async fn export_chunk(&mut self, table: &str, condition: &str, columns: &ColumnMap, rows_per_stmt: usize) -> CResult<()> {
        let mut sorted: Vec<_> = columns.values().collect();
        sorted.sort_by_key(|c| c.ordinal);
        let column_list = sorted.iter().map(|c| format!("`{}`", c.name)).collect::<Vec<_>>().join(",");

        let query = if condition.is_empty() {
            format!("SELECT {} FROM `{}`", column_list, table)
        } else {
            format!("SELECT {} FROM `{}` WHERE {}", column_list, table, condition)
        };

        let packet_budget = self.packet_budget;
        let mut inserter = crate::batch_insert::BatchInserter::new(rows_per_stmt, table, columns, &mut self.target_conn, packet_budget);

        let rows: Vec<Row> = self.source_conn.query(query).await?;
        for mut row in rows {
            let mut values = Vec::with_capacity(sorted.len());
            let mut size: i64 = 0;
            for i in 0..sorted.len() {
                let value: Value = row.take(i).unwrap_or(Value::NULL);
                size += value_byte_size(&value);
                values.push(value);
            }
            inserter.insert(values, size).await?;
        }

        inserter.flush().await?;
        inserter.close().await?;
        Ok(())
    }
}

fn value_byte_size(value: &Value) -> i64 {
    match value {
        Value::NULL => 0,
        Value::Bytes(b) => b.len() as i64,
        Value::Int(_) | Value::UInt(_) | Value::Float(_) | Value::Double(_) => 8,
        Value::Date(..) | Value::Time(..) => 8,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_major_version_ignoring_suffix() {
        assert_eq!(major_version("8.0.34"), 8);
        assert_eq!(major_version("5.6.30-log"), 5);
        assert_eq!(major_version(""), 0);
    }

    #[test]
    fn byte_size_counts_raw_bytes_for_text_values() {
        let value = Value::Bytes(vec![1, 2, 3, 4]);
        assert_eq!(value_byte_size(&value), 4);
        assert_eq!(value_byte_size(&Value::NULL), 0);
    }
}

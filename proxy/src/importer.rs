use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;

use mysql_async::prelude::*;
use mysql_async::{Conn, OptsBuilder, Params, Statement};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, Mutex};

use common::err::CResult;
use common::err::decode_error::ReError;

use crate::settings::TargetDbSettings;
use crate::wire;

const STATE_RUNNING: u8 = 0;
const STATE_STOPPING: u8 = 1;
const STATE_STOPPED: u8 = 2;

fn backend_opts(settings: &TargetDbSettings) -> mysql_async::Opts {
    OptsBuilder::default()
        .ip_or_hostname(settings.db_host.clone())
        .tcp_port(settings.db_port)
        .user(Some(settings.db_user.clone()))
        .pass(Some(settings.db_password.clone()))
        .db_name(Some(settings.db_name.clone()))
        .into()
}

/// Single-listener, single-client MySQL wire-protocol importer (§4.7 / C7): accepts
/// exactly one client connection, authenticates it as the configured target, and
/// relays every command onto its own backing connection to the real target.
pub struct MysqlProxyImporter {
    stop_tx: watch::Sender<bool>,
    local_addr: std::net::SocketAddr,
    state: Arc<AtomicU8>,
}

impl MysqlProxyImporter {
    pub async fn start(host: &str, port: u16, settings: TargetDbSettings) -> CResult<Self> {
        let listener = TcpListener::bind((host, port)).await?;
        let local_addr = listener.local_addr()?;

        let (stop_tx, stop_rx) = watch::channel(false);
        let state = Arc::new(AtomicU8::new(STATE_RUNNING));

        tokio::spawn(run_importer(listener, settings, stop_rx, state.clone()));

        Ok(Self { stop_tx, local_addr, state })
    }

    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    pub fn is_stopped(&self) -> bool {
        self.state.load(Ordering::SeqCst) == STATE_STOPPED
    }

    /// Sends the `STOP` command (§4.7): the importer's own task closes the listener,
    /// the client connection, then the backing connection, in that order.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }
}

async fn run_importer(listener: TcpListener, settings: TargetDbSettings, mut stop_rx: watch::Receiver<bool>, state: Arc<AtomicU8>) {
    let accepted = tokio::select! {
        res = listener.accept() => res,
        _ = stop_rx.changed() => {
            state.store(STATE_STOPPED, Ordering::SeqCst);
            tracing::debug!("proxy stopped before a client connected");
            return;
        }
    };

    let stream = match accepted {
        Ok((stream, addr)) => {
            tracing::info!(client = %addr, "proxy accepted client connection");
            stream
        }
        Err(err) => {
            tracing::warn!(error = %err, "proxy accept failed");
            return;
        }
    };

    match handle_session(stream, &settings, &mut stop_rx, &state).await {
        Ok(()) => tracing::debug!("proxy session ended"),
        Err(err) => {
            if state.load(Ordering::SeqCst) == STATE_STOPPING {
                tracing::info!("proxy session ended during orderly shutdown");
            } else {
                tracing::warn!(error = %err, "proxy session ended with an error");
            }
        }
    }

    state.store(STATE_STOPPED, Ordering::SeqCst);
}

async fn handle_session(
    mut stream: TcpStream,
    settings: &TargetDbSettings,
    stop_rx: &mut watch::Receiver<bool>,
    state: &Arc<AtomicU8>,
) -> CResult<()> {
    let mut backend = Conn::new(backend_opts(settings)).await?;

    wire::perform_handshake(&mut stream, 1, &settings.db_password).await?;

    let statements: Mutex<HashMap<u32, Statement>> = Mutex::new(HashMap::new());
    let next_statement_id = AtomicU32::new(1);

    loop {
        let packet = tokio::select! {
            res = wire::read_packet(&mut stream) => res,
            changed = stop_rx.changed() => {
                if changed.is_ok() {
                    state.store(STATE_STOPPING, Ordering::SeqCst);
                    tracing::debug!("proxy received stop command");
                }
                break;
            }
        };

        let (seq, body) = packet?;
        if body.is_empty() {
            break;
        }

        let reply_seq = seq.wrapping_add(1);
        let command = body[0];
        let payload = &body[1..];

        match command {
            wire::command::QUIT => break,
            wire::command::INIT_DB => {
                let db = String::from_utf8_lossy(payload).to_string();
                let outcome = backend.query_drop(format!("USE `{}`", db)).await;
                respond_ok_or_error(&mut stream, reply_seq, outcome).await?;
            }
            wire::command::QUERY => {
                let sql = String::from_utf8_lossy(payload).to_string();
                relay_query(&mut stream, &mut backend, reply_seq, &sql).await?;
            }
            wire::command::FIELD_LIST => {
                let table = String::from_utf8_lossy(payload).to_string();
                let table = table.split('\0').next().unwrap_or("").to_string();
                relay_field_list(&mut stream, &mut backend, reply_seq, &table).await?;
            }
            wire::command::STMT_PREPARE => {
                let sql = String::from_utf8_lossy(payload).to_string();
                match backend.prep(sql).await {
                    Ok(statement) => {
                        let id = next_statement_id.fetch_add(1, Ordering::SeqCst);
                        let params = statement.params().to_vec();
                        let columns = statement.columns().to_vec();
                        statements.lock().await.insert(id, statement);
                        wire::write_prepare_ok(&mut stream, reply_seq, id, &params, &columns).await?;
                    }
                    Err(err) => {
                        tracing::error!(error = %err, "prepare failed");
                        wire::write_packet(&mut stream, reply_seq, &wire::encode_error(1064, "42000", &err.to_string())).await?;
                    }
                }
            }
            wire::command::STMT_EXECUTE => {
                relay_stmt_execute(&mut stream, &mut backend, &statements, reply_seq, payload).await?;
            }
            wire::command::STMT_CLOSE => {
                if payload.len() >= 4 {
                    let id = u32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]);
                    statements.lock().await.remove(&id);
                }
                // COM_STMT_CLOSE has no response, per protocol.
            }
            other => {
                tracing::warn!(command = other, "proxy received an unsupported command");
                wire::write_packet(&mut stream, reply_seq, &wire::encode_error(1047, "08S01", "unsupported command")).await?;
            }
        }
    }

    let _ = backend.disconnect().await;
    Ok(())
}

async fn respond_ok_or_error(stream: &mut TcpStream, seq: u8, outcome: Result<(), mysql_async::Error>) -> CResult<()> {
    match outcome {
        Ok(()) => wire::write_packet(stream, seq, &wire::encode_ok(0, 0)).await,
        Err(err) => wire::write_packet(stream, seq, &wire::encode_error(1105, "HY000", &err.to_string())).await,
    }
}

async fn relay_query(stream: &mut TcpStream, backend: &mut Conn, seq: u8, sql: &str) -> CResult<()> {
    let mut result = match backend.query_iter(sql).await {
        Ok(result) => result,
        Err(err) => return wire::write_packet(stream, seq, &wire::encode_error(1064, "42000", &err.to_string())).await,
    };

    let columns = result.columns();
    let has_columns = columns.as_ref().map(|c| !c.is_empty()).unwrap_or(false);

    if !has_columns {
        let affected_rows = result.affected_rows();
        let last_insert_id = result.last_insert_id().unwrap_or(0);
        return wire::write_packet(stream, seq, &wire::encode_ok(affected_rows, last_insert_id)).await;
    }

    let columns = columns.unwrap();
    let rows: Vec<mysql_async::Row> = result.collect().await?;
    let values: Vec<Vec<mysql_async::Value>> = rows
        .into_iter()
        .map(|mut row| (0..row.len()).map(|i| row.take(i).unwrap_or(mysql_async::Value::NULL)).collect())
        .collect();

    wire::write_text_resultset(stream, seq, &columns, &values).await?;
    Ok(())
}

async fn relay_field_list(stream: &mut TcpStream, backend: &mut Conn, seq: u8, table: &str) -> CResult<()> {
    let query = format!("SELECT * FROM `{}` LIMIT 0", table);
    match backend.query_iter(query).await {
        Ok(mut result) => {
            let columns = result.columns().map(|c| c.to_vec()).unwrap_or_default();
            let _: Vec<mysql_async::Row> = result.collect().await?;
            let mut next_seq = seq;
            for column in &columns {
                wire::write_packet(stream, next_seq, &wire::encode_column_def(column)).await?;
                next_seq += 1;
            }
            wire::write_packet(stream, next_seq, &[0xfe, 0x00, 0x00, 0x00, 0x00]).await
        }
        Err(err) => wire::write_packet(stream, seq, &wire::encode_error(1146, "42S02", &err.to_string())).await,
    }
}

async fn relay_stmt_execute(
    stream: &mut TcpStream,
    backend: &mut Conn,
    statements: &Mutex<HashMap<u32, Statement>>,
    seq: u8,
    payload: &[u8],
) -> CResult<()> {
    if payload.len() < 9 {
        return wire::write_packet(stream, seq, &wire::encode_error(1210, "HY000", "malformed COM_STMT_EXECUTE")).await;
    }

    let statement_id = u32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]);
    let param_block = &payload[9..];

    let statement = statements.lock().await.get(&statement_id).cloned();
    let Some(statement) = statement else {
        return wire::write_packet(stream, seq, &wire::encode_error(1243, "HY000", "unknown prepared statement id")).await;
    };

    let param_count = statement.params().len();
    let values = if param_count == 0 { Vec::new() } else { wire::decode_binary_params(param_block, param_count)? };

    let outcome = backend.exec_iter(&statement, Params::Positional(values)).await;
    match outcome {
        Ok(mut result) => {
            let affected_rows = result.affected_rows();
            let last_insert_id = result.last_insert_id().unwrap_or(0);
            let _: Vec<mysql_async::Row> = result.collect().await.unwrap_or_default();
            wire::write_packet(stream, seq, &wire::encode_ok(affected_rows, last_insert_id)).await
        }
        Err(err) => {
            let message = format!("{}", err);
            wire::write_packet(stream, seq, &wire::encode_error(1105, "HY000", &message)).await
                .map_err(|io_err| ReError::ConnectionError(format!("{} (original: {})", io_err, message)))
        }
    }
}

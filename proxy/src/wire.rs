use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use mysql_async::consts::ColumnType;
use mysql_async::{Column, Value};
use rand::RngCore;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use common::err::CResult;
use common::err::decode_error::ReError;
use connection::bytes::encrypt_password;
use connection::declar::auth_plugin_names::AuthPlugin;
use connection::util::read_null_term_string_with_cursor;
use connection::PACKET_HEADER_SIZE;

/// Command bytes a COM_* packet starts with (the client→server command set this
/// importer accepts — §4.7's relayed command list).
pub mod command {
    pub const QUIT: u8 = 0x01;
    pub const INIT_DB: u8 = 0x02;
    pub const QUERY: u8 = 0x03;
    pub const FIELD_LIST: u8 = 0x04;
    pub const STMT_PREPARE: u8 = 0x16;
    pub const STMT_EXECUTE: u8 = 0x17;
    pub const STMT_CLOSE: u8 = 0x19;
}

const CLIENT_CONNECT_WITH_DB: u32 = 0x0000_0008;
const CLIENT_PLUGIN_AUTH: u32 = 0x0008_0000;
const CLIENT_SECURE_CONNECTION: u32 = 0x0000_8000;
const CLIENT_PROTOCOL_41: u32 = 0x0000_0200;
const SERVER_CAPABILITIES: u32 = CLIENT_SECURE_CONNECTION | CLIENT_PLUGIN_AUTH | CLIENT_PROTOCOL_41 | CLIENT_CONNECT_WITH_DB;

/// Reads one length-prefixed packet body, stripping the 4-byte header. Returns
/// the sequence id alongside the body so the reply can continue the same sequence.
pub async fn read_packet(stream: &mut TcpStream) -> CResult<(u8, Vec<u8>)> {
    let mut header = [0u8; PACKET_HEADER_SIZE];
    stream.read_exact(&mut header).await?;
    let length = (header[0] as usize) | ((header[1] as usize) << 8) | ((header[2] as usize) << 16);
    let seq = header[3];

    let mut body = vec![0u8; length];
    if length > 0 {
        stream.read_exact(&mut body).await?;
    }
    Ok((seq, body))
}

pub async fn write_packet(stream: &mut TcpStream, seq: u8, body: &[u8]) -> CResult<()> {
    let len = body.len();
    let mut header = [0u8; PACKET_HEADER_SIZE];
    header[0] = (len & 0xff) as u8;
    header[1] = ((len >> 8) & 0xff) as u8;
    header[2] = ((len >> 16) & 0xff) as u8;
    header[3] = seq;

    stream.write_all(&header).await?;
    stream.write_all(body).await?;
    stream.flush().await?;
    Ok(())
}

fn write_len_enc_int(buf: &mut Vec<u8>, value: u64) {
    if value < 251 {
        buf.push(value as u8);
    } else if value < 0x10000 {
        buf.push(0xfc);
        buf.extend_from_slice(&(value as u16).to_le_bytes());
    } else if value < 0x1000000 {
        buf.push(0xfd);
        buf.extend_from_slice(&(value as u32).to_le_bytes()[..3]);
    } else {
        buf.push(0xfe);
        buf.extend_from_slice(&value.to_le_bytes());
    }
}

fn write_len_enc_str(buf: &mut Vec<u8>, s: &str) {
    write_len_enc_int(buf, s.len() as u64);
    buf.extend_from_slice(s.as_bytes());
}

/// Authenticates the connecting client as if this importer were the target
/// server (§4.7): sends a v10 handshake, reads back the client's auth
/// response, and accepts only a scramble matching the configured password.
pub struct ServerHandshake {
    pub scramble: Vec<u8>,
    pub username: String,
    pub database: Option<String>,
}

pub async fn perform_handshake(stream: &mut TcpStream, connection_id: u32, expected_password: &str) -> CResult<ServerHandshake> {
    let mut scramble = vec![0u8; 20];
    rand::thread_rng().fill_bytes(&mut scramble);

    let mut body = Vec::new();
    body.push(10u8); // protocol version
    body.extend_from_slice(b"5.7.31-proxy\0");
    body.extend_from_slice(&connection_id.to_le_bytes());
    body.extend_from_slice(&scramble[..8]);
    body.push(0); // filler
    body.extend_from_slice(&(SERVER_CAPABILITIES as u16).to_le_bytes());
    body.push(0xff); // character set: utf8mb4 compatible placeholder
    body.extend_from_slice(&0u16.to_le_bytes()); // status flags
    body.extend_from_slice(&((SERVER_CAPABILITIES >> 16) as u16).to_le_bytes());
    body.push(21); // auth plugin data length
    body.extend_from_slice(&[0u8; 10]); // reserved
    body.extend_from_slice(&scramble[8..]);
    body.push(0); // null terminator for the salt
    body.extend_from_slice(b"mysql_native_password\0");

    write_packet(stream, 0, &body).await?;

    let (seq, response) = read_packet(stream).await?;
    let mut cursor = Cursor::new(response.as_slice());

    let capability_flags = cursor.read_u32::<LittleEndian>()?;
    let _max_packet_size = cursor.read_u32::<LittleEndian>()?;
    let _character_set = cursor.read_u8()?;
    cursor.set_position(cursor.position() + 23);

    let username = read_null_term_string_with_cursor(&mut cursor)?;

    let auth_response = if capability_flags & CLIENT_SECURE_CONNECTION != 0 {
        let len = cursor.read_u8()? as usize;
        let mut buf = vec![0u8; len];
        std::io::Read::read_exact(&mut cursor, &mut buf)?;
        buf
    } else {
        read_null_term_string_with_cursor(&mut cursor)?.into_bytes()
    };

    let database = if capability_flags & CLIENT_CONNECT_WITH_DB != 0 {
        read_null_term_string_with_cursor(&mut cursor).ok()
    } else {
        None
    };

    let scramble_str: String = scramble[..8].iter().map(|b| *b as char).collect();
    let expected = encrypt_password(&expected_password.to_string(), &scramble_str, &AuthPlugin::MySqlNativePassword);

    if expected != auth_response {
        write_packet(stream, seq + 1, &encode_error(1045, "28000", "Access denied")).await?;
        return Err(ReError::ConnectionError(format!("proxy client auth failed for user {}", username)));
    }

    write_packet(stream, seq + 1, &encode_ok(0, 0)).await?;

    Ok(ServerHandshake { scramble, username, database })
}

pub fn encode_ok(affected_rows: u64, last_insert_id: u64) -> Vec<u8> {
    let mut buf = vec![0x00];
    write_len_enc_int(&mut buf, affected_rows);
    write_len_enc_int(&mut buf, last_insert_id);
    buf.extend_from_slice(&0u16.to_le_bytes()); // status flags
    buf.extend_from_slice(&0u16.to_le_bytes()); // warnings
    buf
}

pub fn encode_error(code: u16, sql_state: &str, message: &str) -> Vec<u8> {
    let mut buf = vec![0xff];
    buf.extend_from_slice(&code.to_le_bytes());
    buf.push(b'#');
    buf.extend_from_slice(sql_state.as_bytes());
    buf.extend_from_slice(message.as_bytes());
    buf
}

fn encode_eof() -> Vec<u8> {
    vec![0xfe, 0x00, 0x00, 0x00, 0x00]
}

pub fn encode_column_def(column: &Column) -> Vec<u8> {
    let mut buf = Vec::new();
    write_len_enc_str(&mut buf, "def");
    write_len_enc_str(&mut buf, column.schema_str().as_ref());
    write_len_enc_str(&mut buf, column.table_str().as_ref());
    write_len_enc_str(&mut buf, column.org_table_str().as_ref());
    write_len_enc_str(&mut buf, column.name_str().as_ref());
    write_len_enc_str(&mut buf, column.org_name_str().as_ref());
    buf.push(0x0c); // length of fixed fields
    buf.extend_from_slice(&33u16.to_le_bytes()); // character set: utf8_general_ci
    buf.extend_from_slice(&column.column_length().to_le_bytes());
    buf.push(column.column_type() as u8);
    buf.extend_from_slice(&(column.flags().bits() as u16).to_le_bytes());
    buf.push(column.decimals());
    buf.extend_from_slice(&0u16.to_le_bytes());
    buf
}

/// Writes a text-protocol resultset — column count, column definitions, an EOF
/// marker, every row length-encoded as strings, and a trailing EOF — the shape
/// every relayed `COM_QUERY` that returns rows needs on the wire.
pub async fn write_text_resultset(stream: &mut TcpStream, start_seq: u8, columns: &[Column], rows: &[Vec<Value>]) -> CResult<u8> {
    let mut seq = start_seq;

    let mut count_buf = Vec::new();
    write_len_enc_int(&mut count_buf, columns.len() as u64);
    write_packet(stream, seq, &count_buf).await?;
    seq += 1;

    for column in columns {
        write_packet(stream, seq, &encode_column_def(column)).await?;
        seq += 1;
    }

    write_packet(stream, seq, &encode_eof()).await?;
    seq += 1;

    for row in rows {
        let mut buf = Vec::new();
        for value in row {
            match value {
                Value::NULL => buf.push(0xfb),
                other => write_len_enc_str(&mut buf, &value_to_text(other)),
            }
        }
        write_packet(stream, seq, &buf).await?;
        seq += 1;
    }

    write_packet(stream, seq, &encode_eof()).await?;
    Ok(seq + 1)
}

/// Responds to `COM_STMT_PREPARE` (§4.7): the backend's own prepare response already
/// carries accurate parameter and result column metadata, which this importer mirrors
/// back to the client verbatim under a front-facing statement id it mints itself.
pub async fn write_prepare_ok(stream: &mut TcpStream, start_seq: u8, statement_id: u32, params: &[Column], columns: &[Column]) -> CResult<()> {
    let mut header = vec![0x00];
    header.extend_from_slice(&statement_id.to_le_bytes());
    header.extend_from_slice(&(columns.len() as u16).to_le_bytes());
    header.extend_from_slice(&(params.len() as u16).to_le_bytes());
    header.push(0); // reserved
    header.extend_from_slice(&0u16.to_le_bytes()); // warning count

    let mut seq = start_seq;
    write_packet(stream, seq, &header).await?;
    seq += 1;

    if !params.is_empty() {
        for column in params {
            write_packet(stream, seq, &encode_column_def(column)).await?;
            seq += 1;
        }
        write_packet(stream, seq, &encode_eof()).await?;
        seq += 1;
    }

    if !columns.is_empty() {
        for column in columns {
            write_packet(stream, seq, &encode_column_def(column)).await?;
            seq += 1;
        }
        write_packet(stream, seq, &encode_eof()).await?;
    }

    Ok(())
}

/// Decodes the binary-protocol parameter block of a `COM_STMT_EXECUTE` packet
/// (null bitmap, optional bound types, then each value in binary encoding) into
/// driver `Value`s, so they can be rebound against the backend via `exec_iter`.
pub fn decode_binary_params(body: &[u8], param_count: usize) -> CResult<Vec<Value>> {
    let mut cursor = Cursor::new(body);

    let null_bitmap_len = (param_count + 7) / 8;
    let mut null_bitmap = vec![0u8; null_bitmap_len];
    std::io::Read::read_exact(&mut cursor, &mut null_bitmap)?;

    let new_params_bind_flag = cursor.read_u8()?;
    let mut types = Vec::with_capacity(param_count);
    if new_params_bind_flag == 1 {
        for _ in 0..param_count {
            let field_type = cursor.read_u8()?;
            let unsigned = cursor.read_u8()? & 0x80 != 0;
            types.push((field_type, unsigned));
        }
    }

    let mut values = Vec::with_capacity(param_count);
    for i in 0..param_count {
        let is_null = (null_bitmap[i / 8] >> (i % 8)) & 1 == 1;
        if is_null {
            values.push(Value::NULL);
            continue;
        }

        let (field_type, unsigned) = types.get(i).copied().unwrap_or((ColumnType::MYSQL_TYPE_VAR_STRING as u8, false));
        values.push(decode_binary_value(&mut cursor, field_type, unsigned)?);
    }

    Ok(values)
}

fn decode_binary_value(cursor: &mut Cursor<&[u8]>, field_type: u8, unsigned: bool) -> CResult<Value> {
    use std::io::Read;

    let column_type = field_type;
    match column_type {
        t if t == ColumnType::MYSQL_TYPE_TINY as u8 => {
            let v = cursor.read_u8()?;
            Ok(if unsigned { Value::UInt(v as u64) } else { Value::Int(v as i8 as i64) })
        }
        t if t == ColumnType::MYSQL_TYPE_SHORT as u8 || t == ColumnType::MYSQL_TYPE_YEAR as u8 => {
            let v = cursor.read_u16::<LittleEndian>()?;
            Ok(if unsigned { Value::UInt(v as u64) } else { Value::Int(v as i16 as i64) })
        }
        t if t == ColumnType::MYSQL_TYPE_LONG as u8 || t == ColumnType::MYSQL_TYPE_INT24 as u8 => {
            let v = cursor.read_u32::<LittleEndian>()?;
            Ok(if unsigned { Value::UInt(v as u64) } else { Value::Int(v as i32 as i64) })
        }
        t if t == ColumnType::MYSQL_TYPE_LONGLONG as u8 => {
            let v = cursor.read_u64::<LittleEndian>()?;
            Ok(if unsigned { Value::UInt(v) } else { Value::Int(v as i64) })
        }
        t if t == ColumnType::MYSQL_TYPE_FLOAT as u8 => Ok(Value::Float(cursor.read_f32::<LittleEndian>()?)),
        t if t == ColumnType::MYSQL_TYPE_DOUBLE as u8 => Ok(Value::Double(cursor.read_f64::<LittleEndian>()?)),
        t if t == ColumnType::MYSQL_TYPE_DATE as u8
            || t == ColumnType::MYSQL_TYPE_DATETIME as u8
            || t == ColumnType::MYSQL_TYPE_TIMESTAMP as u8 =>
        {
            let len = cursor.read_u8()?;
            if len == 0 {
                return Ok(Value::Date(0, 0, 0, 0, 0, 0, 0));
            }
            let year = cursor.read_u16::<LittleEndian>()?;
            let month = cursor.read_u8()?;
            let day = cursor.read_u8()?;
            let (hour, minute, second, micro) = if len > 4 {
                let h = cursor.read_u8()?;
                let m = cursor.read_u8()?;
                let s = cursor.read_u8()?;
                let micro = if len > 7 { cursor.read_u32::<LittleEndian>()? } else { 0 };
                (h, m, s, micro)
            } else {
                (0, 0, 0, 0)
            };
            Ok(Value::Date(year, month, day, hour, minute, second, micro))
        }
        t if t == ColumnType::MYSQL_TYPE_TIME as u8 => {
            let len = cursor.read_u8()?;
            if len == 0 {
                return Ok(Value::Time(false, 0, 0, 0, 0, 0));
            }
            let negative = cursor.read_u8()? != 0;
            let days = cursor.read_u32::<LittleEndian>()?;
            let hours = cursor.read_u8()?;
            let minutes = cursor.read_u8()?;
            let seconds = cursor.read_u8()?;
            let micro = if len > 8 { cursor.read_u32::<LittleEndian>()? } else { 0 };
            Ok(Value::Time(negative, days, hours, minutes, seconds, micro))
        }
        _ => {
            let (_, len) = connection::util::read_len_enc_num(cursor)?;
            let mut buf = vec![0u8; len as usize];
            cursor.read_exact(&mut buf)?;
            Ok(Value::Bytes(buf))
        }
    }
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::NULL => String::new(),
        Value::Bytes(b) => String::from_utf8_lossy(b).to_string(),
        Value::Int(v) => v.to_string(),
        Value::UInt(v) => v.to_string(),
        Value::Float(v) => v.to_string(),
        Value::Double(v) => v.to_string(),
        Value::Date(year, month, day, hour, minute, second, micro) => {
            if *hour == 0 && *minute == 0 && *second == 0 && *micro == 0 {
                format!("{:04}-{:02}-{:02}", year, month, day)
            } else {
                format!("{:04}-{:02}-{:02} {:02}:{:02}:{:02}.{:06}", year, month, day, hour, minute, second, micro)
            }
        }
        Value::Time(neg, days, hours, minutes, seconds, micro) => {
            let sign = if *neg { "-" } else { "" };
            format!("{}{:02}:{:02}:{:02}.{:06}", sign, *days as u32 * 24 + *hours as u32, minutes, seconds, micro)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn encode_ok_has_zero_header_byte() {
        let packet = encode_ok(5, 0);
        assert_eq!(packet[0], 0x00);
    }

    #[test]
    fn encode_error_carries_sql_state_marker() {
        let packet = encode_error(1045, "28000", "Access denied");
        assert_eq!(packet[0], 0xff);
        assert_eq!(packet[3], b'#');
        assert_eq!(&packet[4..9], b"28000");
    }

    #[test]
    fn decodes_binary_null_parameter() {
        // one param, null bitmap bit 0 set, no bound types, no value bytes
        let body = vec![0b0000_0001, 0];
        let values = decode_binary_params(&body, 1).unwrap();
        assert_eq!(values, vec![Value::NULL]);
    }

    #[test]
    fn decodes_binary_long_parameter() {
        let mut body = vec![0b0000_0000, 1]; // null bitmap clear, new-params-bound flag set
        body.push(ColumnType::MYSQL_TYPE_LONG as u8);
        body.push(0x00); // signed
        body.extend_from_slice(&42i32.to_le_bytes());

        let values = decode_binary_params(&body, 1).unwrap();
        assert_eq!(values, vec![Value::Int(42)]);
    }

    #[test]
    fn decodes_binary_string_parameter() {
        let mut body = vec![0b0000_0000, 1];
        body.push(ColumnType::MYSQL_TYPE_VAR_STRING as u8);
        body.push(0x00);
        body.push(3); // length-encoded length
        body.extend_from_slice(b"abc");

        let values = decode_binary_params(&body, 1).unwrap();
        assert_eq!(values, vec![Value::Bytes(b"abc".to_vec())]);
    }
}

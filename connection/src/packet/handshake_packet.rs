use std::io::{Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt};

use common::err::CResult;

use crate::util::read_null_term_string_with_cursor;

/// Initial Handshake Packet (protocol version 10) sent by a MySQL server
/// right after the client opens the TCP connection.
#[derive(Debug)]
pub struct HandshakePacket {
    pub protocol_version: u8,
    pub server_version: String,
    pub connection_id: u32,
    pub auth_plugin_data: Vec<u8>,
    pub capability_flags: u32,
    pub character_set: u8,
    pub status_flags: u16,
    pub auth_plugin_name: Option<String>,
}

impl HandshakePacket {
    pub fn parse(packet: &[u8]) -> CResult<Self> {
        let mut cursor = Cursor::new(packet);

        let protocol_version = cursor.read_u8()?;
        let server_version = read_null_term_string_with_cursor(&mut cursor)?;
        let connection_id = cursor.read_u32::<LittleEndian>()?;

        let mut auth_plugin_data = vec![0u8; 8];
        cursor.read_exact(&mut auth_plugin_data)?;
        cursor.read_u8()?; // filler

        let capability_flags_lower = cursor.read_u16::<LittleEndian>()? as u32;
        let character_set = cursor.read_u8()?;
        let status_flags = cursor.read_u16::<LittleEndian>()?;
        let capability_flags_upper = cursor.read_u16::<LittleEndian>()? as u32;
        let capability_flags = capability_flags_lower | (capability_flags_upper << 16);

        let auth_plugin_data_len = cursor.read_u8()?;
        let mut reserved = [0u8; 10];
        cursor.read_exact(&mut reserved)?;

        let remaining_salt_len = std::cmp::max(13, auth_plugin_data_len as i32 - 8) as usize;
        let mut remaining_salt = vec![0u8; remaining_salt_len];
        cursor.read_exact(&mut remaining_salt)?;
        auth_plugin_data.extend_from_slice(&remaining_salt);
        // the salt is NULL-terminated; drop the trailing terminator byte if present
        if auth_plugin_data.last() == Some(&0) {
            auth_plugin_data.pop();
        }

        let auth_plugin_name = read_null_term_string_with_cursor(&mut cursor).ok();

        Ok(Self {
            protocol_version,
            server_version,
            connection_id,
            auth_plugin_data,
            capability_flags,
            character_set,
            status_flags,
            auth_plugin_name,
        })
    }
}

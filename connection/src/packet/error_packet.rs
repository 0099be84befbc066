use std::io::{Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt};

use common::err::CResult;

#[derive(Debug)]
pub struct ErrorPacket {
    pub error_code: u16,
    pub sql_state_marker: Option<String>,
    pub sql_state: Option<String>,
    pub error_message: String,
}

impl ErrorPacket {
    /// Parses the body of an ERR_Packet, assuming the leading `0xff` marker
    /// byte has already been stripped off by the caller.
    pub fn parse(packet: &[u8]) -> CResult<Self> {
        let mut cursor = Cursor::new(packet);

        let error_code = cursor.read_u16::<LittleEndian>()?;

        let mut sql_state_marker = None;
        let mut sql_state = None;
        if packet.len() > 2 && packet[2] == b'#' {
            let mut marker = [0u8; 1];
            cursor.read_exact(&mut marker)?;
            sql_state_marker = Some(String::from_utf8_lossy(&marker).to_string());

            let mut state = [0u8; 5];
            cursor.read_exact(&mut state)?;
            sql_state = Some(String::from_utf8_lossy(&state).to_string());
        }

        let mut error_message = String::new();
        cursor.read_to_string(&mut error_message)?;

        Ok(Self {
            error_code,
            sql_state_marker,
            sql_state,
            error_message,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_error_with_sql_state() {
        let mut body = vec![0x1a, 0x04];
        body.extend_from_slice(b"#42S02");
        body.extend_from_slice(b"Table doesn't exist");

        let packet = ErrorPacket::parse(&body).unwrap();
        assert_eq!(packet.error_code, 0x041a);
        assert_eq!(packet.sql_state, Some("42S02".to_string()));
        assert_eq!(packet.error_message, "Table doesn't exist");
    }
}

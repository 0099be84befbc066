use std::io::{Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt};
use bytes::Buf;

use common::err::CResult;

use crate::NULL_TERMINATOR;

/// Reads a MySQL length-encoded integer, returning both the number of bytes
/// consumed by the encoding and the decoded value.
pub fn read_len_enc_num<T: AsRef<[u8]>>(cursor: &mut Cursor<T>) -> CResult<(u8, u64)> {
    let first_byte = cursor.read_u8()?;

    match first_byte {
        0xfb => Ok((1, 0)),
        0xfc => Ok((3, cursor.read_u16::<LittleEndian>()? as u64)),
        0xfd => {
            let mut buf = [0u8; 3];
            cursor.read_exact(&mut buf)?;
            let value = buf[0] as u64 | (buf[1] as u64) << 8 | (buf[2] as u64) << 16;
            Ok((4, value))
        }
        0xfe => Ok((9, cursor.read_u64::<LittleEndian>()?)),
        _ => Ok((1, first_byte as u64)),
    }
}

/// Reads bytes up to (and consuming) the next NULL terminator as a UTF-8 string.
pub fn read_null_term_string_with_cursor<T: AsRef<[u8]>>(cursor: &mut Cursor<T>) -> CResult<String> {
    let mut bytes = Vec::new();
    loop {
        let b = cursor.read_u8()?;
        if b == NULL_TERMINATOR {
            break;
        }
        bytes.push(b);
    }
    Ok(String::from_utf8_lossy(&bytes).to_string())
}

/// Reads a length-encoded string (length-encoded integer prefix followed by that many bytes).
pub fn read_len_enc_str_with_cursor(cursor: &mut Cursor<&[u8]>) -> CResult<String> {
    let (_, len) = read_len_enc_num(cursor)?;
    let mut buf = vec![0u8; len as usize];
    cursor.read_exact(&mut buf)?;
    Ok(String::from_utf8_lossy(&buf).to_string())
}

/// Same as `read_len_enc_str_with_cursor`, but a leading `0xfb` marker decodes to `None`
/// instead of an empty string, per the MySQL NULL-column convention for text resultset rows.
pub fn read_len_enc_str_with_cursor_allow_null(cursor: &mut Cursor<&[u8]>) -> CResult<Option<String>> {
    if !cursor.has_remaining() {
        return Ok(None);
    }

    let marker = cursor.get_ref()[cursor.position() as usize];
    if marker == 0xfb {
        cursor.read_u8()?;
        return Ok(None);
    }

    Ok(Some(read_len_enc_str_with_cursor(cursor)?))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn len_enc_num_small_value() {
        let data = [5u8];
        let mut cursor = Cursor::new(&data[..]);
        let (consumed, value) = read_len_enc_num(&mut cursor).unwrap();
        assert_eq!(consumed, 1);
        assert_eq!(value, 5);
    }

    #[test]
    fn len_enc_num_two_byte_value() {
        let data = [0xfc, 0x01, 0x01];
        let mut cursor = Cursor::new(&data[..]);
        let (consumed, value) = read_len_enc_num(&mut cursor).unwrap();
        assert_eq!(consumed, 3);
        assert_eq!(value, 0x0101);
    }

    #[test]
    fn null_term_string_reads_up_to_terminator() {
        let data = [b'a', b'b', 0u8, b'c'];
        let mut cursor = Cursor::new(&data[..]);
        let s = read_null_term_string_with_cursor(&mut cursor).unwrap();
        assert_eq!(s, "ab");
    }

    #[test]
    fn len_enc_str_allow_null_returns_none_for_marker() {
        let data = [0xfbu8];
        let mut cursor = Cursor::new(&data[..]);
        let value = read_len_enc_str_with_cursor_allow_null(&mut cursor).unwrap();
        assert!(value.is_none());
    }

    #[test]
    fn len_enc_str_allow_null_returns_value() {
        let data = [3u8, b'f', b'o', b'o'];
        let mut cursor = Cursor::new(&data[..]);
        let value = read_len_enc_str_with_cursor_allow_null(&mut cursor).unwrap();
        assert_eq!(value, Some("foo".to_string()));
    }
}

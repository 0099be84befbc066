use std::fmt::Debug;
use std::time::Duration;
use byte_unit::{Byte, UnitType};
use pretty_duration::pretty_duration;
use serde::Serialize;

/// Duration 的格式化输出
pub fn to_duration_pretty(duration: &Duration) -> String {
    pretty_duration(duration, None)
}

/// 字节大小 的格式化输出
pub fn to_bytes_len_pretty(len: usize) -> String {
    let byte = Byte::from_u128(len as u128).unwrap();
    let adjusted_byte = byte.get_appropriate_unit(UnitType::Decimal);

    format!("{adjusted_byte:.2}")
}

/// JSON pretty-print, falling back to `Debug` if the value somehow fails to serialize.
pub fn to_string_pretty<T: Sized + Serialize + Debug>(val: &T) -> String {
    match serde_json::to_string_pretty(val) {
        Ok(v) => v,
        Err(_) => format!("{:?}", val),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::time::Duration;

    #[test]
    fn duration_pretty_is_non_empty() {
        assert!(!to_duration_pretty(&Duration::from_secs(90)).is_empty());
    }

    #[test]
    fn bytes_len_pretty_formats_kib() {
        assert!(to_bytes_len_pretty(2048).contains("KiB") || to_bytes_len_pretty(2048).contains("KB"));
    }
}

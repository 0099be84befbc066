use std::fmt::Display;
use std::{fmt, io};
use std::num::ParseIntError;
use std::str::Utf8Error;
use std::string::FromUtf8Error;
use hex::FromHexError;

#[derive(Debug)]
pub enum ReError {
    //////////////////////
    // Common
    //////////////////////
    /// 一定不会出现的异常。如果出现，一定是BUG
    BUG(String),
    /// The parser had an error (recoverable)
    Error(String),
    /// The parser had an unrecoverable error: we got to the right
    /// branch and we know other branches won't work, so backtrack
    /// as fast as possible
    Failure(String),

    //////////////////////
    // IO
    //////////////////////
    IoError(io::Error),
    Utf8Error(Utf8Error),
    FromUtf8Error(FromUtf8Error),
    FromHexError(FromHexError),
    ParseIntError(ParseIntError),
    ConnectionError(String),
    String(String),

    ConfigFileParseErr(String),

    //////////////////////
    // MySQL driver / schema
    //////////////////////
    MysqlQueryErr(String),
    TableSchemaIntoErr(String),
    OpTableNotExistErr(String),
    OpSchemaNotExistErr(String),

    //////////////////////
    // Task store
    //////////////////////
    TaskStoreErr(String),
}

impl Display for ReError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> fmt::Result {
        match self {
            ReError::BUG(s) | ReError::Error(s) | ReError::Failure(s)
            | ReError::ConnectionError(s) | ReError::String(s)
            | ReError::ConfigFileParseErr(s) | ReError::MysqlQueryErr(s)
            | ReError::TableSchemaIntoErr(s) | ReError::OpTableNotExistErr(s)
            | ReError::OpSchemaNotExistErr(s) | ReError::TaskStoreErr(s) => {
                write!(f, "{}", s)
            }
            ReError::IoError(err) => write!(f, "{}", err),
            ReError::Utf8Error(err) => write!(f, "{}", err),
            ReError::FromUtf8Error(err) => write!(f, "{}", err),
            ReError::FromHexError(err) => write!(f, "{}", err),
            ReError::ParseIntError(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for ReError {}

impl From<io::Error> for ReError {
    fn from(error: io::Error) -> Self {
        ReError::IoError(error)
    }
}

impl From<Utf8Error> for ReError {
    fn from(error: Utf8Error) -> Self {
        ReError::Utf8Error(error)
    }
}

impl From<FromUtf8Error> for ReError {
    fn from(error: FromUtf8Error) -> Self {
        ReError::FromUtf8Error(error)
    }
}

impl From<FromHexError> for ReError {
    fn from(error: FromHexError) -> Self {
        ReError::FromHexError(error)
    }
}

impl From<ParseIntError> for ReError {
    fn from(error: ParseIntError) -> Self {
        ReError::ParseIntError(error)
    }
}

impl From<mysql_async::Error> for ReError {
    fn from(error: mysql_async::Error) -> Self {
        ReError::MysqlQueryErr(error.to_string())
    }
}

impl From<serde_json::Error> for ReError {
    fn from(error: serde_json::Error) -> Self {
        ReError::ConfigFileParseErr(error.to_string())
    }
}

impl From<toml::de::Error> for ReError {
    fn from(error: toml::de::Error) -> Self {
        ReError::ConfigFileParseErr(error.to_string())
    }
}

impl From<rusqlite::Error> for ReError {
    fn from(error: rusqlite::Error) -> Self {
        ReError::TaskStoreErr(error.to_string())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn display_groups_string_variants() {
        assert_eq!(ReError::BUG("x".into()).to_string(), "x");
        assert_eq!(ReError::MysqlQueryErr("bad query".into()).to_string(), "bad query");
    }

    #[test]
    fn io_error_display_delegates() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "missing");
        let err: ReError = io_err.into();
        assert_eq!(err.to_string(), "missing");
    }
}

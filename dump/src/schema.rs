use std::collections::BTreeMap;

const NUMERIC_BASE_TYPES: &[&str] = &[
    "bit", "tinyint", "smallint", "mediumint", "int", "integer", "bigint", "real", "double",
    "float", "decimal", "numeric",
];

const BLOB_BASE_TYPES: &[&str] = &[
    "tinyblob", "blob", "mediumblob", "longblob", "binary", "varbinary", "bit",
];

/// A single column, as reconstructed from `SHOW COLUMNS`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub ordinal: usize,
    pub declared_sql_type: String,
    pub base_type: String,
    pub length: Option<u32>,
    pub attributes: Vec<String>,
    pub is_numeric: bool,
    pub is_blob: bool,
}

impl Column {
    /// Parses a `SHOW COLUMNS` `Type` cell such as `varchar(32)` or `int(11) unsigned`
    /// into base type, optional length, and trailing attribute tokens.
    pub fn parse(name: &str, ordinal: usize, col_type: &str) -> Self {
        let declared_sql_type = col_type.to_string();
        let mut tokens = col_type.split_whitespace();
        let first = tokens.next().unwrap_or_default();
        let attributes: Vec<String> = tokens.map(|t| t.to_string()).collect();

        let (base_type, length) = match first.find('(') {
            Some(open) => {
                let base = first[..open].to_lowercase();
                let inside = first[open + 1..].trim_end_matches(')');
                let length = inside.split(',').next().and_then(|n| n.parse::<u32>().ok());
                (base, length)
            }
            None => (first.to_lowercase(), None),
        };

        let is_numeric = NUMERIC_BASE_TYPES.contains(&base_type.as_str());
        let is_blob = BLOB_BASE_TYPES.contains(&base_type.as_str());

        Self {
            name: name.to_string(),
            ordinal,
            declared_sql_type,
            base_type,
            length,
            attributes,
            is_numeric,
            is_blob,
        }
    }
}

pub type ColumnMap = BTreeMap<String, Column>;

/// The frozen, include/exclude-filtered view of the source database the exporter
/// drives the whole dump from.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    pub tables: Vec<String>,
    pub views: Vec<String>,
    pub triggers: Vec<String>,
    pub procedures: Vec<String>,
    pub table_columns: BTreeMap<String, ColumnMap>,
}

impl Schema {
    pub fn columns_sorted_by_ordinal(&self, name: &str) -> Vec<&Column> {
        let mut cols: Vec<&Column> = self
            .table_columns
            .get(name)
            .map(|m| m.values().collect())
            .unwrap_or_default();
        cols.sort_by_key(|c| c.ordinal);
        cols
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_length_and_base_type() {
        let col = Column::parse("age", 1, "int(11) unsigned");
        assert_eq!(col.base_type, "int");
        assert_eq!(col.length, Some(11));
        assert_eq!(col.attributes, vec!["unsigned".to_string()]);
        assert!(col.is_numeric);
        assert!(!col.is_blob);
    }

    #[test]
    fn parses_type_without_length() {
        let col = Column::parse("data", 2, "text");
        assert_eq!(col.base_type, "text");
        assert_eq!(col.length, None);
        assert!(!col.is_numeric);
        assert!(!col.is_blob);
    }

    #[test]
    fn recognizes_blob_type() {
        let col = Column::parse("payload", 3, "varbinary(255)");
        assert!(col.is_blob);
        assert!(!col.is_numeric);
    }
}

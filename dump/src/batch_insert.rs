use mysql_async::prelude::*;
use mysql_async::{Conn, Params, Statement, Value};

use common::err::CResult;
use common::err::decode_error::ReError;

use crate::schema::ColumnMap;

const MAX_PLACEHOLDERS: usize = 60_000;
const MAX_CAP: usize = 5_999;

/// Accumulates row tuples for one table and flushes them as a single multi-row
/// `INSERT`, sized against the placeholder ceiling and the target's packet budget (§4.4).
pub struct BatchInserter<'a> {
    capacity: usize,
    table: String,
    column_count: usize,
    packet_budget: i64,

    pending_rows: Vec<Vec<Value>>,
    pending_byte_size: i64,

    statement: Option<Statement>,
    statement_row_count: usize,

    insert_columns: Vec<String>,
    conn: &'a mut Conn,
}

impl<'a> BatchInserter<'a> {
    pub fn new(requested_capacity: usize, table: &str, columns: &ColumnMap, conn: &'a mut Conn, packet_budget: i64) -> Self {
        let column_count = columns.len();
        let capacity = if requested_capacity == 0 || requested_capacity * column_count > MAX_PLACEHOLDERS {
            std::cmp::min(MAX_CAP, MAX_PLACEHOLDERS / column_count - 1)
        } else {
            requested_capacity
        };

        let mut sorted: Vec<_> = columns.values().collect();
        sorted.sort_by_key(|c| c.ordinal);
        let insert_columns = sorted.into_iter().map(|c| c.name.clone()).collect();

        Self {
            capacity,
            table: table.to_string(),
            column_count,
            packet_budget,
            pending_rows: Vec::with_capacity(capacity),
            pending_byte_size: 0,
            statement: None,
            statement_row_count: 0,
            insert_columns,
            conn,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Validates row width, pre-flushes if the packet budget would be exceeded, then
    /// appends the row and flushes again once `capacity` rows have accumulated.
    pub async fn insert(&mut self, row: Vec<Value>, byte_size: i64) -> CResult<()> {
        if row.len() != self.column_count {
            return Err(ReError::String(format!(
                "invalid row values count: {}, needed {}",
                row.len(),
                self.column_count
            )));
        }

        self.pending_byte_size += byte_size;
        if self.pending_byte_size >= self.packet_budget {
            self.flush().await?;
            self.pending_byte_size += byte_size;
        }

        self.pending_rows.push(row);

        if self.pending_rows.len() == self.capacity {
            self.flush().await?;
        }

        Ok(())
    }

    pub async fn flush(&mut self) -> CResult<()> {
        if self.pending_rows.is_empty() {
            return Ok(());
        }

        let row_count = self.pending_rows.len();
        if self.statement_row_count != row_count {
            self.close().await?;
            let query = self.make_insert_query(row_count);
            self.statement = Some(self.conn.prep(query).await?);
            self.statement_row_count = row_count;
        }

        let mut params = Vec::with_capacity(row_count * self.column_count);
        for row in self.pending_rows.drain(..) {
            params.extend(row);
        }

        let statement = self.statement.as_ref().unwrap();
        self.conn.exec_drop(statement, Params::Positional(params)).await?;

        self.pending_byte_size = 0;
        Ok(())
    }

    pub async fn close(&mut self) -> CResult<()> {
        if let Some(statement) = self.statement.take() {
            self.conn.close(statement).await?;
        }
        self.statement_row_count = 0;
        Ok(())
    }

    fn make_insert_query(&self, row_count: usize) -> String {
        let columns = self
            .insert_columns
            .iter()
            .map(|c| format!("`{}`", c))
            .collect::<Vec<_>>()
            .join(",");

        let placeholders = format!("({})", vec!["?"; self.column_count].join(","));
        let all_placeholders = vec![placeholders; row_count].join(",");

        format!("INSERT INTO `{}` ({}) VALUES {}", self.table, columns, all_placeholders)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::schema::Column;

    fn columns(n: usize) -> ColumnMap {
        let mut map = ColumnMap::new();
        for i in 0..n {
            let name = format!("c{}", i);
            map.insert(name.clone(), Column::parse(&name, i, "int(11)"));
        }
        map
    }

    #[test]
    fn capacity_resolves_to_placeholder_ceiling_for_wide_tables() {
        // S2: 60 columns, requested 2000 rows -> min(5999, floor(60000/60) - 1) = 999
        let cols = columns(60);
        let capacity = if 2000 * cols.len() > MAX_PLACEHOLDERS {
            std::cmp::min(MAX_CAP, MAX_PLACEHOLDERS / cols.len() - 1)
        } else {
            2000
        };
        assert_eq!(capacity, 999);
    }

    #[test]
    fn capacity_keeps_requested_value_when_within_bounds() {
        let cols = columns(2);
        let requested = 100;
        let capacity = if requested == 0 || requested * cols.len() > MAX_PLACEHOLDERS {
            std::cmp::min(MAX_CAP, MAX_PLACEHOLDERS / cols.len() - 1)
        } else {
            requested
        };
        assert_eq!(capacity, 100);
    }
}

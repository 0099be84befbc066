use mysql_async::Conn;

use common::err::CResult;

use crate::inspector::Inspector;

const DEFAULT_CHUNK_SIZE: i64 = 350_000;

/// A range predicate over one table's chosen key column; the unit of parallel export.
/// An empty `condition` means "dump the whole table in one shot".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub table_name: String,
    pub condition: String,
}

impl Chunk {
    pub fn whole_table(table_name: &str) -> Self {
        Self { table_name: table_name.to_string(), condition: String::new() }
    }
}

/// Splits `table` into numeric-key chunks of roughly `chunk_size` rows each, using the
/// inspector to find a suitable key column and its min/max/row-count. Falls back to a
/// single whole-table chunk whenever no suitable indexed numeric column exists.
pub async fn calculate_chunks_for_table(
    inspector: &Inspector,
    conn: &mut Conn,
    table: &str,
    chunk_size: i64,
) -> CResult<Vec<Chunk>> {
    let column = inspector.find_primary_column(conn, table, true).await?;
    if column.is_empty() {
        return Ok(vec![Chunk::whole_table(table)]);
    }

    let (min, max) = inspector.get_min_max_values(conn, table, &column).await?;
    let (min, max) = match (min.parse::<i64>(), max.parse::<i64>()) {
        (Ok(min), Ok(max)) => (min, max),
        _ => return Ok(vec![Chunk::whole_table(table)]),
    };

    let row_count = inspector.estimate_count(conn, table, &column).await?;
    let chunk_size = if chunk_size == 0 { DEFAULT_CHUNK_SIZE } else { chunk_size };

    let est_chunks = std::cmp::max(1, row_count / chunk_size);
    let est_step = (max - min) / est_chunks + 1;

    let mut chunks = Vec::new();
    let mut cutoff = min;
    let mut shown_null = false;
    while cutoff <= max {
        let upper = cutoff + est_step;
        let condition = if !shown_null {
            format!("`{0}` IS NULL OR (`{0}` >= {1} AND `{0}` < {2})", column, cutoff, upper)
        } else {
            format!("(`{0}` >= {1} AND `{0}` < {2})", column, cutoff, upper)
        };

        chunks.push(Chunk { table_name: table.to_string(), condition });
        cutoff += est_step;
        shown_null = true;
    }

    Ok(chunks)
}

#[cfg(test)]
mod test {
    use super::*;

    fn step_condition(col: &str, cutoff: i64, upper: i64, first: bool) -> String {
        if first {
            format!("`{0}` IS NULL OR (`{0}` >= {1} AND `{0}` < {2})", col, cutoff, upper)
        } else {
            format!("(`{0}` >= {1} AND `{0}` < {2})", col, cutoff, upper)
        }
    }

    #[test]
    fn whole_table_chunk_has_empty_condition() {
        let chunk = Chunk::whole_table("users");
        assert_eq!(chunk.table_name, "users");
        assert!(chunk.condition.is_empty());
    }

    #[test]
    fn condition_format_matches_spec_shape() {
        let first = step_condition("id", 1, 3, true);
        assert_eq!(first, "`id` IS NULL OR (`id` >= 1 AND `id` < 3)");

        let second = step_condition("id", 3, 5, false);
        assert_eq!(second, "(`id` >= 3 AND `id` < 5)");
    }
}

use mysql_async::prelude::*;
use mysql_async::{Conn, Row};

use common::err::CResult;
use common::err::decode_error::ReError;

use crate::schema::{Column, ColumnMap};

/// Introspects a source MySQL database: schema object enumeration, column metadata,
/// min/max and row-count estimates, and the version-gated DDL rewrites every worker
/// job (`worker::Worker::run`) needs before replaying definer DDL on the target.
pub struct Inspector {
    pub db_name: String,
}

impl Inspector {
    pub fn new(db_name: impl Into<String>) -> Self {
        Self { db_name: db_name.into() }
    }

    pub async fn tables(&self, conn: &mut Conn) -> CResult<Vec<String>> {
        let query = "SELECT TABLE_NAME FROM INFORMATION_SCHEMA.TABLES WHERE TABLE_TYPE='BASE TABLE' AND TABLE_SCHEMA=?";
        let rows: Vec<String> = conn.exec(query, (&self.db_name,)).await?;
        Ok(rows)
    }

    pub async fn views(&self, conn: &mut Conn) -> CResult<Vec<String>> {
        let query = "SELECT TABLE_NAME FROM INFORMATION_SCHEMA.TABLES WHERE TABLE_TYPE='VIEW' AND TABLE_SCHEMA=?";
        let rows: Vec<String> = conn.exec(query, (&self.db_name,)).await?;
        Ok(rows)
    }

    pub async fn triggers(&self, conn: &mut Conn) -> CResult<Vec<String>> {
        let query = "SELECT TRIGGER_NAME FROM INFORMATION_SCHEMA.TRIGGERS WHERE TRIGGER_SCHEMA=?";
        let rows: Vec<String> = conn.exec(query, (&self.db_name,)).await?;
        Ok(rows)
    }

    pub async fn procedures(&self, conn: &mut Conn) -> CResult<Vec<String>> {
        let query = "SELECT ROUTINE_NAME FROM INFORMATION_SCHEMA.ROUTINES WHERE ROUTINE_TYPE='PROCEDURE' AND ROUTINE_SCHEMA=?";
        let rows: Vec<String> = conn.exec(query, (&self.db_name,)).await?;
        Ok(rows)
    }

    /// `field, col_type, is_null, key, default, extra` from `SHOW COLUMNS`, reassembled
    /// into this crate's `Column` model (§3 of the data model: ordinal, base type,
    /// length, attributes, is_numeric/is_blob).
    pub async fn column_types(&self, conn: &mut Conn, table: &str) -> CResult<ColumnMap> {
        let query = format!("SHOW COLUMNS FROM `{}`", table);
        let rows: Vec<Row> = conn.query(query).await?;

        let mut columns = ColumnMap::new();
        for (ordinal, row) in rows.into_iter().enumerate() {
            let field: String = row.get("Field").ok_or_else(|| ReError::TableSchemaIntoErr("missing Field column".into()))?;
            let col_type: String = row.get("Type").ok_or_else(|| ReError::TableSchemaIntoErr("missing Type column".into()))?;
            columns.insert(field.clone(), Column::parse(&field, ordinal, &col_type));
        }
        Ok(columns)
    }

    pub async fn show_create_table(&self, conn: &mut Conn, table: &str) -> CResult<String> {
        let query = format!("SHOW CREATE TABLE `{}`", table);
        let row: Row = conn
            .query_first(query)
            .await?
            .ok_or_else(|| ReError::OpTableNotExistErr(table.to_string()))?;
        let ddl: String = row.get("Create Table").ok_or_else(|| ReError::TableSchemaIntoErr("missing Create Table column".into()))?;
        Ok(ddl)
    }

    pub async fn show_create_view(&self, conn: &mut Conn, view: &str) -> CResult<String> {
        let query = format!("SHOW CREATE VIEW `{}`", view);
        let row: Row = conn
            .query_first(query)
            .await?
            .ok_or_else(|| ReError::OpTableNotExistErr(view.to_string()))?;
        let ddl: String = row.get("Create View").ok_or_else(|| ReError::TableSchemaIntoErr("missing Create View column".into()))?;
        Ok(rewrite_view_ddl(&ddl))
    }

    /// Tolerates both the 6-column (MySQL < 5.7.2) and 7-column (>= 5.7.2) shapes of
    /// `SHOW CREATE TRIGGER` by reading the `SQL Original Statement` column by name.
    pub async fn show_create_trigger(&self, conn: &mut Conn, trigger: &str) -> CResult<String> {
        let query = format!("SHOW CREATE TRIGGER `{}`", trigger);
        let row: Row = conn
            .query_first(query)
            .await?
            .ok_or_else(|| ReError::OpTableNotExistErr(trigger.to_string()))?;
        let ddl: String = row
            .get("SQL Original Statement")
            .ok_or_else(|| ReError::TableSchemaIntoErr("missing SQL Original Statement column".into()))?;
        Ok(rewrite_trigger_ddl(&ddl))
    }

    pub async fn show_create_procedure(&self, conn: &mut Conn, proc: &str) -> CResult<String> {
        let query = format!("SHOW CREATE PROCEDURE `{}`", proc);
        let row: Row = conn
            .query_first(query)
            .await?
            .ok_or_else(|| ReError::OpTableNotExistErr(proc.to_string()))?;
        let ddl: String = row
            .get("Create Procedure")
            .ok_or_else(|| ReError::TableSchemaIntoErr("missing Create Procedure column".into()))?;
        Ok(ddl)
    }

    /// Order: PRIMARY key column, then any unique index, then (if `use_any_index`) the
    /// column of the highest-cardinality index, then empty. Columns are fetched from
    /// `SHOW INDEX` by name, never by ordinal position.
    pub async fn find_primary_column(&self, conn: &mut Conn, table: &str, use_any_index: bool) -> CResult<String> {
        let query = format!("SHOW INDEX FROM `{}`", table);
        let rows: Vec<Row> = conn.query(query).await?;

        let mut best_any: Option<(i64, String)> = None;
        let mut best_unique: Option<String> = None;

        for row in &rows {
            let seq_in_index: i64 = row.get("Seq_in_index").unwrap_or(0);
            if seq_in_index != 1 {
                continue;
            }

            let key_name: String = row.get("Key_name").unwrap_or_default();
            let column_name: String = row.get("Column_name").unwrap_or_default();
            let non_unique: i64 = row.get("Non_unique").unwrap_or(1);
            let cardinality: i64 = row.get("Cardinality").unwrap_or(0);

            if key_name == "PRIMARY" {
                return Ok(column_name);
            }

            if non_unique == 0 && best_unique.is_none() {
                best_unique = Some(column_name.clone());
            }

            if use_any_index {
                let better = match &best_any {
                    Some((best_card, _)) => cardinality > *best_card,
                    None => true,
                };
                if better {
                    best_any = Some((cardinality, column_name));
                }
            }
        }

        if let Some(col) = best_unique {
            return Ok(col);
        }

        if use_any_index {
            if let Some((_, col)) = best_any {
                return Ok(col);
            }
        }

        Ok(String::new())
    }

    pub async fn get_min_max_values(&self, conn: &mut Conn, table: &str, column: &str) -> CResult<(String, String)> {
        let query = format!(
            "SELECT /*!40001 SQL_NO_CACHE */ IFNULL(MIN(`{0}`),0), IFNULL(MAX(`{0}`),0) FROM `{1}`",
            column, table
        );
        let row: Row = conn
            .query_first(query)
            .await?
            .ok_or_else(|| ReError::OpTableNotExistErr(table.to_string()))?;
        let min: String = row.get(0).unwrap_or_default();
        let max: String = row.get(1).unwrap_or_default();
        Ok((min, max))
    }

    pub async fn estimate_count(&self, conn: &mut Conn, table: &str, column: &str) -> CResult<i64> {
        let select_col = if column.is_empty() { "*".to_string() } else { format!("`{}`", column) };
        let query = format!("EXPLAIN SELECT {} FROM `{}`", select_col, table);
        let row: Row = conn
            .query_first(query)
            .await?
            .ok_or_else(|| ReError::OpTableNotExistErr(table.to_string()))?;
        let rows: i64 = row.get("rows").unwrap_or(0);
        Ok(rows)
    }

    pub fn drop_table_query(table: &str) -> String {
        format!("DROP TABLE IF EXISTS `{}`", table)
    }

    pub fn drop_view_query(view: &str) -> String {
        format!("DROP VIEW IF EXISTS `{}`", view)
    }

    pub fn drop_trigger_query(trigger: &str) -> String {
        format!("DROP TRIGGER IF EXISTS `{}`", trigger)
    }

    pub fn drop_procedure_query(proc: &str) -> String {
        format!("DROP PROCEDURE IF EXISTS `{}`", proc)
    }

    pub fn make_create_table_query(table: &str, columns: &ColumnMap) -> String {
        let mut sorted: Vec<&Column> = columns.values().collect();
        sorted.sort_by_key(|c| c.ordinal);
        let cols = sorted
            .iter()
            .map(|c| format!("`{}` {}", c.name, c.declared_sql_type))
            .collect::<Vec<_>>()
            .join(", ");
        format!("CREATE TABLE IF NOT EXISTS `{}` ({})", table, cols)
    }
}

/// `CREATE DEFINER` → `/*!50003 CREATE*/ /*!50017 DEFINER`, ` TRIGGER` → `*/ /*!50003 TRIGGER`,
/// trailing `*/` appended, for forward-compatible trigger replay across MySQL versions.
pub fn rewrite_trigger_ddl(ddl: &str) -> String {
    let rewritten = ddl
        .replacen("CREATE DEFINER", "/*!50003 CREATE*/ /*!50017 DEFINER", 1)
        .replacen(" TRIGGER", "*/ /*!50003 TRIGGER", 1);
    format!("{}*/", rewritten)
}

/// `CREATE ALGORITHM` → `/*!50001 CREATE ALGORITHM`, ` DEFINER=` → ` */\n/*!50013 DEFINER=`,
/// ` VIEW ` → ` */\n/*!50001 VIEW `, trailing ` */;` appended.
pub fn rewrite_view_ddl(ddl: &str) -> String {
    let rewritten = ddl
        .replacen("CREATE ALGORITHM", "/*!50001 CREATE ALGORITHM", 1)
        .replacen(" DEFINER=", " */\n/*!50013 DEFINER=", 1)
        .replacen(" VIEW ", " */\n/*!50001 VIEW ", 1);
    format!("{} */;", rewritten)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rewrites_trigger_ddl() {
        let ddl = "CREATE DEFINER=`root`@`%` TRIGGER `t` BEFORE INSERT ON `orders` FOR EACH ROW SET NEW.x = 1";
        let rewritten = rewrite_trigger_ddl(ddl);
        assert!(rewritten.starts_with("/*!50003 CREATE*/ /*!50017 DEFINER"));
        assert!(rewritten.contains("*/ /*!50003 TRIGGER"));
        assert!(rewritten.ends_with("*/"));
    }

    #[test]
    fn rewrites_view_ddl() {
        let ddl = "CREATE ALGORITHM=UNDEFINED DEFINER=`root`@`%` SQL SECURITY DEFINER VIEW `v` AS SELECT 1";
        let rewritten = rewrite_view_ddl(ddl);
        assert!(rewritten.starts_with("/*!50001 CREATE ALGORITHM"));
        assert!(rewritten.contains("*/\n/*!50013 DEFINER="));
        assert!(rewritten.contains("*/\n/*!50001 VIEW "));
        assert!(rewritten.ends_with(" */;"));
    }

    #[test]
    fn drop_queries_are_idempotent_statements() {
        assert_eq!(Inspector::drop_table_query("t"), "DROP TABLE IF EXISTS `t`");
        assert_eq!(Inspector::drop_view_query("v"), "DROP VIEW IF EXISTS `v`");
    }

    #[test]
    fn make_create_table_query_sorts_by_ordinal() {
        let mut columns = ColumnMap::new();
        columns.insert("b".to_string(), Column::parse("b", 1, "varchar(8)"));
        columns.insert("a".to_string(), Column::parse("a", 0, "int(11)"));

        let query = Inspector::make_create_table_query("t", &columns);
        assert_eq!(query, "CREATE TABLE IF NOT EXISTS `t` (`a` int(11), `b` varchar(8))");
    }
}

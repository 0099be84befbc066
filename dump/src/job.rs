use crate::schema::ColumnMap;

/// A unit of DDL or data work dispatched to a worker (§3 "Job variants").
#[derive(Debug, Clone)]
pub enum Job {
    CreateTable {
        table: String,
        with_drop: bool,
    },
    CreateViewPlaceholder {
        view: String,
        with_drop: bool,
        columns: ColumnMap,
    },
    CreateView {
        view: String,
    },
    ExportChunk {
        table: String,
        condition: String,
        columns: ColumnMap,
        rows_per_stmt: usize,
    },
    CreateTrigger {
        trigger: String,
        with_drop: bool,
    },
    CreateProcedure {
        proc: String,
        with_drop: bool,
    },
}

impl Job {
    /// The table this job's completion gates, if any — used by the exporter to call
    /// `ChunkManager::done` only for `ExportChunk` jobs.
    pub fn table_name(&self) -> Option<&str> {
        match self {
            Job::ExportChunk { table, .. } => Some(table),
            _ => None,
        }
    }
}

pub mod settings;
pub mod schema;
pub mod inspector;
pub mod chunk;
pub mod chunk_manager;
pub mod batch_insert;
pub mod job;
pub mod worker;
pub mod pool;
pub mod exporter;

pub use exporter::Exporter;
pub use settings::DumpSettings;

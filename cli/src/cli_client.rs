use std::sync::Arc;
use std::time::Instant;

use common::err::CResult;
use common::pretty_util::to_duration_pretty;
use dump::{DumpSettings, Exporter};
use store::TaskStore;

use crate::cli_options::CliOptions;

/// Drives one dump end to end without the HTTP surface (C10): the task store is
/// still used so `Exporter::run` has somewhere to record lifecycle, but nothing
/// else ever queries it out of process.
pub struct CliClient {
    settings: DumpSettings,
    options: CliOptions,
}

impl CliClient {
    pub fn new(settings: DumpSettings, options: CliOptions) -> Self {
        CliClient { settings, options }
    }

    pub async fn run(self) -> CResult<()> {
        let store = Arc::new(TaskStore::open(self.options.store_path())?);
        let exporter = Exporter::new(self.settings, 1, store);

        let started = Instant::now();
        let result = exporter.run().await;
        let elapsed = to_duration_pretty(&started.elapsed());

        match &result {
            Ok(()) => println!("dump finished successfully in {}", elapsed),
            Err(err) => eprintln!("dump failed after {}: {}", elapsed, err),
        }

        result
    }
}

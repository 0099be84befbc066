use serde::Serialize;

/// Process-local CLI invocation options, kept distinct from the dump settings the
/// exporter itself consumes.
#[derive(Debug, Clone, Serialize)]
pub struct CliOptions {
    debug: bool,
    store_path: String,
}

impl CliOptions {
    pub fn new(debug: bool, store_path: String) -> Self {
        CliOptions { debug, store_path }
    }

    pub fn is_debug(&self) -> bool {
        self.debug
    }

    pub fn store_path(&self) -> &str {
        &self.store_path
    }
}

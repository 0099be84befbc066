mod cli_client;
mod cli_options;

use std::io::Read as _;
use std::path::PathBuf;

use clap::Parser;

use common::config::{read_config, FConfig};
use common::err::decode_error::ReError;
use common::err::CResult;
use common::log::tracing_factory::{OutputType, TracingFactory, TracingFactoryOptions};
use dump::DumpSettings;

use crate::cli_client::CliClient;
use crate::cli_options::CliOptions;

#[derive(Parser, Debug, Clone)]
#[command(name = "mysql-sync-cli")]
#[command(version = "0.0.2")]
#[command(author = "rust-us")]
#[command(about = "MySQL to MySQL dump/replication tool")]
#[command(long_about = None)]
pub(crate) struct CliArgs {
    /// path to a TOML process config file (store path, logging)
    #[arg(long, help = "Path to process configuration file", value_name = "FILE")]
    pub process_config: Option<PathBuf>,

    /// path to a JSON dump settings file; reads stdin if omitted
    #[arg(short, long, help = "Path to dump settings JSON file, reads stdin if omitted", value_name = "FILE")]
    pub settings: Option<PathBuf>,

    #[arg(long, help = "override the task store db path", value_name = "PATH")]
    pub store: Option<String>,

    #[arg(short, long, help = "enable debug mode", default_value_t = false)]
    pub debug: bool,
}

#[tokio::main]
async fn main() -> CResult<()> {
    let args = CliArgs::parse();

    let rep_config = load_process_config(&args).get_config();
    let debug = args.debug || rep_config.base.debug;
    let store_path = args.store.clone().unwrap_or_else(|| rep_config.store.db_path.clone());

    let log_opt = TracingFactoryOptions::new(debug, OutputType::STDOUT, rep_config.base.get_log_dir());
    TracingFactory::init_log_with_options(log_opt);

    let settings = load_dump_settings(&args)?;

    eprintln!();
    eprintln!("╔╦╗╔═╗ ╔═╗╔╦╗╦  ");
    eprintln!(" ║ ╠═╣ ║   ║ ║  ");
    eprintln!(" ╩ ╩ ╩ ╚═╝ ╩ ╩═╝ Rust us MySQL Sync CLI{}", if debug { " [-d]" } else { "" });
    eprintln!();

    let options = CliOptions::new(debug, store_path);
    let client = CliClient::new(settings, options);

    client.run().await
}

/// Layers the process-level config: compiled-in defaults, then an optional TOML
/// file passed with `--process-config` (§6, same merge order the HTTP surface uses).
fn load_process_config(args: &CliArgs) -> FConfig {
    match &args.process_config {
        Some(path) => match read_config(path) {
            Ok(rep_config) => FConfig::new(rep_config),
            Err(err) => {
                eprintln!("failed to read process config at {:?}: {}, falling back to defaults", path, err);
                FConfig::default()
            }
        },
        None => FConfig::default(),
    }
}

fn load_dump_settings(args: &CliArgs) -> CResult<DumpSettings> {
    let raw = match &args.settings {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    serde_json::from_str(&raw).map_err(ReError::from)
}

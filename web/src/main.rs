mod api;
mod state;
mod web_error;

use std::env::args;
use std::sync::Arc;

use actix_web::{middleware, web, App, HttpServer};

use common::config::{read_config, FConfig};
use common::log::tracing_factory::{OutputType, TracingFactory, TracingFactoryOptions};
use proxy::ProxyRegistry;
use store::TaskStore;

use crate::state::AppState;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let config = load_config();
    let rep_config = config.get_config();

    let log_opt = TracingFactoryOptions::new(rep_config.base.debug, OutputType::STDOUT, rep_config.base.get_log_dir());
    TracingFactory::init_log_with_options(log_opt);

    let host = rep_config.http.host.clone();
    let port = rep_config.http.port;

    let store = Arc::new(TaskStore::open(&rep_config.store.db_path).expect("failed to open task store"));
    let registry = Arc::new(ProxyRegistry::new());
    let app_state = web::Data::new(AppState::new(store, registry));

    tracing::info!(%host, port, "starting HTTP control surface");

    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .service(api::proxy::start)
            .service(api::proxy::stop)
            .service(api::proxy::list)
            .service(api::sync::start)
            .service(api::sync::status)
            .wrap(middleware::Logger::default())
    })
    .bind((host.as_str(), port))?
    .run()
    .await
}

/// Loads process config from the path given as the first CLI argument, falling
/// back to compiled-in defaults (§6).
fn load_config() -> FConfig {
    match args().nth(1) {
        Some(path) => match read_config(&path) {
            Ok(rep_config) => FConfig::new(rep_config),
            Err(err) => {
                eprintln!("failed to read config at {}: {}, falling back to defaults", path, err);
                FConfig::default()
            }
        },
        None => FConfig::default(),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_config_has_http_defaults() {
        let config = FConfig::default().get_config();
        assert_eq!(config.http.port, 8080);
    }
}

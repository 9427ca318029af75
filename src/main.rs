use log::{info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use actix_web::{App, HttpServer, middleware::Logger, web};

use gpio_api::{AppConfig, AppState, GpioController, api_scope, select_driver};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("GPIO_API_CONFIG").ok())
        .map(PathBuf::from);
    let config = AppConfig::load(config_path.as_deref())
        .unwrap_or_else(|e| panic!("Failed to load config: {e}"));

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(config.log_filter()))
        .init();
    info!("Debug mode: {}", config.debug);

    let driver =
        select_driver(&config.gpio).unwrap_or_else(|e| panic!("Failed to init GPIO driver: {e}"));
    let controller = Arc::new(GpioController::new(config.valid_pins.clone(), driver));

    if !config.default_pins.is_empty() {
        let pins: Vec<i64> = config.default_pins.iter().copied().map(i64::from).collect();
        let results = controller.setup_pins(&pins);
        for result in results.iter().filter(|r| !r.is_configured()) {
            warn!("Default pin {} not configured: {:?}", result.pin, result.outcome);
        }
        info!(
            "Default pins configured: {:?}",
            results
                .iter()
                .filter(|r| r.is_configured())
                .map(|r| r.pin)
                .collect::<Vec<_>>()
        );
    }

    let app_state = AppState {
        controller: controller.clone(),
    };

    let scope_path = config.http.path.clone();
    let server = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(web::Data::new(app_state.clone()))
            .service(api_scope(&scope_path))
    });

    let http_cfg = &config.http;
    let bind_addrs = format!("{}:{}", http_cfg.host, http_cfg.port);
    let server = match &http_cfg.unix_socket {
        Some(socket_path) => {
            if Path::new(socket_path).exists() {
                fs::remove_file(socket_path)?;
            }
            info!("Listening on {socket_path}");

            server
                .bind_uds(socket_path)?
                .bind_auto_h2c((http_cfg.host.as_str(), http_cfg.port))?
        }
        None => server.bind_auto_h2c((http_cfg.host.as_str(), http_cfg.port))?,
    };

    info!("Starting Raspberry Pi GPIO API on {bind_addrs}...");

    let result = server.run().await;

    match controller.cleanup() {
        Ok(()) => info!("GPIO cleanup done on exit"),
        Err(e) => warn!("GPIO cleanup on exit failed: {e}"),
    }

    result
}

use basha_lagbe::config::AppConfig;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };
    log::info!(
        "Starting Basha Lagbe backend with the {} store",
        config.store_backend
    );

    if let Err(e) = basha_lagbe::run(config).await {
        log::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

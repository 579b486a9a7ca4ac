use gltf_viewer::app;
use gltf_viewer::cli::CliArgs;
use gltf_viewer::config::AppConfig;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gltf_viewer=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = match CliArgs::parse_from_env() {
        Ok(parsed) => parsed,
        Err(err) => err.exit(),
    };
    let mut config = AppConfig::load_or_default(&cli.config);
    let overrides = cli.config_overrides();
    if !overrides.is_empty() {
        info!(fields = ?overrides.applied_fields(), "applying command-line overrides");
        config.apply_overrides(&overrides);
    }
    let startup = cli.model.clone().zip(cli.startup_request_source());

    match app::run(config, startup) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            error!("Application error: {err:?}");
            std::process::exit(1);
        }
    }
}

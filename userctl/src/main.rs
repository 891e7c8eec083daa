use clap::Parser;
use userctl::{
    Application,
    config::{Args, Config},
    telemetry,
};

/// Wait for SIGTERM or Ctrl+C
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c().await.expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let received = tokio::select! {
        _ = ctrl_c => "Ctrl+C",
        _ = terminate => "SIGTERM",
    };
    tracing::info!("Received {received}, finishing in-flight requests before exit");
}

/// Print the settings `--validate` resolved.
fn report_valid(args: &Args, config: &Config) {
    println!("Configuration in {} is valid.", args.config);
    println!("  listen:   {}", config.bind_address());
    println!(
        "  pool:     {}..{} connections",
        config.database.pool.min_connections, config.database.pool.max_connections
    );
    println!("  otlp:     {}", if config.enable_otel_export { "on" } else { "off" });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // sqlx and the OTLP exporter both use rustls; pick the provider before either connects
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    let args = Args::parse();
    let config = Config::load(&args)?;

    if args.validate {
        report_valid(&args, &config);
        return Ok(());
    }

    telemetry::init_telemetry(config.enable_otel_export)?;
    tracing::info!(config_file = %args.config, "userctl {} starting", env!("CARGO_PKG_VERSION"));

    Application::new(config).await?.serve(shutdown_signal()).await
}

use actix_web::{web, App, HttpServer};
use clap::Parser;
use cw_capture::DecoderSettings;
use cw_config::Config;
use cw_core::telemetry;
use cw_engine::{
    AlertLog, EventSink, PipelineConfig, SessionConfig, SessionController, StartRequest,
};
use cw_web::{configure_routes, AppState};
use std::{process, sync::Arc, time::Duration};

/// Live crowd-density monitor: ingests a video stream and serves the
/// annotated MJPEG feed, stats snapshot, and alert history over HTTP.
#[derive(Debug, Parser)]
#[command(name = "crowdwatch")]
struct Cli {
    /// Source to start immediately: device index, video file, or stream URL
    #[arg(long)]
    source: Option<String>,
    /// Density alert threshold in [0, 1]
    #[arg(long)]
    threshold: Option<f64>,
    /// Heatmap opacity in [0.3, 1.0]
    #[arg(long)]
    opacity: Option<f64>,
    /// Seconds between repeated HIGH alerts
    #[arg(long)]
    cooldown: Option<f64>,
    /// Bind host (overrides configuration)
    #[arg(long)]
    host: Option<String>,
    /// Bind port (overrides configuration)
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() {
    telemetry::init_tracing("development", "crowdwatch");
    tracing::info!("crowdwatch starting");

    let cli = Cli::parse();

    // Load configuration - exit with non-zero if invalid
    let config = match Config::load() {
        Ok(config) => {
            tracing::debug!(?config, "Configuration loaded successfully");
            config
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let host = cli.host.unwrap_or_else(|| config.server.host.clone());
    let port = cli.port.unwrap_or(config.server.port);

    let session_config = SessionConfig {
        reconnect_backoff: Duration::from_millis(config.capture.reconnect_backoff_ms),
        max_reconnect_attempts: config.capture.max_reconnect_attempts,
        ..SessionConfig::default()
    };
    let mut pipeline_config = PipelineConfig::default();
    pipeline_config.compositor.font_path = config.render.font_path.clone().map(Into::into);
    pipeline_config.alerts.cooldown_seconds = config.engine.alert_cooldown_seconds;
    let decoder = DecoderSettings {
        ffmpeg_bin: config.capture.ffmpeg_bin.clone(),
        ffprobe_bin: config.capture.ffprobe_bin.clone(),
    };

    let alert_log = Arc::new(AlertLog::new(
        config.alerts.memory_capacity,
        config.alerts.persist_count,
        config.alerts.persist_path.clone().map(Into::into),
    ));
    let controller = Arc::new(SessionController::new(
        config.engine.clone(),
        session_config,
        pipeline_config,
        decoder,
        vec![alert_log.clone() as Arc<dyn EventSink>],
    ));

    if let Some(source) = cli.source {
        let request = StartRequest {
            source,
            threshold: cli.threshold,
            opacity: cli.opacity,
            cooldown_seconds: cli.cooldown,
        };
        if let Err(e) = controller.start(request) {
            tracing::error!("Failed to start session: {}", e);
            process::exit(1);
        }
    }

    tracing::info!(
        host = %host,
        port = %port,
        site_id = %config.engine.site_id,
        "Application configured and ready"
    );

    let state = AppState::new(controller, alert_log);
    let server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .configure(configure_routes)
    })
    .bind((host.as_str(), port));

    let server = match server {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("Failed to bind {}:{}: {}", host, port, e);
            process::exit(1);
        }
    };

    if let Err(e) = server.run().await {
        tracing::error!("Server error: {}", e);
        process::exit(1);
    }
}

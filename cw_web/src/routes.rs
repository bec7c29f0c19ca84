//! ABOUTME: Route handlers for the frame sink, stats snapshot, alerts, and control
//! ABOUTME: MJPEG multipart streaming plus JSON start/stop/params endpoints

use crate::AppState;
use actix_web::{web, HttpResponse, Result as ActixResult};
use cw_core::Error;
use cw_engine::StartRequest;
use cw_stream::MjpegStream;
use serde::Deserialize;
use tracing::{info, instrument, warn};

/// Default and maximum number of alerts returned by the listing endpoint
const ALERTS_DEFAULT_LIMIT: usize = 50;
const ALERTS_MAX_LIMIT: usize = 1000;

#[derive(Debug, Deserialize)]
pub struct StartBody {
    pub source: String,
    pub threshold: Option<f64>,
    pub opacity: Option<f64>,
    pub cooldown_seconds: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct ParamsBody {
    pub threshold: f64,
    pub opacity: f64,
}

#[derive(Debug, Deserialize)]
pub struct AlertsQuery {
    pub limit: Option<usize>,
}

/// Continuously-replacing multipart JPEG stream of the latest composited
/// frame. Clients connected before a session starts receive frames as soon
/// as the loop publishes them.
#[instrument(skip(state))]
pub async fn mjpeg_feed(state: web::Data<AppState>) -> ActixResult<HttpResponse> {
    let controller = &state.controller;
    let stream = MjpegStream::new(controller.frame_cell(), controller.metrics());

    Ok(HttpResponse::Ok()
        .content_type(stream.content_type())
        .insert_header(("Cache-Control", "no-cache, no-store, must-revalidate"))
        .insert_header(("Pragma", "no-cache"))
        .insert_header(("Connection", "keep-alive"))
        .streaming(stream))
}

/// Structured snapshot for programmatic polling
pub async fn stats(state: web::Data<AppState>) -> ActixResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(state.controller.snapshot()))
}

/// Most recent alert events, newest first
pub async fn alerts(
    state: web::Data<AppState>,
    query: web::Query<AlertsQuery>,
) -> ActixResult<HttpResponse> {
    let limit = query
        .limit
        .unwrap_or(ALERTS_DEFAULT_LIMIT)
        .min(ALERTS_MAX_LIMIT);
    Ok(HttpResponse::Ok().json(state.alert_log.recent(limit)))
}

/// Begin a session for the requested source
#[instrument(skip(state, body))]
pub async fn start(
    state: web::Data<AppState>,
    body: web::Json<StartBody>,
) -> ActixResult<HttpResponse> {
    let request = StartRequest {
        source: body.source.clone(),
        threshold: body.threshold,
        opacity: body.opacity,
        cooldown_seconds: body.cooldown_seconds,
    };
    info!(source = %request.source, "Start requested");

    let controller = state.controller.clone();
    let outcome = web::block(move || controller.start(request))
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;

    match outcome {
        Ok(()) => Ok(HttpResponse::Ok().json(serde_json::json!({ "status": "started" }))),
        Err(e @ Error::CannotOpen(_)) => {
            warn!(error = %e, "Start rejected");
            Ok(HttpResponse::BadRequest().json(serde_json::json!({ "error": e.to_string() })))
        }
        Err(e) => {
            warn!(error = %e, "Start failed");
            Ok(HttpResponse::InternalServerError()
                .json(serde_json::json!({ "error": e.to_string() })))
        }
    }
}

/// Halt the active session
#[instrument(skip(state))]
pub async fn stop(state: web::Data<AppState>) -> ActixResult<HttpResponse> {
    let controller = state.controller.clone();
    web::block(move || controller.stop())
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "status": "stopped" })))
}

/// Update live parameters; out-of-range values are clamped, never rejected
pub async fn params(
    state: web::Data<AppState>,
    body: web::Json<ParamsBody>,
) -> ActixResult<HttpResponse> {
    state.controller.update_params(body.threshold, body.opacity);
    let (threshold, opacity) = state.controller.current_params();
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "threshold": threshold,
        "opacity": opacity,
    })))
}

/// Configure all routes
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/stream.mjpg", web::get().to(mjpeg_feed))
        .route("/api/stats", web::get().to(stats))
        .route("/api/alerts", web::get().to(alerts))
        .route("/api/start", web::post().to(start))
        .route("/api/stop", web::post().to(stop))
        .route("/api/params", web::post().to(params));
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, App};
    use cw_capture::DecoderSettings;
    use cw_config::EngineDefaults;
    use cw_engine::{AlertLog, EventSink, PipelineConfig, SessionConfig, SessionController};
    use std::sync::Arc;

    fn test_state() -> AppState {
        let defaults = EngineDefaults {
            density_threshold: 0.45,
            heatmap_opacity: 0.70,
            alert_cooldown_seconds: 3.0,
            site_id: "site-test".to_string(),
        };
        let alert_log = Arc::new(AlertLog::new(1000, 100, None));
        let controller = Arc::new(SessionController::new(
            defaults,
            SessionConfig::default(),
            PipelineConfig::default(),
            DecoderSettings {
                // Guaranteed-missing binaries so start attempts fail fast
                ffmpeg_bin: "/nonexistent/ffmpeg".to_string(),
                ffprobe_bin: "/nonexistent/ffprobe".to_string(),
            },
            vec![alert_log.clone() as Arc<dyn EventSink>],
        ));
        AppState::new(controller, alert_log)
    }

    #[actix_web::test]
    async fn test_stats_endpoint_shape() {
        let state = test_state();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/stats").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["running"], false);
        assert_eq!(body["density"], 0.0);
        assert_eq!(body["total_alerts"], 0);
        assert!(body.get("peak_density").is_some());
        assert!(body.get("avg_density").is_some());
        assert!(body.get("alert_active").is_some());
    }

    #[actix_web::test]
    async fn test_alerts_endpoint_empty() {
        let state = test_state();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/alerts").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert!(body.as_array().unwrap().is_empty());
    }

    #[actix_web::test]
    async fn test_start_with_unopenable_source_is_rejected() {
        let state = test_state();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/start")
            .set_json(serde_json::json!({ "source": "/nonexistent/clip.mp4" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
    }

    #[actix_web::test]
    async fn test_stop_without_session_is_ok() {
        let state = test_state();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::post().uri("/api/stop").to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
    }

    #[actix_web::test]
    async fn test_params_are_clamped() {
        let state = test_state();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/params")
            .set_json(serde_json::json!({ "threshold": 2.5, "opacity": 0.0 }))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["threshold"], 1.0);
        assert_eq!(body["opacity"], 0.3);
    }

    #[actix_web::test]
    async fn test_mjpeg_feed_headers() {
        let state = test_state();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/stream.mjpg").to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
        let content_type = resp
            .headers()
            .get("content-type")
            .unwrap()
            .to_str()
            .unwrap();
        assert!(content_type.starts_with("multipart/x-mixed-replace"));
    }
}

use axum::{
    http::{HeaderName, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::controllers::{
    chat::ChatController,
    health::{self, Readiness},
    usage::UsageController,
    voice::VoiceController,
};
use crate::domain::visitor::VISITOR_ID_HEADER;
use crate::infrastructure::config::Config;
use crate::infrastructure::visitor::{request_id_middleware, visitor_middleware, X_REQUEST_ID};

/// Everything the router hands requests to
pub struct AppControllers {
    pub readiness: Arc<Readiness>,
    pub usage: Arc<UsageController>,
    pub chat: Arc<ChatController>,
    pub voice: Arc<VoiceController>,
}

/// Build the application router. Tests serve this same router.
pub fn build_router(config: Arc<Config>, controllers: AppControllers) -> Router {
    // Usage routes
    let usage_routes = Router::new()
        .route("/api/usage", get(UsageController::get_usage))
        .route("/api/usage/check", post(UsageController::check))
        .route(
            "/api/usage/session",
            axum::routing::delete(UsageController::end_session),
        )
        .with_state(controllers.usage);

    // Chat routes
    let chat_routes = Router::new()
        .route(
            "/api/chat/conversations",
            post(ChatController::start_conversation),
        )
        .route(
            "/api/chat/conversations/:id",
            axum::routing::delete(ChatController::end_conversation),
        )
        .route(
            "/api/chat/conversations/:id/messages",
            post(ChatController::send_message),
        )
        .with_state(controllers.chat);

    // Voice routes
    let voice_routes = Router::new()
        .route("/api/voice/speak", post(VoiceController::speak))
        .route(
            "/api/voice/audio/:id",
            get(VoiceController::get_audio).delete(VoiceController::stop_audio),
        )
        .route("/api/voice/audio/:id/ended", post(VoiceController::audio_ended))
        .with_state(controllers.voice);

    // Every API call is scoped to a visitor
    let api_routes = Router::new()
        .merge(usage_routes)
        .merge(chat_routes)
        .merge(voice_routes)
        .layer(middleware::from_fn_with_state(
            config.clone(),
            visitor_middleware,
        ));

    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::health_ready))
        .with_state(controllers.readiness)
        .merge(api_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&config))
                .layer(middleware::from_fn(request_id_middleware)),
        )
}

fn cors_layer(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    let allow_origin = if origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            HeaderName::from_static(VISITOR_ID_HEADER),
            HeaderName::from_static(X_REQUEST_ID),
        ])
        .expose_headers([
            axum::http::header::RETRY_AFTER,
            HeaderName::from_static(X_REQUEST_ID),
        ])
}

/// Start the HTTP server with all routes configured
pub async fn start_http_server(
    config: Arc<Config>,
    controllers: AppControllers,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = build_router(config.clone(), controllers);

    let listener =
        tokio::net::TcpListener::bind(format!("{}:{}", config.host, config.port)).await?;

    tracing::info!("Server listening on {}", listener.local_addr()?);

    // Peer addresses feed visitor identification
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

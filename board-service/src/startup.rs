use crate::config::{BoardConfig, StoreBackend};
use crate::handlers;
use crate::services::{
    AuthService, BoardService, EntityStore, JwtSessionGate, MemoryStore, MongoStore,
    ServiceError, SessionGate,
};
use axum::{
    http::Request,
    middleware,
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    request_id_middleware, security_headers_middleware, REQUEST_ID_HEADER,
};
use service_core::retry::RetryConfig;
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{field, Span};

#[derive(Clone)]
pub struct AppState {
    pub config: BoardConfig,
    pub store: Arc<dyn EntityStore>,
    pub sessions: Arc<dyn SessionGate>,
    pub boards: BoardService,
    pub auth: AuthService,
}

impl AppState {
    /// Wire the services around an already connected store.
    pub fn new(config: BoardConfig, store: Arc<dyn EntityStore>) -> Self {
        let sessions: Arc<dyn SessionGate> = Arc::new(JwtSessionGate::new(
            &config.session.secret,
            config.session.ttl_days,
        ));
        let retry = RetryConfig::with_max_retries(config.max_retries);

        Self {
            boards: BoardService::new(store.clone(), retry),
            auth: AuthService::new(store.clone(), sessions.clone()),
            config,
            store,
            sessions,
        }
    }
}

/// Open the configured store. Mongo connections also get their indexes.
pub async fn connect_store(config: &BoardConfig) -> Result<Arc<dyn EntityStore>, AppError> {
    match (config.store, &config.mongodb) {
        (StoreBackend::Memory, _) => {
            tracing::warn!("Using in-memory entity store; data is lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
        (StoreBackend::Mongo, Some(mongo)) => {
            let store = MongoStore::connect(&mongo.uri, &mongo.database)
                .await
                .map_err(|e| AppError::from(ServiceError::from(e)))?;
            store.initialize_indexes().await.map_err(|e| {
                tracing::error!("Failed to initialize database indexes: {}", e);
                AppError::from(ServiceError::from(e))
            })?;
            Ok(Arc::new(store))
        }
        (StoreBackend::Mongo, None) => Err(AppError::ConfigError(anyhow::anyhow!(
            "MONGODB_URI is required for the mongo store backend"
        ))),
    }
}

pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/auth/signup", post(handlers::auth::signup))
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/logout", post(handlers::auth::logout))
        .route(
            "/boards",
            get(handlers::boards::list_boards).post(handlers::boards::create_board),
        )
        .route(
            "/boards/:board_id",
            get(handlers::boards::get_board)
                .put(handlers::boards::update_board)
                .delete(handlers::boards::delete_board),
        )
        .route(
            "/boards/:board_id/lists",
            get(handlers::lists::list_lists).post(handlers::lists::create_list),
        )
        .route(
            "/boards/:board_id/lists/:list_id",
            axum::routing::put(handlers::lists::update_list).delete(handlers::lists::delete_list),
        )
        .route(
            "/boards/:board_id/lists/:list_id/move",
            post(handlers::lists::move_list),
        )
        .route(
            "/lists/:list_id/cards",
            get(handlers::cards::list_cards).post(handlers::cards::create_card),
        )
        .route(
            "/lists/:list_id/cards/:card_id",
            axum::routing::put(handlers::cards::update_card).delete(handlers::cards::delete_card),
        )
        .route(
            "/lists/:list_id/cards/:card_id/move",
            post(handlers::cards::move_card),
        );

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_endpoint))
        .nest("/api", api)
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(http_request_span))
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}

/// Request span. `user_id` and `username` are filled in once a session
/// cookie has been validated.
pub fn http_request_span<B>(request: &Request<B>) -> Span {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("-");

    tracing::info_span!(
        "http_request",
        request_id = %request_id,
        method = %request.method(),
        uri = %request.uri(),
        version = ?request.version(),
        user_id = field::Empty,
        username = field::Empty,
    )
}

pub struct Application {
    port: u16,
    server: Box<dyn std::future::Future<Output = std::io::Result<()>> + Send + Unpin>,
    state: AppState,
}

impl Application {
    pub async fn build(config: BoardConfig) -> Result<Self, AppError> {
        let store = connect_store(&config).await?;
        let state = AppState::new(config.clone(), store);
        let app = build_router(state.clone());

        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Listening on {}", port);

        let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());

        Ok(Self {
            port,
            server: Box::new(server.into_future()),
            state,
        })
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        self.server.await
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtos::auth::{LoginRequest, SignupRequest};
    use axum::body::Body;
    use axum::http::{header, StatusCode};
    use std::sync::Mutex;
    use tower::util::ServiceExt;
    use tracing::field::{Field, Visit};
    use tracing::span::{Id, Record};
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

    #[derive(Clone, Default)]
    struct RecordedFields(Arc<Mutex<Vec<(String, String)>>>);

    impl RecordedFields {
        fn value_of(&self, name: &str) -> Option<String> {
            self.0
                .lock()
                .unwrap()
                .iter()
                .find(|(field, _)| field == name)
                .map(|(_, value)| value.clone())
        }
    }

    impl Visit for RecordedFields {
        fn record_str(&mut self, field: &Field, value: &str) {
            self.0
                .lock()
                .unwrap()
                .push((field.name().to_string(), value.to_string()));
        }

        fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
            self.0
                .lock()
                .unwrap()
                .push((field.name().to_string(), format!("{:?}", value)));
        }
    }

    impl<S: tracing::Subscriber> Layer<S> for RecordedFields {
        fn on_record(&self, _id: &Id, values: &Record<'_>, _ctx: Context<'_, S>) {
            let mut visitor = self.clone();
            values.record(&mut visitor);
        }
    }

    #[tokio::test]
    async fn session_user_is_recorded_on_request_span() {
        let state = AppState::new(
            BoardConfig::for_memory("span-test-secret"),
            Arc::new(MemoryStore::new()),
        );
        let user = state
            .auth
            .signup(SignupRequest {
                username: "ada".to_string(),
                email: "ada@example.com".to_string(),
                password: "long enough".to_string(),
            })
            .await
            .unwrap();
        let (_, token) = state
            .auth
            .login(LoginRequest {
                email: "ada@example.com".to_string(),
                password: "long enough".to_string(),
            })
            .await
            .unwrap();

        let recorded = RecordedFields::default();
        let subscriber = tracing_subscriber::registry().with(recorded.clone());
        let _guard = tracing::subscriber::set_default(subscriber);

        let response = build_router(state)
            .oneshot(
                Request::builder()
                    .uri("/api/boards")
                    .header(header::COOKIE, format!("session={}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(recorded.value_of("user_id"), Some(user.id));
        assert_eq!(recorded.value_of("username"), Some("ada".to_string()));
    }
}

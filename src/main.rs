mod core;
mod features;
mod modules;
mod shared;

use crate::core::config::Config;
use crate::core::middleware::WorkerCredential;
use crate::core::openapi::{ApiDoc, SwaggerInfoModifier};
use crate::core::{database, middleware};
use crate::features::auth;
use crate::features::documents::{
    routes as documents_routes, DocumentService, IngestionService, PgDocumentStore,
};
use crate::features::dossiers::{
    routes as dossiers_routes, DossierLinkService, PgDossierStore, TimelineService,
};
use crate::features::ocr::{
    routes as ocr_routes, OcrJobService, OcrTriggerClient, StatusCache, StatusSynchronizer,
    StoreStatusSource, TriggerDispatcher, TriggerSweeper,
};
use crate::modules::log_sink::{LogSink, PgLogStore};
use axum::{middleware::from_fn, Router};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::Modify;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

fn main() -> anyhow::Result<()> {
    // Build Tokio runtime with configurable worker threads
    let worker_threads = std::env::var("TOKIO_WORKER_THREADS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|p| p.get())
                .unwrap_or(4)
        });

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(worker_threads)
        .max_blocking_threads(worker_threads * 4)
        .enable_all()
        .build()?;

    runtime.block_on(async_main(worker_threads))
}

async fn async_main(worker_threads: usize) -> anyhow::Result<()> {
    // Load .env file BEFORE initializing logger so RUST_LOG is available
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().map_err(|e| anyhow::anyhow!(e))?;

    tracing::info!(
        "System info: tokio_worker_threads={}, pid={}",
        worker_threads,
        std::process::id()
    );
    tracing::info!("Configuration loaded successfully");

    let pool = database::create_pool(&config.database).await?;
    tracing::info!("Database connection pool created");

    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| anyhow::anyhow!("Migration failed: {}", e))?;
    tracing::info!("Database migrations completed successfully");

    // Initialize auth
    let jwks_client = Arc::new(auth::JwksClient::new(
        &config.auth.jwks_url,
        config.auth.jwks_cache_ttl,
    ));
    let jwt_validator = Arc::new(auth::JwtValidator::new(
        jwks_client,
        config.auth.issuer.clone(),
        config.auth.audience.clone(),
        config.auth.jwt_leeway,
    ));
    tracing::info!("Auth configuration initialized");

    // Blob storage (bucket is created on first start)
    let minio_client = Arc::new(
        modules::storage::MinIOClient::new(config.minio.clone())
            .await
            .map_err(|e| anyhow::anyhow!("Failed to initialize MinIO client: {}", e))?,
    );
    tracing::info!("MinIO client initialized for bucket: {}", config.minio.bucket);

    // Operational log sink, flushed in batches to app_logs
    let (log_sink, log_sink_handle) =
        LogSink::start(Arc::new(PgLogStore::new(pool.clone())), &config.log_sink);
    tracing::info!("Log sink started");

    let document_store = Arc::new(PgDocumentStore::new(pool.clone()));
    let dossier_store = Arc::new(PgDossierStore::new(pool.clone()));

    // OCR job plumbing
    let trigger_client = Arc::new(
        OcrTriggerClient::new(&config.ocr)
            .map_err(|e| anyhow::anyhow!("Failed to create OCR trigger client: {}", e))?,
    );
    let dispatcher = TriggerDispatcher::new(trigger_client, log_sink.clone());
    let status_cache = Arc::new(StatusCache::new());
    let synchronizer = Arc::new(StatusSynchronizer::new(
        Arc::new(StoreStatusSource::new(document_store.clone())),
        Arc::clone(&status_cache),
        &config.sync,
    ));
    let ocr_job_service = Arc::new(OcrJobService::new(
        document_store.clone(),
        dispatcher.clone(),
        Arc::clone(&status_cache),
        log_sink.clone(),
    ));
    tracing::info!(
        "OCR services initialized (functions host: {})",
        config.ocr.functions_base_url
    );

    let ingestion_service = Arc::new(IngestionService::new(
        document_store.clone(),
        minio_client,
        dispatcher.clone(),
        log_sink.clone(),
    ));
    let document_service = Arc::new(DocumentService::new(document_store.clone()));
    tracing::info!("Document services initialized");

    let dossier_link_service = Arc::new(DossierLinkService::new(
        dossier_store.clone(),
        document_store.clone(),
    ));
    let timeline_service = Arc::new(TimelineService::new(dossier_store));
    tracing::info!("Dossier services initialized");

    // Re-send triggers for jobs that sat queued too long
    let shutdown = CancellationToken::new();
    let sweeper = TriggerSweeper::new(document_store, dispatcher, &config.ocr);
    let sweeper_task = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            sweeper.run(shutdown).await;
        })
    };
    tracing::info!("OCR trigger sweeper spawned");

    // Build application router with dynamic swagger config
    let swagger_modifier = SwaggerInfoModifier {
        title: config.swagger.title.clone(),
        version: config.swagger.version.clone(),
        description: config.swagger.description.clone(),
    };

    let mut openapi = ApiDoc::openapi();
    swagger_modifier.modify(&mut openapi);

    let swagger = if let Some(credentials) = config.swagger.credentials() {
        tracing::info!("Swagger UI basic auth enabled");
        Router::new()
            .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi))
            .layer(from_fn(middleware::basic_auth_middleware(Arc::new(
                credentials,
            ))))
    } else {
        tracing::info!("Swagger UI basic auth disabled (no credentials configured)");
        Router::new().merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi))
    };

    // Protected routes (require JWT authentication)
    let protected_routes = Router::new()
        .merge(documents_routes::routes(
            ingestion_service,
            Arc::clone(&document_service),
        ))
        .merge(ocr_routes::routes(
            Arc::clone(&ocr_job_service),
            synchronizer,
            document_service,
        ))
        .merge(dossiers_routes::routes(dossier_link_service, timeline_service))
        .route_layer(axum::middleware::from_fn_with_state(
            jwt_validator.clone(),
            middleware::auth_middleware,
        ));

    // Worker callbacks carry their own credential instead of a user token
    let worker_routes = ocr_routes::worker_routes(
        ocr_job_service,
        WorkerCredential(Arc::new(config.ocr.worker_token.clone())),
    );

    // Simple health check endpoint (no auth required)
    async fn health_check() -> axum::http::StatusCode {
        axum::http::StatusCode::OK
    }
    let health_route = Router::new().route("/health", axum::routing::get(health_check));

    let app = Router::new()
        .merge(swagger)
        .merge(protected_routes)
        .merge(worker_routes)
        .merge(health_route)
        .layer(middleware::cors_layer(
            config.app.cors_allowed_origins.clone(),
        ))
        // Propagate X-Request-Id to response headers
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(middleware::MakeSpanWithRequestId)
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Generate X-Request-Id using UUID v7 (or use client-provided one)
        .layer(SetRequestIdLayer::x_request_id(middleware::MakeRequestUuid));

    // Start server
    let addr = config.app.server_address();
    let socket_addr: std::net::SocketAddr = addr
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid address: {}", e))?;

    // Use socket2 for TCP listener configuration
    let socket = socket2::Socket::new(
        socket2::Domain::for_address(socket_addr),
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;

    socket.set_reuse_address(true)?;
    #[cfg(unix)]
    socket.set_reuse_port(true)?;
    socket.set_nodelay(true)?;

    #[cfg(target_os = "linux")]
    {
        let keepalive = socket2::TcpKeepalive::new()
            .with_time(std::time::Duration::from_secs(60))
            .with_interval(std::time::Duration::from_secs(10))
            .with_retries(3);
        socket.set_tcp_keepalive(&keepalive)?;
    }
    #[cfg(not(target_os = "linux"))]
    {
        let keepalive = socket2::TcpKeepalive::new().with_time(std::time::Duration::from_secs(60));
        socket.set_tcp_keepalive(&keepalive)?;
    }

    socket.set_nonblocking(true)?;
    socket.bind(&socket_addr.into())?;
    socket.listen(1024)?;

    let listener = tokio::net::TcpListener::from_std(socket.into())?;
    tracing::info!("Server listening on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui/", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped, draining background work");
    shutdown.cancel();
    if let Err(e) = sweeper_task.await {
        tracing::warn!("OCR trigger sweeper ended abnormally: {}", e);
    }
    log_sink_handle.shutdown().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

mod auth;
mod config;
mod directory;
mod engine;
mod errors;
mod handlers;
mod labs;
mod ledger;
mod locks;
mod logging;
mod memory;
mod metrics;
mod middleware;
mod models;
mod registry;
mod repository;

use crate::config::Settings;
use crate::directory::PatientDirectory;
use crate::engine::AtdEngine;
use crate::handlers::AppState;
use crate::labs::LabTracker;
use crate::locks::LockManager;
use crate::memory::MemoryRepository;
use crate::middleware::{AuditLogger, RequestId};
use crate::repository::Repository;
use actix_cors::Cors;
use actix_web::{http::header, middleware::Logger, web, App, HttpServer};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();

    // Load configuration
    let settings = Settings::new().expect("Failed to load configuration");

    // Initialize logging
    let log_dir = std::path::Path::new(&settings.logging.audit_log_path)
        .parent()
        .unwrap_or(std::path::Path::new("./logs"));

    logging::init_logging(log_dir, &settings.logging.level)
        .expect("Failed to initialize logging");

    info!("🚀 PatientFlow Backend starting...");
    info!("Configuration loaded: {}", settings.server.bind_addr);

    // Initialize metrics
    metrics::init_metrics().expect("Failed to initialize metrics");

    // Build the record store and the flow services around it
    let repo: Arc<dyn Repository> = Arc::new(MemoryRepository::new());
    let locks = Arc::new(LockManager::new(Duration::from_millis(
        settings.engine.lock_wait_ms,
    )));
    let engine = Arc::new(AtdEngine::new(repo.clone(), locks.clone()));
    let labs = Arc::new(LabTracker::new(repo.clone(), locks.clone()));
    let directory = Arc::new(PatientDirectory::new(repo.clone()));
    let jwt_auth = Arc::new(auth::JwtAuth::new(&settings.jwt));

    // Create app state
    let app_state = web::Data::new(AppState {
        repo: repo.clone(),
        engine: engine.clone(),
        labs: labs.clone(),
        directory: directory.clone(),
        jwt_auth: jwt_auth.clone(),
    });

    info!("✅ All services initialized successfully");
    info!("🌐 Starting server on {}", settings.server.bind_addr);

    let bind_addr = settings.server.bind_addr.clone();
    let cors_origins = settings.cors.allowed_origins.clone();

    HttpServer::new(move || {
        // CORS configuration
        let mut cors = Cors::default()
            .allowed_methods(vec!["GET", "POST", "OPTIONS"])
            .allowed_headers(vec![
                header::CONTENT_TYPE,
                header::AUTHORIZATION,
                header::ACCEPT,
            ])
            .supports_credentials()
            .max_age(3600);

        for origin in &cors_origins {
            cors = cors.allowed_origin(origin);
        }

        App::new()
            // Middleware
            .wrap(Logger::default())
            .wrap(AuditLogger)
            .wrap(RequestId)
            .wrap(cors)
            // App state
            .app_data(app_state.clone())
            // Health check & metrics
            .route("/health", web::get().to(handlers::health_check))
            .route("/metrics", web::get().to(metrics::metrics_handler))
            // Authentication routes
            .route("/api/auth/signup", web::post().to(handlers::signup))
            .route("/api/auth/login", web::post().to(handlers::login))
            .route("/api/auth/logout", web::post().to(handlers::logout))
            // Patient records
            .route("/api/patients", web::post().to(handlers::create_patient))
            .route("/api/patients", web::get().to(handlers::list_patients))
            .route("/api/patients/{id}", web::get().to(handlers::get_patient))
            // Ward & bed inventory
            .route("/api/wards", web::post().to(handlers::register_ward))
            .route("/api/wards", web::get().to(handlers::list_wards))
            .route("/api/wards/{id}/beds", web::get().to(handlers::ward_beds))
            .route("/api/beds/{id}", web::get().to(handlers::get_bed))
            // Admissions
            .route("/api/admissions", web::post().to(handlers::admit))
            .route("/api/admissions", web::get().to(handlers::list_admissions))
            .route("/api/admissions/{id}", web::get().to(handlers::get_admission))
            // Transfers
            .route("/api/transfers", web::post().to(handlers::transfer))
            .route("/api/transfers", web::get().to(handlers::list_transfers))
            // Lab tests & results
            .route("/api/lab/tests", web::post().to(handlers::order_lab_test))
            .route("/api/lab/tests", web::get().to(handlers::list_lab_orders))
            .route(
                "/api/lab/tests/{id}/cancel",
                web::post().to(handlers::cancel_lab_order),
            )
            .route("/api/lab/results", web::post().to(handlers::record_lab_result))
            .route(
                "/api/lab/results/{order_id}",
                web::get().to(handlers::get_lab_result),
            )
            // Discharges
            .route("/api/discharges", web::post().to(handlers::discharge))
    })
    .workers(settings.server.workers.unwrap_or(4))
    .bind(bind_addr)?
    .run()
    .await
}

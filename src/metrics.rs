use actix_web::{HttpResponse, Responder};
use lazy_static::lazy_static;
use prometheus::{
    Encoder, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // Request metrics
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("http_requests_total", "Total number of HTTP requests"),
        &["method", "endpoint", "status"]
    ).unwrap();

    pub static ref HTTP_REQUEST_DURATION: HistogramVec = HistogramVec::new(
        prometheus::HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request duration in seconds"
        ),
        &["method", "endpoint"]
    ).unwrap();

    // Authentication metrics
    pub static ref AUTH_ATTEMPTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("auth_attempts_total", "Total authentication attempts"),
        &["result"] // "success" or "failure"
    ).unwrap();

    // Patient-flow metrics
    pub static ref ADMISSIONS_TOTAL: IntCounter = IntCounter::new(
        "admissions_total",
        "Total successful admissions"
    ).unwrap();

    pub static ref TRANSFERS_TOTAL: IntCounter = IntCounter::new(
        "transfers_total",
        "Total successful inter-ward transfers"
    ).unwrap();

    pub static ref DISCHARGES_TOTAL: IntCounter = IntCounter::new(
        "discharges_total",
        "Total successful discharges"
    ).unwrap();

    pub static ref OCCUPIED_BEDS: IntGauge = IntGauge::new(
        "occupied_beds",
        "Number of beds currently occupied"
    ).unwrap();

    pub static ref FLOW_ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("flow_errors_total", "Flow operation failures by error kind"),
        &["operation", "kind"]
    ).unwrap();

    pub static ref LOCK_CONFLICTS_TOTAL: IntCounter = IntCounter::new(
        "lock_conflicts_total",
        "Lock acquisitions abandoned after exceeding the wait bound"
    ).unwrap();

    // Lab metrics
    pub static ref LAB_ORDERS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("lab_orders_total", "Lab order state transitions"),
        &["state"] // "ordered", "resulted", "cancelled"
    ).unwrap();
}

/// Initialize Prometheus metrics
pub fn init_metrics() -> Result<(), prometheus::Error> {
    REGISTRY.register(Box::new(HTTP_REQUESTS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(HTTP_REQUEST_DURATION.clone()))?;
    REGISTRY.register(Box::new(AUTH_ATTEMPTS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(ADMISSIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(TRANSFERS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(DISCHARGES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(OCCUPIED_BEDS.clone()))?;
    REGISTRY.register(Box::new(FLOW_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(LOCK_CONFLICTS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(LAB_ORDERS_TOTAL.clone()))?;

    Ok(())
}

/// Prometheus metrics endpoint handler
pub async fn metrics_handler() -> impl Responder {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return HttpResponse::InternalServerError().body(format!("Failed to encode metrics: {}", e));
    }

    match String::from_utf8(buffer) {
        Ok(metrics) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(metrics),
        Err(e) => HttpResponse::InternalServerError().body(format!("Failed to convert metrics: {}", e)),
    }
}

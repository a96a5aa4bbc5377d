use crate::audit_log;
use crate::auth::{extract_bearer_token, JwtAuth};
use crate::directory::PatientDirectory;
use crate::engine::AtdEngine;
use crate::errors::FlowError;
use crate::labs::LabTracker;
use crate::metrics::{AUTH_ATTEMPTS_TOTAL, FLOW_ERRORS_TOTAL};
use crate::models::*;
use crate::repository::{Repository, UnitOfWork};
use actix_web::{web, HttpRequest, HttpResponse, Responder};
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::Utc;
use rand::rngs::OsRng;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

pub struct AppState {
    pub repo: Arc<dyn Repository>,
    pub engine: Arc<AtdEngine>,
    pub labs: Arc<LabTracker>,
    pub directory: Arc<PatientDirectory>,
    pub jwt_auth: Arc<JwtAuth>,
}

/// Maps a flow error to its transport status: 400 validation, 404 not found,
/// 409 conflict (retryable), 422 stale state, 500 internal.
fn flow_error_response(operation: &str, err: &FlowError) -> HttpResponse {
    FLOW_ERRORS_TOTAL
        .with_label_values(&[operation, err.kind()])
        .inc();
    let body = serde_json::json!({"error": err.to_string(), "kind": err.kind()});
    match err {
        FlowError::Validation(_) => HttpResponse::BadRequest().json(body),
        FlowError::NotFound { .. } => HttpResponse::NotFound().json(body),
        FlowError::Conflict(_) => HttpResponse::Conflict().json(body),
        FlowError::State(_) => HttpResponse::UnprocessableEntity().json(body),
        FlowError::Internal(_) => HttpResponse::InternalServerError().json(body),
    }
}

/// Validates the Bearer token on a protected route.
fn authenticate(req: &HttpRequest, state: &AppState) -> Result<Claims, HttpResponse> {
    let auth_header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok());

    let token = match extract_bearer_token(auth_header) {
        Ok(t) => t,
        Err(_) => {
            return Err(HttpResponse::Unauthorized().json(serde_json::json!({"error": "Missing token"})))
        }
    };

    let claims = match state.jwt_auth.validate_token(&token) {
        Ok(c) => c,
        Err(_) => {
            return Err(HttpResponse::Unauthorized().json(serde_json::json!({"error": "Invalid token"})))
        }
    };

    if state.jwt_auth.is_token_revoked(claims.jti) {
        return Err(HttpResponse::Unauthorized().json(serde_json::json!({"error": "Token revoked"})));
    }

    Ok(claims)
}

// ============ Health Check ============

pub async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let store_ok = state.repo.list_wards().await.is_ok();

    if store_ok {
        HttpResponse::Ok().json(serde_json::json!({
            "status": "healthy",
            "store": "available",
            "timestamp": Utc::now().to_rfc3339()
        }))
    } else {
        HttpResponse::ServiceUnavailable().json(serde_json::json!({
            "status": "unhealthy",
            "store": "unavailable"
        }))
    }
}

// ============ Authentication Handlers ============

pub async fn signup(state: web::Data<AppState>, body: web::Json<SignupRequest>) -> impl Responder {
    // Validate input
    if let Err(e) = body.validate() {
        return HttpResponse::BadRequest().json(serde_json::json!({"error": e.to_string()}));
    }

    let email = body.email.trim().to_lowercase();

    // Check if user already exists
    match state.repo.find_user_by_email(&email).await {
        Ok(Some(_)) => {
            return HttpResponse::Conflict().json(serde_json::json!({"error": "User already exists"}))
        }
        Ok(None) => {}
        Err(e) => return flow_error_response("signup", &e),
    }

    // Hash password
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = match argon2.hash_password(body.password.as_bytes(), &salt) {
        Ok(hash) => hash.to_string(),
        Err(_) => {
            return HttpResponse::InternalServerError()
                .json(serde_json::json!({"error": "Password hashing failed"}))
        }
    };

    let user = User {
        id: Uuid::new_v4(),
        email: email.clone(),
        password_hash,
        role: "clerk".to_string(),
        created_at: Utc::now(),
    };

    let mut uow = match state.repo.begin().await {
        Ok(u) => u,
        Err(e) => return flow_error_response("signup", &e),
    };
    uow.put_user(user.clone());
    if let Err(e) = uow.commit().await {
        return flow_error_response("signup", &e);
    }

    let token = match state.jwt_auth.generate_token(user.id, &user.email, &user.role) {
        Ok(t) => t,
        Err(_) => {
            return HttpResponse::InternalServerError()
                .json(serde_json::json!({"error": "Token generation failed"}))
        }
    };

    HttpResponse::Ok().json(AuthResponse {
        token,
        user: UserResponse {
            id: user.id,
            email: user.email,
            role: user.role,
        },
    })
}

pub async fn login(state: web::Data<AppState>, body: web::Json<LoginRequest>) -> impl Responder {
    if let Err(e) = body.validate() {
        return HttpResponse::BadRequest().json(serde_json::json!({"error": e.to_string()}));
    }

    let email = body.email.trim().to_lowercase();

    // Find user
    let user = match state.repo.find_user_by_email(&email).await {
        Ok(Some(u)) => u,
        _ => {
            AUTH_ATTEMPTS_TOTAL.with_label_values(&["failure"]).inc();
            return HttpResponse::Unauthorized()
                .json(serde_json::json!({"error": "Invalid credentials"}));
        }
    };

    // Verify password
    let parsed_hash = match PasswordHash::new(&user.password_hash) {
        Ok(h) => h,
        Err(_) => {
            return HttpResponse::InternalServerError()
                .json(serde_json::json!({"error": "Invalid password hash"}))
        }
    };

    let argon2 = Argon2::default();
    if argon2
        .verify_password(body.password.as_bytes(), &parsed_hash)
        .is_err()
    {
        AUTH_ATTEMPTS_TOTAL.with_label_values(&["failure"]).inc();
        audit_log!("authentication", "login", Some(user.id), false);
        return HttpResponse::Unauthorized().json(serde_json::json!({"error": "Invalid credentials"}));
    }

    let token = match state.jwt_auth.generate_token(user.id, &user.email, &user.role) {
        Ok(t) => t,
        Err(_) => {
            return HttpResponse::InternalServerError()
                .json(serde_json::json!({"error": "Token generation failed"}))
        }
    };

    AUTH_ATTEMPTS_TOTAL.with_label_values(&["success"]).inc();
    audit_log!("authentication", "login", Some(user.id), true);

    HttpResponse::Ok().json(AuthResponse {
        token,
        user: UserResponse {
            id: user.id,
            email: user.email,
            role: user.role,
        },
    })
}

pub async fn logout(req: HttpRequest, state: web::Data<AppState>) -> impl Responder {
    let auth_header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok());

    let token = match extract_bearer_token(auth_header) {
        Ok(t) => t,
        Err(_) => {
            return HttpResponse::Unauthorized().json(serde_json::json!({"error": "Missing token"}))
        }
    };

    let claims = match state.jwt_auth.validate_token(&token) {
        Ok(c) => c,
        Err(_) => {
            return HttpResponse::Unauthorized().json(serde_json::json!({"error": "Invalid token"}))
        }
    };

    state.jwt_auth.revoke_token(&claims);
    audit_log!("authentication", "logout", Some(claims.user_id), true);

    HttpResponse::Ok().json(serde_json::json!({"status": "logged_out"}))
}

// ============ Patient Handlers ============

pub async fn create_patient(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<NewPatientRequest>,
) -> impl Responder {
    if let Err(resp) = authenticate(&req, &state) {
        return resp;
    }
    if let Err(e) = body.validate() {
        return HttpResponse::BadRequest().json(serde_json::json!({"error": e.to_string()}));
    }

    match state.directory.create_patient(&body).await {
        Ok(patient) => HttpResponse::Created().json(patient),
        Err(e) => flow_error_response("create_patient", &e),
    }
}

pub async fn get_patient(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> impl Responder {
    if let Err(resp) = authenticate(&req, &state) {
        return resp;
    }

    match state.directory.get_patient(path.into_inner()).await {
        Ok(patient) => HttpResponse::Ok().json(patient),
        Err(e) => flow_error_response("get_patient", &e),
    }
}

pub async fn list_patients(req: HttpRequest, state: web::Data<AppState>) -> impl Responder {
    if let Err(resp) = authenticate(&req, &state) {
        return resp;
    }

    match state.directory.list_patients().await {
        Ok(patients) => HttpResponse::Ok().json(patients),
        Err(e) => flow_error_response("list_patients", &e),
    }
}

// ============ Ward & Bed Handlers ============

#[derive(Debug, Deserialize)]
pub struct BedFilter {
    pub status: Option<String>,
}

pub async fn register_ward(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<RegisterWardRequest>,
) -> impl Responder {
    if let Err(resp) = authenticate(&req, &state) {
        return resp;
    }
    if let Err(e) = body.validate() {
        return HttpResponse::BadRequest().json(serde_json::json!({"error": e.to_string()}));
    }

    match state
        .engine
        .registry()
        .register_ward(&body.name, body.bed_count)
        .await
    {
        Ok((ward, beds)) => HttpResponse::Created().json(serde_json::json!({
            "ward": ward,
            "beds": beds
        })),
        Err(e) => flow_error_response("register_ward", &e),
    }
}

pub async fn list_wards(req: HttpRequest, state: web::Data<AppState>) -> impl Responder {
    if let Err(resp) = authenticate(&req, &state) {
        return resp;
    }

    match state.engine.registry().list_wards().await {
        Ok(wards) => HttpResponse::Ok().json(wards),
        Err(e) => flow_error_response("list_wards", &e),
    }
}

pub async fn ward_beds(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    query: web::Query<BedFilter>,
) -> impl Responder {
    if let Err(resp) = authenticate(&req, &state) {
        return resp;
    }

    let ward_id = path.into_inner();
    let result = match query.status.as_deref() {
        Some("free") => state.engine.registry().available_beds(ward_id).await,
        None => state.engine.registry().beds_in_ward(ward_id).await,
        Some(other) => {
            return HttpResponse::BadRequest().json(serde_json::json!({
                "error": format!("unknown bed status filter: {}", other)
            }))
        }
    };

    match result {
        Ok(beds) => HttpResponse::Ok().json(beds),
        Err(e) => flow_error_response("ward_beds", &e),
    }
}

pub async fn get_bed(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> impl Responder {
    if let Err(resp) = authenticate(&req, &state) {
        return resp;
    }

    match state.engine.get_bed(path.into_inner()).await {
        Ok(bed) => HttpResponse::Ok().json(bed),
        Err(e) => flow_error_response("get_bed", &e),
    }
}

// ============ Admission Handlers ============

#[derive(Debug, Deserialize)]
pub struct AdmissionsQuery {
    pub ward_id: Uuid,
}

pub async fn admit(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<AdmitRequest>,
) -> impl Responder {
    let claims = match authenticate(&req, &state) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    match state.engine.admit(body.patient_id, body.bed_id).await {
        Ok(admission) => {
            audit_log!("patient_flow", "admit", Some(claims.user_id), true);
            HttpResponse::Created().json(admission)
        }
        Err(e) => flow_error_response("admit", &e),
    }
}

pub async fn get_admission(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> impl Responder {
    if let Err(resp) = authenticate(&req, &state) {
        return resp;
    }

    match state.engine.get_admission(path.into_inner()).await {
        Ok(admission) => HttpResponse::Ok().json(admission),
        Err(e) => flow_error_response("get_admission", &e),
    }
}

pub async fn list_admissions(
    req: HttpRequest,
    state: web::Data<AppState>,
    query: web::Query<AdmissionsQuery>,
) -> impl Responder {
    if let Err(resp) = authenticate(&req, &state) {
        return resp;
    }

    match state.engine.list_admissions_by_ward(query.ward_id).await {
        Ok(admissions) => HttpResponse::Ok().json(admissions),
        Err(e) => flow_error_response("list_admissions", &e),
    }
}

// ============ Transfer Handlers ============

#[derive(Debug, Deserialize)]
pub struct TransfersQuery {
    pub admission_id: Uuid,
}

pub async fn transfer(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<TransferRequest>,
) -> impl Responder {
    let claims = match authenticate(&req, &state) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    match state.engine.transfer(body.admission_id, body.to_bed_id).await {
        Ok(admission) => {
            audit_log!("patient_flow", "transfer", Some(claims.user_id), true);
            HttpResponse::Ok().json(admission)
        }
        Err(e) => flow_error_response("transfer", &e),
    }
}

pub async fn list_transfers(
    req: HttpRequest,
    state: web::Data<AppState>,
    query: web::Query<TransfersQuery>,
) -> impl Responder {
    if let Err(resp) = authenticate(&req, &state) {
        return resp;
    }

    match state.engine.transfers_for(query.admission_id).await {
        Ok(transfers) => HttpResponse::Ok().json(transfers),
        Err(e) => flow_error_response("list_transfers", &e),
    }
}

// ============ Lab Handlers ============

#[derive(Debug, Deserialize)]
pub struct LabOrdersQuery {
    pub admission_id: Uuid,
}

pub async fn order_lab_test(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<LabOrderRequest>,
) -> impl Responder {
    if let Err(resp) = authenticate(&req, &state) {
        return resp;
    }
    if let Err(e) = body.validate() {
        return HttpResponse::BadRequest().json(serde_json::json!({"error": e.to_string()}));
    }

    match state.labs.order(body.admission_id, &body.test_type).await {
        Ok(order) => HttpResponse::Created().json(order),
        Err(e) => flow_error_response("order_lab_test", &e),
    }
}

pub async fn list_lab_orders(
    req: HttpRequest,
    state: web::Data<AppState>,
    query: web::Query<LabOrdersQuery>,
) -> impl Responder {
    if let Err(resp) = authenticate(&req, &state) {
        return resp;
    }

    match state.labs.orders_for_admission(query.admission_id).await {
        Ok(orders) => HttpResponse::Ok().json(orders),
        Err(e) => flow_error_response("list_lab_orders", &e),
    }
}

pub async fn cancel_lab_order(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> impl Responder {
    if let Err(resp) = authenticate(&req, &state) {
        return resp;
    }

    match state.labs.cancel(path.into_inner()).await {
        Ok(order) => HttpResponse::Ok().json(order),
        Err(e) => flow_error_response("cancel_lab_order", &e),
    }
}

pub async fn record_lab_result(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<LabResultRequest>,
) -> impl Responder {
    if let Err(resp) = authenticate(&req, &state) {
        return resp;
    }

    match state
        .labs
        .record_result(body.order_id, body.value.clone())
        .await
    {
        Ok(result) => HttpResponse::Created().json(result),
        Err(e) => flow_error_response("record_lab_result", &e),
    }
}

pub async fn get_lab_result(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> impl Responder {
    if let Err(resp) = authenticate(&req, &state) {
        return resp;
    }

    match state.labs.result_for_order(path.into_inner()).await {
        Ok(Some(result)) => HttpResponse::Ok().json(result),
        Ok(None) => HttpResponse::NotFound()
            .json(serde_json::json!({"error": "No result recorded for this order"})),
        Err(e) => flow_error_response("get_lab_result", &e),
    }
}

// ============ Discharge Handlers ============

pub async fn discharge(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<DischargeRequest>,
) -> impl Responder {
    let claims = match authenticate(&req, &state) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    match state.engine.discharge(body.admission_id).await {
        Ok(admission) => {
            audit_log!("patient_flow", "discharge", Some(claims.user_id), true);
            HttpResponse::Ok().json(admission)
        }
        Err(e) => flow_error_response("discharge", &e),
    }
}

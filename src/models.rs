use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

// ============ User Models ============

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SignupRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserResponse,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub role: String,
}

// ============ JWT Claims ============

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user email
    pub user_id: Uuid,
    pub role: String,
    pub exp: i64,  // expiration timestamp
    pub iat: i64,  // issued at
    pub jti: Uuid, // JWT ID (for revocation)
}

// ============ Patient Models ============

#[derive(Debug, Clone, Serialize)]
pub struct Patient {
    pub id: Uuid,
    pub mrn: String,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub sex: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct NewPatientRequest {
    #[validate(length(min = 1))]
    pub mrn: String,
    #[validate(length(min = 1))]
    pub first_name: String,
    #[validate(length(min = 1))]
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    #[validate(length(min = 1))]
    pub sex: String,
}

// ============ Ward & Bed Models ============

#[derive(Debug, Clone, Serialize)]
pub struct Ward {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BedStatus {
    Free,
    Occupied,
}

#[derive(Debug, Clone, Serialize)]
pub struct Bed {
    pub id: Uuid,
    pub ward_id: Uuid,
    pub label: String,
    pub status: BedStatus,
    /// Admission currently occupying this bed. Present iff status is Occupied.
    pub occupant: Option<Uuid>,
}

impl Bed {
    pub fn is_free(&self) -> bool {
        self.status == BedStatus::Free
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterWardRequest {
    #[validate(length(min = 1))]
    pub name: String,
    #[validate(range(min = 1))]
    pub bed_count: i32,
}

// ============ Admission Models ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdmissionState {
    Active,
    Discharged,
}

#[derive(Debug, Clone, Serialize)]
pub struct Admission {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub admitted_ward_id: Uuid,
    pub admitted_bed_id: Uuid,
    /// Present iff state is Active.
    pub current_ward_id: Option<Uuid>,
    pub current_bed_id: Option<Uuid>,
    pub state: AdmissionState,
    pub admitted_at: DateTime<Utc>,
    pub discharged_at: Option<DateTime<Utc>>,
}

impl Admission {
    pub fn is_active(&self) -> bool {
        self.state == AdmissionState::Active
    }
}

#[derive(Debug, Deserialize)]
pub struct AdmitRequest {
    pub patient_id: Uuid,
    pub bed_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub admission_id: Uuid,
    pub to_bed_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct DischargeRequest {
    pub admission_id: Uuid,
}

// ============ Transfer Audit Models ============

#[derive(Debug, Clone, Serialize)]
pub struct TransferRecord {
    pub id: Uuid,
    pub admission_id: Uuid,
    pub from_bed_id: Uuid,
    pub to_bed_id: Uuid,
    pub transferred_at: DateTime<Utc>,
}

// ============ Lab Models ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabOrderState {
    Ordered,
    Resulted,
    Cancelled,
}

#[derive(Debug, Clone, Serialize)]
pub struct LabOrder {
    pub id: Uuid,
    pub admission_id: Uuid,
    pub test_type: String,
    pub state: LabOrderState,
    pub ordered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LabResult {
    pub id: Uuid,
    pub order_id: Uuid,
    pub value: serde_json::Value,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LabOrderRequest {
    pub admission_id: Uuid,
    #[validate(length(min = 1))]
    pub test_type: String,
}

#[derive(Debug, Deserialize)]
pub struct LabResultRequest {
    pub order_id: Uuid,
    pub value: serde_json::Value,
}

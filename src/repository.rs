use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::FlowResult;
use crate::models::{Admission, Bed, LabOrder, LabResult, Patient, TransferRecord, User, Ward};

/// Storage abstraction consumed by the flow components.
///
/// Implementations must be thread-safe (`Send + Sync`). All reads outside a
/// unit of work see the last committed state. Mutations happen only through a
/// [`UnitOfWork`] obtained from [`Repository::begin`].
#[async_trait]
pub trait Repository: Send + Sync {
    /// Starts a unit of work whose buffered writes commit atomically.
    async fn begin(&self) -> FlowResult<Box<dyn UnitOfWork>>;

    // ==================== Users ====================

    async fn find_user_by_email(&self, email: &str) -> FlowResult<Option<User>>;

    // ==================== Patients ====================

    async fn get_patient(&self, id: Uuid) -> FlowResult<Option<Patient>>;
    async fn find_patient_by_mrn(&self, mrn: &str) -> FlowResult<Option<Patient>>;
    async fn list_patients(&self) -> FlowResult<Vec<Patient>>;

    // ==================== Wards & Beds ====================

    async fn get_ward(&self, id: Uuid) -> FlowResult<Option<Ward>>;
    async fn list_wards(&self) -> FlowResult<Vec<Ward>>;
    async fn get_bed(&self, id: Uuid) -> FlowResult<Option<Bed>>;
    /// Beds of a ward, ordered by bed id ascending.
    async fn beds_in_ward(&self, ward_id: Uuid) -> FlowResult<Vec<Bed>>;

    // ==================== Admissions ====================

    async fn get_admission(&self, id: Uuid) -> FlowResult<Option<Admission>>;
    async fn find_active_admission(&self, patient_id: Uuid) -> FlowResult<Option<Admission>>;
    /// Admissions whose current ward is the given ward, ordered by id.
    async fn admissions_in_ward(&self, ward_id: Uuid) -> FlowResult<Vec<Admission>>;

    // ==================== Transfers ====================

    /// Transfer audit records for an admission, oldest first.
    async fn transfers_for_admission(&self, admission_id: Uuid) -> FlowResult<Vec<TransferRecord>>;

    // ==================== Lab Orders & Results ====================

    async fn get_lab_order(&self, id: Uuid) -> FlowResult<Option<LabOrder>>;
    async fn orders_for_admission(&self, admission_id: Uuid) -> FlowResult<Vec<LabOrder>>;
    async fn result_for_order(&self, order_id: Uuid) -> FlowResult<Option<LabResult>>;
}

/// A scoped set of reads and buffered writes that commits atomically.
///
/// Reads through a unit of work observe its own pending writes on top of the
/// committed state. Nothing is visible to other readers until [`commit`]
/// returns; dropping the unit of work without committing discards every
/// buffered write, which is the rollback path.
///
/// [`commit`]: UnitOfWork::commit
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    // ==================== Reads (see pending writes) ====================

    async fn find_user_by_email(&self, email: &str) -> FlowResult<Option<User>>;
    async fn get_patient(&self, id: Uuid) -> FlowResult<Option<Patient>>;
    async fn find_patient_by_mrn(&self, mrn: &str) -> FlowResult<Option<Patient>>;
    async fn get_ward(&self, id: Uuid) -> FlowResult<Option<Ward>>;
    async fn get_bed(&self, id: Uuid) -> FlowResult<Option<Bed>>;
    async fn get_admission(&self, id: Uuid) -> FlowResult<Option<Admission>>;
    async fn find_active_admission(&self, patient_id: Uuid) -> FlowResult<Option<Admission>>;
    async fn get_lab_order(&self, id: Uuid) -> FlowResult<Option<LabOrder>>;
    async fn result_for_order(&self, order_id: Uuid) -> FlowResult<Option<LabResult>>;

    // ==================== Buffered writes ====================

    fn put_user(&mut self, user: User);
    fn put_patient(&mut self, patient: Patient);
    fn put_ward(&mut self, ward: Ward);
    fn put_bed(&mut self, bed: Bed);
    fn put_admission(&mut self, admission: Admission);
    fn push_transfer(&mut self, record: TransferRecord);
    fn put_lab_order(&mut self, order: LabOrder);
    fn put_lab_result(&mut self, result: LabResult);

    /// Applies every buffered write atomically.
    async fn commit(self: Box<Self>) -> FlowResult<()>;
}

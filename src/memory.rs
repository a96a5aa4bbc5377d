use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::errors::FlowResult;
use crate::models::{Admission, Bed, LabOrder, LabResult, Patient, TransferRecord, User, Ward};
use crate::repository::{Repository, UnitOfWork};

/// Committed record tables. `lab_results` is keyed by order id since an order
/// has at most one result.
#[derive(Debug, Default)]
struct Store {
    users: HashMap<Uuid, User>,
    patients: HashMap<Uuid, Patient>,
    wards: HashMap<Uuid, Ward>,
    beds: HashMap<Uuid, Bed>,
    admissions: HashMap<Uuid, Admission>,
    transfers: Vec<TransferRecord>,
    lab_orders: HashMap<Uuid, LabOrder>,
    lab_results: HashMap<Uuid, LabResult>,
}

/// In-memory repository backend.
///
/// A unit of work buffers its writes and applies them under a single
/// store-wide write lock on commit, so a commit is atomic: readers observe
/// either none or all of an operation's writes.
pub struct MemoryRepository {
    store: Arc<RwLock<Store>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(Store::default())),
        }
    }
}

impl Default for MemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn begin(&self) -> FlowResult<Box<dyn UnitOfWork>> {
        Ok(Box::new(MemoryUnitOfWork {
            store: self.store.clone(),
            pending: Pending::default(),
        }))
    }

    async fn find_user_by_email(&self, email: &str) -> FlowResult<Option<User>> {
        let store = self.store.read().await;
        Ok(store.users.values().find(|u| u.email == email).cloned())
    }

    async fn get_patient(&self, id: Uuid) -> FlowResult<Option<Patient>> {
        let store = self.store.read().await;
        Ok(store.patients.get(&id).cloned())
    }

    async fn find_patient_by_mrn(&self, mrn: &str) -> FlowResult<Option<Patient>> {
        let store = self.store.read().await;
        Ok(store.patients.values().find(|p| p.mrn == mrn).cloned())
    }

    async fn list_patients(&self) -> FlowResult<Vec<Patient>> {
        let store = self.store.read().await;
        let mut patients: Vec<Patient> = store.patients.values().cloned().collect();
        patients.sort_by_key(|p| p.id);
        Ok(patients)
    }

    async fn get_ward(&self, id: Uuid) -> FlowResult<Option<Ward>> {
        let store = self.store.read().await;
        Ok(store.wards.get(&id).cloned())
    }

    async fn list_wards(&self) -> FlowResult<Vec<Ward>> {
        let store = self.store.read().await;
        let mut wards: Vec<Ward> = store.wards.values().cloned().collect();
        wards.sort_by_key(|w| w.id);
        Ok(wards)
    }

    async fn get_bed(&self, id: Uuid) -> FlowResult<Option<Bed>> {
        let store = self.store.read().await;
        Ok(store.beds.get(&id).cloned())
    }

    async fn beds_in_ward(&self, ward_id: Uuid) -> FlowResult<Vec<Bed>> {
        let store = self.store.read().await;
        let mut beds: Vec<Bed> = store
            .beds
            .values()
            .filter(|b| b.ward_id == ward_id)
            .cloned()
            .collect();
        beds.sort_by_key(|b| b.id);
        Ok(beds)
    }

    async fn get_admission(&self, id: Uuid) -> FlowResult<Option<Admission>> {
        let store = self.store.read().await;
        Ok(store.admissions.get(&id).cloned())
    }

    async fn find_active_admission(&self, patient_id: Uuid) -> FlowResult<Option<Admission>> {
        let store = self.store.read().await;
        Ok(store
            .admissions
            .values()
            .filter(|a| a.patient_id == patient_id && a.is_active())
            .min_by_key(|a| a.id)
            .cloned())
    }

    async fn admissions_in_ward(&self, ward_id: Uuid) -> FlowResult<Vec<Admission>> {
        let store = self.store.read().await;
        let mut admissions: Vec<Admission> = store
            .admissions
            .values()
            .filter(|a| a.current_ward_id == Some(ward_id))
            .cloned()
            .collect();
        admissions.sort_by_key(|a| a.id);
        Ok(admissions)
    }

    async fn transfers_for_admission(&self, admission_id: Uuid) -> FlowResult<Vec<TransferRecord>> {
        let store = self.store.read().await;
        Ok(store
            .transfers
            .iter()
            .filter(|t| t.admission_id == admission_id)
            .cloned()
            .collect())
    }

    async fn get_lab_order(&self, id: Uuid) -> FlowResult<Option<LabOrder>> {
        let store = self.store.read().await;
        Ok(store.lab_orders.get(&id).cloned())
    }

    async fn orders_for_admission(&self, admission_id: Uuid) -> FlowResult<Vec<LabOrder>> {
        let store = self.store.read().await;
        let mut orders: Vec<LabOrder> = store
            .lab_orders
            .values()
            .filter(|o| o.admission_id == admission_id)
            .cloned()
            .collect();
        orders.sort_by_key(|o| (o.ordered_at, o.id));
        Ok(orders)
    }

    async fn result_for_order(&self, order_id: Uuid) -> FlowResult<Option<LabResult>> {
        let store = self.store.read().await;
        Ok(store.lab_results.get(&order_id).cloned())
    }
}

// ============ Unit of Work ============

#[derive(Debug, Default)]
struct Pending {
    users: HashMap<Uuid, User>,
    patients: HashMap<Uuid, Patient>,
    wards: HashMap<Uuid, Ward>,
    beds: HashMap<Uuid, Bed>,
    admissions: HashMap<Uuid, Admission>,
    transfers: Vec<TransferRecord>,
    lab_orders: HashMap<Uuid, LabOrder>,
    lab_results: HashMap<Uuid, LabResult>,
}

struct MemoryUnitOfWork {
    store: Arc<RwLock<Store>>,
    pending: Pending,
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn find_user_by_email(&self, email: &str) -> FlowResult<Option<User>> {
        if let Some(user) = self.pending.users.values().find(|u| u.email == email) {
            return Ok(Some(user.clone()));
        }
        let store = self.store.read().await;
        Ok(store
            .users
            .values()
            .filter(|u| !self.pending.users.contains_key(&u.id))
            .find(|u| u.email == email)
            .cloned())
    }

    async fn get_patient(&self, id: Uuid) -> FlowResult<Option<Patient>> {
        if let Some(patient) = self.pending.patients.get(&id) {
            return Ok(Some(patient.clone()));
        }
        let store = self.store.read().await;
        Ok(store.patients.get(&id).cloned())
    }

    async fn find_patient_by_mrn(&self, mrn: &str) -> FlowResult<Option<Patient>> {
        if let Some(patient) = self.pending.patients.values().find(|p| p.mrn == mrn) {
            return Ok(Some(patient.clone()));
        }
        let store = self.store.read().await;
        Ok(store
            .patients
            .values()
            .filter(|p| !self.pending.patients.contains_key(&p.id))
            .find(|p| p.mrn == mrn)
            .cloned())
    }

    async fn get_ward(&self, id: Uuid) -> FlowResult<Option<Ward>> {
        if let Some(ward) = self.pending.wards.get(&id) {
            return Ok(Some(ward.clone()));
        }
        let store = self.store.read().await;
        Ok(store.wards.get(&id).cloned())
    }

    async fn get_bed(&self, id: Uuid) -> FlowResult<Option<Bed>> {
        if let Some(bed) = self.pending.beds.get(&id) {
            return Ok(Some(bed.clone()));
        }
        let store = self.store.read().await;
        Ok(store.beds.get(&id).cloned())
    }

    async fn get_admission(&self, id: Uuid) -> FlowResult<Option<Admission>> {
        if let Some(admission) = self.pending.admissions.get(&id) {
            return Ok(Some(admission.clone()));
        }
        let store = self.store.read().await;
        Ok(store.admissions.get(&id).cloned())
    }

    async fn find_active_admission(&self, patient_id: Uuid) -> FlowResult<Option<Admission>> {
        if let Some(admission) = self
            .pending
            .admissions
            .values()
            .find(|a| a.patient_id == patient_id && a.is_active())
        {
            return Ok(Some(admission.clone()));
        }
        let store = self.store.read().await;
        Ok(store
            .admissions
            .values()
            .filter(|a| a.patient_id == patient_id && a.is_active())
            .filter(|a| !self.pending.admissions.contains_key(&a.id))
            .min_by_key(|a| a.id)
            .cloned())
    }

    async fn get_lab_order(&self, id: Uuid) -> FlowResult<Option<LabOrder>> {
        if let Some(order) = self.pending.lab_orders.get(&id) {
            return Ok(Some(order.clone()));
        }
        let store = self.store.read().await;
        Ok(store.lab_orders.get(&id).cloned())
    }

    async fn result_for_order(&self, order_id: Uuid) -> FlowResult<Option<LabResult>> {
        if let Some(result) = self.pending.lab_results.get(&order_id) {
            return Ok(Some(result.clone()));
        }
        let store = self.store.read().await;
        Ok(store.lab_results.get(&order_id).cloned())
    }

    fn put_user(&mut self, user: User) {
        self.pending.users.insert(user.id, user);
    }

    fn put_patient(&mut self, patient: Patient) {
        self.pending.patients.insert(patient.id, patient);
    }

    fn put_ward(&mut self, ward: Ward) {
        self.pending.wards.insert(ward.id, ward);
    }

    fn put_bed(&mut self, bed: Bed) {
        self.pending.beds.insert(bed.id, bed);
    }

    fn put_admission(&mut self, admission: Admission) {
        self.pending.admissions.insert(admission.id, admission);
    }

    fn push_transfer(&mut self, record: TransferRecord) {
        self.pending.transfers.push(record);
    }

    fn put_lab_order(&mut self, order: LabOrder) {
        self.pending.lab_orders.insert(order.id, order);
    }

    fn put_lab_result(&mut self, result: LabResult) {
        self.pending.lab_results.insert(result.order_id, result);
    }

    async fn commit(self: Box<Self>) -> FlowResult<()> {
        let pending = self.pending;
        let mut store = self.store.write().await;
        store.users.extend(pending.users);
        store.patients.extend(pending.patients);
        store.wards.extend(pending.wards);
        store.beds.extend(pending.beds);
        store.admissions.extend(pending.admissions);
        store.transfers.extend(pending.transfers);
        store.lab_orders.extend(pending.lab_orders);
        store.lab_results.extend(pending.lab_results);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BedStatus;
    use chrono::Utc;

    fn sample_bed(ward_id: Uuid) -> Bed {
        Bed {
            id: Uuid::new_v4(),
            ward_id,
            label: "ICU-1".to_string(),
            status: BedStatus::Free,
            occupant: None,
        }
    }

    #[tokio::test]
    async fn test_commit_makes_writes_visible() {
        let repo = MemoryRepository::new();
        let ward_id = Uuid::new_v4();
        let bed = sample_bed(ward_id);
        let bed_id = bed.id;

        let mut uow = repo.begin().await.unwrap();
        uow.put_bed(bed);
        assert!(repo.get_bed(bed_id).await.unwrap().is_none());

        uow.commit().await.unwrap();
        let stored = repo.get_bed(bed_id).await.unwrap().unwrap();
        assert_eq!(stored.ward_id, ward_id);
        assert_eq!(stored.status, BedStatus::Free);
    }

    #[tokio::test]
    async fn test_dropped_unit_of_work_discards_writes() {
        let repo = MemoryRepository::new();
        let bed = sample_bed(Uuid::new_v4());
        let bed_id = bed.id;

        {
            let mut uow = repo.begin().await.unwrap();
            uow.put_bed(bed);
            // dropped without commit
        }

        assert!(repo.get_bed(bed_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unit_of_work_reads_see_pending_writes() {
        let repo = MemoryRepository::new();
        let mut bed = sample_bed(Uuid::new_v4());
        let bed_id = bed.id;

        let mut uow = repo.begin().await.unwrap();
        uow.put_bed(bed.clone());
        bed.status = BedStatus::Occupied;
        bed.occupant = Some(Uuid::new_v4());
        uow.put_bed(bed);

        let seen = uow.get_bed(bed_id).await.unwrap().unwrap();
        assert_eq!(seen.status, BedStatus::Occupied);
    }

    #[tokio::test]
    async fn test_beds_in_ward_sorted_by_id() {
        let repo = MemoryRepository::new();
        let ward_id = Uuid::new_v4();

        let mut uow = repo.begin().await.unwrap();
        for _ in 0..8 {
            uow.put_bed(sample_bed(ward_id));
        }
        uow.put_bed(sample_bed(Uuid::new_v4())); // other ward
        uow.commit().await.unwrap();

        let beds = repo.beds_in_ward(ward_id).await.unwrap();
        assert_eq!(beds.len(), 8);
        let ids: Vec<Uuid> = beds.iter().map(|b| b.id).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }

    #[tokio::test]
    async fn test_pending_discharge_hides_active_admission() {
        let repo = MemoryRepository::new();
        let patient_id = Uuid::new_v4();
        let ward_id = Uuid::new_v4();
        let bed_id = Uuid::new_v4();

        let admission = Admission {
            id: Uuid::new_v4(),
            patient_id,
            admitted_ward_id: ward_id,
            admitted_bed_id: bed_id,
            current_ward_id: Some(ward_id),
            current_bed_id: Some(bed_id),
            state: crate::models::AdmissionState::Active,
            admitted_at: Utc::now(),
            discharged_at: None,
        };
        let mut uow = repo.begin().await.unwrap();
        uow.put_admission(admission.clone());
        uow.commit().await.unwrap();

        // A pending close overrides the committed Active row for reads
        let mut uow = repo.begin().await.unwrap();
        let mut closed = admission.clone();
        closed.state = crate::models::AdmissionState::Discharged;
        closed.current_ward_id = None;
        closed.current_bed_id = None;
        closed.discharged_at = Some(Utc::now());
        uow.put_admission(closed);

        assert!(uow.find_active_admission(patient_id).await.unwrap().is_none());
        // committed state still Active until commit
        assert!(repo
            .find_active_admission(patient_id)
            .await
            .unwrap()
            .is_some());
    }
}

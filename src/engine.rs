use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::errors::{FlowError, FlowResult};
use crate::ledger::AdmissionLedger;
use crate::locks::{LockManager, ResourceKey};
use crate::metrics::{ADMISSIONS_TOTAL, DISCHARGES_TOTAL, OCCUPIED_BEDS, TRANSFERS_TOTAL};
use crate::models::{Admission, Bed, TransferRecord};
use crate::registry::WardRegistry;
use crate::repository::{Repository, UnitOfWork};

/// Admission/Transfer/Discharge lifecycle engine.
///
/// The engine is the only writer of bed and admission state. Each operation
/// acquires the locks for every resource it touches (in the global order),
/// re-reads state under those locks, buffers all writes in one unit of work
/// and commits once. An error anywhere discards the unit of work, so no
/// partial admit/transfer/discharge is ever observable, and a bed can never
/// end up double-occupied.
pub struct AtdEngine {
    repo: Arc<dyn Repository>,
    registry: WardRegistry,
    ledger: AdmissionLedger,
    locks: Arc<LockManager>,
}

impl AtdEngine {
    pub fn new(repo: Arc<dyn Repository>, locks: Arc<LockManager>) -> Self {
        Self {
            registry: WardRegistry::new(repo.clone()),
            ledger: AdmissionLedger::new(repo.clone()),
            repo,
            locks,
        }
    }

    pub fn registry(&self) -> &WardRegistry {
        &self.registry
    }

    pub fn ledger(&self) -> &AdmissionLedger {
        &self.ledger
    }

    /// Admits a patient into a free bed, opening a new Active admission.
    pub async fn admit(&self, patient_id: Uuid, bed_id: Uuid) -> FlowResult<Admission> {
        self.repo
            .get_patient(patient_id)
            .await?
            .ok_or_else(|| FlowError::not_found("patient", patient_id))?;

        let _locks = self
            .locks
            .acquire(vec![
                ResourceKey::Bed(bed_id),
                ResourceKey::Patient(patient_id),
            ])
            .await?;

        let mut uow = self.repo.begin().await?;
        let bed = uow
            .get_bed(bed_id)
            .await?
            .ok_or_else(|| FlowError::not_found("bed", bed_id))?;
        let admission = self.ledger.open(uow.as_mut(), patient_id, &bed).await?;
        self.registry
            .occupy(uow.as_mut(), bed_id, admission.id)
            .await?;
        uow.commit().await?;

        ADMISSIONS_TOTAL.inc();
        OCCUPIED_BEDS.inc();
        info!(
            admission_id = %admission.id,
            patient_id = %patient_id,
            bed_id = %bed_id,
            "patient admitted"
        );
        Ok(admission)
    }

    /// Relocates an Active admission to a free destination bed, releasing the
    /// source bed in the same atomic unit.
    pub async fn transfer(&self, admission_id: Uuid, to_bed_id: Uuid) -> FlowResult<Admission> {
        let admission = self.ledger.get(admission_id).await?;
        let from_bed_id = admission.current_bed_id.ok_or_else(|| {
            FlowError::state(format!("admission {} is not active", admission_id))
        })?;
        if from_bed_id == to_bed_id {
            return Err(FlowError::validation(
                "destination bed equals the current bed",
            ));
        }

        let _locks = self
            .locks
            .acquire(vec![
                ResourceKey::Bed(from_bed_id),
                ResourceKey::Bed(to_bed_id),
                ResourceKey::Admission(admission_id),
            ])
            .await?;

        let mut uow = self.repo.begin().await?;
        // Re-read under the locks: the admission may have moved or closed
        // between the first read and lock acquisition.
        let current = uow
            .get_admission(admission_id)
            .await?
            .ok_or_else(|| FlowError::not_found("admission", admission_id))?;
        if !current.is_active() {
            return Err(FlowError::state(format!(
                "admission {} is not active",
                admission_id
            )));
        }
        if current.current_bed_id != Some(from_bed_id) {
            return Err(FlowError::conflict(
                "admission moved concurrently, retry with fresh data",
            ));
        }

        self.registry.release(uow.as_mut(), from_bed_id).await?;
        let dest = self
            .registry
            .occupy(uow.as_mut(), to_bed_id, admission_id)
            .await?;
        let relocated = self
            .ledger
            .relocate(uow.as_mut(), admission_id, &dest)
            .await?;
        uow.push_transfer(TransferRecord {
            id: Uuid::new_v4(),
            admission_id,
            from_bed_id,
            to_bed_id,
            transferred_at: Utc::now(),
        });
        uow.commit().await?;

        TRANSFERS_TOTAL.inc();
        info!(
            admission_id = %admission_id,
            from_bed_id = %from_bed_id,
            to_bed_id = %to_bed_id,
            "admission transferred"
        );
        Ok(relocated)
    }

    /// Discharges an Active admission, freeing its current bed. Terminal.
    pub async fn discharge(&self, admission_id: Uuid) -> FlowResult<Admission> {
        let admission = self.ledger.get(admission_id).await?;
        let bed_id = admission.current_bed_id.ok_or_else(|| {
            FlowError::state(format!("admission {} is not active", admission_id))
        })?;

        let _locks = self
            .locks
            .acquire(vec![
                ResourceKey::Bed(bed_id),
                ResourceKey::Admission(admission_id),
            ])
            .await?;

        let mut uow = self.repo.begin().await?;
        let current = uow
            .get_admission(admission_id)
            .await?
            .ok_or_else(|| FlowError::not_found("admission", admission_id))?;
        if !current.is_active() {
            return Err(FlowError::state(format!(
                "admission {} is already discharged",
                admission_id
            )));
        }
        if current.current_bed_id != Some(bed_id) {
            return Err(FlowError::conflict(
                "admission moved concurrently, retry with fresh data",
            ));
        }

        self.registry.release(uow.as_mut(), bed_id).await?;
        let closed = self.ledger.close(uow.as_mut(), admission_id).await?;
        uow.commit().await?;

        DISCHARGES_TOTAL.inc();
        OCCUPIED_BEDS.dec();
        info!(
            admission_id = %admission_id,
            bed_id = %bed_id,
            "patient discharged"
        );
        Ok(closed)
    }

    // ==================== Reads ====================

    pub async fn get_bed(&self, bed_id: Uuid) -> FlowResult<Bed> {
        self.registry.get_bed(bed_id).await
    }

    pub async fn get_admission(&self, admission_id: Uuid) -> FlowResult<Admission> {
        self.ledger.get(admission_id).await
    }

    pub async fn list_admissions_by_ward(&self, ward_id: Uuid) -> FlowResult<Vec<Admission>> {
        self.registry.get_ward(ward_id).await?;
        self.ledger.list_by_ward(ward_id).await
    }

    pub async fn transfers_for(&self, admission_id: Uuid) -> FlowResult<Vec<TransferRecord>> {
        self.ledger.get(admission_id).await?;
        self.repo.transfers_for_admission(admission_id).await
    }
}

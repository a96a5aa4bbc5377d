use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::errors::{FlowError, FlowResult};
use crate::models::{Admission, AdmissionState, Bed};
use crate::repository::{Repository, UnitOfWork};

/// Owns admission records and their lifecycle state.
///
/// State transitions (`open`/`relocate`/`close`) are crate-private: they run
/// inside an engine-owned unit of work while the engine holds the patient's
/// or admission's lock, which is what makes the active-admission-per-patient
/// check race-free.
pub struct AdmissionLedger {
    repo: Arc<dyn Repository>,
}

impl AdmissionLedger {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }

    /// Opens a new Active admission for the patient in the given bed.
    pub(crate) async fn open(
        &self,
        uow: &mut dyn UnitOfWork,
        patient_id: Uuid,
        bed: &Bed,
    ) -> FlowResult<Admission> {
        if let Some(existing) = uow.find_active_admission(patient_id).await? {
            return Err(FlowError::conflict(format!(
                "patient {} already has active admission {}",
                patient_id, existing.id
            )));
        }

        let admission = Admission {
            id: Uuid::new_v4(),
            patient_id,
            admitted_ward_id: bed.ward_id,
            admitted_bed_id: bed.id,
            current_ward_id: Some(bed.ward_id),
            current_bed_id: Some(bed.id),
            state: AdmissionState::Active,
            admitted_at: Utc::now(),
            discharged_at: None,
        };
        uow.put_admission(admission.clone());
        Ok(admission)
    }

    /// Moves an Active admission's current location to the given bed.
    pub(crate) async fn relocate(
        &self,
        uow: &mut dyn UnitOfWork,
        admission_id: Uuid,
        new_bed: &Bed,
    ) -> FlowResult<Admission> {
        let mut admission = uow
            .get_admission(admission_id)
            .await?
            .ok_or_else(|| FlowError::not_found("admission", admission_id))?;
        if !admission.is_active() {
            return Err(FlowError::state(format!(
                "admission {} is not active",
                admission_id
            )));
        }
        admission.current_ward_id = Some(new_bed.ward_id);
        admission.current_bed_id = Some(new_bed.id);
        uow.put_admission(admission.clone());
        Ok(admission)
    }

    /// Closes an Active admission. Discharged is terminal.
    pub(crate) async fn close(
        &self,
        uow: &mut dyn UnitOfWork,
        admission_id: Uuid,
    ) -> FlowResult<Admission> {
        let mut admission = uow
            .get_admission(admission_id)
            .await?
            .ok_or_else(|| FlowError::not_found("admission", admission_id))?;
        if !admission.is_active() {
            return Err(FlowError::state(format!(
                "admission {} is already discharged",
                admission_id
            )));
        }
        admission.state = AdmissionState::Discharged;
        admission.discharged_at = Some(Utc::now());
        admission.current_ward_id = None;
        admission.current_bed_id = None;
        uow.put_admission(admission.clone());
        Ok(admission)
    }

    pub async fn get(&self, admission_id: Uuid) -> FlowResult<Admission> {
        self.repo
            .get_admission(admission_id)
            .await?
            .ok_or_else(|| FlowError::not_found("admission", admission_id))
    }

    pub async fn find_active_by_patient(&self, patient_id: Uuid) -> FlowResult<Option<Admission>> {
        self.repo.find_active_admission(patient_id).await
    }

    pub async fn list_by_ward(&self, ward_id: Uuid) -> FlowResult<Vec<Admission>> {
        self.repo.admissions_in_ward(ward_id).await
    }
}

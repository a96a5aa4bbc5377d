use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::errors::{FlowError, FlowResult};
use crate::models::{NewPatientRequest, Patient};
use crate::repository::{Repository, UnitOfWork};

/// Owns patient identity records. Admissions reference patients by id and
/// never duplicate demographic data.
pub struct PatientDirectory {
    repo: Arc<dyn Repository>,
}

impl PatientDirectory {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }

    pub async fn create_patient(&self, req: &NewPatientRequest) -> FlowResult<Patient> {
        let mrn = req.mrn.trim();
        if mrn.is_empty() {
            return Err(FlowError::validation("MRN must not be empty"));
        }

        let mut uow = self.repo.begin().await?;
        if uow.find_patient_by_mrn(mrn).await?.is_some() {
            return Err(FlowError::conflict(format!(
                "patient with MRN {} already exists",
                mrn
            )));
        }

        let patient = Patient {
            id: Uuid::new_v4(),
            mrn: mrn.to_string(),
            first_name: req.first_name.trim().to_string(),
            last_name: req.last_name.trim().to_string(),
            date_of_birth: req.date_of_birth,
            sex: req.sex.trim().to_string(),
            created_at: Utc::now(),
        };
        uow.put_patient(patient.clone());
        uow.commit().await?;

        info!(patient_id = %patient.id, "patient registered");
        Ok(patient)
    }

    pub async fn get_patient(&self, id: Uuid) -> FlowResult<Patient> {
        self.repo
            .get_patient(id)
            .await?
            .ok_or_else(|| FlowError::not_found("patient", id))
    }

    pub async fn list_patients(&self) -> FlowResult<Vec<Patient>> {
        self.repo.list_patients().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryRepository;
    use chrono::NaiveDate;
    use fake::faker::name::en::{FirstName, LastName};
    use fake::Fake;

    fn directory() -> PatientDirectory {
        PatientDirectory::new(Arc::new(MemoryRepository::new()))
    }

    fn request(mrn: &str) -> NewPatientRequest {
        NewPatientRequest {
            mrn: mrn.to_string(),
            first_name: FirstName().fake(),
            last_name: LastName().fake(),
            date_of_birth: NaiveDate::from_ymd_opt(1985, 7, 2).unwrap(),
            sex: "F".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_and_get_patient() {
        let directory = directory();
        let created = directory.create_patient(&request("MRN-001")).await.unwrap();

        let fetched = directory.get_patient(created.id).await.unwrap();
        assert_eq!(fetched.mrn, "MRN-001");
        assert_eq!(fetched.first_name, created.first_name);
    }

    #[tokio::test]
    async fn test_duplicate_mrn_conflicts() {
        let directory = directory();
        directory.create_patient(&request("MRN-001")).await.unwrap();

        let err = directory
            .create_patient(&request("MRN-001"))
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_get_unknown_patient_not_found() {
        let directory = directory();
        let err = directory.get_patient(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, FlowError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_list_patients() {
        let directory = directory();
        for n in 0..3 {
            directory
                .create_patient(&request(&format!("MRN-{n:03}")))
                .await
                .unwrap();
        }
        assert_eq!(directory.list_patients().await.unwrap().len(), 3);
    }
}

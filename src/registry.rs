use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::errors::{FlowError, FlowResult};
use crate::models::{Bed, BedStatus, Ward};
use crate::repository::{Repository, UnitOfWork};

/// Owns the ward/bed inventory and each bed's occupancy status.
///
/// Bed state transitions (`occupy`/`release`) are crate-private and run only
/// inside a unit of work owned by the lifecycle engine, which holds the bed's
/// lock for the duration. Handlers and other callers get read access plus
/// `register_ward`.
pub struct WardRegistry {
    repo: Arc<dyn Repository>,
}

impl WardRegistry {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }

    /// Creates a ward with `bed_count` free beds labelled `"{name}-1"` ...
    /// `"{name}-{bed_count}"`.
    pub async fn register_ward(&self, name: &str, bed_count: i32) -> FlowResult<(Ward, Vec<Bed>)> {
        let name = name.trim();
        if name.is_empty() {
            return Err(FlowError::validation("ward name must not be empty"));
        }
        if bed_count <= 0 {
            return Err(FlowError::validation("bed count must be positive"));
        }

        let ward = Ward {
            id: Uuid::new_v4(),
            name: name.to_string(),
            created_at: Utc::now(),
        };
        let beds: Vec<Bed> = (1..=bed_count)
            .map(|n| Bed {
                id: Uuid::new_v4(),
                ward_id: ward.id,
                label: format!("{}-{}", name, n),
                status: BedStatus::Free,
                occupant: None,
            })
            .collect();

        let mut uow = self.repo.begin().await?;
        uow.put_ward(ward.clone());
        for bed in &beds {
            uow.put_bed(bed.clone());
        }
        uow.commit().await?;

        info!(ward_id = %ward.id, ward_name = %ward.name, beds = beds.len(), "ward registered");
        Ok((ward, beds))
    }

    /// Free beds of a ward, ordered by bed id ascending. The ordering is
    /// deterministic so a caller that lost a race can re-query and walk the
    /// same sequence again.
    pub async fn available_beds(&self, ward_id: Uuid) -> FlowResult<Vec<Bed>> {
        self.get_ward(ward_id).await?;
        let beds = self.repo.beds_in_ward(ward_id).await?;
        Ok(beds.into_iter().filter(|b| b.is_free()).collect())
    }

    pub async fn get_ward(&self, ward_id: Uuid) -> FlowResult<Ward> {
        self.repo
            .get_ward(ward_id)
            .await?
            .ok_or_else(|| FlowError::not_found("ward", ward_id))
    }

    pub async fn list_wards(&self) -> FlowResult<Vec<Ward>> {
        self.repo.list_wards().await
    }

    pub async fn get_bed(&self, bed_id: Uuid) -> FlowResult<Bed> {
        self.repo
            .get_bed(bed_id)
            .await?
            .ok_or_else(|| FlowError::not_found("bed", bed_id))
    }

    pub async fn beds_in_ward(&self, ward_id: Uuid) -> FlowResult<Vec<Bed>> {
        self.get_ward(ward_id).await?;
        self.repo.beds_in_ward(ward_id).await
    }

    /// Marks a bed occupied by the given admission. The caller must hold the
    /// bed's lock.
    pub(crate) async fn occupy(
        &self,
        uow: &mut dyn UnitOfWork,
        bed_id: Uuid,
        admission_id: Uuid,
    ) -> FlowResult<Bed> {
        let mut bed = uow
            .get_bed(bed_id)
            .await?
            .ok_or_else(|| FlowError::not_found("bed", bed_id))?;
        if !bed.is_free() {
            return Err(FlowError::conflict(format!(
                "bed {} is already occupied",
                bed.label
            )));
        }
        bed.status = BedStatus::Occupied;
        bed.occupant = Some(admission_id);
        uow.put_bed(bed.clone());
        Ok(bed)
    }

    /// Marks a bed free. The caller must hold the bed's lock.
    pub(crate) async fn release(&self, uow: &mut dyn UnitOfWork, bed_id: Uuid) -> FlowResult<Bed> {
        let mut bed = uow
            .get_bed(bed_id)
            .await?
            .ok_or_else(|| FlowError::not_found("bed", bed_id))?;
        if bed.is_free() {
            return Err(FlowError::conflict(format!(
                "bed {} is already free",
                bed.label
            )));
        }
        bed.status = BedStatus::Free;
        bed.occupant = None;
        uow.put_bed(bed.clone());
        Ok(bed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryRepository;

    fn registry() -> WardRegistry {
        WardRegistry::new(Arc::new(MemoryRepository::new()))
    }

    #[tokio::test]
    async fn test_register_ward_creates_free_labelled_beds() {
        let registry = registry();
        let (ward, beds) = registry.register_ward("ICU", 3).await.unwrap();

        assert_eq!(ward.name, "ICU");
        assert_eq!(beds.len(), 3);
        let labels: Vec<&str> = beds.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, vec!["ICU-1", "ICU-2", "ICU-3"]);
        assert!(beds.iter().all(|b| b.is_free() && b.occupant.is_none()));
    }

    #[tokio::test]
    async fn test_register_ward_rejects_non_positive_bed_count() {
        let registry = registry();
        for count in [0, -1] {
            let err = registry.register_ward("ICU", count).await.unwrap_err();
            assert!(matches!(err, FlowError::Validation(_)));
        }
    }

    #[tokio::test]
    async fn test_register_ward_rejects_blank_name() {
        let registry = registry();
        let err = registry.register_ward("  ", 2).await.unwrap_err();
        assert!(matches!(err, FlowError::Validation(_)));
    }

    #[tokio::test]
    async fn test_occupy_and_release_roundtrip() {
        let repo = Arc::new(MemoryRepository::new());
        let registry = WardRegistry::new(repo.clone());
        let (_, beds) = registry.register_ward("ICU", 1).await.unwrap();
        let bed_id = beds[0].id;
        let admission_id = Uuid::new_v4();

        let mut uow = repo.begin().await.unwrap();
        let bed = registry
            .occupy(uow.as_mut(), bed_id, admission_id)
            .await
            .unwrap();
        assert_eq!(bed.status, BedStatus::Occupied);
        assert_eq!(bed.occupant, Some(admission_id));
        uow.commit().await.unwrap();

        let mut uow = repo.begin().await.unwrap();
        let bed = registry.release(uow.as_mut(), bed_id).await.unwrap();
        assert!(bed.is_free());
        assert!(bed.occupant.is_none());
        uow.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_double_occupy_conflicts() {
        let repo = Arc::new(MemoryRepository::new());
        let registry = WardRegistry::new(repo.clone());
        let (_, beds) = registry.register_ward("ICU", 1).await.unwrap();
        let bed_id = beds[0].id;

        let mut uow = repo.begin().await.unwrap();
        registry
            .occupy(uow.as_mut(), bed_id, Uuid::new_v4())
            .await
            .unwrap();
        // self double-call inside the same unit of work also conflicts
        let err = registry
            .occupy(uow.as_mut(), bed_id, Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_release_free_bed_conflicts() {
        let repo = Arc::new(MemoryRepository::new());
        let registry = WardRegistry::new(repo.clone());
        let (_, beds) = registry.register_ward("ICU", 1).await.unwrap();

        let mut uow = repo.begin().await.unwrap();
        let err = registry.release(uow.as_mut(), beds[0].id).await.unwrap_err();
        assert!(matches!(err, FlowError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_occupy_unknown_bed_not_found() {
        let repo = Arc::new(MemoryRepository::new());
        let registry = WardRegistry::new(repo.clone());

        let mut uow = repo.begin().await.unwrap();
        let err = registry
            .occupy(uow.as_mut(), Uuid::new_v4(), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_available_beds_filters_and_sorts() {
        let repo = Arc::new(MemoryRepository::new());
        let registry = WardRegistry::new(repo.clone());
        let (ward, beds) = registry.register_ward("ICU", 4).await.unwrap();

        let mut uow = repo.begin().await.unwrap();
        registry
            .occupy(uow.as_mut(), beds[1].id, Uuid::new_v4())
            .await
            .unwrap();
        uow.commit().await.unwrap();

        let available = registry.available_beds(ward.id).await.unwrap();
        assert_eq!(available.len(), 3);
        assert!(available.iter().all(|b| b.is_free()));
        let ids: Vec<Uuid> = available.iter().map(|b| b.id).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }

    #[tokio::test]
    async fn test_available_beds_unknown_ward_not_found() {
        let registry = registry();
        let err = registry.available_beds(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, FlowError::NotFound { .. }));
    }
}

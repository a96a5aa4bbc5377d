use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::errors::{FlowError, FlowResult};
use crate::locks::{LockManager, ResourceKey};
use crate::metrics::LAB_ORDERS_TOTAL;
use crate::models::{LabOrder, LabOrderState, LabResult};
use crate::repository::{Repository, UnitOfWork};

/// Tracks lab test orders and their results, each bound to an admission.
///
/// Shares the engine's lock manager: `order` runs under the admission's lock
/// so it cannot interleave with a concurrent discharge, and result/cancel run
/// under the order's lock so an order resolves exactly once.
pub struct LabTracker {
    repo: Arc<dyn Repository>,
    locks: Arc<LockManager>,
}

impl LabTracker {
    pub fn new(repo: Arc<dyn Repository>, locks: Arc<LockManager>) -> Self {
        Self { repo, locks }
    }

    /// Orders a lab test against an Active admission.
    pub async fn order(&self, admission_id: Uuid, test_type: &str) -> FlowResult<LabOrder> {
        let test_type = test_type.trim();
        if test_type.is_empty() {
            return Err(FlowError::validation("test type must not be empty"));
        }
        self.repo
            .get_admission(admission_id)
            .await?
            .ok_or_else(|| FlowError::not_found("admission", admission_id))?;

        let _locks = self
            .locks
            .acquire(vec![ResourceKey::Admission(admission_id)])
            .await?;

        let mut uow = self.repo.begin().await?;
        let admission = uow
            .get_admission(admission_id)
            .await?
            .ok_or_else(|| FlowError::not_found("admission", admission_id))?;
        if !admission.is_active() {
            return Err(FlowError::state(format!(
                "admission {} is not active",
                admission_id
            )));
        }

        let order = LabOrder {
            id: Uuid::new_v4(),
            admission_id,
            test_type: test_type.to_string(),
            state: LabOrderState::Ordered,
            ordered_at: Utc::now(),
        };
        uow.put_lab_order(order.clone());
        uow.commit().await?;

        LAB_ORDERS_TOTAL.with_label_values(&["ordered"]).inc();
        info!(order_id = %order.id, admission_id = %admission_id, test_type = %order.test_type, "lab test ordered");
        Ok(order)
    }

    /// Records the result for an order in state Ordered, moving it to
    /// Resulted. An order resolves at most once.
    pub async fn record_result(
        &self,
        order_id: Uuid,
        value: serde_json::Value,
    ) -> FlowResult<LabResult> {
        self.repo
            .get_lab_order(order_id)
            .await?
            .ok_or_else(|| FlowError::not_found("lab order", order_id))?;

        let _locks = self
            .locks
            .acquire(vec![ResourceKey::LabOrder(order_id)])
            .await?;

        let mut uow = self.repo.begin().await?;
        let mut order = uow
            .get_lab_order(order_id)
            .await?
            .ok_or_else(|| FlowError::not_found("lab order", order_id))?;
        if order.state != LabOrderState::Ordered {
            return Err(FlowError::state(format!(
                "lab order {} is not awaiting a result",
                order_id
            )));
        }

        order.state = LabOrderState::Resulted;
        uow.put_lab_order(order);
        let result = LabResult {
            id: Uuid::new_v4(),
            order_id,
            value,
            recorded_at: Utc::now(),
        };
        uow.put_lab_result(result.clone());
        uow.commit().await?;

        LAB_ORDERS_TOTAL.with_label_values(&["resulted"]).inc();
        info!(order_id = %order_id, "lab result recorded");
        Ok(result)
    }

    /// Cancels an order that has not yet been resulted.
    pub async fn cancel(&self, order_id: Uuid) -> FlowResult<LabOrder> {
        self.repo
            .get_lab_order(order_id)
            .await?
            .ok_or_else(|| FlowError::not_found("lab order", order_id))?;

        let _locks = self
            .locks
            .acquire(vec![ResourceKey::LabOrder(order_id)])
            .await?;

        let mut uow = self.repo.begin().await?;
        let mut order = uow
            .get_lab_order(order_id)
            .await?
            .ok_or_else(|| FlowError::not_found("lab order", order_id))?;
        if order.state != LabOrderState::Ordered {
            return Err(FlowError::state(format!(
                "lab order {} is already {}",
                order_id,
                match order.state {
                    LabOrderState::Resulted => "resulted",
                    _ => "cancelled",
                }
            )));
        }

        order.state = LabOrderState::Cancelled;
        uow.put_lab_order(order.clone());
        uow.commit().await?;

        LAB_ORDERS_TOTAL.with_label_values(&["cancelled"]).inc();
        info!(order_id = %order_id, "lab order cancelled");
        Ok(order)
    }

    // ==================== Reads ====================

    pub async fn get_order(&self, order_id: Uuid) -> FlowResult<LabOrder> {
        self.repo
            .get_lab_order(order_id)
            .await?
            .ok_or_else(|| FlowError::not_found("lab order", order_id))
    }

    pub async fn orders_for_admission(&self, admission_id: Uuid) -> FlowResult<Vec<LabOrder>> {
        self.repo
            .get_admission(admission_id)
            .await?
            .ok_or_else(|| FlowError::not_found("admission", admission_id))?;
        self.repo.orders_for_admission(admission_id).await
    }

    pub async fn result_for_order(&self, order_id: Uuid) -> FlowResult<Option<LabResult>> {
        self.get_order(order_id).await?;
        self.repo.result_for_order(order_id).await
    }
}

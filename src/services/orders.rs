use serde::Deserialize;
use uuid::Uuid;

use crate::{
    auth::Claims,
    db::{
        models::{Order, OrderDetail, OrderStatus, Role},
        store::OrderFilter,
        Store,
    },
    error::{AppError, AppResult},
};

#[derive(Deserialize, Debug, Default)]
pub struct OrderQuery {
    pub status: Option<OrderStatus>,
}

#[derive(Deserialize, Debug)]
pub struct StatusChange {
    pub status: OrderStatus,
}

/// Orders visible to the caller: patients see their own, staff see all.
pub async fn list_orders(
    store: &dyn Store,
    claims: &Claims,
    query: OrderQuery,
) -> AppResult<Vec<Order>> {
    let patient_id = (claims.role == Role::Patient).then_some(claims.sub);
    Ok(store
        .list_orders(OrderFilter {
            patient_id,
            status: query.status,
        })
        .await?)
}

pub async fn get_order(store: &dyn Store, claims: &Claims, id: Uuid) -> AppResult<OrderDetail> {
    store
        .get_order(id)
        .await?
        .filter(|detail| claims.role != Role::Patient || detail.order.patient_id == claims.sub)
        .ok_or_else(|| AppError::not_found("Order"))
}

async fn transition(store: &dyn Store, order: &Order, to: OrderStatus) -> AppResult<Order> {
    if !order.status.can_transition_to(to) {
        return Err(AppError::Conflict(format!(
            "Cannot move order from {} to {}",
            order.status, to
        )));
    }

    let updated = store
        .transition_order(order.id, order.status, to)
        .await?
        .ok_or_else(|| {
            AppError::Conflict("Order was updated by someone else, reload and retry".to_string())
        })?;
    log::info!("Order {} moved from {} to {}", order.id, order.status, to);
    Ok(updated)
}

/// Staff-driven status change (approve, reject, ship, deliver).
pub async fn change_status(store: &dyn Store, id: Uuid, change: StatusChange) -> AppResult<Order> {
    if matches!(change.status, OrderStatus::Pending | OrderStatus::Cancelled) {
        return Err(AppError::Validation(format!(
            "Staff cannot set an order to {}",
            change.status
        )));
    }

    let detail = store
        .get_order(id)
        .await?
        .ok_or_else(|| AppError::not_found("Order"))?;
    transition(store, &detail.order, change.status).await
}

/// Patient cancellation, allowed only while the order is still pending.
pub async fn cancel_order(store: &dyn Store, claims: &Claims, id: Uuid) -> AppResult<Order> {
    let detail = get_order(store, claims, id).await?;
    if detail.order.status != OrderStatus::Pending {
        return Err(AppError::Conflict(format!(
            "Order is already {} and can no longer be cancelled",
            detail.order.status
        )));
    }
    transition(store, &detail.order, OrderStatus::Cancelled).await
}

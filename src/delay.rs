//! Delay announcement, queue assignment and vendor reporting

use chrono::{DateTime, Duration, Utc};

use crate::error::{AppError, Result};
use crate::models::{
    AnnounceResponse, DelayQueueItem, DeliveryStatus, EnqueueOutcome, Order, VendorDelay,
};
use crate::AppState;

/// Deadline extension for orders still on the road
pub fn grace_period() -> Duration {
    Duration::minutes(30)
}

/// Trailing window covered by the vendor report
pub fn report_window() -> Duration {
    Duration::days(7)
}

/// Record that an order missed its deadline at `now`.
///
/// Orders without a trip, or whose latest trip is delivered, go on the
/// delay queue for an agent. Orders still in transit get their deadline
/// pushed back by the grace period instead.
pub async fn announce_delay(
    state: &AppState,
    order_id: i64,
    now: DateTime<Utc>,
) -> Result<AnnounceResponse> {
    let order = state.store.get_order(order_id).await?;

    if now < order.delivery_time {
        return Err(AppError::PreconditionFailed(format!(
            "Delivery time of order {} has not passed yet",
            order.id
        )));
    }

    let delay = now - order.delivery_time;
    let report = state
        .store
        .upsert_delay_report(order.id, delay, now)
        .await?;

    let in_transit = match state.store.latest_trip_status(order.id).await? {
        None | Some(DeliveryStatus::Delivered) => false,
        Some(DeliveryStatus::Assigned | DeliveryStatus::AtVendor | DeliveryStatus::Picked) => true,
    };

    if in_transit {
        let new_delivery_time = reschedule(state, &order).await?;
        return Ok(AnnounceResponse::Rescheduled { new_delivery_time });
    }

    let message = match state.store.enqueue_delay(report.id, now).await? {
        EnqueueOutcome::Created => {
            tracing::info!(order_id = order.id, report_id = report.id, "Order placed in delay queue");
            "Order placed in delay queue"
        }
        EnqueueOutcome::AlreadyQueued => {
            tracing::debug!(order_id = order.id, report_id = report.id, "Open queue item exists, not queueing again");
            "Order is already in the delay queue"
        }
    };

    Ok(AnnounceResponse::Queued {
        message: message.to_string(),
    })
}

async fn reschedule(state: &AppState, order: &Order) -> Result<DateTime<Utc>> {
    let new_delivery_time = state
        .store
        .extend_delivery_time(order, grace_period())
        .await?;

    tracing::info!(
        order_id = order.id,
        %new_delivery_time,
        "Order still in transit, deadline extended"
    );

    // Best effort: the estimate never decides the outcome
    match &state.eta {
        Some(eta) => match eta.request_estimate(order.id).await {
            Ok(estimate) => {
                tracing::debug!(order_id = order.id, eta_minutes = ?estimate.eta_minutes, "Estimate requested");
            }
            Err(e) => {
                tracing::warn!(order_id = order.id, "Ignoring failed estimate request: {}", e);
            }
        },
        None => tracing::debug!("No ETA service configured"),
    }

    Ok(new_delivery_time)
}

/// Give every unassigned queue item to an agent, oldest first
pub async fn assign_queue(state: &AppState, agent_id: i64) -> Result<Vec<DelayQueueItem>> {
    let agent = state.store.get_agent(agent_id).await?;
    let items = state.store.assign_unassigned(agent.id).await?;

    tracing::info!(agent_id = agent.id, count = items.len(), "Delay queue assigned");

    Ok(items)
}

/// Total delay per vendor over the trailing report window, largest first
pub async fn vendor_report(state: &AppState, now: DateTime<Utc>) -> Result<Vec<VendorDelay>> {
    state.store.vendor_delays_since(now - report_window()).await
}

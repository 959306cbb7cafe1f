//! Database store for orders, trips, agents, delay reports and the delay queue

use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;

use crate::error::{AppError, Result};
use crate::models::{
    Agent, DelayQueueItem, DelayReport, DelayStatus, DeliveryStatus, EnqueueOutcome, Order, Trip,
    Vendor, VendorDelay,
};

/// Database store
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // Vendor operations

    pub async fn create_vendor(&self, name: &str) -> Result<Vendor> {
        let id = sqlx::query(
            r#"
            INSERT INTO vendors (name) VALUES (?)
            "#,
        )
        .bind(name)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        Ok(Vendor {
            id,
            name: name.to_string(),
        })
    }

    // Order operations

    pub async fn create_order(
        &self,
        vendor_id: i64,
        delivery_time: DateTime<Utc>,
    ) -> Result<Order> {
        let now = Utc::now();

        let id = sqlx::query(
            r#"
            INSERT INTO orders (vendor_id, created_at, delivery_time)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(vendor_id)
        .bind(now)
        .bind(delivery_time)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        Ok(Order {
            id,
            vendor_id,
            created_at: now,
            delivery_time,
        })
    }

    pub async fn get_order(&self, id: i64) -> Result<Order> {
        let row = sqlx::query_as::<_, OrderRow>(
            r#"
            SELECT id, vendor_id, created_at, delivery_time
            FROM orders
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Order {} not found", id)))?;

        Ok(row.into())
    }

    /// Push an order's deadline back by `by`.
    ///
    /// The update is keyed on the deadline the caller observed, so two
    /// concurrent extensions of the same order apply only once. The deadline
    /// actually stored afterwards is returned either way.
    pub async fn extend_delivery_time(&self, order: &Order, by: Duration) -> Result<DateTime<Utc>> {
        let extended = order.delivery_time + by;

        let result = sqlx::query(
            r#"
            UPDATE orders SET delivery_time = ? WHERE id = ? AND delivery_time = ?
            "#,
        )
        .bind(extended)
        .bind(order.id)
        .bind(order.delivery_time)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(extended);
        }

        tracing::debug!(order_id = order.id, "Deadline already moved by a concurrent call");
        Ok(self.get_order(order.id).await?.delivery_time)
    }

    // Trip operations

    pub async fn create_trip(&self, order_id: i64, status: DeliveryStatus) -> Result<Trip> {
        let id = sqlx::query(
            r#"
            INSERT INTO trips (order_id, status) VALUES (?, ?)
            "#,
        )
        .bind(order_id)
        .bind(status.as_str())
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        Ok(Trip {
            id,
            order_id,
            status,
        })
    }

    /// Status of the most recent trip for an order, if any trip exists
    pub async fn latest_trip_status(&self, order_id: i64) -> Result<Option<DeliveryStatus>> {
        let status: Option<String> = sqlx::query_scalar(
            r#"
            SELECT status FROM trips
            WHERE order_id = ?
            ORDER BY id DESC
            LIMIT 1
            "#,
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;

        status
            .map(|s| {
                s.parse()
                    .map_err(|e| AppError::Internal(format!("Invalid trip status: {}", e)))
            })
            .transpose()
    }

    // Agent operations

    pub async fn create_agent(&self, name: &str) -> Result<Agent> {
        let id = sqlx::query(
            r#"
            INSERT INTO agents (name) VALUES (?)
            "#,
        )
        .bind(name)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        Ok(Agent {
            id,
            name: name.to_string(),
        })
    }

    pub async fn get_agent(&self, id: i64) -> Result<Agent> {
        let (id, name): (i64, String) = sqlx::query_as(
            r#"
            SELECT id, name FROM agents WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Agent {} not found", id)))?;

        Ok(Agent { id, name })
    }

    /// Remove an agent. Queue items pointing at the agent lose the reference
    /// but keep whatever status they had.
    pub async fn delete_agent(&self, id: i64) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let released = sqlx::query(
            r#"
            UPDATE delay_queue SET agent_id = NULL WHERE agent_id = ?
            "#,
        )
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let deleted = sqlx::query(
            r#"
            DELETE FROM agents WHERE id = ?
            "#,
        )
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if deleted == 0 {
            return Err(AppError::NotFound(format!("Agent {} not found", id)));
        }

        tx.commit().await?;

        if released > 0 {
            tracing::warn!(
                agent_id = id,
                released,
                "Deleted agent still held queue items; statuses left unchanged"
            );
        }

        Ok(())
    }

    // Delay report operations

    /// Record the latest delay of an order, overwriting any previous value
    pub async fn upsert_delay_report(
        &self,
        order_id: i64,
        delay: Duration,
        now: DateTime<Utc>,
    ) -> Result<DelayReport> {
        let row = sqlx::query_as::<_, DelayReportRow>(
            r#"
            INSERT INTO delay_reports (order_id, delay_ms, created_at, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(order_id) DO UPDATE SET
                delay_ms = excluded.delay_ms,
                updated_at = excluded.updated_at
            RETURNING id, order_id, delay_ms, created_at, updated_at
            "#,
        )
        .bind(order_id)
        .bind(delay.num_milliseconds())
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    /// Insert a report with an explicit creation time
    pub async fn create_delay_report(
        &self,
        order_id: i64,
        delay: Duration,
        created_at: DateTime<Utc>,
    ) -> Result<DelayReport> {
        let id = sqlx::query(
            r#"
            INSERT INTO delay_reports (order_id, delay_ms, created_at, updated_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(order_id)
        .bind(delay.num_milliseconds())
        .bind(created_at)
        .bind(created_at)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        Ok(DelayReport {
            id,
            order_id,
            delay: Duration::milliseconds(delay.num_milliseconds()),
            created_at,
            updated_at: created_at,
        })
    }

    pub async fn find_delay_report(&self, order_id: i64) -> Result<Option<DelayReport>> {
        let row = sqlx::query_as::<_, DelayReportRow>(
            r#"
            SELECT id, order_id, delay_ms, created_at, updated_at
            FROM delay_reports
            WHERE order_id = ?
            "#,
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    #[cfg(test)]
    pub async fn count_delay_reports(&self, order_id: i64) -> Result<i64> {
        let count = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM delay_reports WHERE order_id = ?
            "#,
        )
        .bind(order_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// Sum of report delays per vendor for reports created at or after `since`,
    /// largest total first
    pub async fn vendor_delays_since(&self, since: DateTime<Utc>) -> Result<Vec<VendorDelay>> {
        let rows: Vec<(i64, i64)> = sqlx::query_as(
            r#"
            SELECT o.vendor_id, SUM(r.delay_ms) AS total_delay_ms
            FROM delay_reports r
            JOIN orders o ON o.id = r.order_id
            WHERE r.created_at >= ?
            GROUP BY o.vendor_id
            ORDER BY total_delay_ms DESC, o.vendor_id ASC
            "#,
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(vendor_id, total_ms)| VendorDelay {
                vendor_id,
                total_delay: Duration::milliseconds(total_ms),
            })
            .collect())
    }

    // Delay queue operations

    /// Queue a report unless it already has an open item.
    ///
    /// The existence check and the insert run as one statement, and the
    /// partial unique index on open items backs it up.
    pub async fn enqueue_delay(&self, report_id: i64, now: DateTime<Utc>) -> Result<EnqueueOutcome> {
        let result = sqlx::query(
            r#"
            INSERT INTO delay_queue (report_id, status, created_at)
            SELECT ?, 'unassigned', ?
            WHERE NOT EXISTS (
                SELECT 1 FROM delay_queue
                WHERE report_id = ? AND status != 'resolved'
            )
            "#,
        )
        .bind(report_id)
        .bind(now)
        .bind(report_id)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) if done.rows_affected() == 1 => Ok(EnqueueOutcome::Created),
            Ok(_) => Ok(EnqueueOutcome::AlreadyQueued),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Ok(EnqueueOutcome::AlreadyQueued)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Insert a queue item with an explicit status and creation time
    pub async fn create_queue_item(
        &self,
        report_id: i64,
        status: DelayStatus,
        created_at: DateTime<Utc>,
    ) -> Result<DelayQueueItem> {
        let id = sqlx::query(
            r#"
            INSERT INTO delay_queue (report_id, status, created_at)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(report_id)
        .bind(status.as_str())
        .bind(created_at)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        Ok(DelayQueueItem {
            id,
            report_id,
            agent_id: None,
            status,
            created_at,
        })
    }

    pub async fn get_queue_item(&self, id: i64) -> Result<DelayQueueItem> {
        let row = sqlx::query_as::<_, QueueItemRow>(
            r#"
            SELECT id, report_id, agent_id, status, created_at
            FROM delay_queue
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Queue item {} not found", id)))?;

        row.try_into()
    }

    pub async fn queue_items_for_report(&self, report_id: i64) -> Result<Vec<DelayQueueItem>> {
        let rows = sqlx::query_as::<_, QueueItemRow>(
            r#"
            SELECT id, report_id, agent_id, status, created_at
            FROM delay_queue
            WHERE report_id = ?
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(report_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    /// Hand every unassigned item to `agent_id`, oldest first.
    ///
    /// Each item moves with a compare-and-swap on its status, so an item
    /// claimed by a concurrent caller in between is skipped rather than
    /// assigned twice.
    pub async fn assign_unassigned(&self, agent_id: i64) -> Result<Vec<DelayQueueItem>> {
        let rows = sqlx::query_as::<_, QueueItemRow>(
            r#"
            SELECT id, report_id, agent_id, status, created_at
            FROM delay_queue
            WHERE status = 'unassigned'
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut assigned = Vec::with_capacity(rows.len());

        for row in rows {
            let mut item: DelayQueueItem = row.try_into()?;

            let result = sqlx::query(
                r#"
                UPDATE delay_queue SET agent_id = ?, status = 'assigned'
                WHERE id = ? AND status = 'unassigned'
                "#,
            )
            .bind(agent_id)
            .bind(item.id)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() == 0 {
                tracing::debug!(item_id = item.id, "Queue item claimed concurrently, skipping");
                continue;
            }

            item.agent_id = Some(agent_id);
            item.status = DelayStatus::Assigned;
            assigned.push(item);
        }

        Ok(assigned)
    }

    /// Mark an assigned item as resolved. Returns false if the item was not
    /// in the assigned state.
    pub async fn resolve_queue_item(&self, id: i64) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE delay_queue SET status = 'resolved'
            WHERE id = ? AND status = 'assigned'
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(true);
        }

        // Distinguish a missing item from one in the wrong state
        self.get_queue_item(id).await?;
        Ok(false)
    }
}

// Internal row types for sqlx

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: i64,
    vendor_id: i64,
    created_at: DateTime<Utc>,
    delivery_time: DateTime<Utc>,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        Order {
            id: row.id,
            vendor_id: row.vendor_id,
            created_at: row.created_at,
            delivery_time: row.delivery_time,
        }
    }
}

#[derive(sqlx::FromRow)]
struct DelayReportRow {
    id: i64,
    order_id: i64,
    delay_ms: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<DelayReportRow> for DelayReport {
    fn from(row: DelayReportRow) -> Self {
        DelayReport {
            id: row.id,
            order_id: row.order_id,
            delay: Duration::milliseconds(row.delay_ms),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct QueueItemRow {
    id: i64,
    report_id: i64,
    agent_id: Option<i64>,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<QueueItemRow> for DelayQueueItem {
    type Error = AppError;

    fn try_from(row: QueueItemRow) -> Result<Self> {
        Ok(DelayQueueItem {
            id: row.id,
            report_id: row.report_id,
            agent_id: row.agent_id,
            status: row
                .status
                .parse()
                .map_err(|e| AppError::Internal(format!("Invalid status: {}", e)))?,
            created_at: row.created_at,
        })
    }
}

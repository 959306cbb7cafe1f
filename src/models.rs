//! Data models for orders, trips, delay reports and the delay queue

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize, Serializer};

/// A vendor owning many orders
#[derive(Debug, Clone, Serialize)]
pub struct Vendor {
    pub id: i64,
    pub name: String,
}

/// A delivery order with a mutable deadline
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: i64,
    pub vendor_id: i64,
    pub created_at: DateTime<Utc>,
    pub delivery_time: DateTime<Utc>,
}

/// A courier trip for an order
#[derive(Debug, Clone, Serialize)]
pub struct Trip {
    pub id: i64,
    pub order_id: i64,
    pub status: DeliveryStatus,
}

/// Progress of a trip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Assigned,
    AtVendor,
    Picked,
    Delivered,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Assigned => "assigned",
            DeliveryStatus::AtVendor => "at_vendor",
            DeliveryStatus::Picked => "picked",
            DeliveryStatus::Delivered => "delivered",
        }
    }
}

impl std::str::FromStr for DeliveryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "assigned" => Ok(DeliveryStatus::Assigned),
            "at_vendor" => Ok(DeliveryStatus::AtVendor),
            "picked" => Ok(DeliveryStatus::Picked),
            "delivered" => Ok(DeliveryStatus::Delivered),
            _ => Err(format!("Invalid delivery status: {}", s)),
        }
    }
}

/// A support agent who resolves queued delays
#[derive(Debug, Clone, Serialize)]
pub struct Agent {
    pub id: i64,
    pub name: String,
}

/// The latest observed overage of an order past its deadline
#[derive(Debug, Clone, Serialize)]
pub struct DelayReport {
    pub id: i64,
    pub order_id: i64,
    #[serde(serialize_with = "serialize_duration")]
    pub delay: Duration,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A unit of manual-resolution work derived from a delay report
#[derive(Debug, Clone, Serialize)]
pub struct DelayQueueItem {
    pub id: i64,
    pub report_id: i64,
    pub agent_id: Option<i64>,
    pub status: DelayStatus,
    pub created_at: DateTime<Utc>,
}

/// Lifecycle of a queue item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DelayStatus {
    Unassigned,
    Assigned,
    Resolved,
}

impl DelayStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DelayStatus::Unassigned => "unassigned",
            DelayStatus::Assigned => "assigned",
            DelayStatus::Resolved => "resolved",
        }
    }

    /// An item is open until it has been resolved
    pub fn is_open(&self) -> bool {
        match self {
            DelayStatus::Unassigned | DelayStatus::Assigned => true,
            DelayStatus::Resolved => false,
        }
    }
}

impl std::str::FromStr for DelayStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unassigned" => Ok(DelayStatus::Unassigned),
            "assigned" => Ok(DelayStatus::Assigned),
            "resolved" => Ok(DelayStatus::Resolved),
            _ => Err(format!("Invalid delay status: {}", s)),
        }
    }
}

/// Result of trying to put a report on the delay queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Created,
    AlreadyQueued,
}

/// Total delay of one vendor within the reporting window
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VendorDelay {
    pub vendor_id: i64,
    #[serde(serialize_with = "serialize_duration")]
    pub total_delay: Duration,
}

/// Request to announce a delay for an order
#[derive(Debug, Deserialize)]
pub struct AnnounceDelayRequest {
    pub order_id: i64,
}

/// Query for draining the delay queue to an agent
#[derive(Debug, Deserialize)]
pub struct DelayQueueQuery {
    pub agent_id: i64,
}

/// Response of a delay announcement
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum AnnounceResponse {
    Queued { message: String },
    Rescheduled { new_delivery_time: DateTime<Utc> },
}

/// Render a duration as `[D ]HH:MM:SS[.ffffff]`
pub fn format_duration(duration: Duration) -> String {
    let (sign, duration) = if duration < Duration::zero() {
        ("-", -duration)
    } else {
        ("", duration)
    };

    let days = duration.num_days();
    let hours = duration.num_hours() % 24;
    let minutes = duration.num_minutes() % 60;
    let seconds = duration.num_seconds() % 60;
    let micros = (duration.num_milliseconds() % 1000) * 1000;

    let mut out = String::from(sign);
    if days != 0 {
        out.push_str(&format!("{} ", days));
    }
    out.push_str(&format!("{:02}:{:02}:{:02}", hours, minutes, seconds));
    if micros != 0 {
        out.push_str(&format!(".{:06}", micros));
    }
    out
}

fn serialize_duration<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_duration(*duration))
}

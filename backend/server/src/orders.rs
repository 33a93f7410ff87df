//! # Orders
//!
//! Orders are created at checkout and then moved along by admins while the
//! customer pays and picks up over WhatsApp.
//!
//! ## Status list
//! `pending` → `confirmed` → `processing` → `ready` → `completed`
//!
//! - Moves go forward only, skipping steps is fine (walk-in orders go
//!   straight from `pending` to `completed`).
//! - Any open order can be `cancelled`.
//! - `completed` and `cancelled` are final.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::{activity, error::AppError, state::AppState, supabase::Query};

pub const ORDERS_TABLE: &str = "orders";
const MAX_ORDER_LIST: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Processing,
    Ready,
    Completed,
    Cancelled,
}

impl OrderStatus {
    /// The happy path, in order.
    pub const FLOW: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Processing,
        OrderStatus::Ready,
        OrderStatus::Completed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Processing => "processing",
            OrderStatus::Ready => "ready",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    fn rank(self) -> Option<usize> {
        Self::FLOW.iter().position(|status| *status == self)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    pub fn can_move_to(self, next: OrderStatus) -> bool {
        if self.is_terminal() || self == next {
            return false;
        }

        match (self.rank(), next.rank()) {
            (_, None) => next == OrderStatus::Cancelled,
            (Some(from), Some(to)) => to > from,
            (None, Some(_)) => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: i64,
    pub name: String,
    pub quantity: i64,
    pub unit_price: i64,
}

impl OrderItem {
    pub fn line_total(&self) -> i64 {
        self.unit_price * self.quantity
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub code: String,
    pub user_id: String,
    pub customer_name: String,
    pub phone: String,
    pub address: String,
    pub note: Option<String>,
    pub items: Vec<OrderItem>,
    pub total: i64,
    pub status: OrderStatus,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Order {
    pub fn contains_product(&self, product_id: i64) -> bool {
        self.items.iter().any(|item| item.product_id == product_id)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewOrder {
    pub code: String,
    pub user_id: String,
    pub customer_name: String,
    pub phone: String,
    pub address: String,
    pub note: Option<String>,
    pub items: Vec<OrderItem>,
    pub total: i64,
    pub status: OrderStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrackingStep {
    pub status: OrderStatus,
    pub reached: bool,
}

/// What anyone holding an order code may see. No contact details.
#[derive(Debug, Clone, Serialize)]
pub struct OrderTracking {
    pub code: String,
    pub status: OrderStatus,
    pub steps: Vec<TrackingStep>,
    pub total: i64,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<Order> for OrderTracking {
    fn from(order: Order) -> Self {
        let reached_rank = order.status.rank();

        let steps = OrderStatus::FLOW
            .iter()
            .map(|step| TrackingStep {
                status: *step,
                reached: matches!((step.rank(), reached_rank), (Some(at), Some(now)) if at <= now),
            })
            .collect();

        Self {
            code: order.code,
            status: order.status,
            steps,
            total: order.total,
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusUpdate {
    pub status: OrderStatus,
}

pub async fn create(state: &AppState, order: &NewOrder) -> Result<Order, AppError> {
    let order: Order = state.supabase.insert(ORDERS_TABLE, order).await?;
    info!("Order {} placed by {}", order.code, order.user_id);

    Ok(order)
}

pub async fn list_for_user(state: &AppState, user_id: &str) -> Result<Vec<Order>, AppError> {
    state
        .supabase
        .select(
            ORDERS_TABLE,
            &Query::new()
                .select("*")
                .eq("user_id", user_id)
                .order("created_at", false)
                .limit(MAX_ORDER_LIST),
        )
        .await
}

pub async fn completed_for_user(state: &AppState, user_id: &str) -> Result<Vec<Order>, AppError> {
    state
        .supabase
        .select(
            ORDERS_TABLE,
            &Query::new()
                .select("*")
                .eq("user_id", user_id)
                .eq("status", OrderStatus::Completed.as_str()),
        )
        .await
}

pub async fn track(state: &AppState, code: &str) -> Result<OrderTracking, AppError> {
    let order: Order = state
        .supabase
        .select_one(ORDERS_TABLE, Query::new().select("*").eq("code", code.trim()))
        .await?
        .ok_or(AppError::NotFound("Order"))?;

    Ok(order.into())
}

pub async fn list_admin(
    state: &AppState,
    status: Option<OrderStatus>,
    offset: usize,
) -> Result<Vec<Order>, AppError> {
    let mut query = Query::new().select("*");
    if let Some(status) = status {
        query = query.eq("status", status.as_str());
    }

    state
        .supabase
        .select(
            ORDERS_TABLE,
            &query
                .order("created_at", false)
                .limit(MAX_ORDER_LIST)
                .offset(offset),
        )
        .await
}

pub async fn update_status(
    state: &AppState,
    actor_id: &str,
    id: i64,
    next: OrderStatus,
) -> Result<Order, AppError> {
    let order: Order = state
        .supabase
        .select_one(ORDERS_TABLE, Query::new().select("*").eq("id", id))
        .await?
        .ok_or(AppError::NotFound("Order"))?;

    let previous = order.status;
    if !previous.can_move_to(next) {
        return Err(AppError::Conflict(format!(
            "Order {} cannot move from {} to {}",
            order.code,
            previous.as_str(),
            next.as_str()
        )));
    }

    // Filtering on the old status makes a concurrent update lose instead of
    // silently overwriting.
    let mut rows: Vec<Order> = state
        .supabase
        .update(
            ORDERS_TABLE,
            &Query::new().eq("id", id).eq("status", previous.as_str()),
            &json!({ "status": next, "updated_at": Utc::now() }),
        )
        .await?;

    let order = rows
        .pop()
        .ok_or_else(|| AppError::Conflict("Order was updated by someone else".into()))?;

    activity::record(
        state,
        actor_id,
        "order.status",
        "order",
        &id.to_string(),
        json!({ "code": order.code, "from": previous, "to": next }),
    )
    .await;

    Ok(order)
}

//! # Promos
//!
//! A promo window is an optional start and end timestamp pair. Missing bounds
//! are open, so a window with neither bound is always active. Product
//! discounts and promo events both gate on it.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    activity,
    error::AppError,
    state::AppState,
    supabase::Query,
    utils::bounded_text,
    wib::{Countdown, countdown},
};

pub const PROMO_EVENTS_TABLE: &str = "promo_events";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromoWindow {
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
}

impl PromoWindow {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        if !self.is_ordered() {
            return false;
        }

        self.starts_at.is_none_or(|start| start <= now) && self.ends_at.is_none_or(|end| now <= end)
    }

    fn is_ordered(&self) -> bool {
        match (self.starts_at, self.ends_at) {
            (Some(start), Some(end)) => start <= end,
            _ => true,
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.is_ordered() {
            Ok(())
        } else {
            Err(AppError::invalid("Promo end must not be before its start"))
        }
    }

    pub fn countdown_to_end(&self, now: DateTime<Utc>) -> Option<Countdown> {
        self.ends_at.map(|end| countdown(now, end))
    }
}

/// Price a customer pays right now.
pub fn effective_price(
    price: i64,
    discount_price: Option<i64>,
    window: &PromoWindow,
    now: DateTime<Utc>,
) -> i64 {
    match discount_price {
        Some(discount) if discount > 0 && discount < price && window.is_active(now) => discount,
        _ => price,
    }
}

pub fn discount_percent(price: i64, effective: i64) -> u32 {
    if price <= 0 || effective >= price {
        return 0;
    }

    ((price - effective) * 100 / price) as u32
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromoEvent {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub banner_url: Option<String>,
    pub discount_percent: u32,
    #[serde(flatten)]
    pub window: PromoWindow,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromoEventInput {
    pub title: String,
    pub description: Option<String>,
    pub banner_url: Option<String>,
    pub discount_percent: u32,
    #[serde(flatten)]
    pub window: PromoWindow,
    #[serde(default = "enabled")]
    pub is_active: bool,
}

fn enabled() -> bool {
    true
}

impl PromoEventInput {
    pub fn validate(mut self) -> Result<Self, AppError> {
        self.title = bounded_text(&self.title, 2, 120)
            .ok_or_else(|| AppError::invalid("Title must be 2 to 120 characters"))?;

        if !(1..=100).contains(&self.discount_percent) {
            return Err(AppError::invalid("Discount must be between 1 and 100 percent"));
        }

        self.window.validate()?;
        Ok(self)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PromoEventView {
    #[serde(flatten)]
    pub event: PromoEvent,
    pub ends_in: Option<Countdown>,
}

/// Events that are switched on and inside their window, soonest ending first.
pub fn running_events(events: Vec<PromoEvent>, now: DateTime<Utc>) -> Vec<PromoEventView> {
    let mut running: Vec<PromoEventView> = events
        .into_iter()
        .filter(|event| event.is_active && event.window.is_active(now))
        .map(|event| PromoEventView {
            ends_in: event.window.countdown_to_end(now),
            event,
        })
        .collect();

    running.sort_by_key(|view| view.event.window.ends_at.unwrap_or(DateTime::<Utc>::MAX_UTC));
    running
}

pub async fn list_running(state: &AppState) -> Result<Vec<PromoEventView>, AppError> {
    let events = state
        .supabase
        .select(PROMO_EVENTS_TABLE, &Query::new().select("*").eq("is_active", true))
        .await?;

    Ok(running_events(events, Utc::now()))
}

pub async fn list_all(state: &AppState) -> Result<Vec<PromoEvent>, AppError> {
    state
        .supabase
        .select(
            PROMO_EVENTS_TABLE,
            &Query::new().select("*").order("starts_at", false),
        )
        .await
}

pub async fn create(
    state: &AppState,
    actor_id: &str,
    input: PromoEventInput,
) -> Result<PromoEvent, AppError> {
    let input = input.validate()?;
    let event: PromoEvent = state.supabase.insert(PROMO_EVENTS_TABLE, &input).await?;

    activity::record(
        state,
        actor_id,
        "promo.create",
        "promo_event",
        &event.id.to_string(),
        json!({ "title": event.title }),
    )
    .await;

    Ok(event)
}

pub async fn update(
    state: &AppState,
    actor_id: &str,
    id: i64,
    input: PromoEventInput,
) -> Result<PromoEvent, AppError> {
    let input = input.validate()?;
    let mut rows: Vec<PromoEvent> = state
        .supabase
        .update(PROMO_EVENTS_TABLE, &Query::new().eq("id", id), &input)
        .await?;

    let event = rows.pop().ok_or(AppError::NotFound("Promo"))?;

    activity::record(
        state,
        actor_id,
        "promo.update",
        "promo_event",
        &id.to_string(),
        json!({ "title": event.title, "is_active": event.is_active }),
    )
    .await;

    Ok(event)
}

pub async fn delete(state: &AppState, actor_id: &str, id: i64) -> Result<(), AppError> {
    let removed = state
        .supabase
        .delete(PROMO_EVENTS_TABLE, &Query::new().eq("id", id))
        .await?;

    if removed == 0 {
        return Err(AppError::NotFound("Promo"));
    }

    activity::record(state, actor_id, "promo.delete", "promo_event", &id.to_string(), json!({})).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, TimeZone, Utc};

    use super::*;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, day, 12, 0, 0).unwrap()
    }

    fn window(start: Option<u32>, end: Option<u32>) -> PromoWindow {
        PromoWindow {
            starts_at: start.map(at),
            ends_at: end.map(at),
        }
    }

    fn event(id: i64, active: bool, window: PromoWindow) -> PromoEvent {
        PromoEvent {
            id,
            title: format!("Event {id}"),
            description: None,
            banner_url: None,
            discount_percent: 20,
            window,
            is_active: active,
        }
    }

    #[test]
    fn test_open_window_always_active() {
        assert!(PromoWindow::default().is_active(at(1)));
    }

    #[test]
    fn test_bounds_are_inclusive() {
        let w = window(Some(10), Some(20));
        assert!(w.is_active(at(10)));
        assert!(w.is_active(at(20)));
        assert!(!w.is_active(at(20) + Duration::seconds(1)));
        assert!(!w.is_active(at(10) - Duration::seconds(1)));
    }

    #[test]
    fn test_half_open_windows() {
        assert!(window(Some(10), None).is_active(at(30)));
        assert!(!window(Some(10), None).is_active(at(9)));
        assert!(window(None, Some(10)).is_active(at(1)));
        assert!(!window(None, Some(10)).is_active(at(11)));
    }

    #[test]
    fn test_inverted_window_never_active() {
        let w = window(Some(20), Some(10));
        assert!(!w.is_active(at(15)));
        assert!(w.validate().is_err());
    }

    #[test]
    fn test_effective_price() {
        let live = window(Some(1), Some(30));
        let over = window(Some(1), Some(5));

        assert_eq!(effective_price(20_000, Some(15_000), &live, at(10)), 15_000);
        assert_eq!(effective_price(20_000, Some(15_000), &over, at(10)), 20_000);
        assert_eq!(effective_price(20_000, None, &live, at(10)), 20_000);
        assert_eq!(effective_price(20_000, Some(25_000), &live, at(10)), 20_000);
        assert_eq!(effective_price(20_000, Some(0), &live, at(10)), 20_000);
    }

    #[test]
    fn test_discount_percent_rounds_down() {
        assert_eq!(discount_percent(30_000, 20_000), 33);
        assert_eq!(discount_percent(20_000, 20_000), 0);
        assert_eq!(discount_percent(0, 0), 0);
    }

    #[test]
    fn test_running_events_filters_and_sorts() {
        let events = vec![
            event(1, true, window(Some(1), Some(25))),
            event(2, false, window(Some(1), Some(25))),
            event(3, true, window(Some(1), Some(15))),
            event(4, true, window(Some(20), None)),
            event(5, true, window(None, None)),
        ];

        let running = running_events(events, at(10));
        let ids: Vec<i64> = running.iter().map(|view| view.event.id).collect();
        assert_eq!(ids, vec![3, 1, 5]);

        assert_eq!(running[0].ends_in.map(|c| c.days), Some(5));
        assert!(running[2].ends_in.is_none());
    }

    #[test]
    fn test_event_input_validation() {
        let input = PromoEventInput {
            title: "  Payday Sale ".into(),
            description: None,
            banner_url: None,
            discount_percent: 25,
            window: window(Some(1), Some(3)),
            is_active: true,
        };
        assert_eq!(input.clone().validate().unwrap().title, "Payday Sale");

        let zero = PromoEventInput {
            discount_percent: 0,
            ..input.clone()
        };
        assert!(zero.validate().is_err());

        let inverted = PromoEventInput {
            window: window(Some(3), Some(1)),
            ..input
        };
        assert!(inverted.validate().is_err());
    }
}

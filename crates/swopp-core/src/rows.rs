//! Row to model conversion.

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use tracing::warn;

use swopp_db::models::{ItemRow, RequestRow, UserRow};
use swopp_types::models::{Dimensions, Item, Request, RequestStatus, User};

use crate::error::{Result, SwoppError};

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // SQLite's datetime('now') has no timezone; treat it as UTC
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .ok()
}

fn timestamp_or_default(raw: &str, what: &str) -> DateTime<Utc> {
    parse_timestamp(raw).unwrap_or_else(|| {
        warn!("Corrupt {} '{}'", what, raw);
        DateTime::default()
    })
}

fn optional_timestamp(raw: Option<&str>, what: &str) -> Option<DateTime<Utc>> {
    raw.map(|raw| timestamp_or_default(raw, what))
}

pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

pub fn request_status(row: &RequestRow) -> Result<RequestStatus> {
    row.status
        .parse()
        .map_err(|e| SwoppError::Storage(anyhow!("request {}: {}", row.id, e)))
}

pub fn user_from_row(row: UserRow) -> Result<User> {
    let role = row
        .role
        .parse()
        .map_err(|e| SwoppError::Storage(anyhow!("user {}: {}", row.email, e)))?;
    Ok(User {
        created_at: timestamp_or_default(&row.created_at, "user created_at"),
        email: row.email,
        name: row.name,
        picture: row.picture,
        is_driver: row.is_driver,
        role,
    })
}

pub fn request_from_row(row: RequestRow) -> Result<Request> {
    let status = request_status(&row)?;
    Ok(Request {
        scheduled_at: optional_timestamp(row.scheduled_at.as_deref(), "scheduled_at"),
        alternate_date: optional_timestamp(row.alternate_date.as_deref(), "alternate_date"),
        created_at: timestamp_or_default(&row.created_at, "request created_at"),
        id: row.id,
        sender_email: row.sender_email,
        driver_email: row.driver_email,
        pickup: row.pickup,
        dropoff: row.dropoff,
        description: row.description,
        status,
    })
}

pub fn item_from_row(row: ItemRow) -> Result<Item> {
    let item_type = row
        .item_type
        .parse()
        .map_err(|e| SwoppError::Storage(anyhow!("item {}: {}", row.id, e)))?;
    Ok(Item {
        id: row.id,
        request_id: row.request_id,
        name: row.name,
        item_type,
        description: row.description,
        price: row.price,
        image: row.image,
        dimensions: Dimensions {
            width: row.width,
            height: row.height,
            depth: row.depth,
            weight: row.weight,
        },
    })
}

pub fn collect<R, T>(rows: Vec<R>, convert: fn(R) -> Result<T>) -> Result<Vec<T>> {
    rows.into_iter().map(convert).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_both_timestamp_formats() {
        let rfc = parse_timestamp("2026-03-01T10:00:00+00:00").unwrap();
        let sqlite = parse_timestamp("2026-03-01 10:00:00").unwrap();
        assert_eq!(rfc, sqlite);
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_unknown_status_is_storage_error() {
        let row = RequestRow {
            id: 1,
            sender_email: "a@x.com".into(),
            driver_email: None,
            pickup: "P".into(),
            dropoff: "D".into(),
            description: None,
            status: "teleported".into(),
            scheduled_at: None,
            alternate_date: None,
            created_at: "2026-03-01 10:00:00".into(),
        };
        assert!(matches!(request_from_row(row), Err(SwoppError::Storage(_))));
    }
}

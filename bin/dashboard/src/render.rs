//! Plain-text summaries of backend responses.
//!
//! Bodies are rendered from whatever fields are present; a missing field
//! prints as `-` rather than failing.

use bpm_dashboard_identity::Session;
use chrono::{DateTime, NaiveDateTime};
use serde_json::Value as JsonValue;
use std::fmt::Write as _;

/// Measurements listed by the `history` summary.
pub const HISTORY_ROWS: usize = 20;

/// Renders `value` as pretty JSON.
#[must_use]
pub fn json(value: &JsonValue) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

fn field(value: &JsonValue, key: &str) -> String {
    match value.get(key) {
        Some(JsonValue::String(s)) if !s.is_empty() => s.clone(),
        Some(JsonValue::Number(n)) => n.to_string(),
        Some(JsonValue::Bool(b)) => b.to_string(),
        _ => "-".to_string(),
    }
}

/// Summarizes `/bpm/current`.
#[must_use]
pub fn status(value: &JsonValue) -> String {
    if value.get("current_bpm").is_none() {
        let message = value
            .get("message")
            .and_then(JsonValue::as_str)
            .unwrap_or("No measurements found");
        return message.to_string();
    }
    format!(
        "{} bpm ({}, severity {})\ndevice {} at {}",
        field(value, "current_bpm"),
        field(value, "status"),
        field(value, "severity"),
        field(value, "device_id"),
        field(value, "timestamp"),
    )
}

/// Summarizes `/bpm/history`, newest first.
#[must_use]
pub fn history(value: &JsonValue) -> String {
    let measurements = value
        .get("measurements")
        .and_then(JsonValue::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    if measurements.is_empty() {
        return "No measurements found".to_string();
    }

    let mut out = String::new();
    for measurement in measurements.iter().take(HISTORY_ROWS) {
        let _ = writeln!(
            out,
            "{:<32} {:>5} bpm  {:<10} {}",
            field(measurement, "timestamp"),
            field(measurement, "bpm"),
            field(measurement, "status"),
            field(measurement, "device_id"),
        );
    }
    if measurements.len() > HISTORY_ROWS {
        let _ = writeln!(out, "... {} more", measurements.len() - HISTORY_ROWS);
    }
    let _ = write!(out, "{} measurements", field(value, "count"));
    out
}

/// Header row of the history CSV export.
pub const CSV_HEADER: &str = "date,time,bpm,status,device";

fn status_label(status: &str) -> &'static str {
    match status {
        "critical" => "Critical",
        "warning" => "Warning",
        "normal" => "Normal",
        _ => "Unknown",
    }
}

/// Splits a measurement timestamp into `dd/mm/yyyy` and `HH:MM:SS`.
///
/// Accepts RFC 3339 and the backend's offset-less ISO form. Anything else
/// is kept whole in the date column.
fn date_and_time(timestamp: &str) -> (String, String) {
    let parsed = DateTime::parse_from_rfc3339(timestamp)
        .map(|t| t.naive_local())
        .or_else(|_| NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%dT%H:%M:%S%.f"));
    match parsed {
        Ok(t) => (
            t.format("%d/%m/%Y").to_string(),
            t.format("%H:%M:%S").to_string(),
        ),
        Err(_) => (timestamp.to_string(), String::new()),
    }
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Exports every measurement of `/bpm/history` as CSV, in response order.
#[must_use]
pub fn history_csv(value: &JsonValue) -> String {
    let mut out = String::from(CSV_HEADER);
    let measurements = value
        .get("measurements")
        .and_then(JsonValue::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    for measurement in measurements {
        let timestamp = measurement
            .get("timestamp")
            .and_then(JsonValue::as_str)
            .unwrap_or_default();
        let (date, time) = date_and_time(timestamp);
        let status = measurement
            .get("status")
            .and_then(JsonValue::as_str)
            .unwrap_or_default();
        let bpm = match measurement.get("bpm") {
            Some(JsonValue::Number(n)) => n.to_string(),
            Some(JsonValue::String(s)) => s.clone(),
            _ => String::new(),
        };
        let device = measurement
            .get("device_id")
            .and_then(JsonValue::as_str)
            .unwrap_or_default();
        let _ = write!(
            out,
            "\n{},{},{},{},{}",
            csv_field(&date),
            csv_field(&time),
            csv_field(&bpm),
            status_label(status),
            csv_field(device),
        );
    }
    out
}

/// Summarizes `/bpm/statistics`.
#[must_use]
pub fn statistics(value: &JsonValue) -> String {
    if value.get("avg_bpm").is_none() {
        return format!(
            "{}: {}",
            field(value, "period"),
            value
                .get("message")
                .and_then(JsonValue::as_str)
                .unwrap_or("No data for the specified period")
        );
    }
    format!(
        "{}: avg {} bpm, min {}, max {} over {} measurements",
        field(value, "period"),
        field(value, "avg_bpm"),
        field(value, "min_bpm"),
        field(value, "max_bpm"),
        field(value, "count"),
    )
}

/// Summarizes `/devices`.
#[must_use]
pub fn devices(value: &JsonValue) -> String {
    let devices: Vec<String> = value
        .get("devices")
        .and_then(JsonValue::as_array)
        .map(|devices| {
            devices
                .iter()
                .map(|device| match device {
                    JsonValue::String(id) => id.clone(),
                    other => other.to_string(),
                })
                .collect()
        })
        .unwrap_or_default();
    if devices.is_empty() {
        return "No devices".to_string();
    }
    devices.join("\n")
}

/// Summarizes `/user/profile`.
#[must_use]
pub fn profile(value: &JsonValue) -> String {
    let groups = value
        .get("groups")
        .and_then(JsonValue::as_array)
        .map(|groups| {
            groups
                .iter()
                .filter_map(JsonValue::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        })
        .filter(|groups| !groups.is_empty())
        .unwrap_or_else(|| "-".to_string());
    format!(
        "user   {}\nemail  {}\nrole   {}\ngroups {}",
        field(value, "user_id"),
        field(value, "email"),
        field(value, "role"),
        groups,
    )
}

/// Summarizes `/health`.
#[must_use]
pub fn health(value: &JsonValue) -> String {
    field(value, "status")
}

/// Describes the signed-in user.
#[must_use]
pub fn session(session: &Session) -> String {
    let name = if session.display_name().is_empty() {
        "-"
    } else {
        session.display_name()
    };
    let groups = if session.groups().is_empty() {
        "-".to_string()
    } else {
        session.groups().join(", ")
    };
    format!(
        "{}\nname   {}\nrole   {} ({})\ngroups {}",
        session.email(),
        name,
        session.role().label(),
        session.role().description(),
        groups,
    )
}

/// The `watch` view.
#[must_use]
pub fn dashboard(current: &JsonValue, recent: &JsonValue, daily: &JsonValue) -> String {
    format!(
        "== Current ==\n{}\n\n== Today ==\n{}\n\n== Recent ==\n{}",
        status(current),
        statistics(daily),
        history(recent),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use bpm_dashboard_identity::{Role, SessionTokens};
    use serde_json::json;

    #[test]
    fn status_summary() {
        let body = json!({
            "success": true,
            "current_bpm": 72,
            "status": "normal",
            "severity": "low",
            "device_id": "bpm-sensor-01",
            "timestamp": "2024-06-01T12:00:00",
        });
        assert_eq!(
            status(&body),
            "72 bpm (normal, severity low)\ndevice bpm-sensor-01 at 2024-06-01T12:00:00"
        );
    }

    #[test]
    fn status_without_data_shows_message() {
        let body = json!({"success": true, "status": "no_data", "message": "No measurements found"});
        assert_eq!(status(&body), "No measurements found");
    }

    #[test]
    fn history_lists_rows_and_count() {
        let body = json!({
            "measurements": [
                {"timestamp": "t2", "bpm": 80, "status": "normal", "device_id": "d1"},
                {"timestamp": "t1", "bpm": 120, "status": "high", "device_id": "d1"},
            ],
            "count": 2,
        });
        let out = history(&body);
        assert_eq!(out.lines().count(), 3);
        assert!(out.lines().next().expect("row").starts_with("t2"));
        assert!(out.ends_with("2 measurements"));
    }

    #[test]
    fn long_history_is_truncated() {
        let rows: Vec<_> = (0..25).map(|i| json!({"timestamp": format!("t{i}"), "bpm": 70})).collect();
        let out = history(&json!({"measurements": rows, "count": 25}));
        assert!(out.contains("... 5 more"));
    }

    #[test]
    fn history_csv_has_one_row_per_measurement() {
        let body = json!({
            "measurements": [
                {"timestamp": "2024-06-01T08:05:09.123456", "bpm": 130, "status": "critical", "device_id": "bpm-sensor-01"},
                {"timestamp": "2024-05-31T23:59:00+00:00", "bpm": 72, "status": "normal", "device_id": "bpm-sensor-02"},
            ],
            "count": 2,
        });

        assert_eq!(
            history_csv(&body),
            "date,time,bpm,status,device\n\
             01/06/2024,08:05:09,130,Critical,bpm-sensor-01\n\
             31/05/2024,23:59:00,72,Normal,bpm-sensor-02"
        );
    }

    #[test]
    fn history_csv_quotes_and_keeps_odd_values() {
        let body = json!({
            "measurements": [
                {"timestamp": "yesterday", "bpm": 65, "status": "resting", "device_id": "ward 3, bed 2"},
            ],
        });

        assert_eq!(
            history_csv(&body),
            "date,time,bpm,status,device\nyesterday,,65,Unknown,\"ward 3, bed 2\""
        );
        assert_eq!(history_csv(&json!({})), CSV_HEADER);
    }

    #[test]
    fn statistics_summary() {
        let body = json!({"period": "week", "count": 10, "min_bpm": 60.0, "max_bpm": 90.0, "avg_bpm": 72.5});
        assert_eq!(
            statistics(&body),
            "week: avg 72.5 bpm, min 60.0, max 90.0 over 10 measurements"
        );
        let empty = json!({"period": "day", "message": "No data for the specified period"});
        assert_eq!(statistics(&empty), "day: No data for the specified period");
    }

    #[test]
    fn devices_are_listed_as_given() {
        let body = json!({"devices": ["bpm-sensor-02", "bpm-sensor-01"], "count": 2});
        assert_eq!(devices(&body), "bpm-sensor-02\nbpm-sensor-01");
        assert_eq!(devices(&json!({"devices": []})), "No devices");
    }

    #[test]
    fn profile_summary() {
        let body = json!({"user_id": "3f1c", "email": "a@b.com", "role": "patient", "groups": []});
        assert_eq!(
            profile(&body),
            "user   3f1c\nemail  a@b.com\nrole   patient\ngroups -"
        );
    }

    #[test]
    fn session_summary_uses_role_label() {
        let user = Session::new(
            "a@b.com".to_string(),
            SessionTokens::new("i".to_string(), "a".to_string(), "r".to_string()),
        )
        .with_email("a@b.com".to_string())
        .with_role(Role::Doctor);
        let out = session(&user);
        assert!(out.starts_with("a@b.com\nname   -"));
        assert!(out.contains("Doctor (Access to assigned patients and their data)"));
    }

    #[test]
    fn missing_fields_print_placeholder() {
        assert_eq!(health(&json!({})), "-");
        assert_eq!(health(&json!({"status": "healthy"})), "healthy");
    }
}

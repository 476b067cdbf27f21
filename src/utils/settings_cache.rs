//! Process-wide settings cache with an explicit reload.
//!
//! Loaded once at startup and reloaded only by the admin settings write
//! path. Readers during a reload observe either the old or the new
//! snapshot; no finer atomicity is guaranteed.

use anyhow::Result;
use chrono::NaiveTime;
use once_cell::sync::Lazy;
use serde_json::Value;
use sqlx::MySqlPool;
use sqlx::types::Json;
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Debug, Clone)]
pub struct AppSettings {
    pub work_start_time: String,
    pub work_end_time: String,
    /// `HH:MM` time-of-day after which a staff-class check-in is late.
    pub late_threshold_time: String,
    pub working_days: Vec<String>,
    /// Minute window within which a non-admin editor may amend a field
    /// they authored themselves.
    pub officer_edit_time_limit: i64,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            work_start_time: "08:00".to_string(),
            work_end_time: "14:00".to_string(),
            late_threshold_time: "08:30".to_string(),
            working_days: [
                "Saturday",
                "Sunday",
                "Monday",
                "Tuesday",
                "Wednesday",
                "Thursday",
            ]
            .map(str::to_string)
            .to_vec(),
            officer_edit_time_limit: 30,
        }
    }
}

impl AppSettings {
    /// Builds settings from stored key/value pairs, falling back to the
    /// defaults for missing or malformed entries.
    pub fn from_map(map: &HashMap<String, Value>) -> Self {
        let defaults = Self::default();
        let string = |key: &str, fallback: String| {
            map.get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or(fallback)
        };

        Self {
            work_start_time: string("work_start_time", defaults.work_start_time),
            work_end_time: string("work_end_time", defaults.work_end_time),
            late_threshold_time: string("late_threshold_time", defaults.late_threshold_time),
            working_days: map
                .get("working_days")
                .and_then(Value::as_array)
                .map(|days| {
                    days.iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or(defaults.working_days),
            officer_edit_time_limit: map
                .get("officer_edit_time_limit")
                .and_then(Value::as_i64)
                .unwrap_or(defaults.officer_edit_time_limit),
        }
    }

    pub fn late_threshold(&self) -> NaiveTime {
        NaiveTime::parse_from_str(&self.late_threshold_time, "%H:%M")
            .unwrap_or_else(|_| NaiveTime::from_hms_opt(8, 30, 0).unwrap())
    }
}

static SETTINGS: Lazy<RwLock<AppSettings>> = Lazy::new(|| RwLock::new(AppSettings::default()));

pub async fn fetch_all(pool: &MySqlPool) -> Result<HashMap<String, Value>> {
    let rows = sqlx::query_as::<_, (String, Json<Value>)>("SELECT `key`, value FROM settings")
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(|(k, Json(v))| (k, v)).collect())
}

pub async fn load(pool: &MySqlPool) -> Result<()> {
    let map = fetch_all(pool).await?;
    let settings = AppSettings::from_map(&map);
    *SETTINGS.write().expect("settings lock poisoned") = settings;
    log::info!("Application settings loaded");
    Ok(())
}

/// Re-runs [`load`]; called only after an admin settings write.
pub async fn reload(pool: &MySqlPool) -> Result<()> {
    log::info!("Reloading application settings");
    load(pool).await
}

/// Current snapshot. Cheap to clone; callers keep it for one request.
pub fn current() -> AppSettings {
    SETTINGS.read().expect("settings lock poisoned").clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_apply_for_missing_keys() {
        let s = AppSettings::from_map(&HashMap::new());
        assert_eq!(s.late_threshold_time, "08:30");
        assert_eq!(s.officer_edit_time_limit, 30);
        assert_eq!(s.working_days.len(), 6);
    }

    #[test]
    fn stored_values_override_defaults() {
        let map = HashMap::from([
            ("late_threshold_time".to_string(), json!("09:15")),
            ("officer_edit_time_limit".to_string(), json!(45)),
            ("working_days".to_string(), json!(["Monday", "Tuesday"])),
        ]);
        let s = AppSettings::from_map(&map);
        assert_eq!(
            s.late_threshold(),
            NaiveTime::from_hms_opt(9, 15, 0).unwrap()
        );
        assert_eq!(s.officer_edit_time_limit, 45);
        assert_eq!(s.working_days, vec!["Monday", "Tuesday"]);
    }

    #[test]
    fn malformed_threshold_falls_back() {
        let map = HashMap::from([("late_threshold_time".to_string(), json!("not-a-time"))]);
        let s = AppSettings::from_map(&map);
        assert_eq!(
            s.late_threshold(),
            NaiveTime::from_hms_opt(8, 30, 0).unwrap()
        );
    }
}

//! Daily ML-training delegate: sleeps until the next run time, invokes
//! the training scripts, logs the outcome. Fire-and-forget, no retry.

use chrono::{DateTime, Duration as ChronoDuration, FixedOffset, NaiveTime, Utc};
use std::time::Duration;
use tracing::{error, info};

use crate::config::Config;
use crate::utils::calendar::offset_from_minutes;
use crate::utils::ml;

const TRAINING_HOUR: u32 = 1;
pub const TRAINING_SCRIPTS: [&str; 2] = ["train_clustering_model.py", "train_anomaly_model.py"];

/// Seconds from `now` until the next occurrence of `hour`:00 local time.
pub fn seconds_until_hour(now: DateTime<FixedOffset>, hour: u32) -> i64 {
    let target_time = NaiveTime::from_hms_opt(hour, 0, 0).expect("valid hour");
    let mut target = now.date_naive().and_time(target_time);
    if now.time() >= target_time {
        target += ChronoDuration::days(1);
    }
    (target - now.naive_local()).num_seconds()
}

pub fn spawn_daily_training(config: Config) {
    actix_web::rt::spawn(async move {
        let offset = offset_from_minutes(config.local_offset_minutes);
        loop {
            let now = Utc::now().with_timezone(&offset);
            let wait = seconds_until_hour(now, TRAINING_HOUR).max(1) as u64;
            tokio::time::sleep(Duration::from_secs(wait)).await;

            info!("Running daily ML model training job");
            for script in TRAINING_SCRIPTS {
                match ml::run_training(&config, script).await {
                    Ok(output) => {
                        info!(script, output = output.trim(), "training script finished")
                    }
                    Err(e) => error!(script, error = %e, "training script failed"),
                }
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn local(h: u32, m: u32) -> DateTime<FixedOffset> {
        let offset = offset_from_minutes(210);
        offset.with_ymd_and_hms(2026, 8, 31, h, m, 0).unwrap()
    }

    #[test]
    fn before_the_hour_waits_until_today() {
        assert_eq!(seconds_until_hour(local(0, 30), 1), 30 * 60);
    }

    #[test]
    fn at_or_after_the_hour_waits_until_tomorrow() {
        assert_eq!(seconds_until_hour(local(1, 0), 1), 24 * 3600);
        assert_eq!(seconds_until_hour(local(23, 0), 1), 2 * 3600);
    }
}

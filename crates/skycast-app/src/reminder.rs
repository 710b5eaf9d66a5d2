//! Daily weather reminder.
//!
//! Fires a local notification at the configured local time, every day,
//! as long as notification permission is granted.

use chrono::{DateTime, Duration as ChronoDuration, Local, NaiveTime};
use std::sync::Arc;

use skycast_core::ReminderConfig;
use skycast_offline::{Notification, Notifier};

const REMINDER_TITLE: &str = "Weather Reminder";
const REMINDER_BODY: &str = "Good morning! Check today's weather forecast.";

/// Start the reminder task. Returns `None` when the reminder is
/// disabled in config.
pub fn spawn(
    config: ReminderConfig,
    notifier: Arc<dyn Notifier>,
) -> Option<tokio::task::JoinHandle<()>> {
    if !config.enabled {
        return None;
    }

    Some(tokio::spawn(async move {
        loop {
            let target = next_occurrence(Local::now(), config.hour, config.minute);
            let wait = (target - Local::now())
                .to_std()
                .unwrap_or(std::time::Duration::ZERO);
            tracing::debug!(at = %target, "Next weather reminder scheduled");
            tokio::time::sleep(wait).await;

            notifier.show_if_granted(&Notification::new(REMINDER_TITLE, REMINDER_BODY));
        }
    }))
}

/// The next time the reminder should fire: today at `hour:minute`
/// local, or tomorrow if that moment has already passed.
fn next_occurrence(now: DateTime<Local>, hour: u8, minute: u8) -> DateTime<Local> {
    let time = NaiveTime::from_hms_opt(u32::from(hour), u32::from(minute), 0)
        .unwrap_or(NaiveTime::MIN);
    let mut target = now.date_naive().and_time(time);
    if target <= now.naive_local() {
        target += ChronoDuration::days(1);
    }
    target
        .and_local_timezone(Local)
        .earliest()
        .unwrap_or(now + ChronoDuration::days(1))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use chrono::{TimeZone, Timelike};

    #[test]
    fn test_reminder_later_today() {
        let now = Local.with_ymd_and_hms(2024, 3, 1, 6, 30, 0).unwrap();
        let next = next_occurrence(now, 8, 0);
        assert_eq!(next.date_naive(), now.date_naive());
        assert_eq!(next.hour(), 8);
        assert_eq!(next.minute(), 0);
    }

    #[test]
    fn test_reminder_rolls_to_tomorrow_when_passed() {
        let now = Local.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let next = next_occurrence(now, 8, 0);
        assert_eq!(
            next.date_naive(),
            now.date_naive() + ChronoDuration::days(1)
        );
        assert_eq!(next.hour(), 8);
    }

    #[test]
    fn test_exact_moment_rolls_forward() {
        let now = Local.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
        let next = next_occurrence(now, 8, 0);
        assert!(next > now);
    }

    #[test]
    fn test_disabled_reminder_does_not_spawn() {
        let config = ReminderConfig {
            enabled: false,
            hour: 8,
            minute: 0,
        };
        let notifier = Arc::new(skycast_offline::LogNotifier::new(true));
        // No runtime is needed because nothing is spawned
        assert!(spawn(config, notifier).is_none());
    }
}

use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use tracing::warn;

use crate::types::Schedule;

/// Parse a cron expression, accepting both the standard 5-field unix form
/// (`min hour dom month dow`) and the `cron` crate's native 6/7-field form
/// (seconds-first, optional year) by prefixing a `0` seconds field when only
/// five fields are given.
pub fn parse_cron(expression: &str) -> Result<cron::Schedule, cron::error::Error> {
    let field_count = expression.split_whitespace().count();
    let normalized = if field_count == 5 {
        format!("0 {expression}")
    } else {
        expression.to_string()
    };
    cron::Schedule::from_str(&normalized)
}

/// Compute the next UTC execution time for `schedule` starting *after* `from`.
///
/// Returns `None` when the schedule is exhausted (e.g. a `Once` job whose
/// time has already passed) or when the schedule type is not yet supported
/// (e.g. `Cron`).
pub fn compute_next_run(schedule: &Schedule, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match schedule {
        Schedule::Once { at } => {
            // Fire only if the instant is still in the future.
            if *at > from {
                Some(*at)
            } else {
                None
            }
        }

        Schedule::Interval { every_secs } => Some(from + Duration::seconds(*every_secs as i64)),

        Schedule::Daily { hour, minute } => {
            // Build today's candidate at HH:MM:00 UTC.
            let candidate = Utc
                .with_ymd_and_hms(
                    from.year(),
                    from.month(),
                    from.day(),
                    *hour as u32,
                    *minute as u32,
                    0,
                )
                .single()?;
            if candidate > from {
                Some(candidate)
            } else {
                // Today's window has passed — advance to tomorrow.
                Some(candidate + Duration::days(1))
            }
        }

        Schedule::Weekly { day, hour, minute } => {
            // `day` follows ISO weekday numbering: 0=Monday … 6=Sunday,
            // which matches chrono's `num_days_from_monday`.
            let today_dow = from.weekday().num_days_from_monday() as i64;
            let target_dow = (*day as i64).clamp(0, 6);
            let mut days_ahead = target_dow - today_dow;

            // Normalise: negative means the target day already passed this week.
            let candidate_day = if days_ahead < 0 {
                from + Duration::days(7 + days_ahead)
            } else {
                from + Duration::days(days_ahead)
            };

            let candidate = Utc
                .with_ymd_and_hms(
                    candidate_day.year(),
                    candidate_day.month(),
                    candidate_day.day(),
                    *hour as u32,
                    *minute as u32,
                    0,
                )
                .single()?;

            if candidate > from {
                Some(candidate)
            } else {
                // The time on the target weekday has already passed — push 7 days.
                days_ahead = if days_ahead <= 0 { 7 } else { 7 - days_ahead };
                Some(candidate + Duration::days(days_ahead))
            }
        }

        Schedule::Cron { expression } => match parse_cron(expression) {
            Ok(sched) => sched.after(&from).next(),
            Err(e) => {
                warn!(expression = %expression, error = %e, "invalid cron expression; next_run will not be set");
                None
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cron_exact_fire_computes_next_minute_boundary() {
        let from = Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap();
        let schedule = Schedule::Cron {
            expression: "*/5 * * * *".to_string(),
        };
        let next = compute_next_run(&schedule, from).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 1, 1, 9, 5, 0).unwrap());
    }

    #[test]
    fn cron_accepts_native_seconds_field() {
        let from = Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap();
        let schedule = Schedule::Cron {
            expression: "30 * * * * *".to_string(),
        };
        let next = compute_next_run(&schedule, from).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 30).unwrap());
    }

    #[test]
    fn invalid_cron_expression_returns_none() {
        let from = Utc::now();
        let schedule = Schedule::Cron {
            expression: "not a cron expr".to_string(),
        };
        assert!(compute_next_run(&schedule, from).is_none());
    }
}

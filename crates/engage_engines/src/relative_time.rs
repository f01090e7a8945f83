#![forbid(unsafe_code)]

use engage_contracts::activity::EventTimestamp;
use time::macros::format_description;

const MINUTE_S: i64 = 60;
const HOUR_S: i64 = 60 * MINUTE_S;
const DAY_S: i64 = 24 * HOUR_S;
const WEEK_S: i64 = 7 * DAY_S;

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("1 {unit} ago")
    } else {
        format!("{n} {unit}s ago")
    }
}

/// Human label for `ts` as seen at `now`. Instants in the future read as
/// "just now"; anything a week or older is shown as a calendar date.
pub fn format_relative(ts: EventTimestamp, now: EventTimestamp) -> String {
    let elapsed = (now.as_datetime() - ts.as_datetime()).whole_seconds();
    if elapsed < MINUTE_S {
        return "just now".to_string();
    }
    if elapsed < HOUR_S {
        return plural(elapsed / MINUTE_S, "minute");
    }
    if elapsed < DAY_S {
        return plural(elapsed / HOUR_S, "hour");
    }
    if elapsed < WEEK_S {
        return plural(elapsed / DAY_S, "day");
    }
    ts.as_datetime()
        .date()
        .format(format_description!("[year]-[month]-[day]"))
        .unwrap_or_else(|_| ts.to_iso8601())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(ms: i64) -> EventTimestamp {
        EventTimestamp::from_unix_ms(ms)
    }

    const NOW_MS: i64 = 1_717_200_000_000; // 2024-06-01T00:00:00Z

    #[test]
    fn at_relative_01_thresholds() {
        let now = at(NOW_MS);
        assert_eq!(format_relative(at(NOW_MS - 59_000), now), "just now");
        assert_eq!(format_relative(at(NOW_MS - 60_000), now), "1 minute ago");
        assert_eq!(format_relative(at(NOW_MS - 45 * 60_000), now), "45 minutes ago");
        assert_eq!(format_relative(at(NOW_MS - 3_600_000), now), "1 hour ago");
        assert_eq!(format_relative(at(NOW_MS - 23 * 3_600_000), now), "23 hours ago");
        assert_eq!(format_relative(at(NOW_MS - 2 * 86_400_000), now), "2 days ago");
    }

    #[test]
    fn at_relative_02_future_is_just_now_and_old_is_a_date() {
        let now = at(NOW_MS);
        assert_eq!(format_relative(at(NOW_MS + 3_600_000), now), "just now");
        assert_eq!(format_relative(at(NOW_MS - 7 * 86_400_000), now), "2024-05-25");
        assert_eq!(format_relative(EventTimestamp::EPOCH, now), "1970-01-01");
    }
}

//! Boundary between stored UTC instants and human-authored wall-clock times.
//!
//! Every instant the engine stores or compares is UTC. Rotation start times,
//! handoff times and DND quiet hours are written by people in a named zone, so
//! they are converted here and nowhere else.

use chrono::{DateTime, Duration, LocalResult, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Longest forward probe when a wall-clock time falls in a DST gap.
const MAX_GAP_MINUTES: i64 = 4 * 60;

/// Wall-clock time of `at` in `tz`.
pub fn to_local(tz: Tz, at: DateTime<Utc>) -> NaiveDateTime {
    at.with_timezone(&tz).naive_local()
}

/// UTC instant of a wall-clock time in `tz`.
///
/// Ambiguous times (clocks turned back) resolve to the earlier instant.
/// Times that do not exist (clocks turned forward) move to the first valid
/// minute after the gap.
pub fn to_utc(tz: Tz, local: NaiveDateTime) -> DateTime<Utc> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        LocalResult::None => {
            let mut probe = local;
            for _ in 0..MAX_GAP_MINUTES {
                probe += Duration::minutes(1);
                if let Some(dt) = tz.from_local_datetime(&probe).earliest() {
                    return dt.with_timezone(&Utc);
                }
            }
            Utc.from_utc_datetime(&local)
        }
    }
}

pub(crate) mod serde_name {
    use chrono_tz::Tz;
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(tz: &Tz, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(tz.name())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Tz, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse::<Tz>().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn zurich() -> Tz {
        "Europe/Zurich".parse().unwrap()
    }

    fn naive(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn winter_time_is_one_hour_ahead() {
        assert_eq!(
            to_utc(zurich(), naive(2025, 1, 15, 10, 0)),
            ts("2025-01-15T09:00:00Z")
        );
    }

    #[test]
    fn round_trip_through_local() {
        let at = ts("2025-07-01T22:15:00Z");
        assert_eq!(to_utc(zurich(), to_local(zurich(), at)), at);
    }

    #[test]
    fn gap_moves_forward_to_first_valid_minute() {
        // 2025-03-30 02:00 local does not exist in Zurich; clocks jump to 03:00.
        assert_eq!(
            to_utc(zurich(), naive(2025, 3, 30, 2, 30)),
            ts("2025-03-30T01:00:00Z")
        );
    }

    #[test]
    fn ambiguous_time_takes_earlier_instant() {
        // 02:30 happens twice on 2025-10-26; the first one is still CEST.
        assert_eq!(
            to_utc(zurich(), naive(2025, 10, 26, 2, 30)),
            ts("2025-10-26T00:30:00Z")
        );
    }
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time formatting.
//!
//! Timestamps are persisted as fixed-width RFC 3339 strings with millisecond
//! precision and a `Z` suffix, so string ordering in Firestore queries matches
//! chronological ordering.

use chrono::{DateTime, SecondsFormat, Utc};

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Number of UTC calendar days from `earlier` to `later`.
///
/// 23:59 → 00:01 the next day is one day apart even though only two minutes
/// elapsed. Negative when `later` is on an earlier calendar day.
pub fn calendar_days_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> i64 {
    later
        .date_naive()
        .signed_duration_since(earlier.date_naive())
        .num_days()
}

/// Serde adapter storing `DateTime<Utc>` as a fixed-width RFC 3339 string.
pub mod rfc3339_millis {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_utc_rfc3339(*date))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }

    /// Same as the parent module for `Option<DateTime<Utc>>`.
    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            date: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match date {
                Some(date) => serializer.serialize_some(&super::super::format_utc_rfc3339(*date)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            Option::<String>::deserialize(deserializer)?
                .map(|raw| {
                    DateTime::parse_from_rfc3339(&raw)
                        .map(|dt| dt.with_timezone(&Utc))
                        .map_err(serde::de::Error::custom)
                })
                .transpose()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_is_fixed_width() {
        let a = Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap();
        let b = a + chrono::Duration::milliseconds(500);

        assert_eq!(format_utc_rfc3339(a), "2025-03-01T10:00:00.000Z");
        assert!(format_utc_rfc3339(a) < format_utc_rfc3339(b));
    }

    #[test]
    fn test_calendar_days_between() {
        let late = Utc.with_ymd_and_hms(2025, 3, 1, 23, 59, 0).unwrap();
        let early_next = Utc.with_ymd_and_hms(2025, 3, 2, 0, 1, 0).unwrap();

        assert_eq!(calendar_days_between(late, early_next), 1);
        assert_eq!(calendar_days_between(late, late), 0);
        assert_eq!(calendar_days_between(early_next, late), -1);
    }
}

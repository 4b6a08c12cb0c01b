//! Timestamp formatting shared by keys and persisted attributes.
//!
//! Timestamps are RFC 3339 in UTC with millisecond precision and a `Z`
//! suffix. The fixed width keeps lexicographic order equal to chronological
//! order, which the ordering indexes and the `<`/`>` conditions rely on.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Deserializer, Serializer};

/// The current time truncated to the stored precision.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Formats a timestamp for storage.
pub fn format(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parses a stored timestamp.
pub fn parse(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc))
}

/// Serde adapter for required timestamps: `#[serde(with = "crate::timestamp::required")]`.
pub mod required {
    use super::*;

    pub fn serialize<S>(at: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format(*at))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Serde adapter for optional timestamps. Pair with
/// `#[serde(default, skip_serializing_if = "Option::is_none")]`.
pub mod optional {
    use super::*;

    pub fn serialize<S>(at: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match at {
            Some(at) => serializer.serialize_some(&format(*at)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: Option<String> = Option::deserialize(deserializer)?;
        match s {
            Some(s) if !s.trim().is_empty() => parse(&s).map(Some).map_err(serde::de::Error::custom),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde::Serialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Stamped {
        #[serde(with = "required")]
        at: DateTime<Utc>,
        #[serde(default, skip_serializing_if = "Option::is_none", with = "optional")]
        until: Option<DateTime<Utc>>,
    }

    #[test]
    fn test_format_is_fixed_width() {
        let whole = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
        assert_eq!(format(whole), "2024-01-15T10:30:00.000Z");
    }

    #[test]
    fn test_lexicographic_order_matches_time_order() {
        let earlier = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
        let later = earlier + chrono::Duration::milliseconds(5);
        assert!(format(earlier) < format(later));
    }

    #[test]
    fn test_now_survives_storage_round_trip() {
        let at = now();
        assert_eq!(parse(&format(at)).unwrap(), at);
    }

    #[test]
    fn test_serde_round_trip() {
        let stamped = Stamped {
            at: Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
            until: None,
        };

        let json = serde_json::to_value(&stamped).unwrap();
        assert_eq!(json["at"], "2024-06-01T00:00:00.000Z");
        assert!(json.get("until").is_none());

        let parsed: Stamped = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, stamped);
    }
}

//! `X-Time-Format` rendering (spec §4.10, §6 header table).

use chrono::{DateTime, SecondsFormat, Utc};

/// Timestamp rendering chosen by the `X-Time-Format` header. Unknown or
/// absent values fall back to [`TimeFormat::Iso8601`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeFormat {
    /// `2024-01-02T03:04:05.678Z` — the default.
    Iso8601,
    /// Same rendering as ISO-8601 for a `DateTime<Utc>`; kept distinct so
    /// the parser round-trips the header's own vocabulary.
    IsoInstant,
    /// `2024-01-02T03:04:05.678+00:00`.
    Rfc3339,
    /// Same as `IsoOffsetDateTime`, alias of RFC-3339 with an explicit
    /// offset rather than `Z`.
    IsoOffsetDateTime,
    /// Milliseconds since the Unix epoch.
    UnixMillis,
    /// Seconds since the Unix epoch.
    Unix,
    /// `20240102`.
    BasicIsoDate,
    /// `2024-01-02`.
    IsoLocalDate,
    /// `2024-01-02T03:04:05.678`.
    IsoLocalDateTime,
}

impl TimeFormat {
    /// Parse the `X-Time-Format` header value, case-insensitively,
    /// falling back to ISO-8601 on anything unrecognized (spec §6
    /// "invalid/unknown values fall back to ISO-8601").
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::to_ascii_uppercase).as_deref() {
            Some("ISO-8601") | Some("ISO_8601") => Self::Iso8601,
            Some("ISO_INSTANT") => Self::IsoInstant,
            Some("RFC-3339") | Some("RFC_3339") => Self::Rfc3339,
            Some("ISO_OFFSET_DATE_TIME") => Self::IsoOffsetDateTime,
            Some("UNIX") => Self::Unix,
            Some("UNIX-MILLIS") | Some("UNIX_MILLIS") => Self::UnixMillis,
            Some("BASIC_ISO_DATE") => Self::BasicIsoDate,
            Some("ISO_LOCAL_DATE") => Self::IsoLocalDate,
            Some("ISO_LOCAL_DATE_TIME") => Self::IsoLocalDateTime,
            _ => Self::Iso8601,
        }
    }

    /// Render `at` in this format.
    pub fn render(self, at: DateTime<Utc>) -> String {
        match self {
            Self::Iso8601 | Self::IsoInstant => at.to_rfc3339_opts(SecondsFormat::Millis, true),
            Self::Rfc3339 | Self::IsoOffsetDateTime => at.to_rfc3339_opts(SecondsFormat::Millis, false),
            Self::Unix => at.timestamp().to_string(),
            Self::UnixMillis => at.timestamp_millis().to_string(),
            Self::BasicIsoDate => at.format("%Y%m%d").to_string(),
            Self::IsoLocalDate => at.format("%Y-%m-%d").to_string(),
            Self::IsoLocalDateTime => at.format("%Y-%m-%dT%H:%M:%S%.3f").to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap()
    }

    #[test]
    fn unknown_header_falls_back_to_iso8601() {
        assert_eq!(TimeFormat::parse(Some("bogus")), TimeFormat::Iso8601);
        assert_eq!(TimeFormat::parse(None), TimeFormat::Iso8601);
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(TimeFormat::parse(Some("unix-millis")), TimeFormat::UnixMillis);
    }

    #[test]
    fn unix_millis_renders_milliseconds_since_epoch() {
        let rendered = TimeFormat::UnixMillis.render(sample());
        assert_eq!(rendered, sample().timestamp_millis().to_string());
    }

    #[test]
    fn basic_iso_date_has_no_separators() {
        assert_eq!(TimeFormat::BasicIsoDate.render(sample()), "20240102");
    }
}

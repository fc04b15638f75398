use chrono::{DateTime, Local, TimeZone, Utc};

/// How program times are shown: local month/day, then time of day.
pub const DISPLAY_TIME_FORMAT: &str = "%m/%d | %H:%M:%S";

/// Formats `ts` in the machine's local time zone.
pub fn format_local(ts: DateTime<Utc>) -> String {
    format_in(ts, &Local)
}

pub fn format_in<Tz>(ts: DateTime<Utc>, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    ts.with_timezone(tz).format(DISPLAY_TIME_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    #[test]
    fn test_format_in_offset() {
        let ts = Utc.with_ymd_and_hms(2017, 12, 10, 23, 30, 5).unwrap();
        let stockholm_winter = FixedOffset::east_opt(3600).unwrap();
        assert_eq!(format_in(ts, &stockholm_winter), "12/11 | 00:30:05");
        assert_eq!(format_in(ts, &Utc), "12/10 | 23:30:05");
    }
}

use thiserror::Error;
use time::{
    Date, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset,
    format_description::well_known::{Iso8601, Rfc3339},
};

/// Years RFC 3339 can render; anything outside is refused at parse time.
const RENDERABLE_YEARS: std::ops::RangeInclusive<i32> = 0..=9999;

#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum InvalidTimestamp {
    #[error("can not be parsed")]
    Unparseable,
    #[error("can not be in the future")]
    Future,
}

/// Parses an ISO-8601 date-time and rejects instants later than the system
/// clock at the moment of the call. The result is normalized to UTC.
///
/// Values without an offset, including bare dates, are read as UTC.
pub fn validate_timestamp(value: &str) -> Result<OffsetDateTime, InvalidTimestamp> {
    validate_timestamp_at(value, OffsetDateTime::now_utc())
}

fn validate_timestamp_at(
    value: &str,
    now: OffsetDateTime,
) -> Result<OffsetDateTime, InvalidTimestamp> {
    let parsed = parse_timestamp(value).ok_or(InvalidTimestamp::Unparseable)?;
    if parsed > now {
        return Err(InvalidTimestamp::Future);
    }
    Ok(parsed)
}

/// Returns the instant in UTC, or `None` when it cannot be parsed or its UTC
/// year has no RFC 3339 rendering.
pub fn parse_timestamp(value: &str) -> Option<OffsetDateTime> {
    let value = value.trim();
    OffsetDateTime::parse(value, &Rfc3339)
        .or_else(|_| OffsetDateTime::parse(value, &Iso8601::PARSING))
        .or_else(|_| PrimitiveDateTime::parse(value, &Iso8601::PARSING).map(|dt| dt.assume_utc()))
        .or_else(|_| {
            Date::parse(value, &Iso8601::PARSING)
                .map(|date| PrimitiveDateTime::new(date, Time::MIDNIGHT).assume_utc())
        })
        .ok()
        .map(|parsed| parsed.to_offset(UtcOffset::UTC))
        .filter(|parsed| RENDERABLE_YEARS.contains(&parsed.year()))
}

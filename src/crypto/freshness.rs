//! Response freshness enforcement (replay prevention).

use crate::clock::Clock;
use crate::errors::ResponseRejection;
use chrono::{DateTime, Utc};

/// Maximum age of a response before it's considered stale (5 minutes).
pub const MAX_RESPONSE_AGE_SECONDS: i64 = 5 * 60;

/// Maximum future tolerance for response dates (60 seconds).
pub const MAX_FUTURE_TOLERANCE_SECONDS: i64 = 60;

/// Parse an HTTP Date header (RFC 2822), e.g. `Wed, 09 Jun 2021 16:08:15 GMT`.
pub fn parse_http_date(date_str: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(date_str)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Check that a response date is within the freshness window.
pub fn check_freshness<C: Clock + ?Sized>(
    response_date: DateTime<Utc>,
    clock: &C,
) -> Result<(), ResponseRejection> {
    let age_seconds = (clock.now_utc() - response_date).num_seconds();

    if age_seconds > MAX_RESPONSE_AGE_SECONDS {
        return Err(ResponseRejection::TooOld { age_seconds });
    }

    if age_seconds < -MAX_FUTURE_TOLERANCE_SECONDS {
        return Err(ResponseRejection::FromFuture);
    }

    Ok(())
}

/// Parse the Date header and check freshness. An unparseable date is treated
/// as a signature failure since the date is part of the signed message.
pub fn check_date_freshness<C: Clock + ?Sized>(
    date_header: &str,
    clock: &C,
) -> Result<DateTime<Utc>, ResponseRejection> {
    let response_date =
        parse_http_date(date_header).ok_or(ResponseRejection::SignatureInvalid)?;
    check_freshness(response_date, clock)?;
    Ok(response_date)
}

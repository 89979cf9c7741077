//! Booking and tracking code formats.
//!
//! Booking codes are sequential and readable (`BK-202610-00042`); they are only shown to admins and the owning
//! customer. Tracking codes (`TRK-7Q2M-X9DA-4KZP`) are drawn at random from 60 bits of Crockford base-32 so that they
//! say nothing about how many orders exist and cannot be enumerated.
use chrono::{DateTime, Datelike, Utc};
use rand::Rng;
use regex::Regex;

use crate::db_types::{BookingCode, TrackingCode};

/// How many fresh tracking codes are drawn before giving up with `IdentifierExhausted`.
pub const MAX_CODE_ATTEMPTS: usize = 5;

const CROCKFORD_ALPHABET: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";
const TRACKING_PREFIX: &str = "TRK";
const TRACKING_GROUPS: usize = 3;
const GROUP_LEN: usize = 4;

pub fn format_booking_code(issued_at: DateTime<Utc>, sequence: i64) -> BookingCode {
    BookingCode(format!("BK-{:04}{:02}-{sequence:05}", issued_at.year(), issued_at.month()))
}

pub fn random_tracking_code<R: Rng + ?Sized>(rng: &mut R) -> TrackingCode {
    let groups = (0..TRACKING_GROUPS)
        .map(|_| {
            (0..GROUP_LEN).map(|_| CROCKFORD_ALPHABET[rng.gen_range(0..CROCKFORD_ALPHABET.len())] as char).collect::<String>()
        })
        .collect::<Vec<String>>();
    TrackingCode(format!("{TRACKING_PREFIX}-{}", groups.join("-")))
}

pub fn new_tracking_code() -> TrackingCode {
    random_tracking_code(&mut rand::thread_rng())
}

/// Cleans up a tracking code typed in by a visitor.
///
/// Case and surrounding whitespace are ignored, as are the letters Crockford base-32 treats as look-alikes (`O` for
/// `0`, `I` and `L` for `1`). Returns `None` if the result is not a well-formed tracking code.
pub fn normalize_tracking_code(input: &str) -> Option<TrackingCode> {
    let pattern = Regex::new(r"^TRK-[0-9A-HJKMNP-TV-Z]{4}-[0-9A-HJKMNP-TV-Z]{4}-[0-9A-HJKMNP-TV-Z]{4}$").ok()?;
    let upper = input.trim().to_uppercase();
    let (prefix, body) = upper.split_at(upper.find('-').unwrap_or(0));
    let body = body.replace('O', "0").replace(['I', 'L'], "1");
    let candidate = format!("{prefix}{body}");
    pattern.is_match(&candidate).then_some(TrackingCode(candidate))
}

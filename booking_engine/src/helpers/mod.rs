mod codes;

pub use codes::{
    format_booking_code,
    new_tracking_code,
    normalize_tracking_code,
    random_tracking_code,
    MAX_CODE_ATTEMPTS,
};

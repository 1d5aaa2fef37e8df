pub mod timestamps;
pub use timestamps::{
    epoch_seconds, format_timestamp, normalize_timestamp, now_timestamp, parse_timestamp,
    timestamp_seconds_before,
};
pub mod url_validation;
pub use url_validation::{UrlValidationError, validate_endpoint_url};

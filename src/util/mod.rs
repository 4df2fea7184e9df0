//! Small helpers shared by the notifier and configuration code.
//!
//! - **URL validation**: refuses non-http(s) and internal addresses for feed sources
//! - **Text processing**: control-character stripping, HTML escaping, width-aware truncation

mod text;
mod url_validator;

pub use text::{escape_html, format_interval, strip_control_chars, truncate_to_width};
pub use url_validator::{validate_url, UrlValidationError};

mod files;
mod headers;
pub mod progress;

// Export utility functions
pub use self::files::{output_titles, title_from_url};
pub use self::headers::parse_headers;

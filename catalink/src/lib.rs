pub mod handlers;
pub mod report;

// Re-export commonly used handler functions for convenience
pub use handlers::{
    load_endpoints_from_file, load_endpoints_from_source, load_whitelist, parse_endpoint_line,
};
pub use report::{outcome_label, render_json_report, render_text_report};

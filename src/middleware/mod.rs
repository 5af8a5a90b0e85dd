pub mod envelope_errors;
pub mod validate_body;

pub use envelope_errors::envelope_bare_errors;
pub use validate_body::{body_size_kb, has_values, validate_body};

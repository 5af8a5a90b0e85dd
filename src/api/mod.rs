pub mod envelope;
pub mod params;

pub use envelope::{Envelope, Pagination};
pub use params::context_params;

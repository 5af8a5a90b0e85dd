pub mod user;

pub use user::{hash_password, Role, UserRecord};

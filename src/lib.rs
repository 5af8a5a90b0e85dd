pub mod api;
pub mod config;
pub mod database;
pub mod error;
pub mod filter;
pub mod handlers;
pub mod middleware;
pub mod server;
pub mod types;

#[cfg(test)]
pub mod testing;

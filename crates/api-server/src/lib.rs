#![warn(clippy::unwrap_used)]

pub mod rest;
pub mod server;
pub mod stream;

pub use server::ApiServer;

//! HTTP trigger surface

pub mod middleware;
pub mod routes;
mod server;

pub use server::{ApiServer, AppState, router};

//! HTTP shell around the connection registry

pub mod routes;
pub mod server;

pub use routes::{handle_request, AppState};
pub use server::{shutdown_signal, Server};

#![forbid(unsafe_code)]
//! The server engine: connection admission, the request multiplexer, the
//! heartbeat, and the `/healthz` endpoint.

mod config;
mod connection;
mod dispatch;
mod error;
mod factory;
mod health;
mod server;

pub use config::GatewayConfig;
pub use connection::ConnectionState;
pub use error::{CLOSE_AUTH_FAILED, CLOSE_ORIGIN_REJECTED};
pub use factory::{RunnerFactories, RunnerFactoryFn};
pub use server::{build_router, serve, AppState};

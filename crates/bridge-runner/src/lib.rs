#![forbid(unsafe_code)]
//! Provider runner abstraction (C2) and its concrete shapes: a shared
//! subprocess base (C3) specialized by two CLI-backed providers (C4, C5),
//! and a direct HTTP-streaming implementation (C6).

mod adapter;
mod env;
mod error;
mod provider_a;
mod provider_b;
mod provider_c;
mod runner;
mod session;
mod spawn;
mod subprocess;

pub use adapter::SubprocessAdapter;
pub use error::RunnerError;
pub use provider_a::{ProviderAAdapter, ProviderAConfig};
pub use provider_b::{ProviderBAdapter, ProviderBConfig};
pub use provider_c::spawn_http_runner;
pub use runner::{BoxFuture, EventSender, RunOptions, Runner, RunnerEvent, RunnerHandle};
pub use subprocess::spawn_subprocess_runner;

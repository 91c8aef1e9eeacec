use std::sync::Arc;

use bridge_runner::Runner;

/// A pluggable constructor for one provider's runner. Production code
/// passes closures that build real subprocess/HTTP runners; tests pass
/// closures that build an in-memory fake that records inputs and fires
/// handlers synchronously. This is the design's only concession to
/// testability — no production code branches on whether a test is
/// running.
pub type RunnerFactoryFn = Arc<dyn Fn() -> Box<dyn Runner> + Send + Sync>;

#[derive(Clone)]
pub struct RunnerFactories {
    pub provider_a: RunnerFactoryFn,
    pub provider_b: RunnerFactoryFn,
    pub provider_c: RunnerFactoryFn,
}

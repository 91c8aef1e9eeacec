//! Per-connection state (C7): the request registry and the cached
//! runner-per-provider. A connection exclusively owns both; nothing here
//! is shared across connections.

use std::collections::HashMap;

use bridge_runner::Runner;
use bridge_wire::Provider;

use crate::factory::RunnerFactories;

pub struct ConnectionState {
    /// request id -> the provider currently executing it. Removed on the
    /// first of {complete, error, cancel}.
    requests: HashMap<String, Provider>,
    /// At most one runner cached per provider kind, reused for the
    /// lifetime of the connection.
    runners: HashMap<Provider, Box<dyn Runner>>,
    is_alive: bool,
}

impl ConnectionState {
    pub fn new() -> Self {
        Self {
            requests: HashMap::new(),
            runners: HashMap::new(),
            is_alive: true,
        }
    }

    pub fn has_request(&self, request_id: &str) -> bool {
        self.requests.contains_key(request_id)
    }

    pub fn register_request(&mut self, request_id: String, provider: Provider) {
        self.requests.insert(request_id, provider);
    }

    /// Removes a request from the registry. Returns the provider it was
    /// running on, if it was present (cancel of an unknown id is a no-op).
    pub fn remove_request(&mut self, request_id: &str) -> Option<Provider> {
        self.requests.remove(request_id)
    }

    pub fn runner_for(&mut self, provider: Provider, factories: &RunnerFactories) -> &mut Box<dyn Runner> {
        self.runners.entry(provider).or_insert_with(|| match provider {
            Provider::A => (factories.provider_a)(),
            Provider::B => (factories.provider_b)(),
            Provider::C => (factories.provider_c)(),
        })
    }

    pub fn is_alive(&self) -> bool {
        self.is_alive
    }

    pub fn mark_alive(&mut self) {
        self.is_alive = true;
    }

    pub fn mark_dead(&mut self) {
        self.is_alive = false;
    }

    /// Disposes every cached runner. Called on peer close, heartbeat
    /// timeout, or server shutdown — after this, any further `run` seen
    /// by a runner (there shouldn't be any) would short-circuit to an
    /// error, but in practice the connection is gone by then.
    pub async fn dispose_all(&mut self) {
        for (_, runner) in self.runners.iter_mut() {
            runner.dispose().await;
        }
        self.runners.clear();
        self.requests.clear();
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::new()
    }
}

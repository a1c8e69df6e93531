pub mod states;

use crate::config::ManagerConfig;
use crate::manager::ConnectionManager;
use crate::traits::*;
use states::*;
use std::time::Duration;
use tokio::runtime::Handle;

/// Type-state builder for [`ConnectionManager`]
///
/// The endpoint and the transport factory are required; `build()` only exists
/// once both have been provided.
///
/// # Example
/// ```ignore
/// let manager = ConnectionManager::builder()
///     .endpoint("wss://push.example.com/ws")
///     .transport(TungsteniteFactory)
///     .heartbeat_interval(Duration::from_secs(10))
///     .reconnect_strategy(ExponentialBackoff::new(
///         Duration::from_millis(500),
///         Duration::from_secs(10),
///         None,
///     ))
///     .build()?;
/// ```
pub struct ConnectionManagerBuilder<E, T>
where
    E: EndpointState,
    T: TransportState,
{
    _state: TypeState<E, T>,
    config: ManagerConfig,
    /// Explicit settings win over `config()`, whatever the call order
    heartbeat_interval_ms: Option<u64>,
    stale_after_ms: Option<u64>,
    factory: Option<Box<dyn TransportFactory>>,
    reconnect_strategy: Option<Box<dyn ReconnectionStrategy>>,
    runtime: Option<Handle>,
}

impl ConnectionManagerBuilder<NoEndpoint, NoTransport> {
    /// Create a new builder instance
    pub fn new() -> Self {
        Self {
            _state: TypeState::new(),
            config: ManagerConfig::new(String::new()),
            heartbeat_interval_ms: None,
            stale_after_ms: None,
            factory: None,
            reconnect_strategy: None,
            runtime: None,
        }
    }
}

impl Default for ConnectionManagerBuilder<NoEndpoint, NoTransport> {
    fn default() -> Self {
        Self::new()
    }
}

// Endpoint setting
impl<T> ConnectionManagerBuilder<NoEndpoint, T>
where
    T: TransportState,
{
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> ConnectionManagerBuilder<HasEndpoint, T> {
        self.config.endpoint = endpoint.into();
        self.with_state()
    }

    /// Take endpoint, heartbeat interval, stale detection and log level from a
    /// loaded config. `heartbeat_interval`/`stale_after` set on the builder still
    /// take precedence.
    pub fn config(mut self, config: ManagerConfig) -> ConnectionManagerBuilder<HasEndpoint, T> {
        self.config = config;
        self.with_state()
    }
}

// Transport setting
impl<E> ConnectionManagerBuilder<E, NoTransport>
where
    E: EndpointState,
{
    pub fn transport<F>(mut self, factory: F) -> ConnectionManagerBuilder<E, HasTransport>
    where
        F: TransportFactory,
    {
        self.factory = Some(Box::new(factory));
        self.with_state()
    }
}

// Optional settings, available in any state
impl<E, T> ConnectionManagerBuilder<E, T>
where
    E: EndpointState,
    T: TransportState,
{
    /// Liveness-check cadence (default 10s)
    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval_ms = Some(u64::try_from(interval.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// Replace an open connection that has received nothing for `after`
    pub fn stale_after(mut self, after: Duration) -> Self {
        self.stale_after_ms = Some(u64::try_from(after.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// Delay policy for eager reconnects (default [`Immediate`])
    pub fn reconnect_strategy<S>(mut self, strategy: S) -> Self
    where
        S: ReconnectionStrategy + 'static,
    {
        self.reconnect_strategy = Some(Box::new(strategy));
        self
    }

    /// Runtime that connect attempts and the heartbeat are spawned on.
    /// Defaults to the runtime `build()` is called from.
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    fn with_state<E2, T2>(self) -> ConnectionManagerBuilder<E2, T2>
    where
        E2: EndpointState,
        T2: TransportState,
    {
        ConnectionManagerBuilder {
            _state: TypeState::new(),
            config: self.config,
            heartbeat_interval_ms: self.heartbeat_interval_ms,
            stale_after_ms: self.stale_after_ms,
            factory: self.factory,
            reconnect_strategy: self.reconnect_strategy,
            runtime: self.runtime,
        }
    }
}

impl ConnectionManagerBuilder<HasEndpoint, HasTransport> {
    /// Validate the configuration and start the manager's dispatcher
    ///
    /// Must be called inside a Tokio runtime unless one was given via [`runtime`](Self::runtime).
    pub fn build(mut self) -> Result<ConnectionManager> {
        if let Some(ms) = self.heartbeat_interval_ms {
            self.config.heartbeat_interval_ms = ms;
        }
        if let Some(ms) = self.stale_after_ms {
            self.config.stale_after_ms = Some(ms);
        }

        self.config
            .validate()
            .map_err(|e| LifelineError::Configuration(e.to_string()))?;

        let runtime = match self.runtime {
            Some(runtime) => runtime,
            None => Handle::try_current().map_err(|_| {
                LifelineError::Configuration(
                    "ConnectionManager must be built inside a Tokio runtime".to_string(),
                )
            })?,
        };

        let factory = self
            .factory
            .ok_or_else(|| LifelineError::Configuration("transport factory not set".to_string()))?;
        let strategy = self
            .reconnect_strategy
            .unwrap_or_else(|| Box::new(Immediate));

        ConnectionManager::from_parts(self.config, factory, strategy, runtime)
    }
}

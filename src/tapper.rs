//! Shared state for one invocation.

use crate::config::{AuthConfig, Config, Credentials, Deployment};
use crate::dispatch::Transport;
use crate::drivers::DriverRegistry;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Default per-address probe timeout.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(8);

/// Everything scans and procedures read: registered probers, loaded files
/// and the transport.
///
/// Built once, then shared behind an `Arc` and never mutated by workers.
pub struct Tapper {
    registry: DriverRegistry,
    transport: Arc<dyn Transport>,
    probe_timeout: Duration,
    request_timeout: Option<Duration>,
    config: Option<Config>,
    credentials: Option<Credentials>,
    auth: Option<AuthConfig>,
    deployment: Option<Deployment>,
}

impl Tapper {
    pub fn new(registry: DriverRegistry, transport: Arc<dyn Transport>) -> Self {
        Self {
            registry,
            transport,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            request_timeout: None,
            config: None,
            credentials: None,
            auth: None,
            deployment: None,
        }
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Timeout for procedure requests; the transport default applies otherwise.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Credentials injected into every discovered device that can use them.
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_auth(mut self, auth: AuthConfig) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn with_deployment(mut self, deployment: Deployment) -> Self {
        self.deployment = Some(deployment);
        self
    }

    pub fn registry(&self) -> &DriverRegistry {
        &self.registry
    }

    pub fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    pub fn probe_timeout(&self) -> Duration {
        self.probe_timeout
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout
    }

    pub fn config(&self) -> Option<&Config> {
        self.config.as_ref()
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    pub fn auth(&self) -> Option<&AuthConfig> {
        self.auth.as_ref()
    }

    pub fn deployment(&self) -> Option<&Deployment> {
        self.deployment.as_ref()
    }

    /// Whether a loaded policy needs device names that only enrichment fetches.
    pub fn needs_device_names(&self) -> bool {
        let auth = self.auth.as_ref().and_then(|auth| auth.policy.as_ref());
        let deployment = self
            .deployment
            .as_ref()
            .and_then(|deployment| deployment.policy.as_ref());
        auth.into_iter()
            .chain(deployment)
            .any(|policy| policy.matches_names())
    }
}

impl fmt::Debug for Tapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tapper")
            .field("registry", &self.registry)
            .field("probe_timeout", &self.probe_timeout)
            .field("request_timeout", &self.request_timeout)
            .field("config", &self.config.is_some())
            .field("credentials", &self.credentials)
            .field("auth", &self.auth.is_some())
            .field("deployment", &self.deployment.is_some())
            .finish()
    }
}

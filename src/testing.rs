//! Test doubles: a scripted transport and a configurable device.

use crate::config::{AuthConfig, Credentials, Deployment};
use crate::device::{
    Capability, Configurer, Deployer, Device, Enricher, FirmwareStatus, Rebooter, Securer,
    Updater, Versioner,
};
use crate::dispatch::{HttpRequest, HttpResponse, Transport};
use crate::error::{DriverError, DriverResult, TransportError};
use crate::types::HwAddr;
use async_trait::async_trait;
use reqwest::header::{HeaderValue, CONTENT_TYPE, WWW_AUTHENTICATE};
use reqwest::{StatusCode, Url};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A canned response.
#[derive(Debug, Clone)]
pub struct MockReply {
    response: HttpResponse,
}

impl MockReply {
    pub fn json(status: u16, body: &str) -> Self {
        Self::text(status, body).with_header(CONTENT_TYPE, "application/json")
    }

    pub fn text(status: u16, body: &str) -> Self {
        let status = StatusCode::from_u16(status).unwrap();
        Self {
            response: HttpResponse::new(status).with_body(body.as_bytes().to_vec()),
        }
    }

    /// A 401 carrying `WWW-Authenticate: <value>`.
    pub fn challenge(value: &str) -> Self {
        Self::text(401, "").with_header(WWW_AUTHENTICATE, value)
    }

    fn with_header(mut self, name: reqwest::header::HeaderName, value: &str) -> Self {
        self.response = self
            .response
            .with_header(name, HeaderValue::from_str(value).unwrap());
        self
    }
}

#[derive(Default)]
struct MockState {
    routes: HashMap<(String, String), VecDeque<MockReply>>,
    requests: Vec<HttpRequest>,
}

/// Transport answering from a routing table keyed by host and path.
///
/// Unrouted requests fail like a refused connection. A route given a sequence
/// replays its replies in order and then keeps repeating the last one.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(&self, host: &str, path: &str, reply: MockReply) {
        self.route_sequence(host, path, vec![reply]);
    }

    pub fn route_sequence(&self, host: &str, path: &str, replies: Vec<MockReply>) {
        self.state
            .lock()
            .unwrap()
            .routes
            .insert((host.to_string(), path.to_string()), replies.into());
    }

    /// Every request received, in order.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    /// Requests received for `host`.
    pub fn requests_to(&self, host: &str) -> Vec<HttpRequest> {
        self.requests()
            .into_iter()
            .filter(|request| request.url.host_str() == Some(host))
            .collect()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(
        &self,
        request: HttpRequest,
        _timeout: Option<Duration>,
    ) -> Result<HttpResponse, TransportError> {
        let host = request.url.host_str().unwrap_or_default().to_string();
        let key = (host, request.url.path().to_string());

        let mut state = self.state.lock().unwrap();
        state.requests.push(request);

        let replies = state
            .routes
            .get_mut(&key)
            .ok_or_else(|| TransportError::Connect(format!("{}{}: connection refused", key.0, key.1)))?;

        let reply = if replies.len() > 1 {
            replies.pop_front()
        } else {
            replies.front().cloned()
        };
        reply
            .map(|reply| reply.response)
            .ok_or_else(|| TransportError::Connect("no reply scripted".into()))
    }
}

/// A device whose capabilities are chosen per test.
///
/// Requests go to `http://<address>/<capability>`; the default address is
/// `10.0.0.<last octet of the hardware address>`.
#[derive(Debug, Clone)]
pub struct FakeDevice {
    name: String,
    model: String,
    id: String,
    hw_addr: HwAddr,
    address: IpAddr,
    firmware: Option<FirmwareStatus>,
    capabilities: BTreeSet<Capability>,
    credentials: Option<Credentials>,
    panics: bool,
}

impl FakeDevice {
    pub fn new(name: &str, model: &str, hw_addr: &str) -> Self {
        let hw_addr: HwAddr = hw_addr.parse().unwrap();
        let last = hw_addr.octets()[5];
        Self {
            name: name.to_string(),
            model: model.to_string(),
            id: format!("fake-{}", hw_addr.compact()),
            hw_addr,
            address: IpAddr::V4(Ipv4Addr::new(10, 0, 0, last)),
            firmware: None,
            capabilities: BTreeSet::new(),
            credentials: None,
            panics: false,
        }
    }

    pub fn with_firmware(mut self, firmware: FirmwareStatus) -> Self {
        self.firmware = Some(firmware);
        self
    }

    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capabilities.insert(capability);
        self
    }

    pub fn with_address(mut self, address: IpAddr) -> Self {
        self.address = address;
        self
    }

    /// Panic while building any request.
    pub fn panicking(mut self) -> Self {
        self.panics = true;
        self
    }

    pub fn boxed(self) -> Box<dyn Device> {
        Box::new(self)
    }

    fn request(&self, path: &str) -> DriverResult<HttpRequest> {
        if self.panics {
            panic!("fake device {} panicked", self.name);
        }
        let url = Url::parse(&format!("http://{}/{}", self.address, path))
            .map_err(|e| DriverError::InvalidRequest(e.to_string()))?;
        Ok(HttpRequest::get(url))
    }

    fn has(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}

impl Device for FakeDevice {
    fn driver(&self) -> &'static str {
        "fake"
    }

    fn address(&self) -> IpAddr {
        self.address
    }

    fn hw_addr(&self) -> HwAddr {
        self.hw_addr
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn firmware(&self) -> Option<&FirmwareStatus> {
        self.firmware.as_ref()
    }

    fn as_configurer(&self) -> Option<&dyn Configurer> {
        self.has(Capability::Configure).then_some(self as &dyn Configurer)
    }

    fn as_securer(&self) -> Option<&dyn Securer> {
        self.has(Capability::Secure).then_some(self as &dyn Securer)
    }

    fn as_securer_mut(&mut self) -> Option<&mut dyn Securer> {
        if self.has(Capability::Secure) {
            Some(self)
        } else {
            None
        }
    }

    fn as_deployer(&self) -> Option<&dyn Deployer> {
        self.has(Capability::Deploy).then_some(self as &dyn Deployer)
    }

    fn as_rebooter(&self) -> Option<&dyn Rebooter> {
        self.has(Capability::Reboot).then_some(self as &dyn Rebooter)
    }

    fn as_updater(&self) -> Option<&dyn Updater> {
        self.has(Capability::Update).then_some(self as &dyn Updater)
    }

    fn as_versioner(&self) -> Option<&dyn Versioner> {
        self.has(Capability::Version).then_some(self as &dyn Versioner)
    }

    fn as_versioner_mut(&mut self) -> Option<&mut dyn Versioner> {
        if self.has(Capability::Version) {
            Some(self)
        } else {
            None
        }
    }

    fn as_enricher(&self) -> Option<&dyn Enricher> {
        self.has(Capability::Enrich).then_some(self as &dyn Enricher)
    }

    fn as_enricher_mut(&mut self) -> Option<&mut dyn Enricher> {
        if self.has(Capability::Enrich) {
            Some(self)
        } else {
            None
        }
    }
}

impl Configurer for FakeDevice {
    fn configure_requests(&self, config: &Value) -> DriverResult<Vec<HttpRequest>> {
        let keys = config
            .as_object()
            .ok_or_else(|| DriverError::InvalidConfig("expected an object".into()))?;
        keys.keys().map(|key| self.request(key)).collect()
    }
}

impl Securer for FakeDevice {
    fn secure_request(&self, auth: &AuthConfig) -> DriverResult<HttpRequest> {
        auth.check(self)?;
        self.request("secure")
    }

    fn set_credentials(&mut self, credentials: &Credentials) {
        self.credentials = Some(credentials.clone());
    }

    fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }
}

impl Deployer for FakeDevice {
    fn deploy_requests(&self, deployment: &Deployment) -> DriverResult<Vec<HttpRequest>> {
        deployment.check(self)?;
        deployment
            .scripts
            .iter()
            .map(|script| self.request(&format!("deploy/{}", script.slot)))
            .collect()
    }
}

impl Rebooter for FakeDevice {
    fn reboot_request(&self) -> DriverResult<HttpRequest> {
        self.request("reboot")
    }
}

impl Updater for FakeDevice {
    fn update_request(&self) -> DriverResult<HttpRequest> {
        self.request("update")
    }
}

impl Versioner for FakeDevice {
    fn version_request(&self) -> DriverResult<HttpRequest> {
        self.request("version")
    }

    fn apply_version(&mut self, payload: Value) -> DriverResult<()> {
        let current = payload["current"].as_str().unwrap_or_default().to_string();
        let mut firmware = FirmwareStatus::new(current);
        firmware.available = payload["available"].as_str().map(str::to_string);
        self.firmware = Some(firmware);
        Ok(())
    }
}

impl Enricher for FakeDevice {
    fn enrich_request(&self) -> DriverResult<HttpRequest> {
        self.request("enrich")
    }

    fn apply_enrichment(&mut self, payload: Value) -> DriverResult<()> {
        let name = payload["name"]
            .as_str()
            .ok_or_else(|| DriverError::UnexpectedResponse("missing name".into()))?;
        self.name = name.to_string();
        Ok(())
    }
}

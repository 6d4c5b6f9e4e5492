//! First-generation devices: plain REST endpoints, HTTP Basic authentication.

use super::device_url;
use crate::config::{AuthConfig, Credentials};
use crate::device::{
    Configurer, Device, Enricher, FirmwareStatus, Prober, Rebooter, Securer, Updater, Versioner,
};
use crate::dispatch::{BasicAuth, Challenger, HttpRequest};
use crate::error::{DriverError, DriverResult};
use crate::types::HwAddr;
use serde::Deserialize;
use serde_json::Value;
use std::net::IpAddr;

pub const DRIVER: &str = "gen1";

/// User name set when credentials do not name one.
const DEFAULT_USER: &str = "admin";

#[derive(Debug, Deserialize)]
struct ProbeInfo {
    #[serde(rename = "type")]
    kind: Option<String>,
    mac: Option<String>,
    #[serde(default)]
    auth: bool,
    #[serde(default)]
    fw: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OtaStatus {
    old_version: String,
    #[serde(default)]
    new_version: Option<String>,
    #[serde(default)]
    has_update: bool,
}

/// Recognises gen1 devices from `GET /shelly`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Gen1Prober;

impl Prober for Gen1Prober {
    fn driver(&self) -> &'static str {
        DRIVER
    }

    fn probe_request(&self, address: IpAddr) -> DriverResult<HttpRequest> {
        Ok(HttpRequest::get(device_url(address, "/shelly")?))
    }

    fn identify(&self, address: IpAddr, payload: Value) -> DriverResult<Box<dyn Device>> {
        let mismatch = |reason: &str| DriverError::Mismatch {
            driver: DRIVER,
            reason: reason.to_string(),
        };

        if payload.get("gen").is_some() {
            return Err(mismatch("payload carries a generation field"));
        }
        let info: ProbeInfo =
            serde_json::from_value(payload).map_err(|e| mismatch(&e.to_string()))?;
        let kind = info.kind.ok_or_else(|| mismatch("missing type"))?;
        let mac = info.mac.ok_or_else(|| mismatch("missing mac"))?;

        let hw_addr: HwAddr = mac
            .parse()
            .map_err(|e| mismatch(&format!("mac {:?}: {}", mac, e)))?;

        Ok(Box::new(Gen1Device::new(
            address,
            hw_addr,
            kind,
            info.fw,
            info.auth,
        )))
    }
}

/// A gen1 device.
#[derive(Debug, Clone)]
pub struct Gen1Device {
    address: IpAddr,
    hw_addr: HwAddr,
    id: String,
    name: String,
    model: String,
    firmware: Option<FirmwareStatus>,
    auth_enabled: bool,
    auth: BasicAuth,
}

impl Gen1Device {
    pub fn new(
        address: IpAddr,
        hw_addr: HwAddr,
        model: impl Into<String>,
        firmware: Option<String>,
        auth_enabled: bool,
    ) -> Self {
        let id = format!("shelly1-{}", hw_addr.compact());
        Self {
            address,
            hw_addr,
            name: id.clone(),
            id,
            model: model.into(),
            firmware: firmware.map(FirmwareStatus::new),
            auth_enabled,
            auth: BasicAuth::new(DEFAULT_USER),
        }
    }

    /// Whether the probe reported authentication as enabled.
    pub fn auth_enabled(&self) -> bool {
        self.auth_enabled
    }

    fn get(&self, path: &str) -> DriverResult<HttpRequest> {
        Ok(HttpRequest::get(device_url(self.address, path)?))
    }
}

impl Device for Gen1Device {
    fn driver(&self) -> &'static str {
        DRIVER
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
        Some(self)
    }

    fn as_securer(&self) -> Option<&dyn Securer> {
        Some(self)
    }

    fn as_securer_mut(&mut self) -> Option<&mut dyn Securer> {
        Some(self)
    }

    fn as_rebooter(&self) -> Option<&dyn Rebooter> {
        Some(self)
    }

    fn as_updater(&self) -> Option<&dyn Updater> {
        Some(self)
    }

    fn as_versioner(&self) -> Option<&dyn Versioner> {
        Some(self)
    }

    fn as_versioner_mut(&mut self) -> Option<&mut dyn Versioner> {
        Some(self)
    }

    fn as_enricher(&self) -> Option<&dyn Enricher> {
        Some(self)
    }

    fn as_enricher_mut(&mut self) -> Option<&mut dyn Enricher> {
        Some(self)
    }

    fn as_challenger(&self) -> Option<&dyn Challenger> {
        Some(&self.auth)
    }
}

impl Configurer for Gen1Device {
    /// Each key is an endpoint path; its object becomes the query string.
    fn configure_requests(&self, config: &Value) -> DriverResult<Vec<HttpRequest>> {
        let endpoints = config
            .as_object()
            .ok_or_else(|| DriverError::InvalidConfig("gen1 section must be an object".into()))?;

        let mut requests = Vec::with_capacity(endpoints.len());
        for (endpoint, params) in endpoints {
            let params = params.as_object().ok_or_else(|| {
                DriverError::InvalidConfig(format!("{}: parameters must be an object", endpoint))
            })?;

            let mut url = device_url(self.address, endpoint)?;
            if !params.is_empty() {
                let mut query = url.query_pairs_mut();
                for (key, value) in params {
                    query.append_pair(key, &query_value(endpoint, key, value)?);
                }
            }
            requests.push(HttpRequest::get(url));
        }
        Ok(requests)
    }
}

fn query_value(endpoint: &str, key: &str, value: &Value) -> DriverResult<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok(String::new()),
        _ => Err(DriverError::InvalidConfig(format!(
            "{}: {} must be a scalar",
            endpoint, key
        ))),
    }
}

impl Securer for Gen1Device {
    fn secure_request(&self, auth: &AuthConfig) -> DriverResult<HttpRequest> {
        auth.check(self)?;

        let credentials = &auth.credentials;
        let mut url = device_url(self.address, "/settings/login")?;
        url.query_pairs_mut()
            .append_pair("enabled", "1")
            .append_pair("username", credentials.username_or(DEFAULT_USER))
            .append_pair("password", &credentials.password);
        Ok(HttpRequest::get(url))
    }

    fn set_credentials(&mut self, credentials: &Credentials) {
        self.auth.set_credentials(
            credentials.username_or(DEFAULT_USER),
            credentials.password.as_str(),
        );
    }

    fn has_credentials(&self) -> bool {
        self.auth.has_password()
    }
}

impl Rebooter for Gen1Device {
    fn reboot_request(&self) -> DriverResult<HttpRequest> {
        self.get("/reboot")
    }
}

impl Updater for Gen1Device {
    fn update_request(&self) -> DriverResult<HttpRequest> {
        self.get("/ota?update=true")
    }
}

impl Versioner for Gen1Device {
    fn version_request(&self) -> DriverResult<HttpRequest> {
        self.get("/ota")
    }

    fn apply_version(&mut self, payload: Value) -> DriverResult<()> {
        let status: OtaStatus = serde_json::from_value(payload)
            .map_err(|e| DriverError::UnexpectedResponse(format!("/ota: {}", e)))?;

        let mut firmware = FirmwareStatus::new(status.old_version);
        if status.has_update {
            firmware.available = status.new_version;
        }
        self.firmware = Some(firmware);
        Ok(())
    }
}

impl Enricher for Gen1Device {
    fn enrich_request(&self) -> DriverResult<HttpRequest> {
        self.get("/settings")
    }

    /// Unnamed devices report `null` and keep their id as name.
    fn apply_enrichment(&mut self, payload: Value) -> DriverResult<()> {
        if !payload.is_object() {
            return Err(DriverError::UnexpectedResponse(
                "/settings: expected an object".into(),
            ));
        }
        if let Some(name) = payload["name"].as_str().filter(|name| !name.is_empty()) {
            self.name = name.to_string();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::Capability;
    use crate::dispatch::HttpResponse;
    use crate::policy::{Policy, PolicyMode};
    use reqwest::header::{HeaderValue, AUTHORIZATION, WWW_AUTHENTICATE};
    use reqwest::StatusCode;
    use serde_json::json;
    use std::net::Ipv4Addr;

    fn address() -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(192, 168, 1, 20))
    }

    fn device() -> Box<dyn Device> {
        Gen1Prober
            .identify(
                address(),
                json!({"type": "SHSW-1", "mac": "A4CF12F45B01", "auth": false, "fw": "20230913-112003/v1.14.0"}),
            )
            .unwrap()
    }

    #[test]
    fn test_identify() {
        let device = device();
        assert_eq!(device.driver(), "gen1");
        assert_eq!(device.model(), "SHSW-1");
        assert_eq!(device.hw_addr().to_string(), "A4:CF:12:F4:5B:01");
        assert_eq!(device.id(), "shelly1-a4cf12f45b01");
        assert_eq!(device.name(), device.id());
        assert_eq!(device.firmware().unwrap().current, "20230913-112003/v1.14.0");
        assert!(!device.supports(Capability::Deploy));
        assert!(device.supports(Capability::Secure));
    }

    #[test]
    fn test_identify_rejects_other_payloads() {
        let gen2 = json!({"id": "shellyplus1-x", "mac": "A4CF12F45B01", "gen": 2});
        assert!(matches!(
            Gen1Prober.identify(address(), gen2),
            Err(DriverError::Mismatch { .. })
        ));
        assert!(matches!(
            Gen1Prober.identify(address(), json!({"mac": "A4CF12F45B01"})),
            Err(DriverError::Mismatch { .. })
        ));
        assert!(matches!(
            Gen1Prober.identify(address(), json!([1, 2, 3])),
            Err(DriverError::Mismatch { .. })
        ));
    }

    #[test]
    fn test_identify_bad_mac_is_mismatch() {
        let result = Gen1Prober.identify(address(), json!({"type": "router", "mac": "not-a-mac"}));
        assert!(matches!(result, Err(DriverError::Mismatch { .. })));
    }

    #[test]
    fn test_configure_builds_query() {
        let device = device();
        let requests = device
            .as_configurer()
            .unwrap()
            .configure_requests(&json!({
                "settings/relay/0": {"default_state": "off", "auto_off": 30},
                "settings": {"led_status_disable": true}
            }))
            .unwrap();

        assert_eq!(requests.len(), 2);
        let uris: Vec<String> = requests.iter().map(|r| r.request_uri()).collect();
        assert!(uris.contains(&"/settings?led_status_disable=true".to_string()));
        assert!(uris.contains(&"/settings/relay/0?auto_off=30&default_state=off".to_string()));
    }

    #[test]
    fn test_configure_rejects_nested() {
        let device = device();
        let result = device
            .as_configurer()
            .unwrap()
            .configure_requests(&json!({"settings": {"sntp": {"server": "x"}}}));
        assert!(matches!(result, Err(DriverError::InvalidConfig(_))));
    }

    #[test]
    fn test_secure_request_and_policy() {
        let device = device();
        let auth = AuthConfig::new(Credentials::new(None, "hunter2"));
        let request = device.as_securer().unwrap().secure_request(&auth).unwrap();
        assert_eq!(
            request.request_uri(),
            "/settings/login?enabled=1&username=admin&password=hunter2"
        );

        let excluded = auth.with_policy(
            Policy::new(PolicyMode::Blacklist)
                .with_model("^SHSW")
                .unwrap(),
        );
        assert!(matches!(
            device.as_securer().unwrap().secure_request(&excluded),
            Err(DriverError::ExcludedByPolicy)
        ));
    }

    #[test]
    fn test_credentials_feed_challenger() {
        let mut device = device();
        assert!(!device.as_securer().unwrap().has_credentials());
        device
            .as_securer_mut()
            .unwrap()
            .set_credentials(&Credentials::new(Some("ops".into()), "pw"));
        assert!(device.as_securer().unwrap().has_credentials());

        let challenge = HttpResponse::new(StatusCode::UNAUTHORIZED)
            .with_header(WWW_AUTHENTICATE, HeaderValue::from_static("Basic realm=\"x\""));
        let request = device.as_rebooter().unwrap().reboot_request().unwrap();
        let answered = device
            .as_challenger()
            .unwrap()
            .challenge_response(request, &challenge)
            .unwrap();
        // base64("ops:pw")
        assert_eq!(answered.headers[AUTHORIZATION], "Basic b3BzOnB3");
    }

    #[test]
    fn test_apply_version() {
        let mut device = device();
        device
            .as_versioner_mut()
            .unwrap()
            .apply_version(json!({
                "status": "pending",
                "has_update": true,
                "new_version": "v1.14.1",
                "old_version": "v1.14.0"
            }))
            .unwrap();
        let firmware = device.firmware().unwrap();
        assert_eq!(firmware.current, "v1.14.0");
        assert!(firmware.has_update());

        device
            .as_versioner_mut()
            .unwrap()
            .apply_version(json!({"has_update": false, "new_version": "v1.14.0", "old_version": "v1.14.0"}))
            .unwrap();
        assert!(!device.firmware().unwrap().has_update());
    }

    #[test]
    fn test_apply_enrichment() {
        let mut device = device();
        device
            .as_enricher_mut()
            .unwrap()
            .apply_enrichment(json!({"name": null}))
            .unwrap();
        assert_eq!(device.name(), "shelly1-a4cf12f45b01");

        device
            .as_enricher_mut()
            .unwrap()
            .apply_enrichment(json!({"name": "porch light"}))
            .unwrap();
        assert_eq!(device.name(), "porch light");
    }

    #[test]
    fn test_fixed_endpoints() {
        let device = device();
        assert_eq!(
            device.as_updater().unwrap().update_request().unwrap().request_uri(),
            "/ota?update=true"
        );
        assert_eq!(
            device.as_versioner().unwrap().version_request().unwrap().request_uri(),
            "/ota"
        );
        assert_eq!(
            device.as_enricher().unwrap().enrich_request().unwrap().request_uri(),
            "/settings"
        );
    }
}

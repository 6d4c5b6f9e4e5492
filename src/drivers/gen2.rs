//! Second-generation devices: JSON-RPC over `POST /rpc`, SHA-256 Digest
//! authentication with the fixed user `admin`.

use super::device_url;
use crate::config::{AuthConfig, Credentials, Deployment, Script};
use crate::device::{
    Configurer, Deployer, Device, Enricher, FirmwareStatus, Prober, Rebooter, Securer, Updater,
    Versioner,
};
use crate::dispatch::{sha256_hex, Challenger, DigestAuth, HttpRequest, HttpResponse};
use crate::error::{DriverError, DriverResult};
use crate::types::HwAddr;
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::IpAddr;

pub const DRIVER: &str = "gen2";

/// The only user gen2 firmware accepts.
pub const RPC_USER: &str = "admin";

/// Largest code chunk sent in one `Script.PutCode` call.
const CODE_CHUNK: usize = 1024;

#[derive(Debug, Deserialize)]
struct ProbeInfo {
    id: String,
    mac: String,
    model: String,
    #[serde(rename = "gen")]
    generation: u8,
    #[serde(default)]
    ver: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

/// Recognises gen2 (and later) devices from `GET /shelly`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Gen2Prober;

impl Prober for Gen2Prober {
    fn driver(&self) -> &'static str {
        DRIVER
    }

    fn probe_request(&self, address: IpAddr) -> DriverResult<HttpRequest> {
        Ok(HttpRequest::get(device_url(address, "/shelly")?))
    }

    fn identify(&self, address: IpAddr, payload: Value) -> DriverResult<Box<dyn Device>> {
        let mismatch = |reason: String| DriverError::Mismatch {
            driver: DRIVER,
            reason,
        };

        match payload.get("gen").and_then(Value::as_u64) {
            Some(generation) if generation >= 2 => {}
            Some(generation) => return Err(mismatch(format!("generation {}", generation))),
            None => return Err(mismatch("missing generation".to_string())),
        }
        let info: ProbeInfo =
            serde_json::from_value(payload).map_err(|e| mismatch(e.to_string()))?;

        let hw_addr: HwAddr = info
            .mac
            .parse()
            .map_err(|e| mismatch(format!("mac {:?}: {}", info.mac, e)))?;

        let mut device = Gen2Device::new(address, hw_addr, info.id, info.model, info.generation);
        device.firmware = info.ver.map(FirmwareStatus::new);
        if let Some(name) = info.name.filter(|name| !name.is_empty()) {
            device.name = name;
        }
        Ok(Box::new(device))
    }
}

/// A gen2 device.
#[derive(Debug, Clone)]
pub struct Gen2Device {
    address: IpAddr,
    hw_addr: HwAddr,
    id: String,
    name: String,
    model: String,
    generation: u8,
    firmware: Option<FirmwareStatus>,
    auth: DigestAuth,
}

impl Gen2Device {
    pub fn new(
        address: IpAddr,
        hw_addr: HwAddr,
        id: impl Into<String>,
        model: impl Into<String>,
        generation: u8,
    ) -> Self {
        let id = id.into();
        Self {
            address,
            hw_addr,
            name: id.clone(),
            id,
            model: model.into(),
            generation,
            firmware: None,
            auth: DigestAuth::new(RPC_USER),
        }
    }

    pub fn generation(&self) -> u8 {
        self.generation
    }

    fn rpc(&self, frame_id: usize, method: &str, params: Value) -> DriverResult<HttpRequest> {
        let frame = json!({
            "id": frame_id,
            "method": method,
            "params": params,
        });
        Ok(HttpRequest::post_json(device_url(self.address, "/rpc")?, &frame)?)
    }
}

fn rpc_error(label: &str, error: &Value) -> DriverError {
    DriverError::UnexpectedResponse(format!(
        "{}: error {} {}",
        label,
        error["code"],
        error["message"].as_str().unwrap_or_default()
    ))
}

/// The `result` member of an RPC response frame.
fn rpc_result(method: &str, payload: Value) -> DriverResult<Value> {
    if let Some(error) = payload.get("error") {
        return Err(rpc_error(method, error));
    }
    match payload {
        Value::Object(mut frame) => frame.remove("result").ok_or_else(|| {
            DriverError::UnexpectedResponse(format!("{}: frame without result", method))
        }),
        _ => Err(DriverError::UnexpectedResponse(format!(
            "{}: expected a response frame",
            method
        ))),
    }
}

/// `switch:0` -> (`Switch`, Some(0)); `wifi` -> (`WiFi`, None).
fn component_key(key: &str) -> DriverResult<(String, Option<u32>)> {
    let (component, id) = match key.split_once(':') {
        Some((component, id)) => {
            let id = id.parse::<u32>().map_err(|_| {
                DriverError::InvalidConfig(format!("{}: component id must be a number", key))
            })?;
            (component, Some(id))
        }
        None => (key, None),
    };

    if component.is_empty() {
        return Err(DriverError::InvalidConfig(format!("{:?}: empty component", key)));
    }

    let name = match component.to_ascii_lowercase().as_str() {
        "wifi" => "WiFi".to_string(),
        "ble" => "BLE".to_string(),
        "mqtt" => "MQTT".to_string(),
        "ws" => "WS".to_string(),
        lower => {
            let mut chars = lower.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        }
    };
    Ok((name, id))
}

/// Split `code` into chunks of at most `CODE_CHUNK` bytes on char boundaries.
fn code_chunks(code: &str) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut rest = code;
    while !rest.is_empty() {
        let mut end = rest.len().min(CODE_CHUNK);
        while !rest.is_char_boundary(end) {
            end -= 1;
        }
        let (chunk, tail) = rest.split_at(end);
        chunks.push(chunk);
        rest = tail;
    }
    if chunks.is_empty() {
        chunks.push("");
    }
    chunks
}

impl Device for Gen2Device {
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

    /// A 200 reply may still carry an RPC error frame.
    fn check_reply(&self, response: &HttpResponse) -> DriverResult<()> {
        let Ok(frame) = serde_json::from_slice::<Value>(&response.body) else {
            return Ok(());
        };
        match frame.get("error") {
            Some(error) => Err(rpc_error(&format!("frame {}", frame["id"]), error)),
            None => Ok(()),
        }
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

    fn as_deployer(&self) -> Option<&dyn Deployer> {
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

impl Configurer for Gen2Device {
    /// Each key names a component (`sys`, `switch:0`); its object is the
    /// `config` parameter of `<Component>.SetConfig`.
    fn configure_requests(&self, config: &Value) -> DriverResult<Vec<HttpRequest>> {
        let components = config
            .as_object()
            .ok_or_else(|| DriverError::InvalidConfig("gen2 section must be an object".into()))?;

        components
            .iter()
            .enumerate()
            .map(|(index, (key, section))| {
                if !section.is_object() {
                    return Err(DriverError::InvalidConfig(format!(
                        "{}: configuration must be an object",
                        key
                    )));
                }
                let (component, id) = component_key(key)?;
                let mut params = json!({ "config": section });
                if let Some(id) = id {
                    params["id"] = json!(id);
                }
                self.rpc(index + 1, &format!("{}.SetConfig", component), params)
            })
            .collect()
    }
}

impl Securer for Gen2Device {
    fn secure_request(&self, auth: &AuthConfig) -> DriverResult<HttpRequest> {
        auth.check(self)?;

        let ha1 = sha256_hex(&format!(
            "{}:{}:{}",
            RPC_USER, self.id, auth.credentials.password
        ));
        self.rpc(
            1,
            "Shelly.SetAuth",
            json!({ "user": RPC_USER, "realm": self.id, "ha1": ha1 }),
        )
    }

    fn set_credentials(&mut self, credentials: &Credentials) {
        self.auth.set_password(credentials.password.as_str());
    }

    fn has_credentials(&self) -> bool {
        self.auth.has_password()
    }
}

impl Deployer for Gen2Device {
    fn deploy_requests(&self, deployment: &Deployment) -> DriverResult<Vec<HttpRequest>> {
        deployment.check(self)?;

        let mut requests = Vec::new();
        for script in &deployment.scripts {
            self.script_requests(script, &mut requests)?;
        }
        Ok(requests)
    }
}

impl Gen2Device {
    fn script_requests(&self, script: &Script, requests: &mut Vec<HttpRequest>) -> DriverResult<()> {
        for (index, chunk) in code_chunks(&script.code).into_iter().enumerate() {
            requests.push(self.rpc(
                requests.len() + 1,
                "Script.PutCode",
                json!({ "id": script.slot, "code": chunk, "append": index > 0 }),
            )?);
        }
        requests.push(self.rpc(
            requests.len() + 1,
            "Script.SetConfig",
            json!({ "id": script.slot, "config": { "name": script.name, "enable": script.enable } }),
        )?);
        if script.enable {
            requests.push(self.rpc(
                requests.len() + 1,
                "Script.Start",
                json!({ "id": script.slot }),
            )?);
        }
        Ok(())
    }
}

impl Rebooter for Gen2Device {
    fn reboot_request(&self) -> DriverResult<HttpRequest> {
        self.rpc(1, "Shelly.Reboot", json!({}))
    }
}

impl Updater for Gen2Device {
    fn update_request(&self) -> DriverResult<HttpRequest> {
        self.rpc(1, "Shelly.Update", json!({ "stage": "stable" }))
    }
}

impl Versioner for Gen2Device {
    fn version_request(&self) -> DriverResult<HttpRequest> {
        self.rpc(1, "Shelly.CheckForUpdate", json!({}))
    }

    /// An empty result means the device is up to date.
    fn apply_version(&mut self, payload: Value) -> DriverResult<()> {
        let result = rpc_result("Shelly.CheckForUpdate", payload)?;
        let available = result
            .pointer("/stable/version")
            .and_then(Value::as_str)
            .map(str::to_string);

        let firmware = self.firmware.get_or_insert_with(FirmwareStatus::default);
        firmware.available = available;
        Ok(())
    }
}

impl Enricher for Gen2Device {
    fn enrich_request(&self) -> DriverResult<HttpRequest> {
        self.rpc(1, "Shelly.GetDeviceInfo", json!({}))
    }

    fn apply_enrichment(&mut self, payload: Value) -> DriverResult<()> {
        let info = rpc_result("Shelly.GetDeviceInfo", payload)?;
        if let Some(name) = info["name"].as_str().filter(|name| !name.is_empty()) {
            self.name = name.to_string();
        }
        if let Some(ver) = info["ver"].as_str() {
            let firmware = self.firmware.get_or_insert_with(FirmwareStatus::default);
            firmware.current = ver.to_string();
        }
        Ok(())
    }
}

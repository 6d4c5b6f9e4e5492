//! HTTP Digest authentication (RFC 7616) with SHA-256.

use super::{Challenger, HttpRequest, HttpResponse};
use crate::error::ChallengeError;
use rand::Rng;
use reqwest::header::{HeaderValue, AUTHORIZATION, WWW_AUTHENTICATE};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// Nonce count; every challenge is answered exactly once.
const NONCE_COUNT: &str = "00000001";

/// Digest responder holding the device secret.
#[derive(Debug, Clone)]
pub struct DigestAuth {
    username: String,
    password: Option<String>,
}

impl DigestAuth {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: None,
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn set_password(&mut self, password: impl Into<String>) {
        self.password = Some(password.into());
    }

    pub fn has_password(&self) -> bool {
        self.password.is_some()
    }
}

impl Challenger for DigestAuth {
    fn challenge_accepted(&self, response: &HttpResponse) -> bool {
        response.status == reqwest::StatusCode::UNAUTHORIZED && digest_header(response).is_some()
    }

    fn challenge_response(
        &self,
        request: HttpRequest,
        response: &HttpResponse,
    ) -> Result<HttpRequest, ChallengeError> {
        let password = self
            .password
            .as_deref()
            .ok_or(ChallengeError::MissingCredentials)?;

        let header = digest_header(response)
            .ok_or_else(|| ChallengeError::Malformed("no Digest challenge".to_string()))?;
        let challenge = DigestChallenge::parse(&header)?;

        let cnonce = hex::encode(rand::thread_rng().gen::<[u8; 16]>());
        let authorization = challenge.authorize(
            &self.username,
            password,
            request.method.as_str(),
            &request.request_uri(),
            &cnonce,
        );

        let value = HeaderValue::from_str(&authorization)
            .map_err(|e| ChallengeError::InvalidHeader(e.to_string()))?;
        Ok(request.with_header(AUTHORIZATION, value))
    }
}

/// First `WWW-Authenticate` header using the Digest scheme.
fn digest_header(response: &HttpResponse) -> Option<String> {
    response
        .headers
        .get_all(WWW_AUTHENTICATE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|value| {
            value
                .get(..7)
                .is_some_and(|scheme| scheme.eq_ignore_ascii_case("digest "))
        })
        .map(str::to_string)
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct DigestChallenge {
    realm: String,
    nonce: String,
    qop: Option<String>,
    opaque: Option<String>,
    session: bool,
}

impl DigestChallenge {
    fn parse(header: &str) -> Result<Self, ChallengeError> {
        let params = parse_params(header.get(7..).unwrap_or_default());

        let algorithm = params
            .get("algorithm")
            .map(String::as_str)
            .unwrap_or("MD5");
        let session = match algorithm.to_ascii_uppercase().as_str() {
            "SHA-256" => false,
            "SHA-256-SESS" => true,
            _ => return Err(ChallengeError::UnsupportedAlgorithm(algorithm.to_string())),
        };

        let realm = params
            .get("realm")
            .cloned()
            .ok_or_else(|| ChallengeError::Malformed("missing realm".to_string()))?;
        let nonce = params
            .get("nonce")
            .cloned()
            .ok_or_else(|| ChallengeError::Malformed("missing nonce".to_string()))?;

        let qop = match params.get("qop") {
            Some(offered) if offered.split(',').any(|q| q.trim() == "auth") => {
                Some("auth".to_string())
            }
            Some(offered) => {
                return Err(ChallengeError::Malformed(format!(
                    "unsupported qop {:?}",
                    offered
                )))
            }
            None => None,
        };

        Ok(Self {
            realm,
            nonce,
            qop,
            opaque: params.get("opaque").cloned(),
            session,
        })
    }

    fn authorize(&self, username: &str, password: &str, method: &str, uri: &str, cnonce: &str) -> String {
        let mut ha1 = sha256_hex(&format!("{}:{}:{}", username, self.realm, password));
        if self.session {
            ha1 = sha256_hex(&format!("{}:{}:{}", ha1, self.nonce, cnonce));
        }
        let ha2 = sha256_hex(&format!("{}:{}", method, uri));

        let response = match &self.qop {
            Some(qop) => sha256_hex(&format!(
                "{}:{}:{}:{}:{}:{}",
                ha1, self.nonce, NONCE_COUNT, cnonce, qop, ha2
            )),
            None => sha256_hex(&format!("{}:{}:{}", ha1, self.nonce, ha2)),
        };

        let algorithm = if self.session { "SHA-256-sess" } else { "SHA-256" };
        let mut header = format!(
            "Digest username=\"{}\", realm=\"{}\", nonce=\"{}\", uri=\"{}\", algorithm={}, response=\"{}\"",
            username, self.realm, self.nonce, uri, algorithm, response
        );
        if let Some(qop) = &self.qop {
            header.push_str(&format!(
                ", qop={}, nc={}, cnonce=\"{}\"",
                qop, NONCE_COUNT, cnonce
            ));
        }
        if let Some(opaque) = &self.opaque {
            header.push_str(&format!(", opaque=\"{}\"", opaque));
        }
        header
    }
}

/// Lowercase hex SHA-256 of `input`.
pub(crate) fn sha256_hex(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}

/// Parse `key=value, key="quoted, value"` auth parameters.
fn parse_params(input: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    let mut rest = input.trim();

    while let Some(eq) = rest.find('=') {
        let key = rest[..eq].trim().to_ascii_lowercase();
        rest = rest[eq + 1..].trim_start();

        let value = if let Some(quoted) = rest.strip_prefix('"') {
            let end = quoted.find('"').unwrap_or(quoted.len());
            let value = quoted[..end].to_string();
            rest = quoted.get(end + 1..).unwrap_or_default();
            value
        } else {
            let end = rest.find(',').unwrap_or(rest.len());
            let value = rest[..end].trim().to_string();
            rest = &rest[end..];
            value
        };

        params.insert(key, value);
        rest = rest.trim_start().trim_start_matches(',').trim_start();
    }

    params
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::Dispatch;
    use crate::error::DispatchError;
    use crate::testing::{MockReply, MockTransport};
    use reqwest::{StatusCode, Url};

    const CHALLENGE: &str = "Digest qop=\"auth\", realm=\"shellyplus1-a8032ab12345\", nonce=\"60dc59c6\", algorithm=SHA-256";

    fn challenge_response() -> HttpResponse {
        HttpResponse::new(StatusCode::UNAUTHORIZED)
            .with_header(WWW_AUTHENTICATE, HeaderValue::from_static(CHALLENGE))
    }

    fn rpc_request() -> HttpRequest {
        HttpRequest::post_json(
            Url::parse("http://10.0.0.9/rpc").unwrap(),
            &serde_json::json!({"id": 1, "method": "Shelly.Reboot"}),
        )
        .unwrap()
    }

    #[test]
    fn test_parse_params_quoted_and_bare() {
        let params = parse_params("qop=\"auth,auth-int\", realm=\"a, b\", algorithm=SHA-256");
        assert_eq!(params["qop"], "auth,auth-int");
        assert_eq!(params["realm"], "a, b");
        assert_eq!(params["algorithm"], "SHA-256");
    }

    #[test]
    fn test_parse_challenge() {
        let challenge = DigestChallenge::parse(CHALLENGE).unwrap();
        assert_eq!(challenge.realm, "shellyplus1-a8032ab12345");
        assert_eq!(challenge.nonce, "60dc59c6");
        assert_eq!(challenge.qop.as_deref(), Some("auth"));
        assert!(!challenge.session);
    }

    #[test]
    fn test_md5_is_unsupported() {
        let err = DigestChallenge::parse("Digest realm=\"x\", nonce=\"y\"").unwrap_err();
        assert!(matches!(err, ChallengeError::UnsupportedAlgorithm(alg) if alg == "MD5"));
    }

    #[test]
    fn test_authorization_matches_independent_computation() {
        let auth = DigestAuth::new("admin").with_password("hunter2");
        let answered = auth
            .challenge_response(rpc_request(), &challenge_response())
            .unwrap();

        let header = answered.headers.get(AUTHORIZATION).unwrap().to_str().unwrap();
        assert!(header.starts_with("Digest "));
        let params = parse_params(&header[7..]);
        assert_eq!(params["username"], "admin");
        assert_eq!(params["uri"], "/rpc");
        assert_eq!(params["nc"], NONCE_COUNT);

        let ha1 = sha256_hex("admin:shellyplus1-a8032ab12345:hunter2");
        let ha2 = sha256_hex("POST:/rpc");
        let expected = sha256_hex(&format!(
            "{}:60dc59c6:{}:{}:auth:{}",
            ha1, NONCE_COUNT, params["cnonce"], ha2
        ));
        assert_eq!(params["response"], expected);
        assert_eq!(answered.body, rpc_request().body);
    }

    #[test]
    fn test_fresh_cnonce_per_response() {
        let auth = DigestAuth::new("admin").with_password("hunter2");
        let first = auth.challenge_response(rpc_request(), &challenge_response()).unwrap();
        let second = auth.challenge_response(rpc_request(), &challenge_response()).unwrap();
        assert_ne!(
            first.headers.get(AUTHORIZATION),
            second.headers.get(AUTHORIZATION)
        );
    }

    #[test]
    fn test_missing_password() {
        let auth = DigestAuth::new("admin");
        let err = auth
            .challenge_response(rpc_request(), &challenge_response())
            .unwrap_err();
        assert!(matches!(err, ChallengeError::MissingCredentials));
    }

    #[test]
    fn test_basic_challenge_is_not_accepted() {
        let auth = DigestAuth::new("admin").with_password("x");
        let response = HttpResponse::new(StatusCode::UNAUTHORIZED)
            .with_header(WWW_AUTHENTICATE, HeaderValue::from_static("Basic realm=\"x\""));
        assert!(!auth.challenge_accepted(&response));
    }

    #[tokio::test]
    async fn test_dispatch_round_trip() {
        let transport = MockTransport::new();
        transport.route_sequence(
            "10.0.0.9",
            "/rpc",
            vec![
                MockReply::challenge(CHALLENGE),
                MockReply::json(200, r#"{"id":1,"result":null}"#),
            ],
        );
        let auth = DigestAuth::new("admin").with_password("hunter2");

        Dispatch::new(&transport, rpc_request())
            .with_challenger(&auth)
            .send()
            .await
            .unwrap();

        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[1].headers.contains_key(AUTHORIZATION));
    }

    #[tokio::test]
    async fn test_dispatch_second_challenge_is_terminal() {
        let transport = MockTransport::new();
        transport.route("10.0.0.9", "/rpc", MockReply::challenge(CHALLENGE));
        let auth = DigestAuth::new("admin").with_password("wrong");

        let err = Dispatch::new(&transport, rpc_request())
            .with_challenger(&auth)
            .send()
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::Unauthorized { .. }));
        assert_eq!(transport.requests().len(), 2);
    }
}

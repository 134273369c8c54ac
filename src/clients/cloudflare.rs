use crate::config::{AuthMethod, Profile};
use crate::error::{Error, Result};
use crate::ip::PublicAddress;
use minreq::Method;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Cloudflare API v4 base URL
pub const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// An entry of an envelope's `errors` or `messages` list. Cloudflare sends
/// `{code, message}` objects; bare strings are accepted too.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ApiMessage {
    Text(String),
    Detail {
        #[serde(default)]
        code: i64,
        message: String,
    },
}

impl fmt::Display for ApiMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiMessage::Text(text) => f.write_str(text),
            ApiMessage::Detail { code, message } => write!(f, "{}: {}", code, message),
        }
    }
}

/// One DNS record as listed by the provider. Fields beyond id/type/content
/// are kept in `extra` untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderRecord {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default)]
    pub record_type: String,
    #[serde(default)]
    pub content: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Response wrapper shared by every Cloudflare endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub success: bool,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub errors: Vec<ApiMessage>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub messages: Vec<ApiMessage>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub result: Vec<ProviderRecord>,
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Vec<ApiMessage>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<ApiMessage>>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    Many(Vec<ProviderRecord>),
    One(ProviderRecord),
}

// Listing returns an array, patching returns a single record, failures return null.
fn one_or_many<'de, D>(deserializer: D) -> std::result::Result<Vec<ProviderRecord>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::Many(records)) => records,
        Some(OneOrMany::One(record)) => vec![record],
    })
}

/// PATCH body for a DNS record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateRequest {
    #[serde(rename = "type")]
    pub record_type: String,
    pub name: String,
    pub content: String,
    pub ttl: String,
    pub proxied: bool,
}

impl UpdateRequest {
    /// Point the profile's record at `address`, keeping its ttl and proxy flag.
    pub fn new(profile: &Profile, address: &PublicAddress) -> Self {
        UpdateRequest {
            record_type: address.record_type().to_string(),
            name: profile.record_name.clone(),
            content: address.as_str().to_string(),
            ttl: profile.ttl.clone(),
            proxied: profile.proxy,
        }
    }
}

pub struct CloudflareClient {
    server: String,
    zone_id: String,
    email: String,
    method: AuthMethod,
    key: String,
    timeout: Option<u64>,
}

// Custom Debug implementation that hides the key
impl fmt::Debug for CloudflareClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudflareClient")
            .field("server", &self.server)
            .field("zone_id", &self.zone_id)
            .field("email", &self.email)
            .field("method", &self.method)
            .field("key", &"<REDACTED>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl CloudflareClient {
    /// Build a client for the profile's zone.
    ///
    /// `server` is the API base, normally [`CLOUDFLARE_API_BASE`]. `timeout`
    /// applies to every request; `None` waits indefinitely.
    pub fn new(profile: &Profile, server: &str, timeout: Option<u64>) -> Self {
        CloudflareClient {
            server: server.trim_end_matches('/').to_string(),
            zone_id: profile.zone_id.clone(),
            email: profile.email.clone(),
            method: profile.method,
            key: profile.key.clone(),
            timeout,
        }
    }

    pub fn zone_id(&self) -> &str {
        &self.zone_id
    }

    /// Start a request with the authentication headers for this account.
    ///
    /// Global keys send `X-Auth-Email` and `X-Auth-Key`. Tokens send
    /// `Authorization: Bearer`, plus `X-Auth-Email` when one is configured.
    fn request(&self, method: Method, url: &str) -> minreq::Request {
        let request = crate::http::request(method, url, self.timeout)
            .with_header("Content-Type", "application/json");

        match self.method {
            AuthMethod::Global => request
                .with_header("X-Auth-Email", self.email.as_str())
                .with_header("X-Auth-Key", self.key.as_str()),
            AuthMethod::Token if self.email.is_empty() => {
                request.with_header("Authorization", format!("Bearer {}", self.key))
            }
            AuthMethod::Token => request
                .with_header("X-Auth-Email", self.email.as_str())
                .with_header("Authorization", format!("Bearer {}", self.key)),
        }
    }

    /// Send, decode the envelope, and fail unless it reports success.
    fn send(request: minreq::Request) -> Result<Envelope> {
        let response = request.send()?;
        let envelope: Envelope = response.json().map_err(|e| {
            Error::Decode(format!(
                "cloudflare api answered {} with an unexpected body: {}",
                response.status_code, e
            ))
        })?;

        if !envelope.success {
            log::debug!("Unsuccessful cloudflare response: {:?}", envelope);
            return Err(Error::Api {
                errors: envelope.errors,
                messages: envelope.messages,
            });
        }
        Ok(envelope)
    }

    /// List the zone's records of `record_type` named `name`.
    ///
    /// https://developers.cloudflare.com/api/resources/dns/subresources/records/methods/list/
    pub fn list_records(&self, record_type: &str, name: &str) -> Result<Vec<ProviderRecord>> {
        log::info!("Fetching {} record for: {}", record_type, name);

        // minreq's urlencoding feature percent-encodes the path and params
        let url = format!("{}/zones/{}/dns_records", self.server, self.zone_id);
        let request = self
            .request(Method::Get, &url)
            .with_param("type", record_type)
            .with_param("name", name);

        let envelope = Self::send(request)?;
        log::debug!("Cloudflare returned {} record(s)", envelope.result.len());
        Ok(envelope.result)
    }

    /// Overwrite record `record_id` with `update` and return what Cloudflare
    /// reports back.
    ///
    /// https://developers.cloudflare.com/api/resources/dns/subresources/records/methods/edit/
    pub fn patch_record(&self, record_id: &str, update: &UpdateRequest) -> Result<Vec<ProviderRecord>> {
        let url = format!(
            "{}/zones/{}/dns_records/{}",
            self.server, self.zone_id, record_id
        );

        let request = self.request(Method::Patch, &url).with_json(update)?;
        let envelope = Self::send(request)?;
        Ok(envelope.result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use mockito::Matcher;
    use serde_json::json;

    fn profile(method: &str) -> Profile {
        let yaml = format!(
            "cloudflare:\n  email: me@example.com\n  method: {}\n  key: abc\n  zone_id: Z1\n  record_name: home.example.com\n  time_to_live: \"120\"\n  proxy: false\n",
            method
        );
        Config::parse(&yaml).unwrap().profile("cloudflare").unwrap().clone()
    }

    fn envelope_body(records: serde_json::Value) -> String {
        json!({"success": true, "errors": [], "messages": [], "result": records}).to_string()
    }

    #[test]
    fn test_envelope_listing() {
        let body = r#"{
            "success": true,
            "errors": [],
            "messages": [],
            "result": [{
                "id": "rec-1",
                "type": "A",
                "name": "home.example.com",
                "content": "203.0.113.5",
                "proxied": false,
                "ttl": 120,
                "meta": {"auto_added": false}
            }],
            "result_info": {"page": 1, "count": 1}
        }"#;
        let envelope: Envelope = serde_json::from_str(body).unwrap();
        assert!(envelope.success);
        assert_eq!(envelope.result.len(), 1);

        let record = &envelope.result[0];
        assert_eq!(record.id, "rec-1");
        assert_eq!(record.record_type, "A");
        assert_eq!(record.content, "203.0.113.5");
        assert_eq!(record.extra["ttl"], json!(120));
        assert_eq!(record.extra["name"], json!("home.example.com"));
    }

    #[test]
    fn test_envelope_string_records() {
        // Every value a plain string
        let body = r#"{"success":true,"errors":[],"messages":[],"result":[{"id":"1","type":"AAAA","content":"2001:db8::1","ttl":"1"}]}"#;
        let envelope: Envelope = serde_json::from_str(body).unwrap();
        assert_eq!(envelope.result[0].record_type, "AAAA");
        assert_eq!(envelope.result[0].extra["ttl"], json!("1"));
    }

    #[test]
    fn test_envelope_single_result_and_failure() {
        let patched: Envelope =
            serde_json::from_str(r#"{"success":true,"errors":[],"messages":[],"result":{"id":"rec-1","type":"A","content":"203.0.113.7"}}"#).unwrap();
        assert_eq!(patched.result.len(), 1);
        assert_eq!(patched.result[0].content, "203.0.113.7");

        let failed: Envelope = serde_json::from_str(
            r#"{"success":false,"errors":[{"code":10000,"message":"Authentication error"},"plain"],"messages":null,"result":null}"#,
        )
        .unwrap();
        assert!(!failed.success);
        assert!(failed.result.is_empty());
        assert!(failed.messages.is_empty());
        assert_eq!(
            failed.errors,
            vec![
                ApiMessage::Detail { code: 10000, message: "Authentication error".into() },
                ApiMessage::Text("plain".into()),
            ]
        );
        assert_eq!(failed.errors[0].to_string(), "10000: Authentication error");
    }

    #[test]
    fn test_update_request_round_trip() {
        let update = UpdateRequest::new(&profile("token"), &PublicAddress::new("203.0.113.7"));
        let encoded = serde_json::to_string(&update).unwrap();
        assert_eq!(
            encoded,
            r#"{"type":"A","name":"home.example.com","content":"203.0.113.7","ttl":"120","proxied":false}"#
        );

        let decoded: UpdateRequest = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, update);
    }

    #[test]
    fn test_update_request_ipv6() {
        let mut profile = profile("token");
        profile.proxy = true;
        let update = UpdateRequest::new(&profile, &PublicAddress::new("2001:db8::7"));
        assert_eq!(update.record_type, "AAAA");
        assert!(update.proxied);
    }

    #[test]
    fn test_client_debug_redacts_key() {
        let client = CloudflareClient::new(&profile("global"), CLOUDFLARE_API_BASE, None);
        let debug = format!("{:?}", client);
        assert!(debug.contains("<REDACTED>"));
        assert!(!debug.contains("\"abc\""));
    }

    #[test]
    fn test_list_records_token_auth() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/zones/Z1/dns_records")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("type".into(), "A".into()),
                Matcher::UrlEncoded("name".into(), "home.example.com".into()),
            ]))
            .match_header("authorization", "Bearer abc")
            .match_header("x-auth-key", Matcher::Missing)
            .match_header("content-type", "application/json")
            .match_header("user-agent", crate::USER_AGENT)
            .with_body(envelope_body(json!([{"id": "rec-1", "type": "A", "content": "203.0.113.5"}])))
            .create();

        let client = CloudflareClient::new(&profile("token"), &server.url(), None);
        let records = client.list_records("A", "home.example.com").unwrap();

        mock.assert();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "rec-1");
    }

    #[test]
    fn test_list_records_token_without_email() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/zones/Z1/dns_records")
            .match_query(Matcher::Any)
            .match_header("authorization", "Bearer abc")
            .match_header("x-auth-email", Matcher::Missing)
            .match_header("x-auth-key", Matcher::Missing)
            .with_body(envelope_body(json!([])))
            .create();

        let mut profile = profile("token");
        profile.email.clear();
        let client = CloudflareClient::new(&profile, &server.url(), None);
        client.list_records("A", "home.example.com").unwrap();

        mock.assert();
    }

    #[test]
    fn test_list_records_encodes_query() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/zones/Z1/dns_records")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("type".into(), "A".into()),
                Matcher::UrlEncoded("name".into(), "odd&name=x.example.com".into()),
            ]))
            .with_body(envelope_body(json!([])))
            .create();

        let client = CloudflareClient::new(&profile("token"), &server.url(), None);
        client.list_records("A", "odd&name=x.example.com").unwrap();

        mock.assert();
    }

    #[test]
    fn test_list_records_global_auth() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/zones/Z1/dns_records")
            .match_query(Matcher::Any)
            .match_header("x-auth-email", "me@example.com")
            .match_header("x-auth-key", "abc")
            .match_header("authorization", Matcher::Missing)
            .with_body(envelope_body(json!([])))
            .create();

        let client = CloudflareClient::new(&profile("global"), &server.url(), None);
        let records = client.list_records("A", "home.example.com").unwrap();

        mock.assert();
        assert!(records.is_empty());
    }

    #[test]
    fn test_list_records_api_error() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("GET", "/zones/Z1/dns_records")
            .match_query(Matcher::Any)
            .with_status(403)
            .with_body(r#"{"success":false,"errors":[{"code":9109,"message":"Invalid access token"}],"messages":[],"result":null}"#)
            .create();

        let client = CloudflareClient::new(&profile("token"), &server.url(), None);
        let err = client.list_records("A", "home.example.com").unwrap_err();

        match err {
            Error::Api { errors, .. } => assert_eq!(errors[0].to_string(), "9109: Invalid access token"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_list_records_bad_body() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("GET", "/zones/Z1/dns_records")
            .match_query(Matcher::Any)
            .with_status(502)
            .with_body("<html>Bad gateway</html>")
            .create();

        let client = CloudflareClient::new(&profile("token"), &server.url(), None);
        let err = client.list_records("A", "home.example.com").unwrap_err();
        assert!(matches!(err, Error::Decode(ref msg) if msg.contains("502")), "{:?}", err);
    }

    #[test]
    fn test_patch_record_body_and_auth() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("PATCH", "/zones/Z1/dns_records/rec-1")
            .match_header("authorization", "Bearer abc")
            .match_header("x-auth-key", Matcher::Missing)
            .match_body(Matcher::Json(json!({
                "type": "A",
                "name": "home.example.com",
                "content": "203.0.113.7",
                "ttl": "120",
                "proxied": false
            })))
            .with_body(envelope_body(json!({"id": "rec-1", "type": "A", "content": "203.0.113.7"})))
            .create();

        let profile = profile("token");
        let client = CloudflareClient::new(&profile, &format!("{}/", server.url()), None);
        let update = UpdateRequest::new(&profile, &PublicAddress::new("203.0.113.7"));
        let result = client.patch_record("rec-1", &update).unwrap();

        mock.assert();
        assert_eq!(result[0].content, "203.0.113.7");
    }

    #[test]
    fn test_patch_record_failure_surfaces_messages() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("PATCH", "/zones/Z1/dns_records/rec-1")
            .with_status(400)
            .with_body(r#"{"success":false,"errors":["content is invalid"],"messages":["see docs"],"result":null}"#)
            .create();

        let profile = profile("global");
        let client = CloudflareClient::new(&profile, &server.url(), None);
        let update = UpdateRequest::new(&profile, &PublicAddress::new("203.0.113.7"));
        let err = client.patch_record("rec-1", &update).unwrap_err();

        let text = err.to_string();
        assert!(text.contains("content is invalid"), "{}", text);
        assert!(text.contains("see docs"), "{}", text);
    }
}

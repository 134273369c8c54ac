use minreq::Method;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

use crate::error::{Error, Result};

/// Public echo service queried when no address is given on the command line.
pub const DEFAULT_IP_SERVICE: &str = "https://api64.ipify.org/?format=json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpVersion {
    V4,
    V6,
    Unknown,
}

impl IpVersion {
    /// DNS record type holding addresses of this version; empty when unknown.
    pub fn record_type(self) -> &'static str {
        match self {
            IpVersion::V4 => "A",
            IpVersion::V6 => "AAAA",
            IpVersion::Unknown => "",
        }
    }
}

/// Classify a textual address. IPv4-mapped IPv6 addresses (`::ffff:a.b.c.d`)
/// count as IPv4 since they have a 4-byte form.
pub fn classify(raw: &str) -> IpVersion {
    match raw.parse::<IpAddr>() {
        Ok(IpAddr::V4(_)) => IpVersion::V4,
        Ok(IpAddr::V6(v6)) if v6.to_ipv4_mapped().is_some() => IpVersion::V4,
        Ok(IpAddr::V6(_)) => IpVersion::V6,
        Err(_) => IpVersion::Unknown,
    }
}

/// The caller's public address, kept exactly as the echo service spelled it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicAddress {
    #[serde(rename = "ip")]
    raw: String,
}

impl PublicAddress {
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn version(&self) -> IpVersion {
        classify(&self.raw)
    }

    pub fn record_type(&self) -> &'static str {
        self.version().record_type()
    }

    /// True if `content` names the same address, either verbatim or after
    /// parsing both sides (so `2001:db8::1` matches `2001:0db8:0:0:0:0:0:1`).
    pub fn matches(&self, content: &str) -> bool {
        if self.raw == content {
            return true;
        }
        match (self.raw.parse::<IpAddr>(), content.parse::<IpAddr>()) {
            (Ok(ours), Ok(theirs)) => ours == theirs,
            _ => false,
        }
    }
}

impl fmt::Display for PublicAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Reject addresses that would otherwise degrade into an empty record type.
fn validated(address: PublicAddress) -> Result<PublicAddress> {
    if address.version() == IpVersion::Unknown {
        return Err(Error::InvalidPublicIp(address.raw));
    }
    Ok(address)
}

/// Ask an echo service for our address. The service must answer with
/// `{"ip": "<address>"}`.
///
/// # Errors
///
/// `Error::Http` on transport failure, `Error::Decode` if the body is not that
/// JSON shape, `Error::InvalidPublicIp` if the field is not an IP address.
pub fn resolve(url: &str, timeout: Option<u64>) -> Result<PublicAddress> {
    log::debug!("Requesting public IP from {}", url);
    let response = crate::http::request(Method::Get, url, timeout).send()?;
    let address: PublicAddress = response.json().map_err(|e| {
        Error::Decode(format!(
            "IP service {} answered {} with an unexpected body: {}",
            url, response.status_code, e
        ))
    })?;
    validated(address)
}

/// Parse an address supplied by the operator.
pub fn parse_ip(raw: &str) -> Result<PublicAddress> {
    validated(PublicAddress::new(raw.trim()))
}

/// Use `manual` when given, otherwise ask the echo service at `url`.
pub fn get_public_address(manual: Option<&str>, url: &str, timeout: Option<u64>) -> Result<PublicAddress> {
    match manual {
        Some(raw) => parse_ip(raw),
        None => resolve(url, timeout),
    }
}

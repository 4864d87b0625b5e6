//! URL validation applied before any network activity.
//!
//! Hosts are inspected after WHATWG normalization, so `http://2130706433/`,
//! `http://0x7f.1/` and `http://127.1/` are all seen as `127.0.0.1`.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use url::{Host, Url};

use crate::error::Error;
use crate::util::redact_url_for_logs;

const LOOPBACK_NAMES: &[&str] = &[
    "localhost",
    "localhost.localdomain",
    "ip6-localhost",
    "ip6-loopback",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SecurityReason {
    DisallowedScheme,
    MissingHost,
    PrivateNetwork,
}

impl std::fmt::Display for SecurityReason {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::DisallowedScheme => "scheme is not http or https",
            Self::MissingHost => "url has no host",
            Self::PrivateNetwork => "target resolves to a loopback or private address",
        };
        formatter.write_str(text)
    }
}

/// Parses `url` and rejects anything the client must never connect to.
///
/// Returns the parsed URL so callers work with the same normalized form that
/// was checked.
pub fn validate(url: &str, allow_localhost: bool) -> crate::Result<Url> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidUrl {
            url: url.to_owned(),
        });
    }

    let parsed = match Url::parse(trimmed) {
        Ok(parsed) => parsed,
        Err(_) if has_dangerous_scheme_prefix(trimmed) => {
            return Err(violation(trimmed, SecurityReason::DisallowedScheme));
        }
        Err(_) => {
            return Err(Error::InvalidUrl {
                url: url.to_owned(),
            });
        }
    };

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(violation(trimmed, SecurityReason::DisallowedScheme));
    }

    let Some(host) = parsed.host() else {
        return Err(violation(trimmed, SecurityReason::MissingHost));
    };
    // Names are checked against their resolved addresses before each attempt.
    if !allow_localhost && is_private_host(&host) {
        return Err(violation(trimmed, SecurityReason::PrivateNetwork));
    }

    Ok(parsed)
}

fn violation(url: &str, reason: SecurityReason) -> Error {
    Error::SecurityViolation {
        url: redact_url_for_logs(url),
        reason,
    }
}

// A string that fails to parse can still carry a scheme we must report as such.
fn has_dangerous_scheme_prefix(url: &str) -> bool {
    let Some((scheme, _)) = url.split_once(':') else {
        return false;
    };
    let scheme = scheme.trim().to_ascii_lowercase();
    !scheme.is_empty()
        && scheme
            .chars()
            .all(|item| item.is_ascii_alphanumeric() || matches!(item, '+' | '-' | '.'))
        && !matches!(scheme.as_str(), "http" | "https")
}

fn is_private_host(host: &Host<&str>) -> bool {
    match host {
        Host::Domain(domain) => is_loopback_name(domain),
        Host::Ipv4(address) => is_private_ip(IpAddr::V4(*address)),
        Host::Ipv6(address) => is_private_ip(IpAddr::V6(*address)),
    }
}

fn is_loopback_name(domain: &str) -> bool {
    let domain = domain.trim_end_matches('.').to_ascii_lowercase();
    LOOPBACK_NAMES.contains(&domain.as_str()) || domain.ends_with(".localhost")
}

pub(crate) fn is_private_ip(address: IpAddr) -> bool {
    match address {
        IpAddr::V4(address) => is_private_ipv4(address),
        IpAddr::V6(address) => is_private_ipv6(address),
    }
}

fn is_private_ipv4(address: Ipv4Addr) -> bool {
    let octets = address.octets();
    address.is_loopback()
        || address.is_private()
        || address.is_link_local()
        || address.is_unspecified()
        || address.is_broadcast()
        // 0.0.0.0/8
        || octets[0] == 0
        // 100.64.0.0/10 carrier-grade NAT
        || (octets[0] == 100 && (octets[1] & 0b1100_0000) == 64)
}

fn is_private_ipv6(address: Ipv6Addr) -> bool {
    if embedded_ipv4(address).is_some_and(is_private_ipv4) {
        return true;
    }
    let first_segment = address.segments()[0];
    address.is_loopback()
        || address.is_unspecified()
        // fc00::/7 unique local
        || (first_segment & 0xfe00) == 0xfc00
        // fe80::/10 link local
        || (first_segment & 0xffc0) == 0xfe80
}

/// The IPv4 address carried by a mapped, NAT64, 6to4 or IPv4-compatible address.
fn embedded_ipv4(address: Ipv6Addr) -> Option<Ipv4Addr> {
    if let Some(mapped) = address.to_ipv4_mapped() {
        return Some(mapped);
    }
    let segments = address.segments();
    let low_bits = Ipv4Addr::from(u128::from(address) as u32);
    match segments {
        // 64:ff9b::/96
        [0x64, 0xff9b, 0, 0, 0, 0, _, _] => Some(low_bits),
        // 2002::/16 carries the address in bits 16..48
        [0x2002, high, low, ..] => Some(Ipv4Addr::from((u32::from(high) << 16) | u32::from(low))),
        // ::a.b.c.d, leaving :: and ::1 to the checks above
        [0, 0, 0, 0, 0, 0, _, _] if !address.is_loopback() && !address.is_unspecified() => {
            Some(low_bits)
        }
        _ => None,
    }
}

/// A host name the engine must resolve before dialing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ResolveTarget {
    pub(crate) host: String,
    pub(crate) port: u16,
}

/// The name to resolve for `url`, or `None` when the host is an IP literal.
pub(crate) fn resolve_target(url: &Url) -> Option<ResolveTarget> {
    match url.host()? {
        Host::Domain(domain) => Some(ResolveTarget {
            host: domain.to_owned(),
            port: url.port_or_known_default()?,
        }),
        Host::Ipv4(_) | Host::Ipv6(_) => None,
    }
}

/// The first resolved address the client must not connect to.
pub(crate) fn first_private_address(addresses: &[IpAddr]) -> Option<IpAddr> {
    addresses.iter().copied().find(|address| is_private_ip(*address))
}

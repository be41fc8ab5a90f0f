//! SIP address construction and dial-string normalization
//!
//! The native engine only accepts well-formed `sip:` addresses, so every address
//! handed to it is built and validated here first. Parsing is deliberately narrow:
//! it covers the identity, registrar and call addresses this client produces, not the
//! full RFC 3261 URI grammar.
//!
//! # Examples
//!
//! ```rust
//! use sipua_client_core::address::{normalize_destination, SipAddress, Transport};
//!
//! let server = SipAddress::server("sip.example.com", 5060, Transport::Udp).unwrap();
//! assert_eq!(server.to_string(), "sip:sip.example.com:5060;transport=udp");
//!
//! assert_eq!(normalize_destination("5551234", "00"), "005551234");
//! assert_eq!(normalize_destination("0044123", "00"), "0044123");
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ClientError, ClientResult};

/// Signaling transport named in a server address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Udp,
    Tcp,
    Tls,
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::Udp => write!(f, "udp"),
            Transport::Tcp => write!(f, "tcp"),
            Transport::Tls => write!(f, "tls"),
        }
    }
}

impl FromStr for Transport {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "udp" => Ok(Transport::Udp),
            "tcp" => Ok(Transport::Tcp),
            "tls" => Ok(Transport::Tls),
            other => Err(ClientError::config(format!("unknown transport '{}'", other))),
        }
    }
}

/// A validated `sip:` address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SipAddress {
    user: Option<String>,
    host: String,
    port: Option<u16>,
    transport: Option<Transport>,
}

impl SipAddress {
    /// Identity address `sip:{user}@{host}`
    pub fn identity(user: &str, host: &str) -> ClientResult<Self> {
        let input = format!("sip:{}@{}", user, host);
        validate_user(user, &input)?;
        validate_host(host, &input)?;
        Ok(Self {
            user: Some(user.to_string()),
            host: host.to_string(),
            port: None,
            transport: None,
        })
    }

    /// Registrar/proxy address `sip:{host}:{port};transport={transport}`
    pub fn server(host: &str, port: u16, transport: Transport) -> ClientResult<Self> {
        let input = format!("sip:{}:{};transport={}", host, port, transport);
        validate_host(host, &input)?;
        if port == 0 {
            return Err(ClientError::invalid_address(input, "port must be non-zero"));
        }
        Ok(Self {
            user: None,
            host: host.to_string(),
            port: Some(port),
            transport: Some(transport),
        })
    }

    /// Call target `sip:{number}@{domain}`
    pub fn call_target(number: &str, domain: &str) -> ClientResult<Self> {
        Self::identity(number, domain)
    }

    /// Parse a `sip:[user@]host[:port][;transport=x]` string
    pub fn parse(input: &str) -> ClientResult<Self> {
        let rest = input
            .strip_prefix("sip:")
            .ok_or_else(|| ClientError::invalid_address(input, "missing sip: scheme"))?;

        let mut parts = rest.split(';');
        let base = parts.next().unwrap_or_default();
        let mut transport = None;
        for param in parts {
            if let Some(value) = param.strip_prefix("transport=") {
                transport = Some(
                    value
                        .parse::<Transport>()
                        .map_err(|_| ClientError::invalid_address(input, "unknown transport"))?,
                );
            }
        }

        let (user, host_port) = match base.split_once('@') {
            Some((user, host_port)) => {
                validate_user(user, input)?;
                (Some(user.to_string()), host_port)
            }
            None => (None, base),
        };

        let (host, port) = split_host_port(host_port, input)?;
        validate_host(host, input)?;

        Ok(Self {
            user,
            host: host.to_string(),
            port,
            transport,
        })
    }

    /// User part, if any
    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    /// Host part (the "domain" the engine routes on)
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    pub fn transport(&self) -> Option<Transport> {
        self.transport
    }
}

impl fmt::Display for SipAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sip:")?;
        if let Some(user) = &self.user {
            write!(f, "{}@", user)?;
        }
        write!(f, "{}", self.host)?;
        if let Some(port) = self.port {
            write!(f, ":{}", port)?;
        }
        if let Some(transport) = self.transport {
            write!(f, ";transport={}", transport)?;
        }
        Ok(())
    }
}

impl FromStr for SipAddress {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Prepend the international trunk prefix unless the destination already starts with it.
///
/// Applied unconditionally, so `+44...` becomes `00+44...`.
pub fn normalize_destination(destination: &str, prefix: &str) -> String {
    if destination.starts_with(prefix) {
        destination.to_string()
    } else {
        format!("{}{}", prefix, destination)
    }
}

/// Keep only digits and `+`, the way a dialer cleans pasted numbers
pub fn sanitize_dial_string(input: &str) -> String {
    input
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '+')
        .collect()
}

fn split_host_port<'a>(host_port: &'a str, input: &str) -> ClientResult<(&'a str, Option<u16>)> {
    // Bracketed IPv6 literal, optionally followed by :port
    if host_port.starts_with('[') {
        let end = host_port
            .find(']')
            .ok_or_else(|| ClientError::invalid_address(input, "unterminated IPv6 literal"))?;
        let host = &host_port[..=end];
        let tail = &host_port[end + 1..];
        return match tail.strip_prefix(':') {
            Some(port) => Ok((host, Some(parse_port(port, input)?))),
            None if tail.is_empty() => Ok((host, None)),
            None => Err(ClientError::invalid_address(input, "garbage after IPv6 literal")),
        };
    }

    match host_port.rsplit_once(':') {
        Some((host, port)) => Ok((host, Some(parse_port(port, input)?))),
        None => Ok((host_port, None)),
    }
}

fn parse_port(port: &str, input: &str) -> ClientResult<u16> {
    match port.parse::<u16>() {
        Ok(0) | Err(_) => Err(ClientError::invalid_address(input, format!("invalid port '{}'", port))),
        Ok(port) => Ok(port),
    }
}

fn validate_user(user: &str, input: &str) -> ClientResult<()> {
    if user.is_empty() {
        return Err(ClientError::invalid_address(input, "empty user part"));
    }
    if user
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '@' | ':' | ';' | '<' | '>'))
    {
        return Err(ClientError::invalid_address(input, "illegal character in user part"));
    }
    Ok(())
}

fn validate_host(host: &str, input: &str) -> ClientResult<()> {
    if host.is_empty() {
        return Err(ClientError::invalid_address(input, "empty host"));
    }
    if let Some(literal) = host.strip_prefix('[') {
        let inner = literal
            .strip_suffix(']')
            .ok_or_else(|| ClientError::invalid_address(input, "unterminated IPv6 literal"))?;
        return inner
            .parse::<std::net::Ipv6Addr>()
            .map(|_| ())
            .map_err(|_| ClientError::invalid_address(input, "invalid IPv6 literal"));
    }
    if host.starts_with('.') || host.ends_with('.') || host.starts_with('-') {
        return Err(ClientError::invalid_address(input, "malformed host"));
    }
    if !host
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
    {
        return Err(ClientError::invalid_address(input, "illegal character in host"));
    }
    Ok(())
}

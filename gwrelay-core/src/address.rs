//! Address abstraction for transport-agnostic endpoint locations.
//!
//! Provides unified addressing for TCP, IPC and in-process transports with
//! parsing support. The string form is what libzmq expects, so an `Address`
//! always renders back to a string the transport accepts.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Port part of a TCP address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Port {
    /// A concrete port number.
    Number(u16),
    /// `*`: let the OS pick an ephemeral port (bind only).
    Wildcard,
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Wildcard => f.write_str("*"),
        }
    }
}

/// Transport address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Address {
    /// TCP transport: `tcp://host:port`. The host may be an IPv4 address,
    /// a bracketed IPv6 address, a hostname, an interface name or `*`.
    Tcp { host: String, port: Port },
    /// IPC transport (Unix domain socket): `ipc:///path/to/socket`, or a
    /// Linux abstract socket `ipc://@name`.
    Ipc(PathBuf),
    /// In-process transport: `inproc://name`
    Inproc(String),
}

impl Address {
    /// Parse an address from a string.
    ///
    /// Supported formats:
    /// - `tcp://127.0.0.1:5555`
    /// - `tcp://[::1]:5555` (IPv6)
    /// - `tcp://*:5555`, `tcp://0.0.0.0:*`
    /// - `ipc:///tmp/socket.sock`, `ipc://@abstract-name`
    /// - `inproc://name`
    ///
    /// # Examples
    ///
    /// ```
    /// use gwrelay_core::address::Address;
    ///
    /// let address = Address::parse("tcp://127.0.0.1:5555").unwrap();
    /// assert!(address.is_tcp());
    ///
    /// let address = Address::parse("ipc:///tmp/nginx_queue_listen").unwrap();
    /// assert!(address.is_ipc());
    ///
    /// let address = Address::parse("inproc://monitor/xpub").unwrap();
    /// assert!(address.is_inproc());
    /// ```
    pub fn parse(s: &str) -> Result<Self, AddressError> {
        s.parse()
    }

    /// Returns true if this is a TCP address.
    pub fn is_tcp(&self) -> bool {
        matches!(self, Self::Tcp { .. })
    }

    /// Returns true if this is an IPC address.
    pub fn is_ipc(&self) -> bool {
        matches!(self, Self::Ipc(_))
    }

    /// Returns true if this is an inproc address.
    pub fn is_inproc(&self) -> bool {
        matches!(self, Self::Inproc(_))
    }

    /// Filesystem path backing an IPC address.
    ///
    /// `None` for non-IPC addresses and for abstract sockets, which have no
    /// filesystem presence.
    pub fn ipc_path(&self) -> Option<&std::path::Path> {
        match self {
            Self::Ipc(path) if !is_abstract(path) => Some(path.as_path()),
            _ => None,
        }
    }

    /// Scheme name without the `://` separator.
    pub fn scheme(&self) -> &'static str {
        match self {
            Self::Tcp { .. } => "tcp",
            Self::Ipc(_) => "ipc",
            Self::Inproc(_) => "inproc",
        }
    }
}

fn is_abstract(path: &std::path::Path) -> bool {
    path.to_str().is_some_and(|p| p.starts_with('@'))
}

fn parse_tcp(location: &str) -> Result<Address, AddressError> {
    let invalid = || AddressError::InvalidTcpAddress(location.to_string());

    let (host, port) = location.rsplit_once(':').ok_or_else(invalid)?;
    if host.is_empty() {
        return Err(invalid());
    }
    // An IPv6 literal must be bracketed, otherwise the port split is ambiguous.
    if host.contains(':') && !(host.starts_with('[') && host.ends_with(']')) {
        return Err(invalid());
    }

    let port = match port {
        "*" => Port::Wildcard,
        p => Port::Number(p.parse::<u16>().map_err(|_| invalid())?),
    };

    Ok(Address::Tcp {
        host: host.to_string(),
        port,
    })
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(AddressError::Empty);
        }

        if let Some(location) = s.strip_prefix("tcp://") {
            parse_tcp(location)
        } else if let Some(path) = s.strip_prefix("ipc://") {
            if path.is_empty() || path == "@" {
                Err(AddressError::InvalidIpcPath(s.to_string()))
            } else {
                Ok(Self::Ipc(PathBuf::from(path)))
            }
        } else if let Some(name) = s.strip_prefix("inproc://") {
            if name.is_empty() {
                Err(AddressError::InvalidInprocName(
                    "inproc name cannot be empty".to_string(),
                ))
            } else {
                Ok(Self::Inproc(name.to_string()))
            }
        } else {
            Err(AddressError::InvalidScheme(s.to_string()))
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp { host, port } => write!(f, "tcp://{host}:{port}"),
            Self::Ipc(path) => write!(f, "ipc://{}", path.display()),
            Self::Inproc(name) => write!(f, "inproc://{name}"),
        }
    }
}

/// Errors that can occur when parsing addresses.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("address is empty")]
    Empty,

    #[error("Invalid scheme in address: {0} (expected tcp://, ipc://, or inproc://)")]
    InvalidScheme(String),

    #[error("Invalid TCP address: {0} (expected host:port)")]
    InvalidTcpAddress(String),

    #[error("Invalid IPC path: {0}")]
    InvalidIpcPath(String),

    #[error("Invalid inproc name: {0}")]
    InvalidInprocName(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tcp_ipv4() {
        let address = Address::parse("tcp://127.0.0.1:5555").unwrap();
        assert_eq!(
            address,
            Address::Tcp {
                host: "127.0.0.1".into(),
                port: Port::Number(5555)
            }
        );
        assert_eq!(address.to_string(), "tcp://127.0.0.1:5555");
    }

    #[test]
    fn test_parse_tcp_ipv6() {
        let address = Address::parse("tcp://[::1]:5555").unwrap();
        assert!(address.is_tcp());
        assert_eq!(address.to_string(), "tcp://[::1]:5555");
    }

    #[test]
    fn test_parse_tcp_wildcards() {
        let address = Address::parse("tcp://*:6001").unwrap();
        assert_eq!(address.to_string(), "tcp://*:6001");

        let address = Address::parse("tcp://0.0.0.0:*").unwrap();
        assert!(matches!(
            address,
            Address::Tcp {
                port: Port::Wildcard,
                ..
            }
        ));
    }

    #[test]
    fn test_parse_ipc() {
        let address = Address::parse("ipc:///tmp/nginx_queue_listen").unwrap();
        assert!(address.is_ipc());
        assert_eq!(
            address.ipc_path(),
            Some(std::path::Path::new("/tmp/nginx_queue_listen"))
        );
        assert_eq!(address.to_string(), "ipc:///tmp/nginx_queue_listen");
    }

    #[test]
    fn test_parse_ipc_abstract() {
        let address = Address::parse("ipc://@nginx_queue_listen").unwrap();
        assert!(address.is_ipc());
        assert_eq!(address.ipc_path(), None);
        assert_eq!(address.to_string(), "ipc://@nginx_queue_listen");
    }

    #[test]
    fn test_invalid_scheme() {
        let result = Address::parse("http://127.0.0.1:5555");
        assert!(matches!(result, Err(AddressError::InvalidScheme(_))));
    }

    #[test]
    fn test_invalid_tcp_address() {
        for bad in [
            "tcp://invalid:port",
            "tcp://127.0.0.1",
            "tcp://:5555",
            "tcp://127.0.0.1:70000",
            "tcp://::1:5555",
        ] {
            let result = Address::parse(bad);
            assert!(
                matches!(result, Err(AddressError::InvalidTcpAddress(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_empty_inputs() {
        assert_eq!(Address::parse(""), Err(AddressError::Empty));
        assert!(matches!(
            Address::parse("ipc://"),
            Err(AddressError::InvalidIpcPath(_))
        ));
        assert!(matches!(
            Address::parse("inproc://"),
            Err(AddressError::InvalidInprocName(_))
        ));
    }

    #[test]
    fn test_parse_inproc() {
        let address = Address::parse("inproc://monitor/xsub").unwrap();
        assert_eq!(address, Address::Inproc("monitor/xsub".into()));
        assert_eq!(address.scheme(), "inproc");
    }
}

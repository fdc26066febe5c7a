use crate::Error;

use std::{fmt, net::SocketAddr, str::FromStr};

/// Width of the canonical IP field.
pub const IP_LEN: usize = 15;

/// Width of the canonical port field.
pub const PORT_LEN: usize = 5;

/// Width of an `IP + port` entry inside a packet body.
pub const ENTRY_LEN: usize = IP_LEN + PORT_LEN;

/// Canonical peer address.
///
/// Stored as raw octets and a port so that two addresses written
/// differently in text (`"1.2.3.4"` vs `"001.002.003.004"`) compare and
/// hash as the same key. The canonical text form only exists at the
/// encoding boundary.
///
/// # Test
///
/// ```
/// use canopy_server_codec::address::Address;
///
/// let a: Address = "1.2.3.4:99".parse().unwrap();
/// let b: Address = "001.002.003.004:00099".parse().unwrap();
///
/// assert_eq!(a, b);
/// assert_eq!(a.encode_ip(), "001.002.003.004");
/// assert_eq!(a.encode_port(), "00099");
/// assert_eq!(a.to_string(), "001.002.003.004:00099");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address {
    pub octets: [u8; 4],
    pub port: u16,
}

impl Address {
    pub fn new(octets: [u8; 4], port: u16) -> Self {
        Self { octets, port }
    }

    /// Parses the textual IP part. Accepts both padded and unpadded
    /// decimal octets; anything else is a caller error, not a protocol
    /// error.
    pub fn parse_ip(ip: &str) -> Result<[u8; 4], Error> {
        let mut octets = [0u8; 4];
        let mut parts = ip.split('.');

        for octet in octets.iter_mut() {
            *octet = parts
                .next()
                .and_then(|part| part.trim().parse().ok())
                .ok_or(Error::BadAddress)?;
        }

        if parts.next().is_some() {
            return Err(Error::BadAddress);
        }

        Ok(octets)
    }

    /// Parses the textual port part, padded or not.
    pub fn parse_port(port: &str) -> Result<u16, Error> {
        port.trim().parse().map_err(|_| Error::BadAddress)
    }

    pub fn parse(ip: &str, port: &str) -> Result<Self, Error> {
        Ok(Self {
            octets: Self::parse_ip(ip)?,
            port: Self::parse_port(port)?,
        })
    }

    /// Decodes one canonical `IP(15) + PORT(5)` entry from a packet body.
    pub fn decode_entry(text: &str) -> Result<Self, Error> {
        if text.len() < ENTRY_LEN {
            return Err(Error::BadAddress);
        }

        Self::parse(&text[..IP_LEN], &text[IP_LEN..ENTRY_LEN])
    }

    /// The 15-character dotted form, each octet zero-padded to 3 digits.
    pub fn encode_ip(&self) -> String {
        format!(
            "{:03}.{:03}.{:03}.{:03}",
            self.octets[0], self.octets[1], self.octets[2], self.octets[3]
        )
    }

    /// The 5-character zero-padded decimal port.
    pub fn encode_port(&self) -> String {
        format!("{:05}", self.port)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.encode_ip(), self.encode_port())
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (ip, port) = value.rsplit_once(':').ok_or(Error::BadAddress)?;
        Self::parse(ip, port)
    }
}

impl From<SocketAddr> for Address {
    /// Builds the canonical form of a bound socket address. The overlay
    /// is IPv4-only; an IPv6 bind falls back to the loopback octets.
    fn from(addr: SocketAddr) -> Self {
        let octets = match addr {
            SocketAddr::V4(v4) => v4.ip().octets(),
            SocketAddr::V6(_) => [127, 0, 0, 1],
        };

        Self {
            octets,
            port: addr.port(),
        }
    }
}

impl From<Address> for SocketAddr {
    fn from(value: Address) -> Self {
        SocketAddr::from((value.octets, value.port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_idempotent() {
        let first = Address::parse("192.168.1.1", "65000").unwrap();
        let again = Address::parse(&first.encode_ip(), &first.encode_port()).unwrap();

        assert_eq!(first, again);
        assert_eq!(first.encode_ip(), "192.168.001.001");
        assert_eq!(first.encode_port(), "65000");
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(Address::parse_ip("192.168.1").is_err());
        assert!(Address::parse_ip("192.168.1.1.1").is_err());
        assert!(Address::parse_ip("192.168.1.256").is_err());
        assert!(Address::parse_port("70000").is_err());
        assert!("192.168.1.1".parse::<Address>().is_err());
    }

    #[test]
    fn decode_entry_cuts_fixed_fields() {
        let address = Address::decode_entry("127.000.000.00105356").unwrap();

        assert_eq!(address, Address::new([127, 0, 0, 1], 5356));
        assert!(Address::decode_entry("127.000.000.001").is_err());
    }
}

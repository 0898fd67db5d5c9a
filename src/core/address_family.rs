use ipnetwork::IpNetwork;
use std::fmt;
use std::net::IpAddr;

/*-------------------------------------------------------------------------------------------------
  Address Family
-------------------------------------------------------------------------------------------------*/

/// IP address family (IPv4 or IPv6). Each family is matched by its own
/// [RangeRegistry](crate::RangeRegistry).
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum AddressFamily {
    IPv4,
    IPv6,
}

impl AddressFamily {
    /// Address family of an IP prefix.
    pub fn of(prefix: &IpNetwork) -> Self {
        match prefix {
            IpNetwork::V4(_) => AddressFamily::IPv4,
            IpNetwork::V6(_) => AddressFamily::IPv6,
        }
    }

    /// Address family of an IP address.
    pub fn of_addr(ip_addr: &IpAddr) -> Self {
        match ip_addr {
            IpAddr::V4(_) => AddressFamily::IPv4,
            IpAddr::V6(_) => AddressFamily::IPv6,
        }
    }

    /// Width of the address space in bits.
    pub fn bits(&self) -> u8 {
        match self {
            AddressFamily::IPv4 => 32,
            AddressFamily::IPv6 => 128,
        }
    }

    pub fn is_ipv4(&self) -> bool {
        matches!(self, AddressFamily::IPv4)
    }

    pub fn is_ipv6(&self) -> bool {
        matches!(self, AddressFamily::IPv6)
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressFamily::IPv4 => write!(f, "IPv4"),
            AddressFamily::IPv6 => write!(f, "IPv6"),
        }
    }
}

/*-------------------------------------------------------------------------------------------------
  Unit Tests
-------------------------------------------------------------------------------------------------*/

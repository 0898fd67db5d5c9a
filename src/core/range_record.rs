use crate::core::address_family::AddressFamily;
use ipnetwork::IpNetwork;
use serde::Serialize;
use std::sync::Arc;

/*-------------------------------------------------------------------------------------------------
  Range Record
-------------------------------------------------------------------------------------------------*/

/// Published address range: an IP prefix together with the provider that owns it and the
/// provider's region label for the range.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct RangeRecord {
    /// IPv4 or IPv6 prefix.
    pub prefix: IpNetwork,

    /// Identifier of the cloud or CDN provider that owns the prefix (e.g. `aws`).
    pub provider: Arc<str>,

    /// Provider region label; empty when the provider publishes no region granularity.
    pub region: Arc<str>,
}

impl RangeRecord {
    pub fn new(prefix: IpNetwork, provider: &str, region: &str) -> Self {
        Self {
            prefix,
            provider: Arc::from(provider),
            region: Arc::from(region),
        }
    }

    pub fn family(&self) -> AddressFamily {
        AddressFamily::of(&self.prefix)
    }
}

/*-------------------------------------------------------------------------------------------------
  Unit Tests
-------------------------------------------------------------------------------------------------*/

use crate::core::range_record::RangeRecord;
use ipnetwork::IpNetwork;
use serde::Serialize;
use std::sync::Arc;

/*-------------------------------------------------------------------------------------------------
  Lookup Result
-------------------------------------------------------------------------------------------------*/

/// Outcome of a single address lookup. The default value is the "not found" result: an empty
/// provider, an empty region, and no matched prefix.
///
/// A found result may carry an empty region (some providers publish no region granularity),
/// so use the `found` flag returned by [Ranger::get_ip](crate::Ranger::get_ip), not the
/// region string, to tell a match from a miss.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct LookupResult {
    prefix: Option<IpNetwork>,
    provider: Arc<str>,
    region: Arc<str>,
}

impl LookupResult {
    /// Identifier of the provider that owns the address; empty when not found.
    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// Provider region label; empty when not found or when the provider publishes none.
    pub fn region(&self) -> &str {
        &self.region
    }

    /// Most specific published prefix containing the address.
    pub fn prefix(&self) -> Option<&IpNetwork> {
        self.prefix.as_ref()
    }
}

impl Default for LookupResult {
    fn default() -> Self {
        Self {
            prefix: None,
            provider: Arc::from(""),
            region: Arc::from(""),
        }
    }
}

impl From<&RangeRecord> for LookupResult {
    fn from(record: &RangeRecord) -> Self {
        Self {
            prefix: Some(record.prefix),
            provider: Arc::clone(&record.provider),
            region: Arc::clone(&record.region),
        }
    }
}

/*-------------------------------------------------------------------------------------------------
  Unit Tests
-------------------------------------------------------------------------------------------------*/

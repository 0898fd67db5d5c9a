use crate::core::address_family::AddressFamily;
use crate::core::dataset;
use crate::core::errors::Result;
use crate::core::lookup_result::LookupResult;
use crate::core::range_record::RangeRecord;
use crate::core::registry::RangeRegistry;
use lazy_static::lazy_static;
use log::{info, trace};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::BufReader;
use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;

/*-------------------------------------------------------------------------------------------------
  Simple Interface
-------------------------------------------------------------------------------------------------*/

lazy_static! {
    static ref DEFAULT_RANGER: Ranger = Ranger::new();
}

/// _**Simple library interface**_ looks up an IP address in the embedded provider dataset.
/// The default [Ranger] is built on first use and shared by every later call.
///
/// ```
/// let (result, found) = cloudranger::get_ip("3.5.140.101");
/// assert!(found);
/// assert_eq!(result.provider(), "aws");
/// assert_eq!(result.region(), "ap-northeast-2");
///
/// let (result, found) = cloudranger::get_ip("just a random string");
/// assert!(!found);
/// assert_eq!(result.provider(), "");
/// ```
pub fn get_ip(address: &str) -> (LookupResult, bool) {
    DEFAULT_RANGER.get_ip(address)
}

/// The process-wide [Ranger] built from the embedded dataset.
pub fn default_ranger() -> &'static Ranger {
    &DEFAULT_RANGER
}

/*-------------------------------------------------------------------------------------------------
  Ranger
-------------------------------------------------------------------------------------------------*/

/// Classifies IP addresses against published cloud and CDN provider ranges. Holds one
/// [RangeRegistry] per address family; immutable once built, so a single instance can be
/// shared across threads and queried concurrently.
///
/// ```
/// use cloudranger::{RangeRecord, Ranger};
///
/// let ranger = Ranger::from_records([
///     RangeRecord::new("10.0.0.0/8".parse().unwrap(), "example", "global"),
///     RangeRecord::new("10.1.0.0/16".parse().unwrap(), "example", "us-east"),
/// ]);
///
/// let (result, found) = ranger.get_ip("10.1.2.3");
/// assert!(found);
/// assert_eq!(result.region(), "us-east");
/// ```
#[derive(Clone, Debug)]
pub struct Ranger {
    ipv4: RangeRegistry,
    ipv6: RangeRegistry,
}

/*--------------------------------------------------------------------------------------
  Ranger Implementation
--------------------------------------------------------------------------------------*/

impl Default for Ranger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ranger {
    /*-------------------------------------------------------------------------
      Constructors
    -------------------------------------------------------------------------*/

    /// Build a [Ranger] from the dataset embedded in the crate.
    ///
    /// Building parses and indexes every record; build once and reuse the instance (or use
    /// [get_ip]) instead of building per query.
    pub fn new() -> Self {
        // The embedded dataset is checked by the unit tests
        let records = dataset::embedded_records()
            .unwrap_or_else(|error| panic!("Embedded range dataset is malformed: {}", error));
        Self::from_records(records)
    }

    /// Build a [Ranger] from the provided [RangeRecord]s. Records are partitioned by address
    /// family; within a family, the first record seen for a prefix wins.
    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = RangeRecord>,
    {
        let (ipv4_records, ipv6_records): (Vec<RangeRecord>, Vec<RangeRecord>) = records
            .into_iter()
            .partition(|record| record.family().is_ipv4());

        info!(
            "Building ranger from {} IPv4 and {} IPv6 range records",
            ipv4_records.len(),
            ipv6_records.len()
        );

        Self {
            ipv4: RangeRegistry::build(ipv4_records, AddressFamily::IPv4),
            ipv6: RangeRegistry::build(ipv6_records, AddressFamily::IPv6),
        }
    }

    /// Build a [Ranger] from a dataset in the normalized CSV format (`cidr,provider,region`).
    /// Fails on the first malformed row.
    pub fn from_csv<R: std::io::Read>(reader: R) -> Result<Self> {
        Ok(Self::from_records(dataset::read_csv(reader)?))
    }

    /// Build a [Ranger] from a normalized CSV dataset file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|error| format!("Failed to open dataset `{}`: {}", path.display(), error))?;

        info!("Loading range dataset from: {:?}", path);
        Self::from_csv(BufReader::new(file)).map_err(|error| {
            format!("Failed to load dataset `{}`: {}", path.display(), error).into()
        })
    }

    /*-------------------------------------------------------------------------
      Getters
    -------------------------------------------------------------------------*/

    /// Registry of IPv4 ranges.
    pub fn ipv4(&self) -> &RangeRegistry {
        &self.ipv4
    }

    /// Registry of IPv6 ranges.
    pub fn ipv6(&self) -> &RangeRegistry {
        &self.ipv6
    }

    /// Registry matching the provided address family.
    pub fn registry(&self, family: AddressFamily) -> &RangeRegistry {
        match family {
            AddressFamily::IPv4 => &self.ipv4,
            AddressFamily::IPv6 => &self.ipv6,
        }
    }

    /// Total number of registered ranges across both address families.
    pub fn len(&self) -> usize {
        self.ipv4.len() + self.ipv6.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ipv4.is_empty() && self.ipv6.is_empty()
    }

    /// All registered records, IPv4 first, each family in insertion order.
    pub fn records(&self) -> impl Iterator<Item = &RangeRecord> {
        self.ipv4.records().iter().chain(self.ipv6.records())
    }

    /// Providers represented in the registered ranges.
    pub fn providers(&self) -> BTreeSet<Arc<str>> {
        self.records()
            .map(|record| Arc::clone(&record.provider))
            .collect()
    }

    /// Region labels published by a provider (an empty label is included when the provider
    /// publishes ranges without a region).
    pub fn regions(&self, provider: &str) -> BTreeSet<Arc<str>> {
        self.records()
            .filter(|record| &*record.provider == provider)
            .map(|record| Arc::clone(&record.region))
            .collect()
    }

    /*-------------------------------------------------------------------------
      Lookup
    -------------------------------------------------------------------------*/

    /// Look up the provider and region owning an IP address string.
    ///
    /// Returns `(result, true)` for the most specific registered range containing the
    /// address. Strings that are not IPv4 or IPv6 literals and addresses outside every
    /// registered range both return `(LookupResult::default(), false)`.
    pub fn get_ip(&self, address: &str) -> (LookupResult, bool) {
        let ip_addr: IpAddr = match address.parse() {
            Ok(ip_addr) => ip_addr,
            Err(_) => {
                trace!("Not an IP address: {:?}", address);
                return (LookupResult::default(), false);
            }
        };

        match self.lookup(ip_addr) {
            Some(result) => (result, true),
            None => (LookupResult::default(), false),
        }
    }

    /// Look up the provider and region owning an IP address.
    pub fn lookup(&self, ip_addr: IpAddr) -> Option<LookupResult> {
        self.registry(AddressFamily::of_addr(&ip_addr))
            .longest_match(&ip_addr)
            .map(LookupResult::from)
    }

    /// Get every registered [RangeRecord] containing an IP address, ordered from least to
    /// most specific. The last record is the one [Ranger::lookup] reports.
    pub fn get_supernet_records(&self, ip_addr: IpAddr) -> Vec<&RangeRecord> {
        self.registry(AddressFamily::of_addr(&ip_addr))
            .supernet_records(&ip_addr)
    }
}

/*-------------------------------------------------------------------------------------------------
  Unit Tests
-------------------------------------------------------------------------------------------------*/

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::range_record::tests::record;
    use test_log::test;

    /*----------------------------------------------------------------------------------
      Test Helper Functions
    ----------------------------------------------------------------------------------*/

    pub(crate) fn test_ranger() -> Ranger {
        Ranger::from_records([
            record("10.0.0.0/8", "aws", "us-east-1"),
            record("10.0.0.0/16", "gcp", "us-central1"),
            record("10.1.0.0/16", "aws", "us-west-1"),
            record("104.16.0.0/13", "cloudflare", ""),
            record("2001:db8::/32", "aws", "us-east-1"),
            record("2001:db8:1::/48", "linode", "US-CA"),
        ])
    }

    /*----------------------------------------------------------------------------------
      Constructors
    ----------------------------------------------------------------------------------*/

    #[test]
    fn test_from_records_partitions_by_family() {
        let ranger = test_ranger();
        assert_eq!(ranger.ipv4().len(), 4);
        assert_eq!(ranger.ipv6().len(), 2);
        assert_eq!(ranger.len(), 6);
        assert_eq!(ranger.ipv4().family(), AddressFamily::IPv4);
        assert_eq!(ranger.ipv6().family(), AddressFamily::IPv6);
    }

    #[test]
    fn test_empty_ranger_matches_nothing() {
        let ranger = Ranger::from_records(Vec::new());
        assert!(ranger.is_empty());
        assert_eq!(ranger.get_ip("10.0.0.1"), (LookupResult::default(), false));
        assert_eq!(ranger.get_ip("2001:db8::1"), (LookupResult::default(), false));
    }

    #[test]
    fn test_new_uses_embedded_dataset() {
        let ranger = Ranger::new();
        assert!(!ranger.is_empty());
        assert!(ranger.providers().contains("aws"));
        assert!(ranger.providers().contains("cloudflare"));
    }

    #[test]
    fn test_from_csv_is_strict() {
        let valid = "cidr,provider,region\n10.0.0.0/8,aws,us-east-1\n";
        assert_eq!(Ranger::from_csv(valid.as_bytes()).unwrap().len(), 1);

        let invalid = "cidr,provider,region\n10.0.0.0/8,aws,us-east-1\n10.0.0.256/8,aws,x\n";
        assert!(Ranger::from_csv(invalid.as_bytes()).is_err());
    }

    #[test]
    fn test_from_file_missing_file() {
        let result = Ranger::from_file("./does/not/exist.csv");
        assert!(result.is_err());
    }

    /*----------------------------------------------------------------------------------
      Getters
    ----------------------------------------------------------------------------------*/

    #[test]
    fn test_providers_and_regions() {
        let ranger = test_ranger();

        let providers: Vec<String> = ranger
            .providers()
            .iter()
            .map(|provider| provider.to_string())
            .collect();
        assert_eq!(providers, vec!["aws", "cloudflare", "gcp", "linode"]);

        let regions: Vec<String> = ranger
            .regions("aws")
            .iter()
            .map(|region| region.to_string())
            .collect();
        assert_eq!(regions, vec!["us-east-1", "us-west-1"]);

        assert!(ranger.regions("cloudflare").contains(""));
        assert!(ranger.regions("oracle").is_empty());
    }

    /*----------------------------------------------------------------------------------
      Lookup
    ----------------------------------------------------------------------------------*/

    #[test]
    fn test_get_ip_longest_match() {
        let ranger = test_ranger();

        let (result, found) = ranger.get_ip("10.0.1.1");
        assert!(found);
        assert_eq!(result.provider(), "gcp");
        assert_eq!(result.region(), "us-central1");

        let (result, found) = ranger.get_ip("10.2.0.1");
        assert!(found);
        assert_eq!(result.provider(), "aws");
        assert_eq!(result.region(), "us-east-1");

        let (result, found) = ranger.get_ip("2001:db8:1::1");
        assert!(found);
        assert_eq!(result.provider(), "linode");
        assert_eq!(result.region(), "US-CA");
    }

    #[test]
    fn test_get_ip_empty_region_is_found() {
        let ranger = test_ranger();
        let (result, found) = ranger.get_ip("104.21.40.8");
        assert!(found);
        assert_eq!(result.provider(), "cloudflare");
        assert_eq!(result.region(), "");
        assert_eq!(
            result.prefix(),
            Some(&"104.16.0.0/13".parse::<ipnetwork::IpNetwork>().unwrap())
        );
    }

    #[test]
    fn test_get_ip_not_found() {
        let ranger = test_ranger();
        for address in [
            "127.0.0.1",
            "192.168.1.1",
            "::1",
            "just a random string",
            "",
            "10.0.0.1/8",
            " 10.0.0.1",
            "10.0.0.256",
            "fe80::1%eth0",
        ] {
            let (result, found) = ranger.get_ip(address);
            assert!(!found, "{address:?}");
            assert_eq!(result, LookupResult::default(), "{address:?}");
        }
    }

    #[test]
    fn test_lookup_does_not_cross_families() {
        let ranger = test_ranger();
        // IPv4-mapped IPv6 addresses are looked up in the IPv6 registry.
        assert_eq!(ranger.lookup("::ffff:10.0.0.1".parse().unwrap()), None);
        assert!(ranger.lookup("10.0.0.1".parse().unwrap()).is_some());
    }

    #[test]
    fn test_get_supernet_records() {
        let ranger = test_ranger();
        let supernets = ranger.get_supernet_records("10.0.0.1".parse().unwrap());
        assert_eq!(supernets.len(), 2);
        assert_eq!(&*supernets[0].provider, "aws");
        assert_eq!(&*supernets[1].provider, "gcp");

        assert!(ranger
            .get_supernet_records("192.0.2.1".parse().unwrap())
            .is_empty());
    }

    #[test]
    fn test_simple_interface() {
        let (result, found) = get_ip("3.5.140.101");
        assert!(found);
        assert_eq!(result.provider(), "aws");
        assert_eq!(result.region(), "ap-northeast-2");

        assert!(std::ptr::eq(default_ranger(), default_ranger()));
    }

    #[test]
    fn test_ranger_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Ranger>();
        assert_send_sync::<LookupResult>();
    }
}

use crate::core::address_family::AddressFamily;
use crate::core::range_record::RangeRecord;
use crate::core::utils::ipnetwork::{address_bits, bit_at, network_prefix};
use ipnetwork::IpNetwork;
use log::{debug, trace, warn};
use std::net::IpAddr;

/*-------------------------------------------------------------------------------------------------
  Range Registry
-------------------------------------------------------------------------------------------------*/

/// Immutable longest-prefix-match structure over the [RangeRecord]s of one address family.
///
/// The registry is a binary trie keyed by address bits, most significant bit first. A record
/// is attached to the node at the depth of its prefix length, so the deepest record-carrying
/// node on an address's path is the most specific range containing that address. Nodes live
/// in a single arena and refer to each other by index.
#[derive(Clone, Debug)]
pub struct RangeRegistry {
    family: AddressFamily,
    nodes: Vec<Node>,
    records: Vec<RangeRecord>,
}

/// A trie node. `children[0]` follows a `0` bit and `children[1]` a `1` bit; `record` indexes
/// into the registry's record list.
#[derive(Clone, Debug, Default)]
struct Node {
    children: [Option<u32>; 2],
    record: Option<u32>,
}

/*--------------------------------------------------------------------------------------
  Range Registry Implementation
--------------------------------------------------------------------------------------*/

impl RangeRegistry {
    /*-------------------------------------------------------------------------
      Build
    -------------------------------------------------------------------------*/

    /// Build a registry from the records of one address family.
    ///
    /// Records of the other family are skipped. When the same prefix appears more than once,
    /// the first record seen is kept. Host bits set in a record's prefix are cleared.
    pub fn build<I>(records: I, family: AddressFamily) -> Self
    where
        I: IntoIterator<Item = RangeRecord>,
    {
        let mut registry = Self {
            family,
            nodes: vec![Node::default()],
            records: Vec::new(),
        };

        let mut mismatched: usize = 0;
        let mut duplicates: usize = 0;

        for record in records {
            if record.family() != family {
                warn!(
                    "Skipping {} prefix {} in {} registry",
                    record.family(),
                    record.prefix,
                    family
                );
                mismatched += 1;
                continue;
            }

            if !registry.insert(record) {
                duplicates += 1;
            }
        }

        debug!(
            "Built {} registry: {} records, {} nodes, {} duplicates, {} skipped",
            family,
            registry.records.len(),
            registry.nodes.len(),
            duplicates,
            mismatched
        );

        registry
    }

    /// Insert a record; returns `false` when its prefix is already registered.
    fn insert(&mut self, mut record: RangeRecord) -> bool {
        record.prefix = network_prefix(&record.prefix);
        let bits = address_bits(&record.prefix.ip());

        let mut node_index: usize = 0;
        for depth in 0..record.prefix.prefix() {
            let bit = bit_at(bits, depth);
            node_index = match self.nodes[node_index].children[bit] {
                Some(child) => child as usize,
                None => {
                    let child = self.nodes.len();
                    self.nodes.push(Node::default());
                    self.nodes[node_index].children[bit] = Some(child as u32);
                    child
                }
            };
        }

        if let Some(existing) = self.nodes[node_index].record {
            let existing = &self.records[existing as usize];
            debug!(
                "Duplicate prefix {} ({} {:?}); keeping first seen ({} {:?})",
                record.prefix, record.provider, record.region, existing.provider, existing.region
            );
            return false;
        }

        self.nodes[node_index].record = Some(self.records.len() as u32);
        self.records.push(record);
        true
    }

    /*-------------------------------------------------------------------------
      Getters
    -------------------------------------------------------------------------*/

    /// Address family of the registered prefixes.
    pub fn family(&self) -> AddressFamily {
        self.family
    }

    /// Registered records in insertion order (duplicate prefixes excluded).
    pub fn records(&self) -> &[RangeRecord] {
        &self.records
    }

    /// Number of registered records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of trie nodes, including the root.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /*-------------------------------------------------------------------------
      Get Prefix
    -------------------------------------------------------------------------*/

    /// Get the [RangeRecord] registered for exactly the provided prefix.
    pub fn get_prefix(&self, prefix: &IpNetwork) -> Option<&RangeRecord> {
        if AddressFamily::of(prefix) != self.family {
            return None;
        }

        let prefix = network_prefix(prefix);
        let bits = address_bits(&prefix.ip());

        let mut node = &self.nodes[0];
        for depth in 0..prefix.prefix() {
            node = &self.nodes[node.children[bit_at(bits, depth)]? as usize];
        }

        node.record.map(|index| &self.records[index as usize])
    }

    /*-------------------------------------------------------------------------
      Longest Match
    -------------------------------------------------------------------------*/

    /// Get the most specific [RangeRecord] whose prefix contains the provided address.
    pub fn longest_match(&self, ip_addr: &IpAddr) -> Option<&RangeRecord> {
        if AddressFamily::of_addr(ip_addr) != self.family {
            return None;
        }

        let bits = address_bits(ip_addr);

        let mut node = &self.nodes[0];
        let mut best = node.record;
        for depth in 0..self.family.bits() {
            match node.children[bit_at(bits, depth)] {
                Some(child) => {
                    node = &self.nodes[child as usize];
                    if node.record.is_some() {
                        best = node.record;
                    }
                }
                None => break,
            }
        }

        let record = best.map(|index| &self.records[index as usize]);
        trace!(
            "Longest match for {}: {:?}",
            ip_addr,
            record.map(|record| record.prefix)
        );
        record
    }

    /*-------------------------------------------------------------------------
      Supernet Records
    -------------------------------------------------------------------------*/

    /// Get every [RangeRecord] whose prefix contains the provided address, ordered from least
    /// to most specific.
    pub fn supernet_records(&self, ip_addr: &IpAddr) -> Vec<&RangeRecord> {
        let mut supernets = Vec::new();
        if AddressFamily::of_addr(ip_addr) != self.family {
            return supernets;
        }

        let bits = address_bits(ip_addr);

        let mut node = &self.nodes[0];
        if let Some(index) = node.record {
            supernets.push(&self.records[index as usize]);
        }
        for depth in 0..self.family.bits() {
            match node.children[bit_at(bits, depth)] {
                Some(child) => {
                    node = &self.nodes[child as usize];
                    if let Some(index) = node.record {
                        supernets.push(&self.records[index as usize]);
                    }
                }
                None => break,
            }
        }

        supernets
    }
}

/*-------------------------------------------------------------------------------------------------
  Unit Tests
-------------------------------------------------------------------------------------------------*/

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::range_record::tests::record;
    use test_log::test;

    /*----------------------------------------------------------------------------------
      Test Helper Functions
    ----------------------------------------------------------------------------------*/

    fn ip(value: &str) -> IpAddr {
        value.parse().unwrap()
    }

    fn test_ipv4_registry() -> RangeRegistry {
        RangeRegistry::build(
            [
                record("10.0.0.0/8", "aws", "us-east-1"),
                record("10.0.0.0/16", "aws", "us-east-2"),
                record("10.1.0.0/16", "gcp", "us-west1"),
                record("10.0.0.128/25", "azure", "eastus"),
            ],
            AddressFamily::IPv4,
        )
    }

    /*----------------------------------------------------------------------------------
      Build
    ----------------------------------------------------------------------------------*/

    #[test]
    fn test_build_empty_registry_matches_nothing() {
        let registry = RangeRegistry::build(Vec::new(), AddressFamily::IPv4);
        assert!(registry.is_empty());
        assert_eq!(registry.node_count(), 1);
        assert_eq!(registry.longest_match(&ip("10.0.0.1")), None);
        assert!(registry.supernet_records(&ip("10.0.0.1")).is_empty());
    }

    #[test]
    fn test_build_skips_other_family() {
        let registry = RangeRegistry::build(
            [
                record("10.0.0.0/8", "aws", "us-east-1"),
                record("2001:db8::/32", "aws", "us-east-1"),
            ],
            AddressFamily::IPv4,
        );
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.family(), AddressFamily::IPv4);
        assert_eq!(registry.longest_match(&ip("2001:db8::1")), None);
    }

    #[test]
    fn test_build_keeps_first_seen_duplicate() {
        let registry = RangeRegistry::build(
            [
                record("10.0.0.0/8", "aws", "us-east-1"),
                record("10.0.0.0/8", "gcp", "us-central1"),
                record("10.0.0.0/8", "aws", "us-west-2"),
            ],
            AddressFamily::IPv4,
        );
        assert_eq!(registry.len(), 1);

        let matched = registry.longest_match(&ip("10.20.30.40")).unwrap();
        assert_eq!(&*matched.provider, "aws");
        assert_eq!(&*matched.region, "us-east-1");
    }

    #[test]
    fn test_build_clears_host_bits() {
        let registry = RangeRegistry::build(
            [record("10.1.2.3/8", "aws", "us-east-1")],
            AddressFamily::IPv4,
        );
        let expected: IpNetwork = "10.0.0.0/8".parse().unwrap();
        assert_eq!(registry.records()[0].prefix, expected);
        assert!(registry.get_prefix(&expected).is_some());
        assert!(registry.longest_match(&ip("10.200.0.1")).is_some());
    }

    /*----------------------------------------------------------------------------------
      Get Prefix
    ----------------------------------------------------------------------------------*/

    #[test]
    fn test_get_prefix() {
        let registry = test_ipv4_registry();

        let prefix_in_range: IpNetwork = "10.0.0.0/16".parse().unwrap();
        assert_eq!(
            registry.get_prefix(&prefix_in_range).unwrap().prefix,
            prefix_in_range
        );

        let prefix_not_registered: IpNetwork = "10.0.0.0/12".parse().unwrap();
        assert_eq!(registry.get_prefix(&prefix_not_registered), None);

        let prefix_not_in_range: IpNetwork = "192.168.0.0/24".parse().unwrap();
        assert_eq!(registry.get_prefix(&prefix_not_in_range), None);
    }

    /*----------------------------------------------------------------------------------
      Longest Match
    ----------------------------------------------------------------------------------*/

    #[test]
    fn test_longest_match() {
        let registry = test_ipv4_registry();

        let cases = [
            ("10.0.0.1", "10.0.0.0/16"),
            ("10.0.0.200", "10.0.0.128/25"),
            ("10.1.255.255", "10.1.0.0/16"),
            ("10.2.0.1", "10.0.0.0/8"),
        ];
        for (address, expected) in cases {
            let matched = registry.longest_match(&ip(address)).unwrap();
            assert_eq!(
                matched.prefix,
                expected.parse::<IpNetwork>().unwrap(),
                "{address}"
            );
        }

        assert_eq!(registry.longest_match(&ip("11.0.0.1")), None);
        assert_eq!(registry.longest_match(&ip("192.168.1.1")), None);
    }

    #[test]
    fn test_longest_match_is_independent_of_insertion_order() {
        let records = vec![
            record("10.0.0.0/8", "aws", "us-east-1"),
            record("10.0.0.0/16", "aws", "us-east-2"),
            record("10.0.0.128/25", "azure", "eastus"),
        ];
        let forward = RangeRegistry::build(records.clone(), AddressFamily::IPv4);
        let reverse = RangeRegistry::build(records.into_iter().rev(), AddressFamily::IPv4);

        for address in ["10.0.0.1", "10.0.0.129", "10.9.9.9"] {
            assert_eq!(
                forward.longest_match(&ip(address)),
                reverse.longest_match(&ip(address)),
                "{address}"
            );
        }
        assert_eq!(
            &*reverse.longest_match(&ip("10.0.0.129")).unwrap().provider,
            "azure"
        );
    }

    #[test]
    fn test_longest_match_default_route_and_host_route() {
        let registry = RangeRegistry::build(
            [
                record("0.0.0.0/0", "everything", ""),
                record("192.0.2.7/32", "host", "lab"),
            ],
            AddressFamily::IPv4,
        );

        assert_eq!(
            &*registry.longest_match(&ip("192.0.2.7")).unwrap().provider,
            "host"
        );
        assert_eq!(
            &*registry.longest_match(&ip("192.0.2.8")).unwrap().provider,
            "everything"
        );
        assert_eq!(
            &*registry.longest_match(&ip("255.255.255.255")).unwrap().provider,
            "everything"
        );
    }

    #[test]
    fn test_longest_match_ipv6() {
        let registry = RangeRegistry::build(
            [
                record("2600:1900::/28", "gcp", ""),
                record("2600:1900:4010::/44", "gcp", "europe-west1"),
                record("2001:db8::1/128", "host", "lab"),
            ],
            AddressFamily::IPv6,
        );

        assert_eq!(
            &*registry.longest_match(&ip("2600:1900:4010::1")).unwrap().region,
            "europe-west1"
        );
        assert_eq!(
            &*registry.longest_match(&ip("2600:1900:4020::1")).unwrap().region,
            ""
        );
        assert_eq!(
            &*registry.longest_match(&ip("2001:db8::1")).unwrap().provider,
            "host"
        );
        assert_eq!(registry.longest_match(&ip("2001:db8::2")), None);
        assert_eq!(registry.longest_match(&ip("10.0.0.1")), None);
    }

    /*----------------------------------------------------------------------------------
      Supernet Records
    ----------------------------------------------------------------------------------*/

    #[test]
    fn test_supernet_records() {
        let registry = test_ipv4_registry();

        let supernets: Vec<IpNetwork> = registry
            .supernet_records(&ip("10.0.0.200"))
            .into_iter()
            .map(|record| record.prefix)
            .collect();
        let expected: Vec<IpNetwork> = ["10.0.0.0/8", "10.0.0.0/16", "10.0.0.128/25"]
            .iter()
            .map(|prefix| prefix.parse().unwrap())
            .collect();
        assert_eq!(supernets, expected);

        assert!(registry.supernet_records(&ip("192.168.0.1")).is_empty());
    }
}

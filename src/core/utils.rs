use std::collections::BTreeSet;
use std::sync::Arc;

/*-------------------------------------------------------------------------------------------------
  Utilities
-------------------------------------------------------------------------------------------------*/

/*--------------------------------------------------------------------------------------
  Work with Shared String Slices
--------------------------------------------------------------------------------------*/

/// Return the shared copy of `value` held in `set`, inserting it when it is not present yet.
/// Provider and region labels repeat across thousands of records; interning them keeps one
/// allocation per distinct label.
pub fn intern(value: &str, set: &mut BTreeSet<Arc<str>>) -> Arc<str> {
    match set.get(value) {
        Some(item) => Arc::clone(item),
        None => {
            let item: Arc<str> = Arc::from(value);
            set.insert(Arc::clone(&item));
            item
        }
    }
}

/*--------------------------------------------------------------------------------------
  IP Network Supplemental Functions
--------------------------------------------------------------------------------------*/

pub mod ipnetwork {
    use ipnetwork::{IpNetwork, Ipv4Network, Ipv6Network};
    use std::net::IpAddr;

    /*
        The IpNetwork type does not reduce (or provide a method to reduce) an
        interface CIDR prefix to network prefix (where all host bits are set to
        `0`). It does provide a network() method that will extract the network IP.
    */

    pub fn network_prefix(ip_network: &IpNetwork) -> IpNetwork {
        // Re-using a prefix length that was already validated cannot fail.
        match ip_network {
            IpNetwork::V4(ipv4_network) => {
                Ipv4Network::new(ipv4_network.network(), ipv4_network.prefix())
                    .map(IpNetwork::V4)
                    .unwrap_or(*ip_network)
            }
            IpNetwork::V6(ipv6_network) => {
                Ipv6Network::new(ipv6_network.network(), ipv6_network.prefix())
                    .map(IpNetwork::V6)
                    .unwrap_or(*ip_network)
            }
        }
    }

    /*
        The trie walks addresses one bit at a time from the most significant
        bit. Both families are widened to a left-aligned u128 so the walk is
        the same loop for 32 and 128 bit addresses.
    */

    pub fn address_bits(ip_addr: &IpAddr) -> u128 {
        match ip_addr {
            IpAddr::V4(ipv4_addr) => (u32::from(*ipv4_addr) as u128) << 96,
            IpAddr::V6(ipv6_addr) => u128::from(*ipv6_addr),
        }
    }

    /// Bit at `depth` (0 is the most significant bit) of a left-aligned address.
    pub fn bit_at(bits: u128, depth: u8) -> usize {
        ((bits >> (127 - depth as u32)) & 1) as usize
    }
}

/*-------------------------------------------------------------------------------------------------
  Unit Tests
-------------------------------------------------------------------------------------------------*/

#[cfg(test)]
mod tests {
    use super::*;
    use ::ipnetwork::IpNetwork;
    use std::net::IpAddr;

    #[test]
    fn test_intern_reuses_existing_allocation() {
        let mut set: BTreeSet<Arc<str>> = BTreeSet::new();
        let first = intern("us-east-1", &mut set);
        let second = intern("us-east-1", &mut set);
        let other = intern("us-west-2", &mut set);

        assert!(Arc::ptr_eq(&first, &second));
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_network_prefix_clears_host_bits() {
        let interface: IpNetwork = "10.1.2.3/8".parse().unwrap();
        assert_eq!(
            ipnetwork::network_prefix(&interface),
            "10.0.0.0/8".parse::<IpNetwork>().unwrap()
        );

        let interface: IpNetwork = "2001:db8::1/32".parse().unwrap();
        assert_eq!(
            ipnetwork::network_prefix(&interface),
            "2001:db8::/32".parse::<IpNetwork>().unwrap()
        );
    }

    #[test]
    fn test_address_bits_are_left_aligned() {
        let ipv4: IpAddr = "128.0.0.1".parse().unwrap();
        let bits = ipnetwork::address_bits(&ipv4);
        assert_eq!(ipnetwork::bit_at(bits, 0), 1);
        assert_eq!(ipnetwork::bit_at(bits, 1), 0);
        assert_eq!(ipnetwork::bit_at(bits, 31), 1);

        let ipv6: IpAddr = "8000::1".parse().unwrap();
        let bits = ipnetwork::address_bits(&ipv6);
        assert_eq!(ipnetwork::bit_at(bits, 0), 1);
        assert_eq!(ipnetwork::bit_at(bits, 127), 1);
        assert_eq!(ipnetwork::bit_at(bits, 64), 0);
    }
}

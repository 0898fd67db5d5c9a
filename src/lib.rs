//! Identify the cloud or CDN provider (and region) that owns an IP address.
//!
//! `cloudranger` classifies IPv4 and IPv6 addresses against the address ranges published by
//! cloud and CDN providers (AWS, GCP, Azure, Oracle Cloud, Linode, and Cloudflare). Lookups
//! are answered from an in-memory longest-prefix-match trie; no network calls are made at
//! query time.
//!
//! ```
//! // Look up an address in the dataset embedded in the crate
//! let (result, found) = cloudranger::get_ip("34.35.1.2");
//! assert!(found);
//! assert_eq!(result.provider(), "gcp");
//! assert_eq!(result.region(), "africa-south1");
//!
//! // Build (once) and reuse a Ranger for repeated lookups
//! let ranger = cloudranger::Ranger::new();
//! let (result, found) = ranger.get_ip("104.21.40.8");
//! assert!(found);
//! assert_eq!(result.provider(), "cloudflare");
//! assert_eq!(result.region(), ""); // Cloudflare publishes no regions
//! ```
//!
//! A [Ranger] can also be built from your own [RangeRecord]s, from a dataset file in the
//! normalized `cidr,provider,region` CSV format ([Ranger::from_file]), or from freshly
//! retrieved provider feeds ([get_records], [Client]).

/*-------------------------------------------------------------------------------------------------
  Modules
-------------------------------------------------------------------------------------------------*/

mod core;

/*-------------------------------------------------------------------------------------------------
  Library Interface
-------------------------------------------------------------------------------------------------*/

pub use crate::core::address_family::AddressFamily;
pub use crate::core::client::{get_records, Client, ClientBuilder};
pub use crate::core::dataset::{read_csv, write_csv};
pub use crate::core::errors::{Error, Result};
pub use crate::core::feeds::{Feed, Provider};
pub use crate::core::lookup_result::LookupResult;
pub use crate::core::range_record::RangeRecord;
pub use crate::core::ranger::{default_ranger, get_ip, Ranger};
pub use crate::core::registry::RangeRegistry;

// Re-export the IP network types used in the public interface
pub use ipnetwork;

/// Parse a provider feed document into a [Feed].
pub use crate::core::feeds::parse as parse_feed;

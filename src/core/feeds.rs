use crate::core::errors::Result;
use crate::core::range_record::RangeRecord;
use crate::core::utils;
use chrono::{DateTime, NaiveDateTime, Utc};
use ipnetwork::{IpNetwork, Ipv4Network, Ipv6Network};
use log::{debug, warn};
use serde::Deserialize;
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/*-------------------------------------------------------------------------------------------------
  Provider
-------------------------------------------------------------------------------------------------*/

/// Cloud and CDN providers that publish their address ranges.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Provider {
    Aws,
    Azure,
    Cloudflare,
    Gcp,
    Linode,
    Oracle,
}

impl Provider {
    pub const ALL: [Provider; 6] = [
        Provider::Aws,
        Provider::Azure,
        Provider::Cloudflare,
        Provider::Gcp,
        Provider::Linode,
        Provider::Oracle,
    ];

    /// Short identifier used as the provider of the parsed [RangeRecord]s.
    pub fn code(&self) -> &'static str {
        match self {
            Provider::Aws => "aws",
            Provider::Azure => "azure",
            Provider::Cloudflare => "cloudflare",
            Provider::Gcp => "gcp",
            Provider::Linode => "linode",
            Provider::Oracle => "oracle",
        }
    }

    /// Published location of the provider's range feed. Azure publishes its Service Tags
    /// under a URL that changes with every release, so it has no default.
    pub fn default_url(&self) -> Option<&'static str> {
        match self {
            Provider::Aws => Some("https://ip-ranges.amazonaws.com/ip-ranges.json"),
            Provider::Azure => None,
            Provider::Cloudflare => Some("https://api.cloudflare.com/client/v4/ips"),
            Provider::Gcp => Some("https://www.gstatic.com/ipranges/cloud.json"),
            Provider::Linode => Some("https://geoip.linode.com/"),
            Provider::Oracle => {
                Some("https://docs.oracle.com/en-us/iaas/tools/public_ip_ranges.json")
            }
        }
    }

    /// File name used to cache the provider's feed.
    pub fn cache_file_name(&self) -> String {
        match self {
            Provider::Linode => format!("{}.csv", self.code()),
            _ => format!("{}.json", self.code()),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        let value = value.trim().to_lowercase();
        Provider::ALL
            .into_iter()
            .find(|provider| provider.code() == value)
            .ok_or_else(|| format!("Unknown provider: {}", value))
    }
}

/*-------------------------------------------------------------------------------------------------
  Feed
-------------------------------------------------------------------------------------------------*/

/// Normalized contents of one provider feed.
#[derive(Clone, Debug)]
pub struct Feed {
    pub provider: Provider,

    /// Publication time reported by the feed, when it reports one.
    pub published: Option<DateTime<Utc>>,

    /// Range records in feed order; repeated prefixes keep their first occurrence.
    pub records: Vec<RangeRecord>,
}

/// Parse the text of a provider feed into a [Feed]. Fails on malformed documents and on any
/// malformed prefix.
pub fn parse(provider: Provider, text: &str) -> Result<Feed> {
    let feed = match provider {
        Provider::Aws => parse_aws(text),
        Provider::Azure => parse_azure(text),
        Provider::Cloudflare => parse_cloudflare(text),
        Provider::Gcp => parse_gcp(text),
        Provider::Linode => parse_linode(text),
        Provider::Oracle => parse_oracle(text),
    }
    .map_err(|error| format!("Invalid {} feed: {}", provider, error))?;

    debug!(
        "Parsed {} feed: {} records, published {:?}",
        provider,
        feed.records.len(),
        feed.published
    );

    Ok(feed)
}

/*--------------------------------------------------------------------------------------
  Feed Builder
--------------------------------------------------------------------------------------*/

struct FeedBuilder {
    provider: Provider,
    provider_code: Arc<str>,
    published: Option<DateTime<Utc>>,
    regions: BTreeSet<Arc<str>>,
    seen: HashSet<IpNetwork>,
    records: Vec<RangeRecord>,
}

impl FeedBuilder {
    fn new(provider: Provider) -> Self {
        Self {
            provider,
            provider_code: Arc::from(provider.code()),
            published: None,
            regions: BTreeSet::new(),
            seen: HashSet::new(),
            records: Vec::new(),
        }
    }

    fn published(mut self, published: Option<DateTime<Utc>>) -> Self {
        self.published = published;
        self
    }

    fn push(&mut self, prefix: IpNetwork, region: &str) {
        let prefix = utils::ipnetwork::network_prefix(&prefix);

        // Feeds list a prefix once per service using it
        if !self.seen.insert(prefix) {
            return;
        }

        let region = utils::intern(region.trim(), &mut self.regions);
        self.records.push(RangeRecord {
            prefix,
            provider: Arc::clone(&self.provider_code),
            region,
        });
    }

    fn build(self) -> Feed {
        Feed {
            provider: self.provider,
            published: self.published,
            records: self.records,
        }
    }
}

/*--------------------------------------------------------------------------------------
  Publication Timestamps
--------------------------------------------------------------------------------------*/

const AWS_DATETIME_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";
const ISO_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

fn parse_published(value: &str, format: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, format)
        .map(|naive_date_time| naive_date_time.and_utc())
        .inspect_err(|error| warn!("Unrecognized feed timestamp {:?}: {}", value, error))
        .ok()
}

/*--------------------------------------------------------------------------------------
  AWS (ip-ranges.json)
--------------------------------------------------------------------------------------*/

#[derive(Debug, Deserialize)]
struct AwsIpRanges {
    #[serde(rename = "createDate")]
    create_date: String,
    prefixes: Vec<AwsIpv4Prefix>,
    ipv6_prefixes: Vec<AwsIpv6Prefix>,
}

#[derive(Debug, Deserialize)]
struct AwsIpv4Prefix {
    ip_prefix: Ipv4Network,
    region: String,
}

#[derive(Debug, Deserialize)]
struct AwsIpv6Prefix {
    ipv6_prefix: Ipv6Network,
    region: String,
}

fn parse_aws(text: &str) -> Result<Feed> {
    let json: AwsIpRanges = serde_json::from_str(text)?;

    let mut builder = FeedBuilder::new(Provider::Aws)
        .published(parse_published(&json.create_date, AWS_DATETIME_FORMAT));

    for prefix in &json.prefixes {
        builder.push(IpNetwork::V4(prefix.ip_prefix), &prefix.region);
    }
    for prefix in &json.ipv6_prefixes {
        builder.push(IpNetwork::V6(prefix.ipv6_prefix), &prefix.region);
    }

    Ok(builder.build())
}

/*--------------------------------------------------------------------------------------
  GCP (cloud.json)
--------------------------------------------------------------------------------------*/

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GcpIpRanges {
    creation_time: String,
    prefixes: Vec<GcpPrefix>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GcpPrefix {
    ipv4_prefix: Option<Ipv4Network>,
    ipv6_prefix: Option<Ipv6Network>,
    #[serde(default)]
    scope: String,
}

fn parse_gcp(text: &str) -> Result<Feed> {
    let json: GcpIpRanges = serde_json::from_str(text)?;

    let mut builder = FeedBuilder::new(Provider::Gcp)
        .published(parse_published(&json.creation_time, ISO_DATETIME_FORMAT));

    for prefix in &json.prefixes {
        match (prefix.ipv4_prefix, prefix.ipv6_prefix) {
            (Some(ipv4_prefix), _) => builder.push(IpNetwork::V4(ipv4_prefix), &prefix.scope),
            (None, Some(ipv6_prefix)) => builder.push(IpNetwork::V6(ipv6_prefix), &prefix.scope),
            (None, None) => {
                return Err(format!("Prefix entry without a prefix: {:?}", prefix).into())
            }
        }
    }

    Ok(builder.build())
}

/*--------------------------------------------------------------------------------------
  Azure (Service Tags)
--------------------------------------------------------------------------------------*/

const AZURE_CLOUD_TAG: &str = "AzureCloud.";

#[derive(Debug, Deserialize)]
struct AzureServiceTags {
    values: Vec<AzureServiceTag>,
}

#[derive(Debug, Deserialize)]
struct AzureServiceTag {
    name: String,
    properties: AzureServiceTagProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AzureServiceTagProperties {
    #[serde(default)]
    region: String,
    address_prefixes: Vec<IpNetwork>,
}

fn parse_azure(text: &str) -> Result<Feed> {
    let json: AzureServiceTags = serde_json::from_str(text)?;

    let mut builder = FeedBuilder::new(Provider::Azure);

    // Regional `AzureCloud.<region>` tags cover every service's regional ranges
    for tag in &json.values {
        if !tag.name.starts_with(AZURE_CLOUD_TAG) || tag.properties.region.is_empty() {
            continue;
        }
        for prefix in &tag.properties.address_prefixes {
            builder.push(*prefix, &tag.properties.region);
        }
    }

    Ok(builder.build())
}

/*--------------------------------------------------------------------------------------
  Oracle (public_ip_ranges.json)
--------------------------------------------------------------------------------------*/

#[derive(Debug, Deserialize)]
struct OracleIpRanges {
    last_updated_timestamp: String,
    regions: Vec<OracleRegion>,
}

#[derive(Debug, Deserialize)]
struct OracleRegion {
    region: String,
    cidrs: Vec<OracleCidr>,
}

#[derive(Debug, Deserialize)]
struct OracleCidr {
    cidr: IpNetwork,
}

fn parse_oracle(text: &str) -> Result<Feed> {
    let json: OracleIpRanges = serde_json::from_str(text)?;

    let mut builder = FeedBuilder::new(Provider::Oracle).published(parse_published(
        &json.last_updated_timestamp,
        ISO_DATETIME_FORMAT,
    ));

    for region in &json.regions {
        for cidr in &region.cidrs {
            builder.push(cidr.cidr, &region.region);
        }
    }

    Ok(builder.build())
}

/*--------------------------------------------------------------------------------------
  Cloudflare (API /client/v4/ips)
--------------------------------------------------------------------------------------*/

#[derive(Debug, Deserialize)]
struct CloudflareResponse {
    success: bool,
    result: Option<CloudflareIps>,
}

#[derive(Debug, Deserialize)]
struct CloudflareIps {
    ipv4_cidrs: Vec<Ipv4Network>,
    ipv6_cidrs: Vec<Ipv6Network>,
}

fn parse_cloudflare(text: &str) -> Result<Feed> {
    let json: CloudflareResponse = serde_json::from_str(text)?;

    let ips = match (json.success, json.result) {
        (true, Some(ips)) => ips,
        _ => return Err("Cloudflare API response reports failure".into()),
    };

    // Cloudflare publishes no region granularity
    let mut builder = FeedBuilder::new(Provider::Cloudflare);
    for cidr in ips.ipv4_cidrs {
        builder.push(IpNetwork::V4(cidr), "");
    }
    for cidr in ips.ipv6_cidrs {
        builder.push(IpNetwork::V6(cidr), "");
    }

    Ok(builder.build())
}

/*--------------------------------------------------------------------------------------
  Linode (RFC 8805 geofeed)
--------------------------------------------------------------------------------------*/

/*
    Geofeed rows are `prefix,country,region,city,postal_code`; trailing
    columns may be omitted and `#` starts a comment line.
*/

fn parse_linode(text: &str) -> Result<Feed> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let mut builder = FeedBuilder::new(Provider::Linode);
    for row in csv_reader.records() {
        let row = row?;
        let prefix = match row.get(0) {
            Some(prefix) if !prefix.is_empty() => prefix,
            _ => continue,
        };
        let prefix: IpNetwork = prefix
            .parse()
            .map_err(|error| format!("Invalid geofeed prefix {:?}: {}", prefix, error))?;
        builder.push(prefix, row.get(2).unwrap_or_default());
    }

    Ok(builder.build())
}

/*-------------------------------------------------------------------------------------------------
  Unit Tests
-------------------------------------------------------------------------------------------------*/

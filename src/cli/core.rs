use crate::cli::{self, Command, OutputFormat};
use chrono::{DateTime, Utc};
use cloudranger::{Client, Provider, RangeRecord, Ranger, Result};
use ipnetwork::IpNetwork;
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::net::IpAddr;
use std::path::Path;

/*-------------------------------------------------------------------------------------------------
  Core functions
-------------------------------------------------------------------------------------------------*/

/*--------------------------------------------------------------------------------------
  Run the selected command
--------------------------------------------------------------------------------------*/

pub fn run(args: &cli::Args) -> Result<()> {
    match &args.command {
        Command::Lookup {
            data,
            output,
            all,
            addresses,
        } => lookup(data.as_deref(), *output, *all, addresses),
        Command::Providers { data } => providers(data.as_deref()),
        Command::Fetch { providers, output } => fetch(providers, output.as_deref()),
    }
}

/*--------------------------------------------------------------------------------------
  Load the range dataset
--------------------------------------------------------------------------------------*/

pub fn load_ranger(data: Option<&Path>) -> Result<Ranger> {
    match data {
        Some(path) => Ranger::from_file(path),
        None => Ok(Ranger::new()),
    }
}

/*--------------------------------------------------------------------------------------
  Lookup
--------------------------------------------------------------------------------------*/

/// One line of lookup output.
#[derive(Debug, Serialize)]
pub struct LookupRow<'a> {
    pub address: &'a str,
    pub found: bool,
    pub provider: String,
    pub region: String,
    pub prefix: Option<IpNetwork>,
}

impl<'a> LookupRow<'a> {
    fn not_found(address: &'a str) -> Self {
        Self {
            address,
            found: false,
            provider: String::new(),
            region: String::new(),
            prefix: None,
        }
    }
}

/// Build the output rows for the looked-up addresses. With `all`, every range containing an
/// address gets a row (least specific first); otherwise only the most specific range.
pub fn lookup_rows<'a>(ranger: &Ranger, addresses: &'a [String], all: bool) -> Vec<LookupRow<'a>> {
    let mut rows = Vec::new();

    for address in addresses {
        if all {
            let supernets = match address.parse::<IpAddr>() {
                Ok(ip_addr) => ranger.get_supernet_records(ip_addr),
                Err(_) => Vec::new(),
            };
            if supernets.is_empty() {
                rows.push(LookupRow::not_found(address));
            }
            rows.extend(supernets.into_iter().map(|record| LookupRow {
                address,
                found: true,
                provider: record.provider.to_string(),
                region: record.region.to_string(),
                prefix: Some(record.prefix),
            }));
        } else {
            let (result, found) = ranger.get_ip(address);
            rows.push(LookupRow {
                address,
                found,
                provider: result.provider().to_string(),
                region: result.region().to_string(),
                prefix: result.prefix().copied(),
            });
        }
    }

    rows
}

fn lookup(
    data: Option<&Path>,
    output: OutputFormat,
    all: bool,
    addresses: &[String],
) -> Result<()> {
    let ranger = load_ranger(data)?;
    let rows = lookup_rows(&ranger, addresses, all);

    cli::log::lookup_results(&rows);

    match output {
        OutputFormat::Table => cli::output::lookup_table(&rows),
        OutputFormat::Json => cli::output::lookup_json(&rows)?,
        OutputFormat::Csv => cli::csv::lookup_results(&rows, io::stdout().lock())?,
    }

    Ok(())
}

/*--------------------------------------------------------------------------------------
  Providers
--------------------------------------------------------------------------------------*/

fn providers(data: Option<&Path>) -> Result<()> {
    let ranger = load_ranger(data)?;
    cli::output::provider_table(&ranger);
    Ok(())
}

/*--------------------------------------------------------------------------------------
  Fetch
--------------------------------------------------------------------------------------*/

fn fetch(providers: &[Provider], output: Option<&Path>) -> Result<()> {
    let providers: Vec<Provider> = if providers.is_empty() {
        Provider::ALL.to_vec()
    } else {
        providers.to_vec()
    };

    let records = Client::new().get_records(&providers)?;
    cli::log::fetch_results(&providers, &records);

    let fetched = Utc::now();
    match output {
        Some(path) => {
            let file = File::create(path).map_err(|error| {
                format!("Failed to create dataset `{}`: {}", path.display(), error)
            })?;
            write_dataset(&providers, &records, fetched, BufWriter::new(file))
        }
        None => write_dataset(&providers, &records, fetched, io::stdout().lock()),
    }
}

/// Write fetched records as a dataset file, prefixed with `#` provenance comments.
fn write_dataset<W: Write>(
    providers: &[Provider],
    records: &[RangeRecord],
    fetched: DateTime<Utc>,
    mut writer: W,
) -> Result<()> {
    let counts: Vec<String> = providers
        .iter()
        .map(|provider| {
            let count = records
                .iter()
                .filter(|record| &*record.provider == provider.code())
                .count();
            format!("{provider} {count}")
        })
        .collect();

    writeln!(writer, "# cloudranger range dataset fetched {}", fetched.to_rfc3339())?;
    writeln!(writer, "# Records per provider: {}", counts.join(", "))?;

    cloudranger::write_csv(records, writer)
}

/*-------------------------------------------------------------------------------------------------
  Unit Tests
-------------------------------------------------------------------------------------------------*/

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn test_ranger() -> Ranger {
        Ranger::from_records([
            RangeRecord::new("10.0.0.0/8".parse().unwrap(), "aws", "us-east-1"),
            RangeRecord::new("10.1.0.0/16".parse().unwrap(), "gcp", "us-west1"),
        ])
    }

    #[test]
    fn test_lookup_rows_most_specific() {
        let ranger = test_ranger();
        let addresses = vec!["10.1.2.3".to_string(), "not-an-ip".to_string()];
        let rows = lookup_rows(&ranger, &addresses, false);

        assert_eq!(rows.len(), 2);
        assert!(rows[0].found);
        assert_eq!(rows[0].provider, "gcp");
        assert_eq!(rows[0].prefix, Some("10.1.0.0/16".parse().unwrap()));
        assert!(!rows[1].found);
        assert_eq!(rows[1].provider, "");
    }

    #[test]
    fn test_lookup_rows_all_supernets() {
        let ranger = test_ranger();
        let addresses = vec!["10.1.2.3".to_string(), "192.168.1.1".to_string()];
        let rows = lookup_rows(&ranger, &addresses, true);

        let providers: Vec<&str> = rows.iter().map(|row| row.provider.as_str()).collect();
        assert_eq!(providers, vec!["aws", "gcp", ""]);
        assert_eq!(rows[2].address, "192.168.1.1");
        assert!(!rows[2].found);
    }

    #[test]
    fn test_write_dataset_reads_back() {
        let records = vec![
            RangeRecord::new("3.5.140.0/22".parse().unwrap(), "aws", "ap-northeast-2"),
            RangeRecord::new("2405:b500::/32".parse().unwrap(), "cloudflare", ""),
        ];
        let fetched = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();

        let mut buffer: Vec<u8> = Vec::new();
        write_dataset(
            &[Provider::Aws, Provider::Cloudflare],
            &records,
            fetched,
            &mut buffer,
        )
        .unwrap();

        let written = String::from_utf8(buffer.clone()).unwrap();
        assert!(written.starts_with(
            "# cloudranger range dataset fetched 2026-10-19T12:00:00+00:00\n\
             # Records per provider: aws 1, cloudflare 1\n\
             cidr,provider,region\n"
        ));

        let ranger = Ranger::from_csv(buffer.as_slice()).unwrap();
        assert_eq!(ranger.len(), 2);
        assert_eq!(ranger.get_ip("3.5.140.101").0.region(), "ap-northeast-2");
    }
}

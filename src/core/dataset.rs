use crate::core::errors::Result;
use crate::core::range_record::RangeRecord;
use crate::core::utils;
use ipnetwork::IpNetwork;
use log::debug;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::io;
use std::sync::Arc;

/*-------------------------------------------------------------------------------------------------
  Range Dataset
-------------------------------------------------------------------------------------------------*/

/*
    The normalized dataset is a CSV file with a `cidr,provider,region` header.
    Lines starting with `#` are comments and the region column may be empty.

        cidr,provider,region
        3.5.140.0/22,aws,ap-northeast-2
        104.16.0.0/13,cloudflare,
*/

/// Curated dataset compiled into the crate and used by [Ranger::new](crate::Ranger::new).
pub(crate) const EMBEDDED_DATASET: &str = include_str!("../../data/ranges.csv");

const CSV_HEADER: [&str; 3] = ["cidr", "provider", "region"];

#[derive(Debug, Deserialize)]
struct CsvRangeRecord {
    cidr: IpNetwork,
    provider: String,
    region: String,
}

/*--------------------------------------------------------------------------------------
  Read Range Records
--------------------------------------------------------------------------------------*/

/// Parse [RangeRecord]s from the normalized CSV dataset format. Fails on the first malformed
/// row; a dataset is either loaded completely or not at all.
pub fn read_csv<R: io::Read>(reader: R) -> Result<Vec<RangeRecord>> {
    let mut providers: BTreeSet<Arc<str>> = BTreeSet::new();
    let mut regions: BTreeSet<Arc<str>> = BTreeSet::new();

    let mut csv_reader = csv::ReaderBuilder::new()
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut records = Vec::new();
    for row in csv_reader.deserialize::<CsvRangeRecord>() {
        let row = row.map_err(|error| format!("Invalid range record: {}", error))?;

        if row.provider.is_empty() {
            return Err(format!("Range record {} has no provider", row.cidr).into());
        }

        records.push(RangeRecord {
            prefix: row.cidr,
            provider: utils::intern(&row.provider, &mut providers),
            region: utils::intern(&row.region, &mut regions),
        });
    }

    debug!(
        "Read {} range records ({} providers, {} regions)",
        records.len(),
        providers.len(),
        regions.len()
    );

    Ok(records)
}

/// Parse the dataset compiled into the crate.
pub(crate) fn embedded_records() -> Result<Vec<RangeRecord>> {
    read_csv(EMBEDDED_DATASET.as_bytes())
}

/*--------------------------------------------------------------------------------------
  Write Range Records
--------------------------------------------------------------------------------------*/

/// Write [RangeRecord]s in the normalized CSV dataset format.
pub fn write_csv<'r, I, W>(records: I, writer: W) -> Result<()>
where
    I: IntoIterator<Item = &'r RangeRecord>,
    W: io::Write,
{
    let mut writer = csv::Writer::from_writer(writer);

    writer.write_record(CSV_HEADER)?;
    for record in records {
        writer.serialize((record.prefix, &*record.provider, &*record.region))?;
    }

    writer.flush()?;

    Ok(())
}

/*-------------------------------------------------------------------------------------------------
  Unit Tests
-------------------------------------------------------------------------------------------------*/

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::log_error;
    use crate::core::range_record::tests::record;
    use test_log::test;

    #[test]
    fn test_read_csv() {
        let csv = "\
# provider ranges
cidr,provider,region
3.5.140.0/22,aws,ap-northeast-2
# cloudflare publishes no regions
104.16.0.0/13,cloudflare,
2a01:7e03::/32, linode ,US-CA
";
        let records = read_csv(csv.as_bytes()).unwrap();

        assert_eq!(
            records,
            vec![
                record("3.5.140.0/22", "aws", "ap-northeast-2"),
                record("104.16.0.0/13", "cloudflare", ""),
                record("2a01:7e03::/32", "linode", "US-CA"),
            ]
        );
    }

    #[test]
    fn test_read_csv_interns_labels() {
        let csv = "\
cidr,provider,region
3.5.140.0/22,aws,ap-northeast-2
3.5.144.0/22,aws,ap-northeast-2
";
        let records = read_csv(csv.as_bytes()).unwrap();
        assert!(Arc::ptr_eq(&records[0].provider, &records[1].provider));
        assert!(Arc::ptr_eq(&records[0].region, &records[1].region));
    }

    #[test]
    fn test_read_csv_empty_dataset() {
        let records = read_csv("cidr,provider,region\n".as_bytes()).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_read_csv_rejects_malformed_rows() {
        let malformed = [
            "cidr,provider,region\nnot-a-cidr,aws,us-east-1\n",
            "cidr,provider,region\n10.0.0.0/33,aws,us-east-1\n",
            "cidr,provider,region\n2001:db8::/129,aws,us-east-1\n",
            "cidr,provider,region\n10.0.0.0/8,,us-east-1\n",
            "cidr,provider,region\n10.0.0.0/8,aws\n",
        ];

        for csv in malformed {
            let result = read_csv(csv.as_bytes()).inspect_err(log_error);
            assert!(result.is_err(), "{csv:?}");
        }
    }

    #[test]
    fn test_embedded_dataset_is_well_formed() {
        let records = embedded_records().inspect_err(log_error).unwrap();
        assert!(!records.is_empty());
        assert!(records.iter().any(|record| record.family().is_ipv4()));
        assert!(records.iter().any(|record| record.family().is_ipv6()));
    }

    #[test]
    fn test_write_csv_output_reads_back() {
        let records = vec![
            record("3.5.140.0/22", "aws", "ap-northeast-2"),
            record("2405:b500::/32", "cloudflare", ""),
        ];

        let mut buffer: Vec<u8> = Vec::new();
        write_csv(&records, &mut buffer).unwrap();

        let written = String::from_utf8(buffer.clone()).unwrap();
        assert!(written.starts_with("cidr,provider,region\n"));
        assert!(written.contains("2405:b500::/32,cloudflare,\n"));

        assert_eq!(read_csv(buffer.as_slice()).unwrap(), records);
    }
}

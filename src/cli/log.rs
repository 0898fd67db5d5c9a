use crate::cli::LookupRow;
use cloudranger::{Provider, RangeRecord};
use log::{info, warn};
use std::collections::BTreeSet;

/*-------------------------------------------------------------------------------------------------
  Logging Functions
-------------------------------------------------------------------------------------------------*/

/*--------------------------------------------------------------------------------------
  Lookup Results
--------------------------------------------------------------------------------------*/

pub fn lookup_results(rows: &[LookupRow]) {
    let addresses: BTreeSet<&str> = rows.iter().map(|row| row.address).collect();
    let found: BTreeSet<&str> = rows
        .iter()
        .filter(|row| row.found)
        .map(|row| row.address)
        .collect();

    info!("Looked up {} address(es)", addresses.len());

    if !found.is_empty() {
        info!("Found {} address(es) in provider ranges", found.len());
    };

    let count_not_found = addresses.len() - found.len();
    if count_not_found > 0 {
        warn!("Did not find {count_not_found} address(es) in provider ranges");
    };
}

/*--------------------------------------------------------------------------------------
  Fetch Results
--------------------------------------------------------------------------------------*/

pub fn fetch_results(providers: &[Provider], records: &[RangeRecord]) {
    for provider in providers {
        let count = records
            .iter()
            .filter(|record| &*record.provider == provider.code())
            .count();
        info!("Fetched {count} {provider} range(s)");
    }

    info!("Fetched {} range(s) in total", records.len());
}

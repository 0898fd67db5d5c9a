use crate::cli::LookupRow;
use cloudranger::Result;
use std::io;

/*-------------------------------------------------------------------------------------------------
  Write Lookup Results as CSV
-------------------------------------------------------------------------------------------------*/

pub fn lookup_results<W: io::Write>(rows: &[LookupRow], writer: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);

    // The header row is derived from the LookupRow field names
    for row in rows {
        writer.serialize(row)?;
    }

    writer.flush()?;

    Ok(())
}

/*-------------------------------------------------------------------------------------------------
  Unit Tests
-------------------------------------------------------------------------------------------------*/

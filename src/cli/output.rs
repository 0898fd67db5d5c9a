use crate::cli::LookupRow;
use cloudranger::{Ranger, Result};
use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::{NOTHING, UTF8_FULL};
use comfy_table::*;

/*-------------------------------------------------------------------------------------------------
  Output Functions
-------------------------------------------------------------------------------------------------*/

fn header_cell(title: &str) -> Cell {
    Cell::new(title)
        .add_attribute(Attribute::Bold)
        .fg(Color::Green)
}

/*--------------------------------------------------------------------------------------
  Lookup Table
--------------------------------------------------------------------------------------*/

pub fn lookup_table(rows: &[LookupRow]) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        header_cell("Address"),
        header_cell("Provider"),
        header_cell("Region"),
        header_cell("Prefix"),
    ]);

    for row in rows {
        if row.found {
            table.add_row(vec![
                Cell::new(row.address).add_attribute(Attribute::Bold),
                Cell::new(&row.provider),
                Cell::new(&row.region),
                Cell::new(row.prefix.map(|prefix| prefix.to_string()).unwrap_or_default()),
            ]);
        } else {
            table.add_row(vec![
                Cell::new(row.address).add_attribute(Attribute::Bold),
                Cell::new("not found").fg(Color::DarkGrey),
                Cell::new(""),
                Cell::new(""),
            ]);
        }
    }

    // Right-align the Address column
    if let Some(column) = table.column_mut(0) {
        column.set_cell_alignment(CellAlignment::Right);
    }

    println!("{table}");
}

/*--------------------------------------------------------------------------------------
  Lookup JSON
--------------------------------------------------------------------------------------*/

pub fn lookup_json(rows: &[LookupRow]) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(rows)?);
    Ok(())
}

/*--------------------------------------------------------------------------------------
  Provider Table
--------------------------------------------------------------------------------------*/

pub fn provider_table(ranger: &Ranger) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        header_cell("Provider"),
        header_cell("Regions"),
        header_cell("IPv4 Ranges"),
        header_cell("IPv6 Ranges"),
    ]);

    for provider in ranger.providers() {
        let count = |records: &[cloudranger::RangeRecord]| {
            records
                .iter()
                .filter(|record| record.provider == provider)
                .count()
        };
        let region_count = ranger
            .regions(&provider)
            .iter()
            .filter(|region| !region.is_empty())
            .count();

        table.add_row(vec![
            Cell::new(&provider).add_attribute(Attribute::Bold),
            Cell::new(region_count),
            Cell::new(count(ranger.ipv4().records())),
            Cell::new(count(ranger.ipv6().records())),
        ]);
    }

    for index in 1..4 {
        if let Some(column) = table.column_mut(index) {
            column.set_cell_alignment(CellAlignment::Right);
        }
    }

    println!("{table}");

    // Print provider-table summary
    let mut summary_table = Table::new();
    summary_table
        .load_preset(NOTHING)
        .set_content_arrangement(ContentArrangement::Dynamic);

    summary_table.add_row(vec![Cell::new(ranger.len()), Cell::new("Ranges")]);
    summary_table.add_row(vec![
        Cell::new(ranger.providers().len()),
        Cell::new("Providers"),
    ]);

    if let Some(column) = summary_table.column_mut(0) {
        column.set_cell_alignment(CellAlignment::Right);
    }

    println!("{summary_table}");
}

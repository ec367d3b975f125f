// src/data_input/csv_reader.rs

use csv::ReaderBuilder;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::data_input::raw_table::{RawHeader, RawTable};
use crate::data_input::schema::normalize_column_name;
use crate::error::AnalysisResult;

/// Returns true for the line that starts the data table: it names the time
/// column and at least one PID or gyro column.
fn is_table_header(line: &str) -> bool {
    line.contains("time") && (line.contains("axisP") || line.contains("gyroADC"))
}

/// Parses one `"key","value"` metadata line.
fn parse_metadata_line(line: &str) -> Option<(String, String)> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes());
    let record = rdr.records().next()?.ok()?;
    if record.len() < 2 {
        return None;
    }
    let key = record.get(0)?.trim().trim_matches('"').to_string();
    let value = record.get(1)?.trim().trim_matches('"').to_string();
    if key.is_empty() {
        None
    } else {
        Some((key, value))
    }
}

/// Reads the decoder's CSV output from any reader.
///
/// Lines before the table header are treated as header parameters. Each data
/// row becomes one `RawTable` row; unparseable cells are `None` and rows
/// without a time value are skipped.
pub fn read_decoded_csv<R: Read>(reader: R) -> AnalysisResult<(RawTable, RawHeader)> {
    let mut header = RawHeader::default();
    let mut csv_lines: Vec<String> = Vec::new();
    let mut found_csv_headers = false;

    for line_result in BufReader::new(reader).lines() {
        let line = line_result?;
        let trimmed_line = line.trim();
        if trimmed_line.is_empty() {
            continue;
        }

        if found_csv_headers {
            csv_lines.push(line);
        } else if is_table_header(trimmed_line) {
            found_csv_headers = true;
            csv_lines.push(line);
        } else if let Some((key, value)) = parse_metadata_line(trimmed_line) {
            header.push(key, value);
        }
    }

    if !found_csv_headers {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "could not find CSV headers in decoded log").into());
    }
    info!(entries = header.entries.len(), "Extracted header parameters");
    for (key, value) in header.entries.iter().take(5) {
        debug!(key = key.as_str(), value = value.as_str(), "Header parameter");
    }

    let csv_content = csv_lines.join("\n");
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(csv_content.as_bytes());

    let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let time_idx = columns.iter().position(|c| normalize_column_name(c) == "time");
    debug!(columns = columns.len(), ?time_idx, "Read table header");

    let mut table = RawTable::new(columns);
    let mut skipped = 0usize;
    for (row_index, result) in reader.records().enumerate() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                warn!(row = row_index + 1, error = %e, "Skipping row due to CSV read error");
                skipped += 1;
                continue;
            }
        };
        let row: Vec<Option<f64>> = record.iter().map(|cell| cell.parse::<f64>().ok()).collect();

        if let Some(idx) = time_idx {
            if row.get(idx).copied().flatten().is_none() {
                skipped += 1;
                continue;
            }
        }
        table.push_row(row);
    }

    if skipped > 0 {
        warn!(rows = skipped, "Skipped rows with missing time or malformed records");
    }
    info!(rows = table.row_count(), "Finished reading data rows");
    Ok((table, header))
}

/// Opens and reads a decoded CSV file.
pub fn read_decoded_csv_file(path: &Path) -> AnalysisResult<(RawTable, RawHeader)> {
    let file = File::open(path)?;
    read_decoded_csv(file)
}

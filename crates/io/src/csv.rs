// CSV loading for bit-toggle measurement files

use std::io::Read;
use std::path::Path;

use togglesheet_engine::{PipelineConfig, RawRow, Table};

/// Read, split and classify one measurement file.
///
/// Totals problems are reported here, with the file path, and never fail the load.
pub fn load(path: &Path, config: &PipelineConfig) -> Result<Table, String> {
    let content = read_file_as_utf8(path)?;
    let raw = parse_rows(&content, config.table.delimiter as u8)
        .map_err(|e| format!("{}: {}", path.display(), e))?;

    let table = Table::from_raw_rows(raw, &config.totals);

    if let Some(warning) = &table.totals.warning {
        log::warn!(
            "{} in {}. Defaulting total bits to 1.",
            warning,
            path.display()
        );
    }

    Ok(table)
}

/// Split content into rows, one per CSV record.
///
/// Each record is parsed on its own so that completely empty lines survive
/// as zero-cell rows and keep their index (the csv reader would skip them).
pub fn parse_rows(content: &str, delimiter: u8) -> Result<Vec<RawRow>, String> {
    let mut rows = Vec::new();

    for (record_idx, line) in record_lines(content, delimiter).into_iter().enumerate() {
        if line.is_empty() {
            rows.push(Vec::new());
            continue;
        }

        let record = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(false)
            .flexible(true)
            .from_reader(line.as_bytes())
            .records()
            .next()
            .transpose()
            .map_err(|e| format!("record {}: {}", record_idx + 1, e))?;

        let cells = match record {
            Some(record) => record.iter().map(str::to_string).collect(),
            None => Vec::new(),
        };
        rows.push(cells);
    }

    Ok(rows)
}

/// Cut content at line breaks that lie outside quoted fields.
///
/// A quote opens a quoted field only at the start of a field, as in the csv
/// reader; elsewhere it is literal. The `\r` of a CRLF break is dropped.
fn record_lines(content: &str, delimiter: u8) -> Vec<&str> {
    let bytes = content.as_bytes();
    let mut lines = Vec::new();
    let mut start = 0;
    let mut field_start = true;
    let mut in_quotes = false;
    let mut idx = 0;

    while idx < bytes.len() {
        let byte = bytes[idx];
        if in_quotes {
            if byte == b'"' {
                if bytes.get(idx + 1) == Some(&b'"') {
                    idx += 1;
                } else {
                    in_quotes = false;
                }
            }
        } else if byte == b'\n' {
            lines.push(strip_cr(&content[start..idx]));
            start = idx + 1;
            field_start = true;
            idx += 1;
            continue;
        } else if byte == b'"' && field_start {
            in_quotes = true;
        }
        field_start = !in_quotes && byte == delimiter;
        idx += 1;
    }

    if start < bytes.len() {
        lines.push(strip_cr(&content[start..]));
    }
    lines
}

fn strip_cr(line: &str) -> &str {
    line.strip_suffix('\r').unwrap_or(line)
}

/// Read file and convert to UTF-8 if needed (handles Windows-1252, Latin-1, etc.)
pub fn read_file_as_utf8(path: &Path) -> Result<String, String> {
    let mut file = std::fs::File::open(path)
        .map_err(|e| format!("cannot open {}: {}", path.display(), e))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;

    // Try UTF-8 first; on failure, recover the buffer from the error
    let text = match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => {
            let bytes = e.into_bytes();
            // Fall back to Windows-1252 (common for instrument PCs)
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            decoded.into_owned()
        }
    };

    Ok(match text.strip_prefix('\u{feff}') {
        Some(stripped) => stripped.to_string(),
        None => text,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;
    use togglesheet_engine::{Row, TotalsWarning};

    fn cells(row: &[&str]) -> RawRow {
        row.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn blank_lines_become_empty_rows() {
        let rows = parse_rows("a,b\n\nc\n", b',').unwrap();
        assert_eq!(rows, vec![cells(&["a", "b"]), Vec::new(), cells(&["c"])]);
    }

    #[test]
    fn crlf_and_trailing_empty_fields() {
        let rows = parse_rows("Bit,0to1,1to0,\r\n0,1,2,\r\n", b',').unwrap();
        assert_eq!(rows[0], cells(&["Bit", "0to1", "1to0", ""]));
        assert_eq!(rows[1], cells(&["0", "1", "2", ""]));
    }

    #[test]
    fn quoted_fields_keep_commas() {
        let rows = parse_rows("ProductName,\"Bus, rev B\"\n", b',').unwrap();
        assert_eq!(rows[0], cells(&["ProductName", "Bus, rev B"]));
    }

    #[test]
    fn quoted_newline_stays_in_one_cell() {
        let rows = parse_rows("Note,\"two\r\nlines\"\n\nBit,0to1,1to0\n", b',').unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], cells(&["Note", "two\r\nlines"]));
        assert_eq!(rows[1], Vec::<String>::new());
        assert_eq!(rows[2], cells(&["Bit", "0to1", "1to0"]));
    }

    #[test]
    fn mid_field_quote_is_literal() {
        let rows = parse_rows("5\" panel,1\nnext\n", b',').unwrap();
        assert_eq!(rows, vec![cells(&["5\" panel", "1"]), cells(&["next"])]);
    }

    #[test]
    fn escaped_quotes_and_trailing_blank_lines() {
        let rows = parse_rows("\"say \"\"hi\"\"\",x\n\n", b',').unwrap();
        assert_eq!(rows, vec![cells(&["say \"hi\"", "x"]), Vec::new()]);
    }

    #[test]
    fn quoted_newline_keeps_fixed_row_index() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fixed.csv");
        fs::write(&path, "Note,\"a\nb\"\nBit,0to1,1to0\n0,1,3\n'25,'200\n").unwrap();

        let mut config = PipelineConfig::default();
        config.totals.strategy = togglesheet_engine::TotalsStrategy::FixedOffset;
        config.totals.fixed_row = 3;
        let table = load(&path, &config).unwrap();
        assert_eq!(table.totals.warning, None);
        assert_eq!(table.totals.total_bits, 200);
    }

    #[test]
    fn whitespace_line_is_not_blank() {
        let rows = parse_rows("  \n", b',').unwrap();
        assert_eq!(rows, vec![cells(&["  "])]);
    }

    #[test]
    fn semicolon_delimiter() {
        let rows = parse_rows("Bit;0to1;1to0\n", b';').unwrap();
        assert_eq!(rows[0], cells(&["Bit", "0to1", "1to0"]));
    }

    #[test]
    fn windows_1252_fallback() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("latin.csv");
        // "Temperature,85°" with ° as 0xB0
        fs::write(&path, b"Temperature,85\xb0\n").unwrap();
        let text = read_file_as_utf8(&path).unwrap();
        assert_eq!(text, "Temperature,85\u{b0}\n");
    }

    #[test]
    fn bom_is_stripped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bom.csv");
        fs::write(&path, "\u{feff}ProductName,X\n").unwrap();
        let table = load(&path, &PipelineConfig::default()).unwrap();
        assert_eq!(table.metadata.product_name.as_deref(), Some("X"));
    }

    #[test]
    fn load_classifies_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.csv");
        fs::write(
            &path,
            "ProductName,BusTest\nTemperature,25\nTime,60\n\nBit,0to1,1to0\n0,10,20\n1,30,40\n,Total compared bits\n,'8192\n",
        )
        .unwrap();

        let table = load(&path, &PipelineConfig::default()).unwrap();
        assert_eq!(table.header_index, Some(4));
        assert_eq!(table.rows[3], Row::Blank);
        assert_eq!(table.data_rows().count(), 2);
        assert_eq!(table.totals.total_bits, 8192);
        assert_eq!(table.metadata.composite_name().as_deref(), Some("temp_25.0_time_60.0"));
    }

    #[test]
    fn load_with_invalid_totals_still_succeeds() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        fs::write(&path, "Bit,0to1,1to0\n0,1,1\n,Total compared bits\n,abc\n").unwrap();

        let table = load(&path, &PipelineConfig::default()).unwrap();
        assert_eq!(table.totals.total_bits, 1);
        assert!(matches!(table.totals.warning, Some(TotalsWarning::NotAnInteger { .. })));
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempdir().unwrap();
        let err = load(&dir.path().join("nope.csv"), &PipelineConfig::default()).unwrap_err();
        assert!(err.contains("nope.csv"));
    }
}

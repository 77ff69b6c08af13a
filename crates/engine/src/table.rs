// Row classification: one pass over the raw rows, first matching predicate wins.

use crate::config::TotalsConfig;
use crate::model::{DataRow, Metadata, MetadataKey, RawRow, Row, AVERAGE_LABEL, HEADER_LABELS};
use crate::totals::{self, Totals};

/// A loaded measurement file: classified rows, metadata and totals.
#[derive(Debug, Clone)]
pub struct Table {
    pub rows: Vec<Row>,
    pub header_index: Option<usize>,
    pub metadata: Metadata,
    pub totals: Totals,
}

impl Table {
    pub fn from_raw_rows(raw: Vec<RawRow>, totals_config: &TotalsConfig) -> Self {
        let metadata = extract_metadata(&raw);
        let header_index = find_header(&raw);

        let rows: Vec<Row> = raw
            .into_iter()
            .enumerate()
            .map(|(idx, cells)| classify(cells, idx, header_index))
            .collect();

        let totals = totals::extract(&rows, totals_config);

        Self { rows, header_index, metadata, totals }
    }

    pub fn data_rows(&self) -> impl Iterator<Item = &DataRow> {
        self.rows.iter().filter_map(|row| match row {
            Row::Data(data) => Some(data),
            _ => None,
        })
    }
}

/// Index of the first row whose first three trimmed cells are `Bit`, `0to1`, `1to0`.
pub fn find_header(rows: &[RawRow]) -> Option<usize> {
    rows.iter().position(|cells| is_header(cells))
}

fn is_header(cells: &[String]) -> bool {
    cells.len() >= HEADER_LABELS.len()
        && cells
            .iter()
            .zip(HEADER_LABELS.iter())
            .all(|(cell, label)| cell.trim() == *label)
}

/// Scan every row; the last occurrence of a key wins.
pub fn extract_metadata(rows: &[RawRow]) -> Metadata {
    let mut metadata = Metadata::default();
    for cells in rows {
        if let Some(key) = metadata_key(cells) {
            metadata.apply(key, &cells[1]);
        }
    }
    metadata
}

fn metadata_key(cells: &[String]) -> Option<MetadataKey> {
    if cells.len() < 2 {
        return None;
    }
    MetadataKey::from_label(cells[0].trim())
}

/// Bit index must be a non-negative integer; both counts must be integers.
pub fn parse_data_row(cells: RawRow) -> Result<DataRow, RawRow> {
    if cells.len() < 3 {
        return Err(cells);
    }
    let parsed = (
        cells[0].trim().parse::<u64>(),
        cells[1].trim().parse::<i64>(),
        cells[2].trim().parse::<i64>(),
    );
    match parsed {
        (Ok(bit), Ok(zero_to_one), Ok(one_to_zero)) => {
            Ok(DataRow { cells, bit, zero_to_one, one_to_zero })
        }
        _ => Err(cells),
    }
}

fn classify(mut cells: RawRow, idx: usize, header_index: Option<usize>) -> Row {
    if cells.is_empty() {
        return Row::Blank;
    }

    if header_index == Some(idx) {
        cells.push(AVERAGE_LABEL.to_string());
        return Row::Header(cells);
    }

    let after_header = header_index.is_some_and(|h| idx > h);
    let cells = if after_header {
        match parse_data_row(cells) {
            Ok(data) => return Row::Data(data),
            Err(cells) => cells,
        }
    } else {
        cells
    };

    match metadata_key(&cells) {
        Some(key) => Row::Metadata { key, cells },
        None => Row::Unclassified(cells),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(lines: &[&str]) -> Vec<RawRow> {
        lines
            .iter()
            .map(|line| {
                if line.is_empty() {
                    Vec::new()
                } else {
                    line.split(',').map(|c| c.to_string()).collect()
                }
            })
            .collect()
    }

    fn load(lines: &[&str]) -> Table {
        Table::from_raw_rows(raw(lines), &TotalsConfig::default())
    }

    #[test]
    fn header_gains_average_label() {
        let table = load(&["Bit,0to1,1to0", "3,10,20"]);
        assert_eq!(table.header_index, Some(0));
        assert_eq!(table.rows[0], Row::Header(raw(&["Bit,0to1,1to0,average"]).remove(0)));
        match &table.rows[1] {
            Row::Data(d) => {
                assert_eq!((d.bit, d.zero_to_one, d.one_to_zero), (3, 10, 20));
                assert_eq!(d.average(), 15.0);
            }
            other => panic!("expected data row, got {other:?}"),
        }
    }

    #[test]
    fn header_match_trims_cells() {
        let table = load(&[" Bit , 0to1 ,1to0 "]);
        assert_eq!(table.header_index, Some(0));
    }

    #[test]
    fn only_first_header_counts() {
        let rows = raw(&["ProductName,X", "Bit,0to1,1to0", "0,1,1", "Bit,0to1,1to0", "1,2,2"]);
        assert_eq!(find_header(&rows), Some(1));
        assert_eq!(find_header(&rows), Some(1));

        let table = Table::from_raw_rows(rows.clone(), &TotalsConfig::default());
        let headers = table.rows.iter().filter(|r| matches!(r, Row::Header(_))).count();
        assert_eq!(headers, 1);
        assert_eq!(table.rows[3], Row::Unclassified(rows[3].clone()));
        assert_eq!(table.data_rows().count(), 2);
    }

    #[test]
    fn numeric_rows_before_header_pass_through() {
        let table = load(&["5,6,7", "Bit,0to1,1to0"]);
        assert_eq!(table.rows[0], Row::Unclassified(raw(&["5,6,7"]).remove(0)));
        assert_eq!(table.data_rows().count(), 0);
    }

    #[test]
    fn no_header_means_no_data() {
        let table = load(&["0,1,2", "1,3,4"]);
        assert_eq!(table.header_index, None);
        assert!(table.rows.iter().all(|r| !r.is_data()));
    }

    #[test]
    fn data_predicate_rejects_bad_rows() {
        let table = load(&[
            "Bit,0to1,1to0",
            "-1,2,3",
            "x,2,3",
            "4,five,6",
            "7,8",
            "",
            "9, 10 , 11",
        ]);
        assert!(matches!(table.rows[1], Row::Unclassified(_)));
        assert!(matches!(table.rows[2], Row::Unclassified(_)));
        assert!(matches!(table.rows[3], Row::Unclassified(_)));
        assert!(matches!(table.rows[4], Row::Unclassified(_)));
        assert_eq!(table.rows[5], Row::Blank);
        assert!(table.rows[6].is_data());
    }

    #[test]
    fn negative_counts_are_still_data() {
        let table = load(&["Bit,0to1,1to0", "2,-4,2"]);
        let data: Vec<_> = table.data_rows().collect();
        assert_eq!(data.len(), 1);
        assert_eq!(data[0].average(), -1.0);
    }

    #[test]
    fn metadata_fields_extracted() {
        let table = load(&[
            "ProductName, DDR5-X ",
            "Temperature,85",
            "Time,12.5",
            "",
            "Bit,0to1,1to0",
        ]);
        assert_eq!(table.metadata.product_name.as_deref(), Some("DDR5-X"));
        assert_eq!(table.metadata.temperature, Some(85.0));
        assert_eq!(table.metadata.time, Some(12.5));
        assert!(matches!(table.rows[0], Row::Metadata { key: MetadataKey::ProductName, .. }));
        assert_eq!(table.rows[3], Row::Blank);
    }

    #[test]
    fn metadata_needs_two_cells() {
        let table = load(&["ProductName", "Temperature,warm"]);
        assert_eq!(table.metadata, Metadata::default());
        assert!(matches!(table.rows[0], Row::Unclassified(_)));
    }

    #[test]
    fn non_data_rows_survive_verbatim() {
        let lines = ["# run 7", "ProductName,Z", "", "Bit,0to1,1to0", "note,,x"];
        let table = load(&lines);
        let input = raw(&lines);
        for (idx, row) in table.rows.iter().enumerate() {
            if idx == 3 {
                assert_eq!(row.cells().len(), input[idx].len() + 1);
                assert_eq!(&row.cells()[..3], &input[idx][..]);
            } else {
                assert_eq!(row.cells(), &input[idx][..]);
            }
        }
    }

    #[test]
    fn totals_extracted_during_load() {
        let table = load(&["Bit,0to1,1to0", "0,1,1", ",Total compared bits", ",'2048"]);
        assert_eq!(table.totals.total_bits, 2048);
        assert_eq!(table.totals.warning, None);
    }
}

use std::io::Read;

use super::normalize::clean;

/// Columns per logical row in the legacy export (A..T).
const EXPECTED_COLS: usize = 20;

/// One source row, positionally mapped. Short rows are padded with empties,
/// long rows truncated; malformed individual fields degrade to `None` later
/// in the pipeline rather than dropping the row.
#[derive(Debug, Clone, Default)]
pub struct RawRecord {
    /// Column A: service start date, free-form.
    pub start_date: Option<String>,
    /// Column B: group label.
    pub group: Option<String>,
    pub child: RawChild,
    pub first_parent: RawParent,
    pub second_parent: RawParent,
}

/// Columns C..G.
#[derive(Debug, Clone, Default)]
pub struct RawChild {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub personal_code: Option<String>,
    pub dob: Option<String>,
    pub address: Option<String>,
}

/// Columns H..M for the first parent, O..T for the second. Column N is
/// unused in every known export.
#[derive(Debug, Clone, Default)]
pub struct RawParent {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub personal_code: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
}

/// Parse decoded legacy text into raw records. Tab-separated, unquoted,
/// no header row; column counts vary between export generations.
pub fn parse_rows<R: Read>(reader: R) -> Result<Vec<RawRecord>, csv::Error> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut records = Vec::new();
    for row in csv_reader.records() {
        let row = row?;
        if row.iter().all(|field| field.trim().is_empty()) {
            continue;
        }
        records.push(map_row(&row));
    }
    Ok(records)
}

fn map_row(row: &csv::StringRecord) -> RawRecord {
    let col = |index: usize| -> Option<String> {
        if index >= EXPECTED_COLS {
            return None;
        }
        row.get(index).and_then(clean)
    };

    RawRecord {
        start_date: col(0),
        group: col(1),
        child: RawChild {
            first_name: col(2),
            last_name: col(3),
            personal_code: col(4),
            dob: col(5),
            address: col(6),
        },
        first_parent: RawParent {
            first_name: col(7),
            last_name: col(8),
            personal_code: col(9),
            phone: col(10),
            email: col(11),
            address: col(12),
        },
        // Column 13 (N) carries no data.
        second_parent: RawParent {
            first_name: col(14),
            last_name: col(15),
            personal_code: col(16),
            phone: col(17),
            address: col(18),
            email: col(19),
        },
    }
}

use crate::error::{Field, FieldError, LoadError};
use crate::types::{ApplicationRecord, Bays, Cell, MonthlyData, SheetGrid};
use crate::util::{parse_amount, parse_count, parse_week_day};
#[cfg(feature = "xlsx")]
use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};
use log::debug;
#[cfg(feature = "xlsx")]
use std::io::Cursor;

/// Positional columns of a data row.
pub const SPRAY_COLUMNS: std::ops::Range<usize> = 0..3;
pub const FOG_COLUMNS: std::ops::Range<usize> = 3..6;
pub const DATE_COLUMN: usize = 6;
pub const BAYS_COLUMN: usize = 7;
pub const PRICE_COLUMN: usize = 8;
pub const BUDGET_COLUMN: usize = 9;
pub const ROW_WIDTH: usize = 10;

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const CFB_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

#[derive(Debug, Clone, PartialEq)]
pub struct LoadReport {
    pub sheets: usize,
    pub data_rows: usize,
    pub records: usize,
    pub blank_rows: usize,
}

/// Validate one data row of `sheet`.
///
/// Returns `Ok(None)` for a row with no values at all; such rows are dropped
/// by the caller. `row` is the spreadsheet row number used in errors.
pub fn normalize_row(
    cells: &[Cell],
    sheet: &str,
    row: usize,
) -> Result<Option<ApplicationRecord>, LoadError> {
    let mut fields: Vec<Cell> = cells.iter().take(ROW_WIDTH).cloned().collect();
    fields.resize(ROW_WIDTH, Cell::Empty);

    if fields.iter().all(Cell::is_empty) {
        return Ok(None);
    }
    validate_fields(&fields, sheet)
        .map(Some)
        .map_err(|source| LoadError::Row {
            sheet: sheet.to_string(),
            row,
            source,
        })
}

// Checks run in column order; the first failure wins.
fn validate_fields(fields: &[Cell], sheet: &str) -> Result<ApplicationRecord, FieldError> {
    let spray_chemicals = chemical_slots(&fields[SPRAY_COLUMNS]);
    let fog_chemicals = chemical_slots(&fields[FOG_COLUMNS]);
    let is_full = fog_chemicals.iter().any(Option::is_some);

    let date_value = fields[DATE_COLUMN]
        .as_text()
        .ok_or(FieldError::MissingField(Field::Date))?;
    let date = parse_week_day(&date_value)?;

    let count = parse_count(&fields[BAYS_COLUMN], Field::Bays)?;
    let price = parse_amount(&fields[PRICE_COLUMN], Field::Price)?;
    let monthly_budget = parse_amount(&fields[BUDGET_COLUMN], Field::MonthlyBudget)?;

    Ok(ApplicationRecord {
        spray_chemicals,
        fog_chemicals,
        date,
        bays: Bays { count, is_full },
        price,
        monthly_budget,
        month: sheet.to_string(),
    })
}

fn chemical_slots(cells: &[Cell]) -> [Option<String>; 3] {
    [cells[0].as_text(), cells[1].as_text(), cells[2].as_text()]
}

/// Parse every data row of one tab. Row 0 is the header and is skipped.
pub fn parse_sheet(grid: &SheetGrid) -> Result<Vec<ApplicationRecord>, LoadError> {
    if grid.rows.len() < 2 {
        return Err(LoadError::EmptySheet {
            sheet: grid.name.clone(),
        });
    }

    let mut records = Vec::new();
    for (idx, cells) in grid.rows.iter().enumerate().skip(1) {
        // Spreadsheet rows are 1-based and the header is row 1.
        if let Some(record) = normalize_row(cells, &grid.name, idx + 1)? {
            records.push(record);
        }
    }
    debug!(
        "parsed {} applications from sheet {:?}",
        records.len(),
        grid.name
    );
    Ok(records)
}

/// Parse all tabs in order. Any failing tab fails the whole workbook.
pub fn parse_workbook(sheets: &[SheetGrid]) -> Result<MonthlyData, LoadError> {
    let mut data = MonthlyData::new();
    for grid in sheets {
        let records = parse_sheet(grid)?;
        data.insert(grid.name.clone(), records);
    }
    Ok(data)
}

/// Decode workbook bytes (xlsx, xlsb, ods or xls) into per-tab grids.
pub fn decode_workbook(bytes: &[u8]) -> Result<Vec<SheetGrid>, LoadError> {
    if bytes.is_empty() {
        return Err(LoadError::UnrecognizedFormat("the file is empty".to_string()));
    }
    if !(bytes.starts_with(ZIP_MAGIC) || bytes.starts_with(CFB_MAGIC)) {
        return Err(LoadError::UnrecognizedFormat(
            "expected an xlsx, xlsb, ods or xls workbook".to_string(),
        ));
    }
    read_sheets(bytes)
}

#[cfg(feature = "xlsx")]
fn read_sheets(bytes: &[u8]) -> Result<Vec<SheetGrid>, LoadError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;
    let names = workbook.sheet_names();
    log::info!("workbook decoded, sheets: {:?}", names);

    let mut sheets = Vec::with_capacity(names.len());
    for name in names {
        let range = workbook.worksheet_range(&name)?;
        sheets.push(SheetGrid {
            rows: anchored_rows(&range),
            name,
        });
    }
    Ok(sheets)
}

#[cfg(not(feature = "xlsx"))]
fn read_sheets(_bytes: &[u8]) -> Result<Vec<SheetGrid>, LoadError> {
    Err(LoadError::UnsupportedEnvironment(
        "built without the `xlsx` feature, no workbook decoder available".to_string(),
    ))
}

// calamine trims leading blank rows and columns from a range; put them back
// so column indexes and row numbers match the sheet.
#[cfg(feature = "xlsx")]
fn anchored_rows(range: &Range<Data>) -> Vec<Vec<Cell>> {
    let Some((first_row, first_col)) = range.start() else {
        return Vec::new();
    };
    let mut rows = vec![Vec::new(); first_row as usize];
    for row in range.rows() {
        let mut cells = vec![Cell::Empty; first_col as usize];
        cells.extend(row.iter().map(Cell::from));
        rows.push(cells);
    }
    rows
}

/// Decode and parse a workbook held in memory.
pub fn load_workbook(bytes: &[u8]) -> Result<(MonthlyData, LoadReport), LoadError> {
    let sheets = decode_workbook(bytes)?;
    let data = parse_workbook(&sheets)?;

    let data_rows: usize = sheets.iter().map(|s| s.rows.len().saturating_sub(1)).sum();
    let records = data.total_records();
    let report = LoadReport {
        sheets: data.len(),
        data_rows,
        records,
        blank_rows: data_rows - records,
    };
    Ok((data, report))
}

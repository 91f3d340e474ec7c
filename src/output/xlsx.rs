use anyhow::Result;
use rust_xlsxwriter::{Workbook, Worksheet};

use crate::output::{row_values, totals_values, MATERIAL_COLUMNS, TOTALS_COLUMNS};
use crate::report::TablePayload;

pub const DATA_SHEET: &str = "Data";
pub const TOTALS_SHEET: &str = "CO2 Emission Totals";

/// Builds the two-sheet workbook offered as the project export.
pub fn table_to_xlsx(payload: &TablePayload) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();

    let mut data = Worksheet::new();
    data.set_name(DATA_SHEET)?;
    for (col, heading) in MATERIAL_COLUMNS.iter().enumerate() {
        data.write_string(0, col as u16, *heading)?;
    }
    for (idx, row) in payload.rows.iter().enumerate() {
        let r = idx as u32 + 1;
        data.write_string(r, 0, &row.material)?;
        for (col, value) in row_values(row).into_iter().enumerate() {
            data.write_number(r, col as u16 + 1, value)?;
        }
    }
    workbook.push_worksheet(data);

    let mut totals = Worksheet::new();
    totals.set_name(TOTALS_SHEET)?;
    for (col, heading) in TOTALS_COLUMNS.iter().enumerate() {
        totals.write_string(0, col as u16, *heading)?;
    }
    totals.write_string(1, 0, "Totals")?;
    for (col, value) in totals_values(&payload.totals).into_iter().enumerate() {
        totals.write_number(1, col as u16 + 1, value)?;
    }
    workbook.push_worksheet(totals);

    Ok(workbook.save_to_buffer()?)
}

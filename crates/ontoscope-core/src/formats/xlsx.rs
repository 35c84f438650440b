use std::path::Path;

use rust_xlsxwriter::{
    Color, Format, FormatAlign, FormatBorder, FormatUnderline, Table, TableColumn, TableStyle, Url,
    Workbook, Worksheet,
};

use crate::error::Result;
use crate::formats::csv::{COLUMNS, row};
use crate::record::CanonicalRecord;

const YEAR_COL: u16 = 4;
const DOI_COL: u16 = 5;
const URL_COL: u16 = 6;
const MAX_COLUMN_WIDTH: usize = 60;
/// Longest string a single cell accepts.
const MAX_CELL_CHARS: usize = 32_767;

/// Spreadsheet export: one styled table, newest records first.
///
/// Cells wrap and carry thin borders, DOIs and URLs become hyperlinks and
/// column widths follow the content up to a fixed cap.
pub fn write_records(path: &Path, records: &[CanonicalRecord]) -> Result<()> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name("Results")?;

    let cell = Format::new()
        .set_text_wrap()
        .set_border(FormatBorder::Thin)
        .set_align(FormatAlign::Top);
    let link = cell
        .clone()
        .set_font_color(Color::RGB(0x0563C1))
        .set_underline(FormatUnderline::Single);

    let rows = sorted(records);
    let mut widths: Vec<usize> = COLUMNS.iter().map(|name| name.chars().count()).collect();

    for (row_index, record) in (1u32..).zip(&rows) {
        for (col, value) in (0u16..).zip(row(record)) {
            let value: String = value.chars().take(MAX_CELL_CHARS).collect();
            let width = &mut widths[usize::from(col)];
            *width = (*width).max(value.chars().count());
            write_cell(worksheet, row_index, col, record, &value, &cell, &link)?;
        }
    }

    if rows.is_empty() {
        let header = cell.clone().set_bold();
        for (col, name) in (0u16..).zip(COLUMNS) {
            worksheet.write_string_with_format(0, col, *name, &header)?;
        }
    } else {
        let columns: Vec<TableColumn> =
            COLUMNS.iter().map(|name| TableColumn::new().set_header(*name)).collect();
        let table = Table::new()
            .set_name("DataTable")
            .set_style(TableStyle::Medium9)
            .set_columns(&columns);
        let last_row = u32::try_from(rows.len()).unwrap_or(u32::MAX);
        let last_col = u16::try_from(COLUMNS.len() - 1).unwrap_or(u16::MAX);
        worksheet.add_table(0, 0, last_row, last_col, &table)?;
    }

    for (col, width) in (0u16..).zip(widths) {
        let width = (width + 2).min(MAX_COLUMN_WIDTH);
        worksheet.set_column_width(col, width as f64)?;
    }

    workbook.save(path)?;
    Ok(())
}

fn write_cell(
    worksheet: &mut Worksheet,
    row_index: u32,
    col: u16,
    record: &CanonicalRecord,
    value: &str,
    cell: &Format,
    link: &Format,
) -> Result<()> {
    match (col, record.year) {
        (YEAR_COL, Some(year)) => {
            worksheet.write_number_with_format(row_index, col, f64::from(year), cell)?;
        }
        (DOI_COL, _) if !value.is_empty() => {
            let url = Url::new(format!("https://doi.org/{value}")).set_text(value);
            worksheet.write_url_with_format(row_index, col, url, link)?;
        }
        (URL_COL, _) if value.starts_with("http://") || value.starts_with("https://") => {
            worksheet.write_url_with_format(row_index, col, Url::new(value), link)?;
        }
        _ => {
            worksheet.write_string_with_format(row_index, col, value, cell)?;
        }
    }
    Ok(())
}

/// Year descending with undated records last, then title.
fn sorted(records: &[CanonicalRecord]) -> Vec<&CanonicalRecord> {
    let mut rows: Vec<&CanonicalRecord> = records.iter().collect();
    rows.sort_by(|a, b| {
        b.year
            .cmp(&a.year)
            .then_with(|| a.title.to_lowercase().cmp(&b.title.to_lowercase()))
    });
    rows
}

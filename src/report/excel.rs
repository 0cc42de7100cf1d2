use rust_xlsxwriter::{Format, Workbook};

use super::{ReportCell, ReportTable};

const MAX_COL_WIDTH: usize = 50;

pub fn render_xlsx(table: &ReportTable) -> anyhow::Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();

    {
        let sheet = workbook.add_worksheet();
        sheet.set_name(sheet_name(&table.title))?;

        let mut widths: Vec<usize> = table.headers.iter().map(|h| h.len()).collect();

        for (col, header) in table.headers.iter().enumerate() {
            sheet.write_string_with_format(0, col as u16, *header, &bold)?;
        }

        for (r, row) in table.rows.iter().enumerate() {
            let row_num = (r + 1) as u32;
            for (col, cell) in row.iter().enumerate() {
                match cell {
                    ReportCell::Text(s) => {
                        sheet.write_string(row_num, col as u16, s.as_str())?;
                    }
                    ReportCell::Number(n) => {
                        sheet.write_number(row_num, col as u16, *n)?;
                    }
                }
                if let Some(w) = widths.get_mut(col) {
                    *w = (*w).max(cell.display().chars().count());
                }
            }
        }

        for (col, w) in widths.iter().enumerate() {
            sheet.set_column_width(col as u16, (w + 2).min(MAX_COL_WIDTH) as f64)?;
        }
        sheet.set_freeze_panes(1, 0)?;
    }

    Ok(workbook.save_to_buffer()?)
}

/// Excel sheet names: max 31 chars, none of `[]:*?/\`
fn sheet_name(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .filter(|c| !matches!(c, '[' | ']' | ':' | '*' | '?' | '/' | '\\'))
        .take(31)
        .collect();
    if cleaned.trim().is_empty() {
        "Report".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::sample_table;

    #[test]
    fn renders_an_xlsx_archive() {
        let bytes = render_xlsx(&sample_table()).unwrap();
        // xlsx is a zip container
        assert!(bytes.starts_with(b"PK"));
    }

    #[test]
    fn sheet_names_are_sanitised() {
        assert_eq!(sheet_name("Leave [2026/03]"), "Leave 202603");
        assert_eq!(sheet_name("???"), "Report");
        assert_eq!(sheet_name(&"x".repeat(40)).len(), 31);
    }
}

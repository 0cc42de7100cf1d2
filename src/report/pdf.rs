use anyhow::anyhow;
use chrono::Local;
use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference};

use super::ReportTable;

// A4 landscape
const PAGE_W: f32 = 297.0;
const PAGE_H: f32 = 210.0;
const MARGIN: f32 = 12.0;
const ROW_H: f32 = 6.5;
const BODY_PT: f32 = 9.0;
const TITLE_PT: f32 = 15.0;
/// Average Helvetica glyph width at `BODY_PT`, in mm
const CHAR_W: f32 = 1.75;

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
}

struct Cursor {
    layer: PdfLayerReference,
    y: f32,
}

pub fn render_pdf(table: &ReportTable) -> anyhow::Result<Vec<u8>> {
    let (doc, page, layer) = PdfDocument::new(&table.title, Mm(PAGE_W), Mm(PAGE_H), "Layer 1");
    let fonts = Fonts {
        regular: doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| anyhow!("pdf font: {e:?}"))?,
        bold: doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| anyhow!("pdf font: {e:?}"))?,
    };

    let mut cursor = Cursor {
        layer: doc.get_page(page).get_layer(layer),
        y: PAGE_H - MARGIN,
    };

    cursor
        .layer
        .use_text(table.title.as_str(), TITLE_PT, Mm(MARGIN), Mm(cursor.y - 4.0), &fonts.bold);
    cursor.y -= 10.0;
    let generated = format!(
        "Generated {} - {} record(s)",
        Local::now().format("%Y-%m-%d %H:%M"),
        table.rows.len()
    );
    cursor
        .layer
        .use_text(generated, BODY_PT, Mm(MARGIN), Mm(cursor.y), &fonts.regular);
    cursor.y -= ROW_H * 1.5;

    let columns = table.headers.len().max(1);
    let col_w = (PAGE_W - 2.0 * MARGIN) / columns as f32;
    let max_chars = ((col_w - 1.5) / CHAR_W).floor().max(3.0) as usize;

    let header: Vec<String> = table.headers.iter().map(|h| h.to_string()).collect();
    write_row(&cursor, &header, col_w, max_chars, &fonts.bold);
    cursor.y -= ROW_H;

    if table.rows.is_empty() {
        cursor
            .layer
            .use_text("No records", BODY_PT, Mm(MARGIN), Mm(cursor.y), &fonts.regular);
    }

    for row in &table.rows {
        if cursor.y < MARGIN + ROW_H {
            new_page(&doc, &mut cursor);
            write_row(&cursor, &header, col_w, max_chars, &fonts.bold);
            cursor.y -= ROW_H;
        }
        let cells: Vec<String> = row.iter().map(|c| c.display()).collect();
        write_row(&cursor, &cells, col_w, max_chars, &fonts.regular);
        cursor.y -= ROW_H;
    }

    doc.save_to_bytes().map_err(|e| anyhow!("pdf save: {e:?}"))
}

fn new_page(doc: &PdfDocumentReference, cursor: &mut Cursor) {
    let (page, layer) = doc.add_page(Mm(PAGE_W), Mm(PAGE_H), "Layer 1");
    cursor.layer = doc.get_page(page).get_layer(layer);
    cursor.y = PAGE_H - MARGIN;
}

fn write_row(cursor: &Cursor, cells: &[String], col_w: f32, max_chars: usize, font: &IndirectFontRef) {
    for (i, cell) in cells.iter().enumerate() {
        let x = MARGIN + col_w * i as f32;
        cursor
            .layer
            .use_text(truncate(cell, max_chars), BODY_PT, Mm(x), Mm(cursor.y), font);
    }
}

/// Cuts `text` to `max` characters, marking the cut with ".."
fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let keep = max.saturating_sub(2);
    let mut out: String = text.chars().take(keep).collect();
    out.push_str("..");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{ReportTable, sample_table};

    #[test]
    fn renders_a_pdf_document() {
        let bytes = render_pdf(&sample_table()).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn empty_table_still_renders() {
        let table = ReportTable::new("Leave Report", vec!["Name", "Days"]);
        let bytes = render_pdf(&table).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn long_tables_spill_onto_more_pages() {
        let mut table = ReportTable::new("Task Report", vec!["Title"]);
        for i in 0..200 {
            table.push_row(vec![format!("Task {i}").into()]);
        }
        let long = render_pdf(&table).unwrap();
        let short = render_pdf(&sample_table()).unwrap();
        assert!(long.len() > short.len());
    }

    #[test]
    fn truncation_keeps_short_text() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a very long description", 8), "a very..");
    }
}

//! Tabular report export to PDF and Excel.
//!
//! Handlers map their records into a [`ReportTable`]; rendering is delegated to
//! `printpdf` and `rust_xlsxwriter`.

mod excel;
mod pdf;

use actix_web::{
    HttpResponse,
    http::header::{ContentDisposition, DispositionParam, DispositionType},
    web,
};
use chrono::Local;
use serde::Serialize;
use tracing::error;

use crate::error::ApiError;

pub use excel::render_xlsx;
pub use pdf::render_pdf;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ReportCell {
    Text(String),
    Number(f64),
}

impl ReportCell {
    pub fn display(&self) -> String {
        match self {
            ReportCell::Text(s) => s.clone(),
            ReportCell::Number(n) if n.fract() == 0.0 => format!("{n:.0}"),
            ReportCell::Number(n) => format!("{n:.2}"),
        }
    }
}

impl From<String> for ReportCell {
    fn from(s: String) -> Self {
        ReportCell::Text(s)
    }
}

impl From<&str> for ReportCell {
    fn from(s: &str) -> Self {
        ReportCell::Text(s.to_string())
    }
}

impl From<f64> for ReportCell {
    fn from(n: f64) -> Self {
        ReportCell::Number(n)
    }
}

impl From<i64> for ReportCell {
    fn from(n: i64) -> Self {
        ReportCell::Number(n as f64)
    }
}

impl<T: Into<ReportCell>> From<Option<T>> for ReportCell {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or_else(|| ReportCell::Text(String::new()))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportTable {
    pub title: String,
    pub headers: Vec<&'static str>,
    pub rows: Vec<Vec<ReportCell>>,
}

impl ReportTable {
    pub fn new(title: impl Into<String>, headers: Vec<&'static str>) -> Self {
        Self {
            title: title.into(),
            headers,
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<ReportCell>) {
        debug_assert_eq!(row.len(), self.headers.len());
        self.rows.push(row);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Pdf,
    Excel,
}

impl ReportFormat {
    /// `None` means the caller wants JSON rows
    pub fn parse(raw: Option<&str>) -> Result<Option<Self>, ApiError> {
        let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
            return Ok(None);
        };
        match raw.to_ascii_lowercase().as_str() {
            "pdf" => Ok(Some(ReportFormat::Pdf)),
            "excel" | "xlsx" => Ok(Some(ReportFormat::Excel)),
            _ => Err(ApiError::bad_request(
                "Invalid report type. Allowed: pdf, excel",
            )),
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ReportFormat::Pdf => "application/pdf",
            ReportFormat::Excel => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ReportFormat::Pdf => "pdf",
            ReportFormat::Excel => "xlsx",
        }
    }

    pub fn render(self, table: &ReportTable) -> anyhow::Result<Vec<u8>> {
        match self {
            ReportFormat::Pdf => render_pdf(table),
            ReportFormat::Excel => render_xlsx(table),
        }
    }
}

pub fn file_name(stem: &str, format: ReportFormat) -> String {
    format!(
        "{}-{}.{}",
        stem,
        Local::now().format("%Y%m%d"),
        format.extension()
    )
}

/// Renders off the async executor and wraps the bytes as a download
pub async fn download(
    table: ReportTable,
    format: ReportFormat,
    stem: &str,
) -> Result<HttpResponse, ApiError> {
    let bytes = web::block(move || format.render(&table))
        .await
        .map_err(|e| {
            error!(error = %e, "Report render task failed");
            ApiError::Internal
        })?
        .map_err(|e| {
            error!(error = %e, "Failed to render report");
            ApiError::Internal
        })?;

    Ok(HttpResponse::Ok()
        .content_type(format.content_type())
        .insert_header(ContentDisposition {
            disposition: DispositionType::Attachment,
            parameters: vec![DispositionParam::Filename(file_name(stem, format))],
        })
        .body(bytes))
}

#[cfg(test)]
pub(crate) fn sample_table() -> ReportTable {
    let mut table = ReportTable::new("Attendance Report", vec!["Date", "Name", "Hours"]);
    table.push_row(vec!["2026-03-02".into(), "Jane Doe".into(), 8.5.into()]);
    table.push_row(vec!["2026-03-03".into(), "John Roe".into(), ReportCell::from(None::<f64>)]);
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_report_type() {
        assert_eq!(ReportFormat::parse(Some("pdf")).unwrap(), Some(ReportFormat::Pdf));
        assert_eq!(ReportFormat::parse(Some("EXCEL")).unwrap(), Some(ReportFormat::Excel));
        assert_eq!(ReportFormat::parse(Some("xlsx")).unwrap(), Some(ReportFormat::Excel));
        assert_eq!(ReportFormat::parse(None).unwrap(), None);
        assert_eq!(ReportFormat::parse(Some("  ")).unwrap(), None);
        assert!(ReportFormat::parse(Some("csv")).is_err());
    }

    #[test]
    fn numbers_display_without_noise() {
        assert_eq!(ReportCell::Number(3.0).display(), "3");
        assert_eq!(ReportCell::Number(8.333).display(), "8.33");
        assert_eq!(ReportCell::from(None::<i64>).display(), "");
    }

    #[test]
    fn file_name_carries_extension() {
        let name = file_name("leave-report", ReportFormat::Excel);
        assert!(name.starts_with("leave-report-"));
        assert!(name.ends_with(".xlsx"));
    }

    #[actix_web::test]
    async fn download_sets_attachment_headers() {
        let resp = download(sample_table(), ReportFormat::Pdf, "attendance-report")
            .await
            .unwrap();
        let headers = resp.headers();
        assert_eq!(headers.get("content-type").unwrap(), "application/pdf");
        let disposition = headers.get("content-disposition").unwrap().to_str().unwrap();
        assert!(disposition.starts_with("attachment"));
        assert!(disposition.contains("attendance-report-"));
    }
}

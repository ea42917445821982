//! Inspection report export: block layout plus PDF rendering.

pub mod layout;
pub mod render;

use bytes::Bytes;
use chrono::NaiveDate;

use crate::config::ReportConfig;
use crate::models::VistoriaDetails;

pub use layout::Block;
pub use render::RenderedReport;

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("PDF error: {0}")]
    Pdf(String),
}

/// `vistoria-{nome}-{YYYY-MM-DD}.pdf`, every non-alphanumeric ASCII char of the name replaced by `_`
pub fn report_filename(nome_obra: &str, date: NaiveDate) -> String {
    let name: String = nome_obra
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("vistoria-{}-{}.pdf", name, date.format("%Y-%m-%d"))
}

/// Lay out and render the report for a stored record
pub fn generate(
    config: &ReportConfig,
    details: &VistoriaDetails,
    photos: &[Option<Bytes>],
    font: Option<&[u8]>,
) -> Result<RenderedReport, ReportError> {
    let legendas: Vec<String> = details.fotos.iter().map(|f| f.legenda.clone()).collect();
    let blocks = layout::build(config, &details.vistoria, &legendas);
    render::render(&config.title, &blocks, photos, font)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_filename_sanitizes_name() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 14).unwrap();
        assert_eq!(
            report_filename("Creche Municipal - Bloco B/2", date),
            "vistoria-Creche_Municipal___Bloco_B_2-2024-05-14.pdf"
        );
        assert_eq!(
            report_filename("Pavimentação", date),
            "vistoria-Pavimenta__o-2024-05-14.pdf"
        );
    }
}

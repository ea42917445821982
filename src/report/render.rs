use bytes::Bytes;
use printpdf::image_crate::{self, DynamicImage, GenericImageView};
use printpdf::{
    BuiltinFont, Image, ImageTransform, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference,
    PdfLayerReference,
};
use std::io::Cursor;

use super::layout::{self, Block, CAPTION_SIZE, HEADING_SIZE, PHOTO_ERROR_SUFFIX, TEXT_SIZE};
use super::ReportError;

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN_X: f32 = 20.0;
const MARGIN_TOP: f32 = 20.0;
const MARGIN_BOTTOM: f32 = 20.0;
const INDENT: f32 = 30.0;
const BLOCK_GAP: f32 = 5.0;
const PHOTO_MAX_WIDTH: f32 = 150.0;
const PHOTO_MAX_HEIGHT: f32 = 100.0;
const PT_TO_MM: f32 = 0.3528;
/// Average Helvetica glyph width relative to the font size
const AVG_GLYPH_WIDTH: f32 = 0.5;

fn pdf_error(e: impl std::fmt::Display) -> ReportError {
    ReportError::Pdf(e.to_string())
}

fn line_height(size: f32) -> f32 {
    size * 0.4
}

fn text_width(text: &str, size: f32) -> f32 {
    text.chars().count() as f32 * size * AVG_GLYPH_WIDTH * PT_TO_MM
}

fn chars_per_line(width: f32, size: f32) -> usize {
    (width / (size * AVG_GLYPH_WIDTH * PT_TO_MM)).floor() as usize
}

/// Display size in mm, keeping the aspect ratio inside the photo box
fn fit_photo(width_px: u32, height_px: u32) -> (f32, f32) {
    let (w, h) = (width_px.max(1) as f32, height_px.max(1) as f32);
    let scale = (PHOTO_MAX_WIDTH / w).min(PHOTO_MAX_HEIGHT / h);
    (w * scale, h * scale)
}

struct PageWriter {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    /// Distance from the top edge of the page
    y: f32,
    pages: usize,
}

impl PageWriter {
    fn new(title: &str, font: Option<&[u8]>) -> Result<Self, ReportError> {
        let (doc, page, layer) =
            PdfDocument::new(title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Camada 1");

        let (regular, bold) = match font {
            Some(data) => {
                let regular = doc.add_external_font(Cursor::new(data)).map_err(pdf_error)?;
                (regular.clone(), regular)
            }
            None => (
                doc.add_builtin_font(BuiltinFont::Helvetica).map_err(pdf_error)?,
                doc.add_builtin_font(BuiltinFont::HelveticaBold).map_err(pdf_error)?,
            ),
        };

        let layer = doc.get_page(page).get_layer(layer);
        Ok(Self {
            doc,
            layer,
            regular,
            bold,
            y: MARGIN_TOP,
            pages: 1,
        })
    }

    fn ensure_space(&mut self, needed: f32) {
        if self.y + needed > PAGE_HEIGHT - MARGIN_BOTTOM {
            let (page, layer) = self.doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Camada 1");
            self.layer = self.doc.get_page(page).get_layer(layer);
            self.y = MARGIN_TOP;
            self.pages += 1;
        }
    }

    fn line(&self, text: &str, size: f32, x: f32, bold: bool) {
        let font = if bold { &self.bold } else { &self.regular };
        self.layer
            .use_text(text, size, Mm(x), Mm(PAGE_HEIGHT - self.y), font);
    }

    /// Wrapped paragraph followed by the standard block gap
    fn paragraph(&mut self, text: &str, x: f32, size: f32, bold: bool) {
        let lines = layout::wrap(text, chars_per_line(PAGE_WIDTH - 2.0 * MARGIN_X, size));
        let height = line_height(size);
        self.ensure_space(lines.len() as f32 * height);
        for line in &lines {
            self.line(line, size, x, bold);
            self.y += height;
        }
        self.y += BLOCK_GAP;
    }

    fn title(&mut self, text: &str, size: f32) {
        let x = ((PAGE_WIDTH - text_width(text, size)) / 2.0).max(MARGIN_X);
        self.ensure_space(line_height(size));
        self.line(text, size, x, true);
        self.y += 8.0;
    }

    fn photo(&mut self, caption: &str, data: Option<&Bytes>) {
        let decoded = data.and_then(|d| match image_crate::load_from_memory(d) {
            Ok(img) => Some(img),
            Err(e) => {
                tracing::warn!("Skipping undecodable photo '{}': {}", caption, e);
                None
            }
        });

        let Some(img) = decoded else {
            self.paragraph(&format!("{}{}", caption, PHOTO_ERROR_SUFFIX), INDENT, CAPTION_SIZE, false);
            return;
        };

        let (width_px, height_px) = img.dimensions();
        let (width, height) = fit_photo(width_px, height_px);
        self.ensure_space(height + 20.0);

        let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
        let dpi = width_px as f32 * 25.4 / width;
        Image::from_dynamic_image(&rgb).add_to_layer(
            self.layer.clone(),
            ImageTransform {
                translate_x: Some(Mm(INDENT)),
                translate_y: Some(Mm(PAGE_HEIGHT - self.y - height)),
                dpi: Some(dpi),
                ..Default::default()
            },
        );
        self.y += height + BLOCK_GAP;

        self.paragraph(caption, INDENT, CAPTION_SIZE, false);
        self.y += 10.0;
    }
}

/// Rendered report
pub struct RenderedReport {
    pub bytes: Vec<u8>,
    pub pages: usize,
}

/// Render blocks to an A4 PDF. `photos[i]` holds the encoded bytes for `Block::Photo { index: i }`.
pub fn render(
    title: &str,
    blocks: &[Block],
    photos: &[Option<Bytes>],
    font: Option<&[u8]>,
) -> Result<RenderedReport, ReportError> {
    let mut writer = PageWriter::new(title, font)?;

    for block in blocks {
        match block {
            Block::Title { text, size } => writer.title(text, *size),
            Block::Heading(text) => writer.paragraph(text, MARGIN_X, HEADING_SIZE, true),
            Block::Label(text) => writer.paragraph(text, MARGIN_X, TEXT_SIZE, true),
            Block::Text(text) => writer.paragraph(text, MARGIN_X, TEXT_SIZE, false),
            Block::Bullet(text) => {
                writer.paragraph(&format!("• {}", text), INDENT, TEXT_SIZE, false)
            }
            Block::Photo { index, caption } => {
                writer.photo(caption, photos.get(*index).and_then(|p| p.as_ref()))
            }
            Block::Space(mm) => writer.y += mm,
        }
    }

    let pages = writer.pages;
    let bytes = writer.doc.save_to_bytes().map_err(pdf_error)?;
    Ok(RenderedReport { bytes, pages })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReportConfig;
    use crate::report::layout::sample_vistoria;

    fn png(width: u32, height: u32) -> Bytes {
        let img = image_crate::RgbImage::from_pixel(width, height, image_crate::Rgb([200, 120, 40]));
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut out, image_crate::ImageOutputFormat::Png)
            .unwrap();
        Bytes::from(out.into_inner())
    }

    #[test]
    fn test_fit_photo_keeps_aspect_inside_box() {
        let (w, h) = fit_photo(4000, 3000);
        assert!((w - 133.333).abs() < 0.01);
        assert!((h - 100.0).abs() < 0.01);

        let (w, h) = fit_photo(3000, 1000);
        assert!((w - 150.0).abs() < 0.01);
        assert!((h - 50.0).abs() < 0.01);
    }

    #[test]
    fn test_render_produces_pdf() {
        let blocks = layout::build(&ReportConfig::default(), &sample_vistoria(), &[]);
        let report = render("Relatório", &blocks, &[], None).unwrap();
        assert!(report.bytes.starts_with(b"%PDF"));
        assert_eq!(report.pages, 1);
    }

    #[test]
    fn test_photos_break_pages_and_tolerate_bad_data() {
        let legendas: Vec<String> = (1..=4).map(|i| format!("Foto de campo {}", i)).collect();
        let blocks = layout::build(&ReportConfig::default(), &sample_vistoria(), &legendas);
        let photos = vec![
            Some(png(400, 300)),
            Some(Bytes::from_static(b"corrompido")),
            None,
            Some(png(300, 400)),
        ];

        let report = render("Relatório", &blocks, &photos, None).unwrap();
        assert!(report.bytes.starts_with(b"%PDF"));
        assert!(report.pages >= 2);
    }
}

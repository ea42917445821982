//! Overlay stamping for captured photos: a translucent box in the top-left
//! corner carrying the logo, the organisation label, the GPS fix and the
//! capture time.

use chrono::NaiveDateTime;
use image::{imageops, imageops::FilterType, ColorType, DynamicImage, Rgba, RgbaImage};
use imageproc::drawing::draw_text_mut;
use rusttype::{Font, Scale};

use crate::config::OverlayConfig;
use crate::models::GeoPoint;

const BOX_X: u32 = 10;
const BOX_Y: u32 = 10;
const BOX_WIDTH: u32 = 300;
const BOX_HEIGHT: u32 = 80;
const BOX_OPACITY: f32 = 0.7;
const LOGO_SIZE: u32 = 60;
const TEXT_X: i32 = 90;
const JPEG_QUALITY: u8 = 90;

#[derive(Debug, thiserror::Error)]
pub enum OverlayError {
    #[error("Invalid image: {0}")]
    Image(#[from] image::ImageError),
}

pub struct OverlayStamper {
    label: String,
    font: Option<Font<'static>>,
    logo: Option<RgbaImage>,
}

impl OverlayStamper {
    pub fn new(label: &str, font: Option<Font<'static>>, logo: Option<RgbaImage>) -> Self {
        Self {
            label: label.to_string(),
            font,
            logo: logo.map(|l| imageops::resize(&l, LOGO_SIZE, LOGO_SIZE, FilterType::Triangle)),
        }
    }

    /// Load font and logo from the configured paths; missing assets only disable that part
    pub fn from_config(config: &OverlayConfig) -> Self {
        let font = config.font_path.as_ref().and_then(|path| {
            match std::fs::read(path).ok().and_then(Font::try_from_vec) {
                Some(font) => Some(font),
                None => {
                    tracing::warn!("Overlay font {} could not be loaded, text disabled", path);
                    None
                }
            }
        });
        if font.is_none() && config.font_path.is_none() {
            tracing::info!("No overlay font configured, photos are stamped without text");
        }

        let logo = config.logo_path.as_ref().and_then(|path| match image::open(path) {
            Ok(img) => Some(img.to_rgba8()),
            Err(e) => {
                tracing::warn!("Overlay logo {} could not be loaded: {}", path, e);
                None
            }
        });

        Self::new(&config.label, font, logo)
    }

    /// Text lines written next to the logo
    pub fn lines(&self, position: Option<GeoPoint>, taken_at: NaiveDateTime) -> Vec<String> {
        let mut lines = vec![self.label.clone()];
        if let Some(point) = position {
            lines.push(format!("GPS: {}", point));
        }
        lines.push(format!("Data: {}", taken_at.format("%d/%m/%Y, %H:%M:%S")));
        lines
    }

    /// Stamp the overlay onto an encoded photo, returning a JPEG
    pub fn stamp(
        &self,
        data: &[u8],
        position: Option<GeoPoint>,
        taken_at: NaiveDateTime,
    ) -> Result<Vec<u8>, OverlayError> {
        let mut img = image::load_from_memory(data)?.to_rgba8();

        darken_box(&mut img);

        if let Some(logo) = &self.logo {
            imageops::overlay(&mut img, logo, 20, 20);
        }

        if let Some(font) = &self.font {
            let scale = Scale::uniform(14.0);
            for (i, line) in self.lines(position, taken_at).iter().enumerate() {
                let y = 22 + i as i32 * 20;
                draw_text_mut(&mut img, Rgba([255, 255, 255, 255]), TEXT_X, y, scale, font, line);
            }
        }

        let rgb = DynamicImage::ImageRgba8(img).to_rgb8();
        let mut out = Vec::new();
        let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY);
        encoder.encode(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb8)?;
        Ok(out)
    }
}

/// Blend the overlay box towards black, clipped to the image bounds
fn darken_box(img: &mut RgbaImage) {
    let (width, height) = img.dimensions();
    let keep = 1.0 - BOX_OPACITY;
    for y in BOX_Y..(BOX_Y + BOX_HEIGHT).min(height) {
        for x in BOX_X..(BOX_X + BOX_WIDTH).min(width) {
            let pixel = img.get_pixel_mut(x, y);
            for channel in 0..3 {
                pixel[channel] = (pixel[channel] as f32 * keep).round() as u8;
            }
        }
    }
}

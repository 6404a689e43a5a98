//! In-terminal image previews drawn with upper half-blocks: each cell shows two
//! vertically stacked pixels, the top one as foreground and the bottom one as
//! background colour.

use crate::model::ImageBlob;
use image::{imageops::FilterType, DynamicImage};
use ratatui::{
    style::{Color, Style},
    text::{Line, Span},
};

/// Longest edge kept after decoding. Terminals never need more.
const THUMBNAIL_EDGE: u32 = 160;

pub enum Preview {
    Missing,
    Undecodable,
    Ready(DynamicImage),
}

impl Preview {
    pub fn from_blob(blob: Option<&ImageBlob>) -> Self {
        let Some(blob) = blob else {
            return Preview::Missing;
        };
        match image::load_from_memory(blob.as_bytes()) {
            Ok(img) => Preview::Ready(img.thumbnail(THUMBNAIL_EDGE, THUMBNAIL_EDGE)),
            Err(e) => {
                tracing::warn!(error = %e, bytes = blob.len(), "could not decode preview");
                Preview::Undecodable
            }
        }
    }

    /// Render into at most `width` x `height` cells, keeping the aspect ratio.
    /// `placeholder` is shown when there is nothing to draw.
    pub fn lines(&self, width: u16, height: u16, placeholder: &str) -> Vec<Line<'static>> {
        let img = match self {
            Preview::Ready(img) if width > 0 && height > 0 => img,
            Preview::Undecodable => {
                return vec![Line::from(Span::styled(
                    "Image could not be decoded",
                    Style::default().fg(Color::DarkGray),
                ))]
            }
            _ => {
                return vec![Line::from(Span::styled(
                    placeholder.to_string(),
                    Style::default().fg(Color::DarkGray),
                ))]
            }
        };

        let scaled = img
            .resize(u32::from(width), u32::from(height) * 2, FilterType::Triangle)
            .to_rgb8();
        let (w, h) = scaled.dimensions();
        (0..h)
            .step_by(2)
            .map(|y| {
                let spans: Vec<Span<'static>> = (0..w)
                    .map(|x| {
                        let top = scaled.get_pixel(x, y).0;
                        let bottom = if y + 1 < h {
                            scaled.get_pixel(x, y + 1).0
                        } else {
                            [0, 0, 0]
                        };
                        Span::styled(
                            "▀",
                            Style::default()
                                .fg(Color::Rgb(top[0], top[1], top[2]))
                                .bg(Color::Rgb(bottom[0], bottom[1], bottom[2])),
                        )
                    })
                    .collect();
                Line::from(spans)
            })
            .collect()
    }

    #[cfg(test)]
    fn dimensions(&self) -> Option<(u32, u32)> {
        match self {
            Preview::Ready(img) => Some((img.width(), img.height())),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn png(w: u32, h: u32) -> ImageBlob {
        let img = RgbImage::from_fn(w, h, |x, _| {
            if x % 2 == 0 {
                Rgb([255, 0, 0])
            } else {
                Rgb([0, 0, 255])
            }
        });
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        ImageBlob::from(out.into_inner())
    }

    #[test]
    fn large_images_are_thumbnailed() {
        let preview = Preview::from_blob(Some(&png(640, 320)));
        assert_eq!(preview.dimensions(), Some((160, 80)));
    }

    #[test]
    fn rendering_fits_the_area() {
        let preview = Preview::from_blob(Some(&png(40, 40)));
        let lines = preview.lines(10, 4, "none");
        assert!(lines.len() <= 4);
        assert!(lines.iter().all(|l| l.spans.len() <= 10));
        assert!(lines[0].spans.iter().all(|s| s.content == "▀"));
    }

    #[test]
    fn placeholders_for_missing_and_garbage() {
        let missing = Preview::from_blob(None);
        assert_eq!(
            missing.lines(10, 4, "No annotated image")[0].spans[0].content,
            "No annotated image"
        );

        let garbage = Preview::from_blob(Some(&ImageBlob::from(vec![1u8, 2, 3])));
        assert!(matches!(garbage, Preview::Undecodable));
        assert_eq!(
            garbage.lines(10, 4, "x")[0].spans[0].content,
            "Image could not be decoded"
        );
    }
}

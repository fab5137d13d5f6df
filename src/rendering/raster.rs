//! Rasterize a vertical window of a display list
//!
//! Text is drawn as solid glyph cells on the layout's character grid; there
//! is no font rasterization. SVG output carries real `<text>` elements.

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{DynamicImage, ExtendedColorType, ImageEncoder, Rgba as Pixel, RgbaImage};

use crate::planner::SplitPosition;
use crate::rendering::layout::{CHAR_WIDTH, LINE_HEIGHT};
use crate::rendering::paint::{DisplayList, PaintCommand, Rgba};
use crate::rendering::Screenshot;
use crate::{Error, ExportFormat, Result};

/// Visible part of a glyph cell at scale 1
const GLYPH_HEIGHT: u32 = 7;

/// Render the band `window` of `list` at `scale` and encode it as `format`.
pub fn render_window(
    list: &DisplayList,
    window: SplitPosition,
    scale: f64,
    format: ExportFormat,
    jpeg_quality: u8,
) -> Result<Screenshot> {
    if !scale.is_finite() || scale <= 0.0 {
        return Err(Error::RenderError(format!("invalid scale {}", scale)));
    }
    let width = ((list.width as f64 * scale).ceil() as u32).max(1);
    let height = ((window.height * scale).ceil() as u32).max(1);

    let data = match format {
        ExportFormat::Svg => render_svg(list, window, width, height).into_bytes(),
        ExportFormat::Png => {
            let mut img = paint_pixels(list, window, scale, width, height);
            mask_corners(&mut img, list, window, scale);
            let mut buf = Vec::new();
            PngEncoder::new(&mut buf)
                .write_image(img.as_raw(), width, height, ExtendedColorType::Rgba8)
                .map_err(|e| Error::RenderError(format!("PNG encoding failed: {}", e)))?;
            buf
        }
        ExportFormat::Jpeg => {
            // No alpha channel: corners keep the background colour
            let img = paint_pixels(list, window, scale, width, height);
            let rgb = DynamicImage::ImageRgba8(img).to_rgb8();
            let mut buf = Vec::new();
            JpegEncoder::new_with_quality(&mut buf, jpeg_quality)
                .write_image(rgb.as_raw(), width, height, ExtendedColorType::Rgb8)
                .map_err(|e| Error::RenderError(format!("JPEG encoding failed: {}", e)))?;
            buf
        }
    };

    Ok(Screenshot { width, height, data })
}

fn paint_pixels(list: &DisplayList, window: SplitPosition, scale: f64, width: u32, height: u32) -> RgbaImage {
    let bg = list.background;
    let mut img = RgbaImage::from_pixel(width, height, Pixel([bg.0, bg.1, bg.2, bg.3]));

    for cmd in &list.commands {
        match cmd {
            PaintCommand::SolidRect { x, y, width: w, height: h, rgba } => {
                fill_rect(&mut img, *x as f64, *y as f64 - window.start_y, *w as f64, *h as f64, scale, *rgba);
            }
            PaintCommand::Text { x, y, text, scale: s, rgba } => {
                let cell = (CHAR_WIDTH * s) as f64;
                let glyph_h = (GLYPH_HEIGHT * s) as f64;
                let top = *y as f64 - window.start_y + (LINE_HEIGHT * s - GLYPH_HEIGHT * s) as f64 / 2.0;
                // skip lines entirely outside the window
                if top + glyph_h < 0.0 || top > window.height {
                    continue;
                }
                for (i, ch) in text.chars().enumerate() {
                    if ch.is_whitespace() {
                        continue;
                    }
                    let gx = *x as f64 + i as f64 * cell + *s as f64;
                    fill_rect(&mut img, gx, top, cell - 2.0 * *s as f64, glyph_h, scale, *rgba);
                }
            }
        }
    }
    img
}

/// Fill a rectangle given in window-relative CSS pixels, blending by alpha.
fn fill_rect(img: &mut RgbaImage, x: f64, y: f64, w: f64, h: f64, scale: f64, rgba: Rgba) {
    if rgba.3 == 0 || w <= 0.0 || h <= 0.0 {
        return;
    }
    let x0 = (x * scale).floor().max(0.0) as u32;
    let y0 = (y * scale).floor().max(0.0) as u32;
    let x1 = ((x + w) * scale).ceil().clamp(0.0, img.width() as f64) as u32;
    let y1 = ((y + h) * scale).ceil().clamp(0.0, img.height() as f64) as u32;

    for py in y0..y1 {
        for px in x0..x1 {
            let dst = img.get_pixel_mut(px, py);
            *dst = blend(dst.0, rgba);
        }
    }
}

fn blend(dst: [u8; 4], src: Rgba) -> Pixel<u8> {
    if src.3 == 255 {
        return Pixel([src.0, src.1, src.2, 255]);
    }
    let a = src.3 as f32 / 255.0;
    let mix = |s: u8, d: u8| (s as f32 * a + d as f32 * (1.0 - a)).round() as u8;
    let out_a = (src.3 as f32 + dst[3] as f32 * (1.0 - a)).round().min(255.0) as u8;
    Pixel([mix(src.0, dst[0]), mix(src.1, dst[1]), mix(src.2, dst[2]), out_a])
}

/// Clear the pixels outside the card's rounded corners.
fn mask_corners(img: &mut RgbaImage, list: &DisplayList, window: SplitPosition, scale: f64) {
    let r = list.corner_radius as f64;
    if r <= 0.0 {
        return;
    }
    let (card_w, card_h) = (list.width as f64, list.height as f64);

    for py in 0..img.height() {
        let cy = (py as f64 + 0.5) / scale + window.start_y;
        let center_y = if cy < r {
            r
        } else if cy > card_h - r {
            card_h - r
        } else {
            continue;
        };
        for px in 0..img.width() {
            let cx = (px as f64 + 0.5) / scale;
            let center_x = if cx < r {
                r
            } else if cx > card_w - r {
                card_w - r
            } else {
                continue;
            };
            let (dx, dy) = (cx - center_x, cy - center_y);
            if dx * dx + dy * dy > r * r {
                img.put_pixel(px, py, Pixel([0, 0, 0, 0]));
            }
        }
    }
}

fn render_svg(list: &DisplayList, window: SplitPosition, width: u32, height: u32) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{}\" height=\"{}\" viewBox=\"0 {} {} {}\">",
        width, height, window.start_y, list.width, window.height
    ));
    out.push_str(&format!(
        "<defs><clipPath id=\"card\"><rect x=\"0\" y=\"0\" width=\"{}\" height=\"{}\" rx=\"{}\"/></clipPath></defs>",
        list.width, list.height, list.corner_radius
    ));
    out.push_str("<g clip-path=\"url(#card)\">");
    out.push_str(&format!(
        "<rect x=\"0\" y=\"0\" width=\"{}\" height=\"{}\" fill=\"{}\"/>",
        list.width,
        list.height,
        svg_color(list.background)
    ));
    for cmd in &list.commands {
        match cmd {
            PaintCommand::SolidRect { x, y, width, height, rgba } => out.push_str(&format!(
                "<rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" fill=\"{}\"/>",
                x,
                y,
                width,
                height,
                svg_color(*rgba)
            )),
            PaintCommand::Text { x, y, text, scale, rgba } => out.push_str(&format!(
                "<text x=\"{}\" y=\"{}\" font-family=\"monospace\" font-size=\"{}\" fill=\"{}\">{}</text>",
                x,
                y + (LINE_HEIGHT * scale) as i32 - *scale as i32,
                LINE_HEIGHT * scale,
                svg_color(*rgba),
                escape_xml(text)
            )),
        }
    }
    out.push_str("</g></svg>");
    out
}

fn svg_color(c: Rgba) -> String {
    if c.3 == 255 {
        format!("#{:02x}{:02x}{:02x}", c.0, c.1, c.2)
    } else {
        format!("rgba({},{},{},{:.3})", c.0, c.1, c.2, c.3 as f64 / 255.0)
    }
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

//! Paint commands and card decorations

use crate::rendering::layout::{ElementType, Layout, CHAR_WIDTH, LINE_HEIGHT, PAGE_PADDING};
use crate::{Error, ExportConfig, Result, WatermarkPosition};

/// Straight (non-premultiplied) RGBA
pub type Rgba = (u8, u8, u8, u8);

pub const TEXT_COLOR: Rgba = (0, 0, 0, 255);
const MUTED_COLOR: Rgba = (136, 136, 136, 255);
const RULE_COLOR: Rgba = (204, 204, 204, 255);
const CODE_BACKGROUND: Rgba = (246, 248, 250, 255);
const QUOTE_BAR: Rgba = (221, 221, 221, 255);

#[derive(Debug, Clone, PartialEq)]
pub enum PaintCommand {
    SolidRect {
        x: i32,
        y: i32,
        width: u32,
        height: u32,
        rgba: Rgba,
    },
    Text {
        x: i32,
        y: i32,
        text: String,
        scale: u32,
        rgba: Rgba,
    },
}

/// Everything needed to paint any window of a card
#[derive(Debug, Clone)]
pub struct DisplayList {
    pub width: u32,
    pub height: u32,
    pub background: Rgba,
    pub corner_radius: u32,
    pub commands: Vec<PaintCommand>,
}

/// Visual extras layered on top of the content
#[derive(Debug, Clone, PartialEq)]
pub struct Decorations {
    pub background: Rgba,
    pub border: Option<Rgba>,
    pub corner_radius: u32,
    pub watermark: Option<(String, WatermarkPosition, Rgba)>,
    pub theme_label: Option<String>,
}

impl Default for Decorations {
    fn default() -> Self {
        Self {
            background: (255, 255, 255, 255),
            border: None,
            corner_radius: 0,
            watermark: None,
            theme_label: None,
        }
    }
}

impl Decorations {
    pub fn from_config(config: &ExportConfig) -> Result<Self> {
        let border = if config.border {
            Some(parse_color(&config.border_color)?)
        } else {
            None
        };
        let watermark = match &config.watermark {
            Some(w) if !w.text.trim().is_empty() => {
                let color = match w.color.as_deref() {
                    Some(c) => parse_color(c)?,
                    None => MUTED_COLOR,
                };
                // rendered at half opacity
                Some((w.text.clone(), w.position, (color.0, color.1, color.2, color.3 / 2)))
            }
            _ => None,
        };
        Ok(Self {
            background: parse_color(&config.background_color)?,
            border,
            corner_radius: config.border_radius,
            watermark,
            theme_label: config.theme_name.clone().filter(|t| !t.trim().is_empty()),
        })
    }
}

/// Parse `#rgb`, `#rrggbb`, `#rrggbbaa` or one of a few named colours.
pub fn parse_color(s: &str) -> Result<Rgba> {
    let s = s.trim();
    match s.to_ascii_lowercase().as_str() {
        "white" => return Ok((255, 255, 255, 255)),
        "black" => return Ok((0, 0, 0, 255)),
        "transparent" => return Ok((0, 0, 0, 0)),
        _ => {}
    }
    let hex = s
        .strip_prefix('#')
        .ok_or_else(|| Error::ConfigError(format!("unsupported colour '{}'", s)))?;
    let digits: Vec<u8> = hex
        .chars()
        .map(|c| c.to_digit(16).map(|d| d as u8))
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| Error::ConfigError(format!("invalid hex colour '{}'", s)))?;
    match digits.as_slice() {
        [r, g, b] => Ok((r * 17, g * 17, b * 17, 255)),
        [r1, r2, g1, g2, b1, b2] => Ok((r1 * 16 + r2, g1 * 16 + g2, b1 * 16 + b2, 255)),
        [r1, r2, g1, g2, b1, b2, a1, a2] => {
            Ok((r1 * 16 + r2, g1 * 16 + g2, b1 * 16 + b2, a1 * 16 + a2))
        }
        _ => Err(Error::ConfigError(format!("invalid hex colour '{}'", s))),
    }
}

/// Build the display list for a laid-out card.
pub fn build_display_list(layout: &Layout, deco: &Decorations) -> DisplayList {
    let mut commands = Vec::new();

    for node in &layout.nodes {
        let r = &node.lb.rect;
        let pad = node.lb.box_model.padding as i32;
        let mut text_x = r.x + pad;
        let mut color = TEXT_COLOR;

        match node.elem_type {
            ElementType::Rule => {
                commands.push(PaintCommand::SolidRect {
                    x: r.x,
                    y: r.y,
                    width: r.width,
                    height: r.height,
                    rgba: RULE_COLOR,
                });
                continue;
            }
            ElementType::Code => commands.push(PaintCommand::SolidRect {
                x: r.x,
                y: r.y,
                width: r.width,
                height: r.height,
                rgba: CODE_BACKGROUND,
            }),
            ElementType::Quote => {
                commands.push(PaintCommand::SolidRect {
                    x: r.x,
                    y: r.y,
                    width: 3,
                    height: r.height,
                    rgba: QUOTE_BAR,
                });
                text_x += 4;
                color = MUTED_COLOR;
            }
            ElementType::Footer => {
                commands.push(PaintCommand::SolidRect {
                    x: r.x,
                    y: r.y,
                    width: r.width,
                    height: 1,
                    rgba: RULE_COLOR,
                });
                color = MUTED_COLOR;
            }
            _ => {}
        }

        let line_step = (LINE_HEIGHT * node.scale) as i32;
        for (i, line) in node.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            commands.push(PaintCommand::Text {
                x: text_x,
                y: r.y + pad + i as i32 * line_step,
                text: line.to_string(),
                scale: node.scale,
                rgba: color,
            });
        }
    }

    if let Some(label) = &deco.theme_label {
        let text = format!("Theme: {}", label);
        let w = text_width(&text);
        commands.push(PaintCommand::Text {
            x: layout.width as i32 - PAGE_PADDING as i32 - w,
            y: PAGE_PADDING as i32,
            text,
            scale: 1,
            rgba: MUTED_COLOR,
        });
    }

    if let Some((text, position, rgba)) = &deco.watermark {
        let w = text_width(text);
        let margin = PAGE_PADDING as i32;
        let right = layout.width as i32 - margin - w;
        let bottom = layout.height as i32 - margin - LINE_HEIGHT as i32;
        let (x, y) = match position {
            WatermarkPosition::TopLeft => (margin, margin),
            WatermarkPosition::TopRight => (right, margin),
            WatermarkPosition::BottomLeft => (margin, bottom),
            WatermarkPosition::BottomRight => (right, bottom),
        };
        commands.push(PaintCommand::Text {
            x,
            y,
            text: text.clone(),
            scale: 1,
            rgba: *rgba,
        });
    }

    if let Some(rgba) = deco.border {
        let (w, h) = (layout.width, layout.height);
        for (x, y, width, height) in [(0, 0, w, 1), (0, h as i32 - 1, w, 1), (0, 0, 1, h), (w as i32 - 1, 0, 1, h)] {
            commands.push(PaintCommand::SolidRect { x, y, width, height, rgba });
        }
    }

    DisplayList {
        width: layout.width,
        height: layout.height,
        background: deco.background,
        corner_radius: deco.corner_radius,
        commands,
    }
}

fn text_width(text: &str) -> i32 {
    (text.chars().count() as u32 * CHAR_WIDTH) as i32
}

//! Block layout for card HTML
//!
//! Blocks are stacked top to bottom with fixed margins and padding, text is
//! wrapped on a monospace character grid. Every block gets a stable vertical
//! extent; there is no inline formatting.

use scraper::{ElementRef, Html, Selector};

/// Horizontal advance of one character at scale 1
pub const CHAR_WIDTH: u32 = 8;
/// Height of one text line at scale 1
pub const LINE_HEIGHT: u32 = 10;
/// Padding around the whole card
pub const PAGE_PADDING: u32 = 8;

const FOOTER_HEIGHT: u32 = 40;

#[derive(Debug, Clone, PartialEq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn bottom(&self) -> i32 {
        self.y + self.height as i32
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoxModel {
    pub margin: u32,
    pub border: u32,
    pub padding: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutBox {
    pub rect: Rect,
    pub box_model: BoxModel,
}

impl LayoutBox {
    pub fn content_width(&self) -> u32 {
        let total = self.box_model.border + self.box_model.padding;
        self.rect.width.saturating_sub(total * 2)
    }
}

/// Kind of block a layout node was produced from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    /// `h1`..`h6`, carrying the level
    Heading(u8),
    Paragraph,
    /// `ul` or `ol`
    List,
    Quote,
    Code,
    Table,
    /// `hr`
    Rule,
    /// Author footer appended by decorations
    Footer,
    /// Any other top-level element with text
    Other,
}

impl ElementType {
    /// Blocks the auto split mode may cut between
    pub fn is_split_candidate(&self) -> bool {
        matches!(
            self,
            ElementType::Heading(_)
                | ElementType::Paragraph
                | ElementType::List
                | ElementType::Quote
                | ElementType::Code
                | ElementType::Table
        )
    }

    fn text_scale(&self) -> u32 {
        match self {
            ElementType::Heading(1) => 3,
            ElementType::Heading(2) => 2,
            _ => 1,
        }
    }

    fn padding(&self) -> u32 {
        match self {
            ElementType::Heading(_) | ElementType::Quote | ElementType::Code => 8,
            ElementType::Rule => 0,
            _ => 6,
        }
    }

    fn margin(&self) -> u32 {
        match self {
            ElementType::Heading(_) | ElementType::Rule => 8,
            _ => 6,
        }
    }
}

/// A laid-out block: its box, the rendered (already wrapped) text and kind
#[derive(Debug, Clone)]
pub struct LayoutNode {
    pub lb: LayoutBox,
    pub text: String,
    pub elem_type: ElementType,
    pub scale: u32,
}

impl LayoutNode {
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.text.lines()
    }
}

/// Laid-out card: blocks in document order plus the full content size
#[derive(Debug, Clone)]
pub struct Layout {
    pub width: u32,
    pub height: u32,
    pub nodes: Vec<LayoutNode>,
}

impl Layout {
    fn recompute_height(&mut self) {
        let bottom = self
            .nodes
            .last()
            .map(|n| n.lb.rect.bottom().max(0) as u32)
            .unwrap_or(PAGE_PADDING);
        self.height = bottom + PAGE_PADDING;
    }

    /// Append the author footer below the last block.
    pub fn append_footer(&mut self, author: &str) {
        let y = self
            .nodes
            .last()
            .map(|n| n.lb.rect.bottom() + n.lb.box_model.margin as i32)
            .unwrap_or(PAGE_PADDING as i32);
        self.nodes.push(LayoutNode {
            lb: LayoutBox {
                rect: Rect {
                    x: PAGE_PADDING as i32,
                    y,
                    width: self.width.saturating_sub(PAGE_PADDING * 2),
                    height: FOOTER_HEIGHT,
                },
                box_model: BoxModel {
                    margin: 0,
                    border: 1,
                    padding: 12,
                },
            },
            text: format!("{}  Made with Obsidian", author.trim()),
            elem_type: ElementType::Footer,
            scale: 1,
        });
        self.recompute_height();
    }
}

/// Lay out the blocks of `document` for a card `width` pixels wide.
/// - Wrapper elements (`div`, `section`, ...) are descended into
/// - Headings are scaled (h1 x3, h2 x2), everything else is scale 1
/// - `pre` keeps its own line breaks; tables render one line per row
pub fn layout_document(document: &Html, width: u32) -> Layout {
    let body_sel = Selector::parse("body").unwrap();
    let root = document
        .select(&body_sel)
        .next()
        .unwrap_or_else(|| document.root_element());

    let mut blocks = Vec::new();
    collect_blocks(root, &mut blocks);

    let block_width = width.saturating_sub(PAGE_PADDING * 2);
    let mut y = PAGE_PADDING;
    let mut nodes = Vec::with_capacity(blocks.len());

    for (elem_type, el) in blocks {
        let scale = elem_type.text_scale();
        let padding = elem_type.padding();
        let margin = elem_type.margin();
        let content_w = block_width.saturating_sub(padding * 2);
        let chars_per_line = ((content_w / (CHAR_WIDTH * scale)) as usize).max(1);

        let text = block_text(elem_type, el, chars_per_line);
        let box_h = if elem_type == ElementType::Rule {
            2
        } else {
            let lines_count = (text.lines().count() as u32).max(1);
            lines_count * LINE_HEIGHT * scale + padding * 2
        };

        nodes.push(LayoutNode {
            lb: LayoutBox {
                rect: Rect {
                    x: PAGE_PADDING as i32,
                    y: y as i32,
                    width: block_width,
                    height: box_h,
                },
                box_model: BoxModel {
                    margin,
                    border: 0,
                    padding,
                },
            },
            text,
            elem_type,
            scale,
        });
        y += box_h + margin;
    }

    let mut layout = Layout {
        width,
        height: 0,
        nodes,
    };
    layout.recompute_height();
    layout
}

fn collect_blocks<'a>(el: ElementRef<'a>, out: &mut Vec<(ElementType, ElementRef<'a>)>) {
    for child in el.children().filter_map(ElementRef::wrap) {
        let name = child.value().name();
        let kind = match name {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                ElementType::Heading(name[1..].parse().unwrap_or(6))
            }
            "p" => ElementType::Paragraph,
            "ul" | "ol" => ElementType::List,
            "blockquote" => ElementType::Quote,
            "pre" => ElementType::Code,
            "table" => ElementType::Table,
            "hr" => ElementType::Rule,
            "div" | "section" | "article" | "main" | "header" | "footer" | "body" => {
                collect_blocks(child, out);
                continue;
            }
            "head" | "title" | "style" | "script" | "template" => continue,
            _ => {
                if collapse_whitespace(&child.text().collect::<String>()).is_empty() {
                    continue;
                }
                ElementType::Other
            }
        };
        out.push((kind, child));
    }
}

fn block_text(kind: ElementType, el: ElementRef<'_>, chars_per_line: usize) -> String {
    match kind {
        ElementType::Rule => String::new(),
        ElementType::Code => {
            let raw = el.text().collect::<String>();
            raw.trim_end_matches('\n').to_string()
        }
        ElementType::List => {
            let ordered = el.value().name() == "ol";
            let mut lines = Vec::new();
            let items = el
                .children()
                .filter_map(ElementRef::wrap)
                .filter(|c| c.value().name() == "li");
            for (i, li) in items.enumerate() {
                let marker = if ordered { format!("{}. ", i + 1) } else { "* ".to_string() };
                let text = collapse_whitespace(&li.text().collect::<String>());
                let wrapped = wrap_text(&text, chars_per_line.saturating_sub(marker.len()).max(1));
                for (j, line) in wrapped.into_iter().enumerate() {
                    if j == 0 {
                        lines.push(format!("{}{}", marker, line));
                    } else {
                        lines.push(format!("{}{}", " ".repeat(marker.len()), line));
                    }
                }
            }
            lines.join("\n")
        }
        ElementType::Table => {
            let row_sel = Selector::parse("tr").unwrap();
            let cell_sel = Selector::parse("th, td").unwrap();
            el.select(&row_sel)
                .map(|row| {
                    row.select(&cell_sel)
                        .map(|c| collapse_whitespace(&c.text().collect::<String>()))
                        .collect::<Vec<_>>()
                        .join(" | ")
                })
                .collect::<Vec<_>>()
                .join("\n")
        }
        _ => {
            let text = collapse_whitespace(&el.text().collect::<String>());
            wrap_text(&text, chars_per_line).join("\n")
        }
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Greedy word wrap; words longer than a line are hard-broken.
pub fn wrap_text(text: &str, chars_per_line: usize) -> Vec<String> {
    let limit = chars_per_line.max(1);
    let mut lines = Vec::new();
    let mut cur = String::new();
    let mut cur_len = 0usize;

    for word in text.split_whitespace() {
        let mut chars: Vec<char> = word.chars().collect();
        while chars.len() > limit {
            if cur_len > 0 {
                lines.push(std::mem::take(&mut cur));
                cur_len = 0;
            }
            let rest = chars.split_off(limit);
            lines.push(chars.into_iter().collect());
            chars = rest;
        }
        let word_len = chars.len();
        if cur_len > 0 && cur_len + 1 + word_len > limit {
            lines.push(std::mem::take(&mut cur));
            cur_len = 0;
        }
        if cur_len > 0 {
            cur.push(' ');
            cur_len += 1;
        }
        cur.extend(chars);
        cur_len += word_len;
    }
    if cur_len > 0 {
        lines.push(cur);
    }
    lines
}

/// Split a rendered note into cards, one per `<h2>` section.
///
/// Content before the first `<h2>` becomes its own card when it has any
/// text; a note without `<h2>` is a single card.
pub fn split_cards(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let body_sel = Selector::parse("body").unwrap();
    let root = document
        .select(&body_sel)
        .next()
        .unwrap_or_else(|| document.root_element());

    let mut cards = Vec::new();
    let mut current = String::new();
    let mut current_has_content = false;

    for child in root.children() {
        if let Some(el) = ElementRef::wrap(child) {
            if el.value().name() == "h2" && current_has_content {
                cards.push(std::mem::take(&mut current));
                current_has_content = false;
            }
            let is_void = el.value().name() == "hr" || el.value().name() == "img";
            if is_void || !collapse_whitespace(&el.text().collect::<String>()).is_empty() {
                current_has_content = true;
            }
            current.push_str(&el.html());
        } else if let Some(text) = child.value().as_text() {
            let text = collapse_whitespace(text);
            if !text.is_empty() {
                current.push_str(&format!("<p>{}</p>", escape_text(&text)));
                current_has_content = true;
            }
        }
    }
    if current_has_content {
        cards.push(current);
    }
    cards
}

fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

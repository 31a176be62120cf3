//! Page layout: turns parsed blocks into positioned drawing operations.
//!
//! Greedy word wrap against the Helvetica metric tables, a vertical cursor
//! that opens a new page whenever the next line would cross the bottom
//! margin, and theme-driven decorations (title band, heading rules, footer).
//! Coordinates in `DrawOp` are PDF user space: origin bottom-left, points.

use crate::render::encoding::encode_winansi;
use crate::render::font_metrics::FontVariant;
use crate::render::markdown::{Block, Emphasis, Inline};
use crate::render::Theme;

/// A4 in points.
pub const PAGE_WIDTH: f32 = 595.28;
pub const PAGE_HEIGHT: f32 = 841.89;

const LINE_SPACING: f32 = 1.35;
const LIST_INDENT: f32 = 16.0;
const BULLET_GUTTER: f32 = 12.0;
const NUMBER_GUTTER: f32 = 18.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb(pub f32, pub f32, pub f32);

impl Rgb {
    pub const BLACK: Rgb = Rgb(0.0, 0.0, 0.0);
    pub const WHITE: Rgb = Rgb(1.0, 1.0, 1.0);
}

/// Page size and margins, in points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub width: f32,
    pub height: f32,
    pub margin_left: f32,
    pub margin_right: f32,
    pub margin_top: f32,
    pub margin_bottom: f32,
}

impl Default for PageGeometry {
    fn default() -> Self {
        Self {
            width: PAGE_WIDTH,
            height: PAGE_HEIGHT,
            margin_left: 50.0,
            margin_right: 50.0,
            margin_top: 56.0,
            margin_bottom: 56.0,
        }
    }
}

impl PageGeometry {
    pub fn text_width(&self) -> f32 {
        self.width - self.margin_left - self.margin_right
    }

    fn bottom_limit(&self) -> f32 {
        self.height - self.margin_bottom
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Text {
        x: f32,
        y: f32,
        font: FontVariant,
        size: f32,
        color: Rgb,
        bytes: Vec<u8>,
    },
    Line {
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
        width: f32,
        color: Rgb,
    },
    Rect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        color: Rgb,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub ops: Vec<DrawOp>,
}

impl Page {
    /// Concatenated text bytes of the page, one op per line.
    #[cfg(test)]
    pub fn text(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for op in &self.ops {
            if let DrawOp::Text { bytes, .. } = op {
                out.extend_from_slice(bytes);
                out.push(b'\n');
            }
        }
        out
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Word wrapping
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Word {
    pub font: FontVariant,
    pub bytes: Vec<u8>,
    pub width: f32,
    /// Whether whitespace separated this word from the previous one. Words
    /// without it (e.g. `**Acme**Corp`) are kept on the same line.
    pub space_before: bool,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(Word),
    Break,
}

fn variant_for(base: FontVariant, emphasis: Emphasis) -> FontVariant {
    match (emphasis, base) {
        (Emphasis::Regular, base) => base,
        (Emphasis::Bold, base) => base.bold(),
        (Emphasis::Italic, FontVariant::Bold | FontVariant::BoldItalic) => FontVariant::BoldItalic,
        (Emphasis::Italic, _) => FontVariant::Italic,
    }
}

fn tokenize(content: &[Inline], base: FontVariant, size: f32) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut space_pending = false;

    for inline in content {
        let (font, text) = match inline {
            Inline::Run(emphasis, text) => (variant_for(base, *emphasis), text),
            Inline::Break => {
                tokens.push(Token::Break);
                space_pending = false;
                continue;
            }
        };

        let metrics = font.metrics();
        let push_word = |bytes: Vec<u8>, space_before: bool, tokens: &mut Vec<Token>| {
            let width = metrics.measure(&bytes, size);
            tokens.push(Token::Word(Word {
                font,
                bytes,
                width,
                space_before,
            }));
        };

        let mut current: Vec<u8> = Vec::new();
        let mut current_space = false;
        for byte in encode_winansi(text) {
            if byte == b' ' {
                if !current.is_empty() {
                    push_word(std::mem::take(&mut current), current_space, &mut tokens);
                }
                space_pending = true;
            } else {
                if current.is_empty() {
                    current_space = space_pending;
                    space_pending = false;
                }
                current.push(byte);
            }
        }
        if !current.is_empty() {
            push_word(current, current_space, &mut tokens);
        }
    }
    tokens
}

struct Wrapper {
    lines: Vec<Vec<Word>>,
    current: Vec<Word>,
    used: f32,
    first_width: f32,
    rest_width: f32,
    size: f32,
}

impl Wrapper {
    fn limit(&self) -> f32 {
        if self.lines.is_empty() {
            self.first_width
        } else {
            self.rest_width
        }
    }

    fn break_line(&mut self) {
        self.lines.push(std::mem::take(&mut self.current));
        self.used = 0.0;
    }

    fn push(&mut self, word: Word, advance: f32) {
        self.current.push(word);
        self.used += advance;
    }

    /// Places a run of glued words, breaking before it if it does not fit.
    fn place(&mut self, unit: Vec<Word>) {
        let unit_width: f32 = unit.iter().map(|w| w.width).sum();
        let space = if self.current.is_empty() {
            0.0
        } else {
            unit[0].font.metrics().space(self.size)
        };

        if self.used + space + unit_width <= self.limit() {
            let mut advance = space;
            for word in unit {
                advance += word.width;
                self.push(word, std::mem::take(&mut advance));
            }
            return;
        }

        if !self.current.is_empty() {
            self.break_line();
        }

        if unit_width <= self.limit() {
            for word in unit {
                let width = word.width;
                self.push(word, width);
            }
            return;
        }

        for word in unit {
            self.place_split(word);
        }
    }

    /// Hard-splits a word wider than the line.
    fn place_split(&mut self, word: Word) {
        let metrics = word.font.metrics();
        let mut chunk: Vec<u8> = Vec::new();
        let mut chunk_width = 0.0;

        for byte in word.bytes {
            let width = metrics.measure(&[byte], self.size);
            let occupied = !chunk.is_empty() || !self.current.is_empty();
            if occupied && self.used + chunk_width + width > self.limit() {
                if !chunk.is_empty() {
                    let piece = Word {
                        font: word.font,
                        bytes: std::mem::take(&mut chunk),
                        width: chunk_width,
                        space_before: false,
                    };
                    self.push(piece, chunk_width);
                }
                self.break_line();
                chunk_width = 0.0;
            }
            chunk.push(byte);
            chunk_width += width;
        }

        if !chunk.is_empty() {
            let piece = Word {
                font: word.font,
                bytes: chunk,
                width: chunk_width,
                space_before: false,
            };
            self.push(piece, chunk_width);
        }
    }

    fn finish(mut self) -> Vec<Vec<Word>> {
        if !self.current.is_empty() || self.lines.is_empty() {
            self.lines.push(self.current);
        }
        self.lines
    }
}

/// Wraps inline content into lines no wider than `first_width` (first line)
/// and `rest_width` (following lines), preferring word boundaries.
pub fn wrap(
    content: &[Inline],
    base: FontVariant,
    size: f32,
    first_width: f32,
    rest_width: f32,
) -> Vec<Vec<Word>> {
    let mut wrapper = Wrapper {
        lines: Vec::new(),
        current: Vec::new(),
        used: 0.0,
        first_width,
        rest_width,
        size,
    };

    let mut unit: Vec<Word> = Vec::new();
    for token in tokenize(content, base, size) {
        match token {
            Token::Word(word) => {
                if word.space_before && !unit.is_empty() {
                    wrapper.place(std::mem::take(&mut unit));
                }
                unit.push(word);
            }
            Token::Break => {
                if !unit.is_empty() {
                    wrapper.place(std::mem::take(&mut unit));
                }
                wrapper.break_line();
            }
        }
    }
    if !unit.is_empty() {
        wrapper.place(unit);
    }
    wrapper.finish()
}

/// Rendered width of a wrapped line.
pub fn line_width(line: &[Word], size: f32) -> f32 {
    line.iter()
        .enumerate()
        .map(|(i, w)| {
            if i > 0 && w.space_before {
                w.width + w.font.metrics().space(size)
            } else {
                w.width
            }
        })
        .sum()
}

// ────────────────────────────────────────────────────────────────────────────
// Page composition
// ────────────────────────────────────────────────────────────────────────────

/// Something drawn in the left gutter of a list item's first line.
struct Marker {
    bytes: Vec<u8>,
    x: f32,
}

struct TextStyle {
    font: FontVariant,
    size: f32,
    color: Rgb,
}

pub struct LayoutEngine<'a> {
    theme: &'a Theme,
    geometry: PageGeometry,
    pages: Vec<Page>,
    /// Distance from the top edge of the current page.
    cursor: f32,
}

impl<'a> LayoutEngine<'a> {
    pub fn new(theme: &'a Theme, geometry: PageGeometry) -> Self {
        Self {
            theme,
            geometry,
            pages: vec![Page::default()],
            cursor: geometry.margin_top,
        }
    }

    fn page(&mut self) -> &mut Page {
        let last = self.pages.len() - 1;
        &mut self.pages[last]
    }

    fn at_page_top(&self) -> bool {
        self.cursor <= self.geometry.margin_top
    }

    fn new_page(&mut self) {
        self.pages.push(Page::default());
        self.cursor = self.geometry.margin_top;
    }

    /// Starts a new page unless `height` still fits on this one.
    fn ensure(&mut self, height: f32) {
        if !self.at_page_top() && self.cursor + height > self.geometry.bottom_limit() {
            self.new_page();
        }
    }

    fn gap(&mut self, height: f32) {
        if self.at_page_top() {
            return;
        }
        self.cursor += height;
        if self.cursor > self.geometry.bottom_limit() {
            self.new_page();
        }
    }

    fn pdf_y(&self, from_top: f32) -> f32 {
        self.geometry.height - from_top
    }

    fn emit_line(&mut self, line: &[Word], x: f32, style: &TextStyle) {
        let line_height = style.size * LINE_SPACING;
        self.ensure(line_height);
        let baseline = self.pdf_y(self.cursor + style.size);

        let mut fragments: Vec<(FontVariant, f32, Vec<u8>)> = Vec::new();
        let mut pen = x;
        for (i, word) in line.iter().enumerate() {
            let spaced = i > 0 && word.space_before;
            if spaced {
                pen += word.font.metrics().space(style.size);
            }
            let same_font = matches!(fragments.last(), Some((font, _, _)) if *font == word.font);
            match fragments.last_mut() {
                Some((_, _, bytes)) if same_font => {
                    if spaced {
                        bytes.push(b' ');
                    }
                    bytes.extend_from_slice(&word.bytes);
                }
                _ => fragments.push((word.font, pen, word.bytes.clone())),
            }
            pen += word.width;
        }

        for (font, fx, bytes) in fragments {
            self.page().ops.push(DrawOp::Text {
                x: fx,
                y: baseline,
                font,
                size: style.size,
                color: style.color,
                bytes,
            });
        }
        self.cursor += line_height;
    }

    fn text_block(&mut self, content: &[Inline], style: TextStyle, indent: f32, marker: Option<Marker>) {
        let x = self.geometry.margin_left + indent;
        let width = self.geometry.text_width() - indent;
        let lines = wrap(content, style.font, style.size, width, width);

        for (i, line) in lines.iter().enumerate() {
            self.emit_line(line, x, &style);
            if i == 0 {
                if let Some(marker) = &marker {
                    let baseline = self.pdf_y(self.cursor - style.size * LINE_SPACING + style.size);
                    self.page().ops.push(DrawOp::Text {
                        x: marker.x,
                        y: baseline,
                        font: FontVariant::Regular,
                        size: style.size,
                        color: style.color,
                        bytes: marker.bytes.clone(),
                    });
                }
            }
        }
    }

    fn horizontal_rule(&mut self, color: Rgb, width: f32) {
        self.ensure(6.0);
        self.cursor += 3.0;
        let y = self.pdf_y(self.cursor);
        let x1 = self.geometry.margin_left;
        let x2 = self.geometry.width - self.geometry.margin_right;
        self.page().ops.push(DrawOp::Line {
            x1,
            y1: y,
            x2,
            y2: y,
            width,
            color,
        });
        self.cursor += 3.0;
    }

    /// Document title at the top of the first page.
    pub fn title(&mut self, title: &str) {
        let theme = self.theme;
        let size = theme.title_size;
        let content = vec![Inline::Run(Emphasis::Regular, title.to_string())];
        let width = self.geometry.text_width();
        let lines = wrap(&content, FontVariant::Bold, size, width, width);
        let line_height = size * LINE_SPACING;

        let color = if theme.title_band {
            let padding = 14.0;
            let band_height = lines.len() as f32 * line_height + 2.0 * padding;
            let band_top = self.cursor - padding;
            let y = self.pdf_y(band_top + band_height);
            let page_width = self.geometry.width;
            self.page().ops.push(DrawOp::Rect {
                x: 0.0,
                y,
                width: page_width,
                height: band_height,
                color: theme.accent,
            });
            Rgb::WHITE
        } else {
            theme.text_color
        };

        for line in &lines {
            let x = self.geometry.margin_left + (width - line_width(line, size)).max(0.0) / 2.0;
            let style = TextStyle {
                font: FontVariant::Bold,
                size,
                color,
            };
            self.emit_line(line, x, &style);
        }
        self.cursor += if theme.title_band { 28.0 } else { 10.0 };
    }

    pub fn block(&mut self, block: &Block) {
        let theme = self.theme;
        match block {
            Block::Blank => self.gap(theme.body_size * 0.4),
            Block::Rule => {
                self.gap(2.0);
                self.horizontal_rule(theme.rule_color, 0.5);
                self.gap(2.0);
            }
            Block::Heading { level, content } => {
                let index = usize::from(level.saturating_sub(1)).min(3);
                let size = theme.heading_sizes[index];
                self.gap(theme.heading_space_before[index]);
                // keep the heading with at least one following body line
                self.ensure(size * LINE_SPACING + theme.body_size * LINE_SPACING);
                let style = TextStyle {
                    font: FontVariant::Bold,
                    size,
                    color: theme.heading_color,
                };
                self.text_block(content, style, 0.0, None);
                if theme.heading_rules && *level <= 2 {
                    self.horizontal_rule(theme.accent, 0.8);
                }
                self.gap(3.0);
            }
            Block::Paragraph(content) => {
                let style = self.body_style();
                self.text_block(content, style, 0.0, None);
                self.gap(3.0);
            }
            Block::Bullet { depth, content } => {
                let gutter = f32::from(*depth) * LIST_INDENT;
                let marker = Marker {
                    bytes: theme.bullet.to_vec(),
                    x: self.geometry.margin_left + gutter,
                };
                let style = self.body_style();
                self.text_block(content, style, gutter + BULLET_GUTTER, Some(marker));
                self.gap(2.0);
            }
            Block::Numbered {
                depth,
                label,
                content,
            } => {
                let gutter = f32::from(*depth) * LIST_INDENT;
                let bytes = encode_winansi(label);
                let label_width = FontVariant::Regular
                    .metrics()
                    .measure(&bytes, theme.body_size);
                let marker = Marker {
                    bytes,
                    x: self.geometry.margin_left + gutter,
                };
                let style = self.body_style();
                let indent = gutter + NUMBER_GUTTER.max(label_width + 4.0);
                self.text_block(content, style, indent, Some(marker));
                self.gap(2.0);
            }
        }
    }

    fn body_style(&self) -> TextStyle {
        TextStyle {
            font: FontVariant::Regular,
            size: self.theme.body_size,
            color: self.theme.text_color,
        }
    }

    /// Finishes layout, adding page-number footers when the theme asks for them.
    pub fn finish(mut self) -> Vec<Page> {
        if self.theme.page_numbers {
            let total = self.pages.len();
            let size = 9.0;
            let y = self.geometry.margin_bottom / 2.0;
            for (index, page) in self.pages.iter_mut().enumerate() {
                let label = format!("{} / {}", index + 1, total).into_bytes();
                let width = FontVariant::Regular.metrics().measure(&label, size);
                page.ops.push(DrawOp::Text {
                    x: self.geometry.width - self.geometry.margin_right - width,
                    y,
                    font: FontVariant::Regular,
                    size,
                    color: self.theme.rule_color,
                    bytes: label,
                });
            }
        }
        self.pages
    }
}

/// Lays out a whole document: title followed by every block.
pub fn layout_document(
    blocks: &[Block],
    title: &str,
    theme: &Theme,
    geometry: PageGeometry,
) -> Vec<Page> {
    let mut engine = LayoutEngine::new(theme, geometry);
    if !title.trim().is_empty() {
        engine.title(title);
    }
    for block in blocks {
        engine.block(block);
    }
    engine.finish()
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

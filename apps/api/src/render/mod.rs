// Output Formatter: markdown-flavoured generation output → paginated PDF.
// One layout engine, two rendering strategies (basic, styled).
// Rendering is CPU-bound and must run inside tokio::task::spawn_blocking.

pub mod encoding;
pub mod font_metrics;
pub mod layout;
pub mod markdown;
pub mod pdf;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::errors::AppError;
use crate::render::layout::{layout_document, PageGeometry, Rgb};

/// Visual parameters of a rendering strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct Theme {
    pub title_size: f32,
    /// Full-width accent band behind the title.
    pub title_band: bool,
    pub body_size: f32,
    /// Font sizes for heading levels 1..=4.
    pub heading_sizes: [f32; 4],
    pub heading_space_before: [f32; 4],
    /// Accent underline below level 1 and 2 headings.
    pub heading_rules: bool,
    pub page_numbers: bool,
    pub text_color: Rgb,
    pub heading_color: Rgb,
    pub accent: Rgb,
    pub rule_color: Rgb,
    /// WinAnsi bytes drawn in front of unordered list items.
    pub bullet: &'static [u8],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderStyle {
    /// Black text, centered title. Mirrors a plain cell-based report.
    Basic,
    /// Accent headings, title band and page-number footer.
    Styled,
}

#[derive(Debug, Error)]
#[error("unknown render style '{0}' (expected 'basic' or 'styled')")]
pub struct UnknownRenderStyle(String);

impl FromStr for RenderStyle {
    type Err = UnknownRenderStyle;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "basic" => Ok(RenderStyle::Basic),
            "styled" => Ok(RenderStyle::Styled),
            other => Err(UnknownRenderStyle(other.to_string())),
        }
    }
}

impl fmt::Display for RenderStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RenderStyle::Basic => "basic",
            RenderStyle::Styled => "styled",
        })
    }
}

impl RenderStyle {
    pub fn theme(&self) -> Theme {
        match self {
            RenderStyle::Basic => Theme {
                title_size: 18.0,
                title_band: false,
                body_size: 11.0,
                heading_sizes: [15.0, 14.0, 13.0, 12.0],
                heading_space_before: [6.0, 5.0, 4.0, 3.0],
                heading_rules: false,
                page_numbers: false,
                text_color: Rgb::BLACK,
                heading_color: Rgb::BLACK,
                accent: Rgb::BLACK,
                rule_color: Rgb(0.4, 0.4, 0.4),
                bullet: b"-",
            },
            RenderStyle::Styled => Theme {
                title_size: 20.0,
                title_band: true,
                body_size: 10.5,
                heading_sizes: [16.0, 14.0, 12.5, 11.5],
                heading_space_before: [10.0, 8.0, 6.0, 4.0],
                heading_rules: true,
                page_numbers: true,
                text_color: Rgb(0.17, 0.17, 0.2),
                heading_color: Rgb(0.1, 0.25, 0.45),
                accent: Rgb(0.16, 0.38, 0.62),
                rule_color: Rgb(0.55, 0.6, 0.66),
                bullet: &[0x95],
            },
        }
    }
}

/// The Output Formatter interface. Carried in `AppState` as `Arc<dyn DocumentRenderer>`.
pub trait DocumentRenderer: Send + Sync {
    fn style(&self) -> RenderStyle;

    /// Renders `text` under `title`. Never fails on text content; only
    /// serialisation failures surface, as `AppError::Io`.
    fn render(&self, text: &str, title: &str) -> Result<Vec<u8>, AppError>;
}

/// PDF renderer parameterised by a `RenderStyle`.
#[derive(Debug, Clone)]
pub struct PdfRenderer {
    style: RenderStyle,
    theme: Theme,
    geometry: PageGeometry,
}

impl PdfRenderer {
    pub fn new(style: RenderStyle) -> Self {
        Self {
            style,
            theme: style.theme(),
            geometry: PageGeometry::default(),
        }
    }
}

impl DocumentRenderer for PdfRenderer {
    fn style(&self) -> RenderStyle {
        self.style
    }

    fn render(&self, text: &str, title: &str) -> Result<Vec<u8>, AppError> {
        let blocks = markdown::parse(text);
        let pages = layout_document(&blocks, title, &self.theme, self.geometry);
        debug!(
            "Laid out {} blocks on {} pages ({} style)",
            blocks.len(),
            pages.len(),
            self.style
        );
        pdf::write_pdf(&pages, &self.geometry, title)
            .map_err(|e| AppError::Io(format!("PDF creation error: {e}")))
    }
}

/// Renders on the blocking pool.
pub async fn render_document(
    renderer: Arc<dyn DocumentRenderer>,
    text: String,
    title: String,
) -> Result<Vec<u8>, AppError> {
    tokio::task::spawn_blocking(move || renderer.render(&text, &title))
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Render task failed: {e}")))?
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

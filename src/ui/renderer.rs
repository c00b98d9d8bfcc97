//! Grid rendering for the overlay window
//!
//! Builds an [`OverlayScene`] (pure geometry in overlay-local pixels) from the
//! session grid and the current selection, then rasterizes it with tiny-skia.
//! Layout is kept separate from rasterization so it can be tested without a
//! window.

use ab_glyph::{Font, FontArc, PxScale, ScaleFont, point};
use tiny_skia::{Color, Paint, PathBuilder, Pixmap, PremultipliedColorU8, Rect as SkiaRect, Stroke, Transform};

use crate::config::settings::{OverlayPalette, Rgba};
use crate::domain::core::{Point, Rect};
use crate::domain::grid::{CellCoords, CellSpan, Grid};

/// Rendering errors
#[derive(Debug, thiserror::Error)]
pub enum RendererError {
    #[error("Failed to create pixmap for rendering")]
    PixmapCreationFailed,

    #[error("Invalid canvas dimensions: {width}x{height}")]
    InvalidCanvasDimensions { width: i32, height: i32 },
}

/// Axis-aligned line segment
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub width: f32,
}

/// Highlighted selection with its span label
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionVisual {
    pub rect: SkiaRect,
    pub label: String,
    pub font_size: f32,
}

/// Everything needed to draw one overlay frame
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayScene {
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub lines: Vec<Line>,
    pub selection: Option<SelectionVisual>,
    pub palette: OverlayPalette,
}

impl OverlayScene {
    /// Lays out the grid and an optional physical selection rectangle
    ///
    /// Everything is translated so the grid's area starts at (0, 0).
    pub fn build(
        grid: &Grid,
        selection: Option<Rect>,
        palette: OverlayPalette,
        dpi_scale: f32,
    ) -> Result<Self, RendererError> {
        let area = grid.area();
        if area.is_degenerate() {
            return Err(RendererError::InvalidCanvasDimensions {
                width: area.w,
                height: area.h,
            });
        }

        let origin = Point::new(area.x, area.y);
        let line_width = (2.0 * dpi_scale).max(1.0);
        let dims = grid.dimensions();
        let mut lines = Vec::new();

        // Interior boundaries come from the grid itself so they match placement exactly
        for col in 1..dims.columns {
            if let Ok(cell) = grid.cell_rect(CellCoords::new(col, 0)) {
                let x = (cell.x - origin.x) as f32;
                lines.push(Line {
                    x1: x,
                    y1: 0.0,
                    x2: x,
                    y2: area.h as f32,
                    width: line_width,
                });
            }
        }
        for row in 1..dims.rows {
            if let Ok(cell) = grid.cell_rect(CellCoords::new(0, row)) {
                let y = (cell.y - origin.y) as f32;
                lines.push(Line {
                    x1: 0.0,
                    y1: y,
                    x2: area.w as f32,
                    y2: y,
                    width: line_width,
                });
            }
        }

        let selection = selection.and_then(|rect| {
            let local = rect.relative_to(origin);
            let skia = SkiaRect::from_xywh(local.x as f32, local.y as f32, local.w as f32, local.h as f32)?;
            let span = span_of(grid, rect);
            Some(SelectionVisual {
                rect: skia,
                label: span_label(span),
                font_size: (28.0 * dpi_scale).max(18.0),
            })
        });

        Ok(Self {
            canvas_width: area.w as u32,
            canvas_height: area.h as u32,
            lines,
            selection,
            palette,
        })
    }
}

/// Cell span covered by a physical rectangle on `grid`
pub fn span_of(grid: &Grid, rect: Rect) -> CellSpan {
    let first = grid.point_to_cell(Point::new(rect.x, rect.y));
    let last = grid.point_to_cell(Point::new(rect.right() - 1, rect.bottom() - 1));
    CellSpan::between(first, last)
}

/// "columns × rows" text shown on the selection
pub fn span_label(span: CellSpan) -> String {
    format!("{} \u{00d7} {}", span.columns(), span.rows())
}

fn skia_color(c: Rgba) -> Color {
    Color::from_rgba8(c.r, c.g, c.b, c.a)
}

/// Rasterizes overlay scenes
pub struct GridRenderer {
    /// Label font; labels are skipped without one
    font: Option<FontArc>,
}

impl std::fmt::Debug for GridRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GridRenderer")
            .field("has_font", &self.font.is_some())
            .finish()
    }
}

impl GridRenderer {
    /// Loads Segoe UI from the Windows fonts directory
    pub fn new() -> Self {
        let windir = std::env::var("WINDIR").unwrap_or_else(|_| r"C:\Windows".to_string());
        let path = std::path::Path::new(&windir).join("Fonts").join("segoeui.ttf");
        let font = match std::fs::read(&path) {
            Ok(bytes) => match FontArc::try_from_vec(bytes) {
                Ok(font) => Some(font),
                Err(e) => {
                    tracing::warn!(path = %path.display(), "Unusable label font: {e}");
                    None
                }
            },
            Err(e) => {
                tracing::warn!(path = %path.display(), "Label font not found, labels disabled: {e}");
                None
            }
        };
        Self { font }
    }

    pub fn without_font() -> Self {
        Self { font: None }
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Render a scene to a fresh pixmap
    pub fn render(&self, scene: &OverlayScene) -> Result<Pixmap, RendererError> {
        let mut pixmap =
            Pixmap::new(scene.canvas_width, scene.canvas_height).ok_or(RendererError::PixmapCreationFailed)?;
        pixmap.fill(skia_color(scene.palette.background));

        if let Some(selection) = &scene.selection {
            let mut paint = Paint::default();
            paint.set_color(skia_color(scene.palette.selection_fill));
            pixmap.fill_rect(selection.rect, &paint, Transform::identity(), None);
        }

        self.render_lines(&mut pixmap, &scene.lines, scene.palette.grid_line);

        if let Some(selection) = &scene.selection {
            self.render_border(&mut pixmap, selection, scene.palette.selection_border);
            self.render_label(&mut pixmap, selection, scene.palette.label);
        }

        Ok(pixmap)
    }

    fn render_lines(&self, pixmap: &mut Pixmap, lines: &[Line], color: Rgba) {
        let mut paint = Paint::default();
        paint.set_color(skia_color(color));
        for line in lines {
            let mut path_builder = PathBuilder::new();
            path_builder.move_to(line.x1, line.y1);
            path_builder.line_to(line.x2, line.y2);
            if let Some(path) = path_builder.finish() {
                let stroke = Stroke {
                    width: line.width,
                    ..Stroke::default()
                };
                pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
            }
        }
    }

    fn render_border(&self, pixmap: &mut Pixmap, selection: &SelectionVisual, color: Rgba) {
        let width = (selection.font_size / 7.0).max(2.0);
        let inset = width / 2.0;
        let r = selection.rect;
        let Some(rect) = SkiaRect::from_ltrb(r.left() + inset, r.top() + inset, r.right() - inset, r.bottom() - inset)
        else {
            return;
        };
        let path = PathBuilder::from_rect(rect);
        let mut paint = Paint::default();
        paint.set_color(skia_color(color));
        let stroke = Stroke {
            width,
            ..Stroke::default()
        };
        pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
    }

    /// Draws the span label centred in the selection
    fn render_label(&self, pixmap: &mut Pixmap, selection: &SelectionVisual, color: Rgba) {
        let Some(font) = &self.font else {
            return;
        };
        let scale = PxScale::from(selection.font_size);
        let scaled = font.as_scaled(scale);

        let text_width: f32 = selection
            .label
            .chars()
            .map(|c| scaled.h_advance(scaled.glyph_id(c)))
            .sum();
        let rect = selection.rect;
        let left = rect.left() + (rect.width() - text_width) / 2.0;
        let baseline = rect.top() + (rect.height() - scaled.height()) / 2.0 + scaled.ascent();

        let width = pixmap.width() as i32;
        let height = pixmap.height() as i32;
        let pixels = pixmap.pixels_mut();

        let mut caret = left;
        for c in selection.label.chars() {
            let id = scaled.glyph_id(c);
            let glyph = id.with_scale_and_position(scale, point(caret, baseline));
            caret += scaled.h_advance(id);

            let Some(outlined) = font.outline_glyph(glyph) else {
                continue;
            };
            let bounds = outlined.px_bounds();
            outlined.draw(|gx, gy, coverage| {
                let x = bounds.min.x as i32 + gx as i32;
                let y = bounds.min.y as i32 + gy as i32;
                if x < 0 || y < 0 || x >= width || y >= height {
                    return;
                }
                let idx = (y * width + x) as usize;
                pixels[idx] = blend_over(pixels[idx], color, coverage);
            });
        }
    }
}

impl Default for GridRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Source-over blend of `color` at `coverage` onto a premultiplied pixel
fn blend_over(dst: PremultipliedColorU8, color: Rgba, coverage: f32) -> PremultipliedColorU8 {
    let sa = (color.a as f32 / 255.0) * coverage.clamp(0.0, 1.0);
    let inv = 1.0 - sa;
    let channel = |src: u8, dst: u8| ((src as f32 * sa) + dst as f32 * inv).round().min(255.0) as u8;
    let a = ((sa * 255.0) + dst.alpha() as f32 * inv).round().min(255.0) as u8;
    let r = channel(color.r, dst.red()).min(a);
    let g = channel(color.g, dst.green()).min(a);
    let b = channel(color.b, dst.blue()).min(a);
    PremultipliedColorU8::from_rgba(r, g, b, a).unwrap_or(dst)
}

/// Converts tiny-skia's premultiplied RGBA to the premultiplied BGRA a DIB section expects
pub fn rgba_to_bgra(rgba: &[u8], bgra: &mut [u8]) {
    for (src, dst) in rgba.chunks_exact(4).zip(bgra.chunks_exact_mut(4)) {
        dst[0] = src[2];
        dst[1] = src[1];
        dst[2] = src[0];
        dst[3] = src[3];
    }
}

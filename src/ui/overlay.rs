//! Overlay window for grid display
//!
//! One layered, top-most, click-through popup covers the work area of the
//! monitor a gesture started on. It never takes focus, so the dragged window
//! stays foreground. Frames are drawn with tiny-skia and pushed with
//! `UpdateLayeredWindow` for flicker-free per-pixel alpha.

use std::ffi::c_void;

use windows::Win32::Foundation::{COLORREF, HWND, LPARAM, LRESULT, POINT, SIZE, WPARAM};
use windows::Win32::Graphics::Gdi::{
    AC_SRC_ALPHA, AC_SRC_OVER, BI_RGB, BITMAPINFO, BITMAPINFOHEADER, BLENDFUNCTION,
    CreateCompatibleDC, CreateDIBSection, DIB_RGB_COLORS, DeleteDC, DeleteObject, GetDC, HGDIOBJ,
    ReleaseDC, SelectObject,
};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::HiDpi::GetDpiForWindow;
use windows::Win32::UI::WindowsAndMessaging::{
    CreateWindowExW, DefWindowProcW, DestroyWindow, RegisterClassW, SW_SHOWNOACTIVATE, ShowWindow,
    ULW_ALPHA, UpdateLayeredWindow, WNDCLASSW, WS_EX_LAYERED, WS_EX_NOACTIVATE, WS_EX_TOOLWINDOW,
    WS_EX_TOPMOST, WS_EX_TRANSPARENT, WS_POPUP,
};
use windows::core::w;

use crate::config::settings::OverlayPalette;
use crate::domain::core::Rect;
use crate::domain::grid::{Grid, GridDimensions, GridError};
use crate::ui::renderer::{GridRenderer, OverlayScene, RendererError, rgba_to_bgra};

/// Overlay management errors
#[derive(Debug, thiserror::Error)]
pub enum OverlayError {
    #[error("Failed to resolve module handle")]
    ModuleHandleFailed,

    #[error("Failed to create overlay window over {bounds:?}")]
    WindowCreationFailed { bounds: Rect },

    #[error("Overlay is not shown")]
    NotShown,

    #[error("Invalid overlay grid: {0}")]
    Grid(#[from] GridError),

    #[error("Failed to acquire screen device context")]
    DeviceContextFailed,

    #[error("Failed to create memory device context")]
    MemoryDeviceContextFailed,

    #[error("Failed to create DIB section for overlay frame")]
    DibSectionCreationFailed,

    #[error("Failed to select bitmap into memory DC")]
    BitmapSelectionFailed,

    #[error("Failed to update layered window surface")]
    LayerUpdateFailed,

    #[error("Rendering failed: {0}")]
    RenderingError(#[from] RendererError),
}

/// Visual surface driven by a gesture session
///
/// All rectangles are physical pixels; conversion to surface-local units is
/// the implementation's job.
pub trait OverlaySurface {
    type Error: std::fmt::Display;

    /// Shows an empty grid of `rows` × `columns` over `bounds`
    fn show(&mut self, bounds: Rect, rows: u32, columns: u32) -> Result<(), Self::Error>;

    /// Highlights `selection`
    fn set_selection(&mut self, selection: Rect) -> Result<(), Self::Error>;

    /// Hides and releases the surface; safe to call repeatedly
    fn close(&mut self);
}

/// Live window state while shown
#[derive(Debug)]
struct ShownOverlay {
    hwnd: HWND,
    grid: Grid,
    dpi_scale: f32,
}

/// Layered-window implementation of [`OverlaySurface`]
#[derive(Debug)]
pub struct LayeredOverlay {
    palette: OverlayPalette,
    renderer: GridRenderer,
    shown: Option<ShownOverlay>,
}

impl LayeredOverlay {
    pub fn new(palette: OverlayPalette) -> Self {
        Self {
            palette,
            renderer: GridRenderer::new(),
            shown: None,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.shown.is_some()
    }

    fn register_window_class() -> Result<(), OverlayError> {
        unsafe extern "system" fn overlay_window_proc(
            hwnd: HWND,
            msg: u32,
            wparam: WPARAM,
            lparam: LPARAM,
        ) -> LRESULT {
            unsafe { DefWindowProcW(hwnd, msg, wparam, lparam) }
        }

        let hinstance = unsafe { GetModuleHandleW(None) }.map_err(|_| OverlayError::ModuleHandleFailed)?;
        let wc = WNDCLASSW {
            lpfnWndProc: Some(overlay_window_proc),
            hInstance: hinstance.into(),
            lpszClassName: w!("GridSnapOverlayWindow"),
            ..Default::default()
        };

        // Zero means already registered on later gestures, which is fine
        if unsafe { RegisterClassW(&wc) } == 0 {
            tracing::trace!("Overlay window class already registered");
        }
        Ok(())
    }

    fn create_window(bounds: Rect) -> Result<HWND, OverlayError> {
        Self::register_window_class()?;
        let hinstance = unsafe { GetModuleHandleW(None) }.map_err(|_| OverlayError::ModuleHandleFailed)?;

        let hwnd = unsafe {
            CreateWindowExW(
                WS_EX_LAYERED | WS_EX_TOPMOST | WS_EX_NOACTIVATE | WS_EX_TOOLWINDOW | WS_EX_TRANSPARENT,
                w!("GridSnapOverlayWindow"),
                w!("GridSnap Overlay"),
                WS_POPUP,
                bounds.x,
                bounds.y,
                bounds.w,
                bounds.h,
                None,
                None,
                hinstance,
                None,
            )
        };

        if hwnd.0 == 0 {
            return Err(OverlayError::WindowCreationFailed { bounds });
        }
        Ok(hwnd)
    }

    fn redraw(&self, selection: Option<Rect>) -> Result<(), OverlayError> {
        let shown = self.shown.as_ref().ok_or(OverlayError::NotShown)?;
        let scene = OverlayScene::build(&shown.grid, selection, self.palette, shown.dpi_scale)?;
        let pixmap = self.renderer.render(&scene)?;
        present_pixmap(shown.hwnd, shown.grid.area(), &pixmap)
    }
}

impl OverlaySurface for LayeredOverlay {
    type Error = OverlayError;

    fn show(&mut self, bounds: Rect, rows: u32, columns: u32) -> Result<(), OverlayError> {
        self.close();
        let grid = Grid::new(bounds, GridDimensions::new(rows, columns)?)?;
        let hwnd = Self::create_window(bounds)?;
        let dpi = unsafe { GetDpiForWindow(hwnd) };
        let dpi_scale = if dpi == 0 { 1.0 } else { dpi as f32 / 96.0 };

        self.shown = Some(ShownOverlay { hwnd, grid, dpi_scale });
        if let Err(e) = self.redraw(None) {
            self.close();
            return Err(e);
        }
        unsafe {
            ShowWindow(hwnd, SW_SHOWNOACTIVATE);
        }
        tracing::debug!(?bounds, rows, columns, dpi_scale, "Overlay shown");
        Ok(())
    }

    fn set_selection(&mut self, selection: Rect) -> Result<(), OverlayError> {
        self.redraw(Some(selection))
    }

    fn close(&mut self) {
        if let Some(shown) = self.shown.take() {
            unsafe {
                DestroyWindow(shown.hwnd).ok();
            }
            tracing::debug!("Overlay closed");
        }
    }
}

impl Drop for LayeredOverlay {
    fn drop(&mut self) {
        self.close();
    }
}

/// Present the pixmap via UpdateLayeredWindow
fn present_pixmap(hwnd: HWND, bounds: Rect, pixmap: &tiny_skia::Pixmap) -> Result<(), OverlayError> {
    let width = pixmap.width() as i32;
    let height = pixmap.height() as i32;

    unsafe {
        let screen_dc = GetDC(HWND(0));
        if screen_dc.0 == 0 {
            return Err(OverlayError::DeviceContextFailed);
        }

        let memory_dc = CreateCompatibleDC(screen_dc);
        if memory_dc.0 == 0 {
            ReleaseDC(HWND(0), screen_dc);
            return Err(OverlayError::MemoryDeviceContextFailed);
        }

        let mut bitmap_info = BITMAPINFO::default();
        bitmap_info.bmiHeader = BITMAPINFOHEADER {
            biSize: std::mem::size_of::<BITMAPINFOHEADER>() as u32,
            biWidth: width,
            biHeight: -height, // top-down
            biPlanes: 1,
            biBitCount: 32,
            biCompression: BI_RGB.0,
            ..Default::default()
        };

        let mut pixel_ptr: *mut c_void = std::ptr::null_mut();
        let dib = match CreateDIBSection(memory_dc, &bitmap_info, DIB_RGB_COLORS, &mut pixel_ptr, None, 0) {
            Ok(bitmap) => bitmap,
            Err(_) => {
                DeleteDC(memory_dc);
                ReleaseDC(HWND(0), screen_dc);
                return Err(OverlayError::DibSectionCreationFailed);
            }
        };
        let dib_object: HGDIOBJ = dib.into();

        if pixel_ptr.is_null() {
            DeleteObject(dib_object);
            DeleteDC(memory_dc);
            ReleaseDC(HWND(0), screen_dc);
            return Err(OverlayError::DibSectionCreationFailed);
        }

        {
            let dst = std::slice::from_raw_parts_mut(pixel_ptr as *mut u8, pixmap.data().len());
            rgba_to_bgra(pixmap.data(), dst);
        }

        let old_bitmap = SelectObject(memory_dc, dib_object);
        if old_bitmap.0 == 0 {
            DeleteObject(dib_object);
            DeleteDC(memory_dc);
            ReleaseDC(HWND(0), screen_dc);
            return Err(OverlayError::BitmapSelectionFailed);
        }

        let size = SIZE { cx: width, cy: height };
        let dst_point = POINT {
            x: bounds.x,
            y: bounds.y,
        };
        let src_point = POINT { x: 0, y: 0 };
        let blend = BLENDFUNCTION {
            BlendOp: AC_SRC_OVER as u8,
            BlendFlags: 0,
            SourceConstantAlpha: 255,
            AlphaFormat: AC_SRC_ALPHA as u8,
        };

        let update_result = UpdateLayeredWindow(
            hwnd,
            screen_dc,
            Some(&dst_point),
            Some(&size),
            memory_dc,
            Some(&src_point),
            COLORREF(0),
            Some(&blend),
            ULW_ALPHA,
        );

        SelectObject(memory_dc, old_bitmap);
        DeleteObject(dib_object);
        DeleteDC(memory_dc);
        ReleaseDC(HWND(0), screen_dc);

        if update_result.is_err() {
            return Err(OverlayError::LayerUpdateFailed);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_overlay_is_hidden() {
        let overlay = LayeredOverlay::new(OverlayPalette::default());
        assert!(!overlay.is_visible());
    }

    #[test]
    fn selection_before_show_is_an_error() {
        let mut overlay = LayeredOverlay::new(OverlayPalette::default());
        assert!(matches!(
            overlay.set_selection(Rect::new(0, 0, 10, 10)),
            Err(OverlayError::NotShown)
        ));
        overlay.close();
        overlay.close();
    }

    #[test]
    fn invalid_dimensions_are_rejected_before_creating_a_window() {
        let mut overlay = LayeredOverlay::new(OverlayPalette::default());
        let result = overlay.show(Rect::new(0, 0, 800, 600), 0, 3);
        assert!(matches!(result, Err(OverlayError::Grid(_))));
        assert!(!overlay.is_visible());
    }

    #[test]
    #[ignore = "needs an interactive desktop session"]
    fn show_select_close() {
        let mut overlay = LayeredOverlay::new(OverlayPalette::default());
        overlay.show(Rect::new(0, 0, 800, 600), 2, 3).unwrap();
        assert!(overlay.is_visible());
        overlay.set_selection(Rect::new(266, 0, 534, 600)).unwrap();
        overlay.close();
        assert!(!overlay.is_visible());
    }
}

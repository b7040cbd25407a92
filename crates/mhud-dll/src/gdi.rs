//! GDI text presenter.
//!
//! Draws the overlay spans onto the device context handed to `SwapBuffers`.
//! The font is created on the first frame and released by `cleanup`, both on
//! the render thread.

use std::ffi::c_void;

use mhud::{Error, FrameHandle, HudSnapshot, Presenter};
use tracing::debug;
use windows::Win32::Foundation::COLORREF;
use windows::Win32::Graphics::Gdi::{
    ANTIALIASED_QUALITY, CLIP_DEFAULT_PRECIS, CreateFontW, DEFAULT_CHARSET, DeleteObject, HDC,
    HFONT, HGDIOBJ, OUT_DEFAULT_PRECIS, SelectObject, SetBkMode, SetTextColor, TRANSPARENT,
    TextOutW,
};
use windows::core::w;

use crate::overlay::{self, LINE_HEIGHT};

const FONT_WEIGHT_BOLD: i32 = 700;

#[derive(Default)]
pub struct GdiPresenter {
    font: Option<HFONT>,
}

// SAFETY: the font handle is only created, selected and deleted on the render
// thread. The presenter moves across threads once, before the redirect is live.
unsafe impl Send for GdiPresenter {}

impl GdiPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    fn font(&mut self) -> mhud::Result<HFONT> {
        if let Some(font) = self.font {
            return Ok(font);
        }

        // SAFETY: plain GDI object creation, no pointers beyond the face name
        let font = unsafe {
            CreateFontW(
                LINE_HEIGHT - 2,
                0,
                0,
                0,
                FONT_WEIGHT_BOLD,
                0,
                0,
                0,
                DEFAULT_CHARSET,
                OUT_DEFAULT_PRECIS,
                CLIP_DEFAULT_PRECIS,
                ANTIALIASED_QUALITY,
                0,
                w!("Segoe UI"),
            )
        };
        if font.is_invalid() {
            return Err(Error::FrameCustomization(
                "CreateFontW returned no font".to_string(),
            ));
        }

        debug!("Created overlay font");
        self.font = Some(font);
        Ok(font)
    }
}

impl Presenter for GdiPresenter {
    fn customize_frame(&mut self, frame: FrameHandle, snapshot: &HudSnapshot) -> mhud::Result<()> {
        let spans = overlay::layout(snapshot);
        if spans.is_empty() {
            return Ok(());
        }

        let font = self.font()?;
        let hdc = HDC(frame.0 as *mut c_void);

        // SAFETY: `hdc` is the device context the game is presenting right now
        unsafe {
            let previous = SelectObject(hdc, HGDIOBJ(font.0));
            SetBkMode(hdc, TRANSPARENT);

            let mut result = Ok(());
            for span in &spans {
                SetTextColor(hdc, COLORREF(span.color.colorref()));
                let text: Vec<u16> = span.text.encode_utf16().collect();
                if !TextOutW(hdc, span.x, span.y, &text).as_bool() {
                    result = Err(Error::FrameCustomization(format!(
                        "TextOutW failed for '{}'",
                        span.text
                    )));
                    break;
                }
            }

            SelectObject(hdc, previous);
            result
        }
    }

    fn cleanup(&mut self) -> mhud::Result<()> {
        let Some(font) = self.font.take() else {
            return Ok(());
        };

        // SAFETY: the font was created by this presenter and is no longer selected
        if unsafe { DeleteObject(HGDIOBJ(font.0)) }.as_bool() {
            debug!("Released overlay font");
            Ok(())
        } else {
            Err(Error::Cleanup("DeleteObject failed for overlay font".to_string()))
        }
    }
}

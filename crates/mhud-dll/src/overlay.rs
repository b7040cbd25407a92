//! Text layout for the stat overlay.
//!
//! Pure data so the drawing backend only has to place strings.

use mhud::HudSnapshot;

/// Left edge, clear of the hearts and pickups counters
pub const ORIGIN_X: i32 = 6;
pub const ORIGIN_Y: i32 = 96;
pub const LINE_HEIGHT: i32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextColor {
    Normal,
    /// Recent change in the player's favour
    Better,
    Worse,
}

impl TextColor {
    /// `0x00BBGGRR`, the layout GDI expects
    pub fn colorref(self) -> u32 {
        match self {
            TextColor::Normal => 0x00F0_F0F0,
            TextColor::Better => 0x0040_E040,
            TextColor::Worse => 0x0040_40E0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlaySpan {
    pub text: String,
    pub x: i32,
    pub y: i32,
    pub color: TextColor,
}

/// One span per reading, top to bottom. Nothing is drawn outside a run.
pub fn layout(snapshot: &HudSnapshot) -> Vec<OverlaySpan> {
    if !snapshot.run_active {
        return Vec::new();
    }

    snapshot
        .readings
        .iter()
        .enumerate()
        .map(|(row, reading)| {
            let color = if reading.recent_delta == 0.0 {
                TextColor::Normal
            } else if reading.is_improvement() {
                TextColor::Better
            } else {
                TextColor::Worse
            };
            OverlaySpan {
                text: reading.to_string(),
                x: ORIGIN_X,
                y: ORIGIN_Y + row as i32 * LINE_HEIGHT,
                color,
            }
        })
        .collect()
}

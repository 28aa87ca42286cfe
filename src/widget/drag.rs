pub const PANEL_WIDTH: f64 = 400.0;
pub const PANEL_HEIGHT: f64 = 600.0;
pub const PANEL_PADDING: f64 = 20.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self { width: 1280.0, height: 800.0 }
    }
}

/// Top-left corner of the panel in viewport coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Position {
    pub left: f64,
    pub top: f64,
}

impl Position {
    /// Top-right corner, inset by the padding.
    pub fn default_for(viewport: Viewport) -> Self {
        Self {
            left: viewport.width - PANEL_WIDTH - PANEL_PADDING,
            top: PANEL_PADDING,
        }.clamped(viewport)
    }

    pub fn clamped(self, viewport: Viewport) -> Self {
        let max_left = (viewport.width - PANEL_WIDTH).max(0.0);
        let max_top = (viewport.height - PANEL_HEIGHT).max(0.0);
        Self {
            left: self.left.clamp(0.0, max_left),
            top: self.top.clamp(0.0, max_top),
        }
    }
}

/// Pointer offset inside the panel captured when the header was pressed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Drag {
    offset_x: f64,
    offset_y: f64,
}

impl Drag {
    pub fn start(position: Position, pointer_x: f64, pointer_y: f64) -> Self {
        Self {
            offset_x: pointer_x - position.left,
            offset_y: pointer_y - position.top,
        }
    }

    pub fn follow(&self, pointer_x: f64, pointer_y: f64, viewport: Viewport) -> Position {
        Position {
            left: pointer_x - self.offset_x,
            top: pointer_y - self.offset_y,
        }.clamped(viewport)
    }
}

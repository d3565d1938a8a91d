//! Touch screen input
//!
//! The bottom screen is drawn letterboxed into a host rectangle of any
//! shape. [`TouchMapper`] undoes that letterboxing to recover core
//! coordinates; [`TouchTracker`] filters drags that happen without a press.

/// Native touch screen width
pub const SCREEN_WIDTH: f32 = 256.0;
/// Native touch screen height
pub const SCREEN_HEIGHT: f32 = 192.0;

/// Point in core screen coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TouchPoint {
    pub x: u16,
    pub y: u16,
}

/// Host rectangle the bottom screen is drawn into
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchMapper {
    left: f32,
    top: f32,
    width: f32,
    height: f32,
}

impl TouchMapper {
    pub fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Map a host point to core coordinates
    ///
    /// Each axis that lands outside the visible screen maps to 0.
    pub fn map(&self, client_x: f32, client_y: f32) -> TouchPoint {
        if self.width <= 0.0 || self.height <= 0.0 {
            return TouchPoint::default();
        }

        let local_x = client_x - self.left;
        let local_y = client_y - self.top;
        let scale_x = self.width / SCREEN_WIDTH;
        let scale_y = self.height / SCREEN_HEIGHT;

        let mut x = local_x / scale_x;
        let mut y = local_y / scale_y;

        if self.width / self.height > SCREEN_WIDTH / SCREEN_HEIGHT {
            // Pillarboxed: bars left and right
            let extra = (scale_x - scale_y) * SCREEN_WIDTH;
            x = (local_x - extra / 2.0) / (self.width - extra) * SCREEN_WIDTH;
        } else {
            // Letterboxed: bars top and bottom
            let extra = (scale_y - scale_x) * SCREEN_HEIGHT;
            y = (local_y - extra / 2.0) / (self.height - extra) * SCREEN_HEIGHT;
        }

        TouchPoint {
            x: clamp_axis(x, SCREEN_WIDTH),
            y: clamp_axis(y, SCREEN_HEIGHT),
        }
    }
}

fn clamp_axis(value: f32, limit: f32) -> u16 {
    if value > 0.0 && value <= limit {
        value as u16
    } else {
        0
    }
}

/// Press state of the pointer over the touch screen
#[derive(Debug, Clone, Copy, Default)]
pub struct TouchTracker {
    touching: bool,
}

impl TouchTracker {
    pub fn is_touching(&self) -> bool {
        self.touching
    }

    pub fn press(&mut self, point: TouchPoint) -> TouchPoint {
        self.touching = true;
        point
    }

    /// Pointer movement; only reported while pressed
    pub fn drag(&self, point: TouchPoint) -> Option<TouchPoint> {
        self.touching.then_some(point)
    }

    pub fn release(&mut self) {
        self.touching = false;
    }
}

// Fixed geometry of the rendered page. All values are canvas pixels with a
// top-left origin.

/// Rendered page size.
pub const PAGE_WIDTH_PX: u32 = 1654;
pub const PAGE_HEIGHT_PX: u32 = 2339;

/// Images per page and grid shape.
pub const IMAGES_PER_PAGE: usize = 10;
pub const GRID_COLUMNS: usize = 2;
pub const GRID_ROWS: usize = 5;

pub const GRID_ORIGIN_X: u32 = 200;
pub const GRID_ORIGIN_Y: u32 = 370;
pub const CELL_WIDTH: u32 = 626;
pub const CELL_HEIGHT: u32 = 303;

/// Text size: 24pt at 96 DPI.
pub const FONT_SIZE_PX: f32 = 32.0;

/// JPEG quality used when embedding pages.
pub const JPEG_QUALITY: u8 = 95;

/// Resolution that maps one canvas pixel onto one page unit.
pub const PAGE_DPI: f32 = 96.0;

/// Text anchors: left edge and alphabetic baseline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    pub x: f32,
    pub y: f32,
}

const fn anchor(x: f32, y: f32) -> Anchor {
    Anchor { x, y }
}

pub const FULL_NAME: Anchor = anchor(256.0, 200.0);
pub const LAST_NAME: Anchor = anchor(830.0, 200.0);
pub const STUDENT_ID: Anchor = anchor(1270.0, 200.0);
pub const CLASS: Anchor = anchor(1375.0, 200.0);
pub const POINTS: Anchor = anchor(1390.0, 255.0);
pub const MONTH: Anchor = anchor(585.0, 255.0);
pub const SEMESTER: Anchor = anchor(1020.0, 255.0);
pub const SEMESTER_YEAR: Anchor = anchor(1080.0, 255.0);
pub const MONTH_CHECK: Anchor = anchor(420.0, 255.0);
pub const SEMESTER_CHECK: Anchor = anchor(770.0, 255.0);
pub const DATE: Anchor = anchor(750.0, 2070.0);

/// Box the signature line is centred in.
pub const SIGNATURE_LEFT: f32 = 580.0;
pub const SIGNATURE_TOP: f32 = 1995.0;
pub const SIGNATURE_WIDTH: f32 = 495.0;
pub const SIGNATURE_HEIGHT: f32 = 30.0;
pub const SIGNATURE_BASELINE_OFFSET: f32 = 8.0;

/// Top-left corner of image slot `index` (0..10), filled row by row.
pub fn slot_origin(index: usize) -> (u32, u32) {
    let column = (index % GRID_COLUMNS) as u32;
    let row = (index / GRID_COLUMNS) as u32;
    (
        GRID_ORIGIN_X + column * CELL_WIDTH,
        GRID_ORIGIN_Y + row * CELL_HEIGHT,
    )
}

/// Anchor that centres text of `text_width` inside the signature box.
pub fn signature_anchor(text_width: f32) -> Anchor {
    Anchor {
        x: SIGNATURE_LEFT + (SIGNATURE_WIDTH - text_width) / 2.0,
        y: SIGNATURE_TOP + SIGNATURE_HEIGHT / 2.0 + SIGNATURE_BASELINE_OFFSET,
    }
}

/// Canvas pixels to millimetres at `PAGE_DPI`.
pub fn px_to_mm(px: u32) -> f32 {
    px as f32 * 25.4 / PAGE_DPI
}

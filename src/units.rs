/// millimeters per pixel at 96 DPI
pub const MM_PER_PIXEL: f64 = 0.264583;

/// PDF points per millimeter (72 pt per inch, 25.4 mm per inch)
pub const PT_PER_MM: f64 = 72.0 / 25.4;

pub fn pixels_to_mm(pixels: f64) -> f64 {
    pixels * MM_PER_PIXEL
}

pub fn mm_to_pt(mm: f64) -> f64 {
    mm * PT_PER_MM
}

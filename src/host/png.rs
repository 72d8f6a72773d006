//! Raster helpers for simulated viewport captures.

use std::io::Cursor;

use image::{ImageFormat, ImageResult, Rgb, RgbImage};

/// Creates an image shaded vertically from `top` to `bottom`.
pub fn gradient(width: u32, height: u32, top: Rgb<u8>, bottom: Rgb<u8>) -> RgbImage {
    let span = f64::from(height.saturating_sub(1).max(1));
    RgbImage::from_fn(width, height, |_, y| {
        let t = f64::from(y) / span;
        Rgb(std::array::from_fn(|c| lerp(top[c], bottom[c], t)))
    })
}

/// Fills the rectangle spanning `x0..x1`, `y0..y1`, clipped to the image.
pub fn fill_rect(image: &mut RgbImage, x0: u32, y0: u32, x1: u32, y1: u32, colour: Rgb<u8>) {
    let x1 = x1.min(image.width());
    let y1 = y1.min(image.height());
    for y in y0..y1 {
        for x in x0..x1 {
            image.put_pixel(x, y, colour);
        }
    }
}

/// Encodes the image as a PNG file.
///
/// # Errors
///
/// Returns an error if the encoder rejects the image.
pub fn encode_png(image: &RgbImage) -> ImageResult<Vec<u8>> {
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

fn lerp(a: u8, b: u8, t: f64) -> u8 {
    let value = f64::from(a) + (f64::from(b) - f64::from(a)) * t;
    value.round().clamp(0.0, 255.0) as u8
}

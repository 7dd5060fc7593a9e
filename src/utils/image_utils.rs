use std::io::Cursor;

use image::{ImageFormat, RgbaImage};

use crate::{
    encoded_image::{EncodedImage, ICON_RESOURCE_NAME},
    error::EncodingError,
};

/// Geometry of a native colour bitmap, as reported by the bitmap object itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BitmapDescriptor {
    pub width: u32,
    pub height: u32,
    pub bit_depth: u16,
    pub stride: u32,
}

impl BitmapDescriptor {
    /// Buffer size for a 32bpp readback of the whole bitmap.
    pub fn dib_len(&self) -> Option<usize> {
        usize::try_from(self.width)
            .ok()?
            .checked_mul(usize::try_from(self.height).ok()?)?
            .checked_mul(4)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Converts a bottom-up BGRA DIB into a top-down RGBA image.
///
/// Returns `None` when `data` is not exactly `width * height * 4` bytes.
pub fn bottom_up_bgra_to_image(width: u32, height: u32, data: &[u8]) -> Option<RgbaImage> {
    let row_len = usize::try_from(width).ok()?.checked_mul(4)?;
    let expected = row_len.checked_mul(usize::try_from(height).ok()?)?;
    if data.len() != expected {
        return None;
    }
    if expected == 0 {
        return RgbaImage::from_raw(width, height, Vec::new());
    }

    // BGRA -> RGBA, last row first
    let rgba_data = data
        .chunks_exact(row_len)
        .rev()
        .flat_map(|row| row.chunks_exact(4).flat_map(|px| [px[2], px[1], px[0], px[3]]))
        .collect::<Vec<_>>();

    RgbaImage::from_raw(width, height, rgba_data)
}

/// Legacy icons carry no alpha in their colour bitmap; show them opaque
/// instead of fully transparent. Returns whether the image was changed.
pub fn restore_opaque_alpha(image: &mut RgbaImage) -> bool {
    if image.pixels().any(|px| px[3] != 0) {
        return false;
    }
    for px in image.pixels_mut() {
        px[3] = u8::MAX;
    }
    true
}

/// Serializes a raster as PNG under the shared icon resource name.
pub fn encode_png(image: &RgbaImage) -> Result<EncodedImage, EncodingError> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(EncodingError::EmptyRaster { width, height });
    }

    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(EncodedImage::new(ICON_RESOURCE_NAME, bytes))
}

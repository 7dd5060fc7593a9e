use std::{
    fmt,
    sync::{Arc, LazyLock},
};

use base64::{Engine, engine::general_purpose};
use image::{ImageFormat, RgbaImage};

/// Logical name given to every icon encoded from a shell bitmap.
pub const ICON_RESOURCE_NAME: &str = "icon.png";

pub const GENERIC_FILE_RESOURCE_NAME: &str = "generic-file.png";

static GENERIC_FILE_ICON: LazyLock<EncodedImage> = LazyLock::new(|| {
    EncodedImage::new(
        GENERIC_FILE_RESOURCE_NAME,
        include_bytes!("../assets/generic_file.png").as_slice(),
    )
});

/// The "generic file" icon handed out whenever a path cannot be resolved.
pub fn generic_file_icon() -> &'static EncodedImage {
    &GENERIC_FILE_ICON
}

/// An immutable PNG blob ready to be embedded in a UI.
///
/// Cloning shares the underlying bytes, so cache hits never copy pixel data.
#[derive(Clone, PartialEq, Eq)]
pub struct EncodedImage {
    name: &'static str,
    bytes: Arc<[u8]>,
}

impl EncodedImage {
    pub fn new(name: &'static str, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name,
            bytes: bytes.into(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn to_base64(&self) -> String {
        general_purpose::STANDARD.encode(&self.bytes)
    }

    /// `data:image/png;base64,...`, directly usable as an `<img src>`.
    pub fn to_data_url(&self) -> String {
        format!("data:image/png;base64,{}", self.to_base64())
    }

    pub fn decode(&self) -> image::ImageResult<RgbaImage> {
        let image = image::load_from_memory_with_format(&self.bytes, ImageFormat::Png)?;
        Ok(image.to_rgba8())
    }
}

impl fmt::Debug for EncodedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodedImage")
            .field("name", &self.name)
            .field("len", &self.bytes.len())
            .finish()
    }
}

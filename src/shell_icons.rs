#[cfg(not(windows))]
use std::convert::Infallible;
use std::path::Path;

use image::RgbaImage;

use crate::error::{ExtractionError, ResolutionError};
#[cfg(windows)]
use crate::utils::{
    gdi_utils::{AutoIcon, get_shell_icon, hicon_to_image},
    image_utils::restore_opaque_alpha,
};

/// Looks up the native icon the OS shell associates with a file.
///
/// The returned handle is owned by the caller and releases the native
/// resource when dropped.
pub trait IconHandleResolver: Send + Sync {
    type Handle;

    fn resolve(&self, path: &Path) -> Result<Self::Handle, ResolutionError>;
}

/// Turns a resolved icon handle into a top-down RGBA raster.
pub trait BitmapExtractor<H>: Send + Sync {
    fn extract(&self, handle: &H) -> Result<RgbaImage, ExtractionError>;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum IconSize {
    #[default]
    Large,
    Small,
}

/// A shell icon handle, destroyed on drop.
#[derive(Debug)]
pub struct OwnedIcon(
    #[cfg(windows)] AutoIcon,
    #[cfg(not(windows))] Infallible,
);

/// Resolves icons through `SHGetFileInfoW`.
///
/// Only Windows has a shell to ask; elsewhere every lookup fails with
/// [`ResolutionError::Unsupported`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ShellIconResolver {
    size: IconSize,
}

impl ShellIconResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_size(self, size: IconSize) -> Self {
        ShellIconResolver { size }
    }

    pub fn size(&self) -> IconSize {
        self.size
    }
}

impl IconHandleResolver for ShellIconResolver {
    type Handle = OwnedIcon;

    fn resolve(&self, path: &Path) -> Result<OwnedIcon, ResolutionError> {
        match path.try_exists() {
            Ok(true) => {}
            Ok(false) => return Err(ResolutionError::NotFound(path.to_path_buf())),
            Err(source) => {
                return Err(ResolutionError::Inaccessible {
                    path: path.to_path_buf(),
                    source,
                });
            }
        }

        #[cfg(windows)]
        {
            use windows::Win32::UI::Shell::{SHGFI_LARGEICON, SHGFI_SMALLICON};

            let size_flag = match self.size {
                IconSize::Large => SHGFI_LARGEICON,
                IconSize::Small => SHGFI_SMALLICON,
            };
            get_shell_icon(path, size_flag).map(OwnedIcon)
        }

        #[cfg(not(windows))]
        {
            Err(ResolutionError::Unsupported)
        }
    }
}

/// Reads icon pixels back through a GDI memory device context.
#[derive(Clone, Copy, Debug, Default)]
pub struct GdiBitmapExtractor;

impl BitmapExtractor<OwnedIcon> for GdiBitmapExtractor {
    fn extract(&self, handle: &OwnedIcon) -> Result<RgbaImage, ExtractionError> {
        #[cfg(windows)]
        {
            let mut image = hicon_to_image(handle.0.raw())?;
            if restore_opaque_alpha(&mut image) {
                log::debug!(
                    "Icon extract: legacy {}x{} icon without alpha, made opaque",
                    image.width(),
                    image.height()
                );
            }
            Ok(image)
        }

        #[cfg(not(windows))]
        {
            let never: Infallible = handle.0;
            match never {}
        }
    }
}

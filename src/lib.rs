//! Shell icons for shortcut browsers.
//!
//! Given a file path, ask the Windows shell for its icon, read the icon's
//! pixels back into an RGBA raster, encode that as PNG and keep the result in
//! a per-session cache. [`IconResourceService::get_display_icon`] is the one
//! call a UI needs; it always returns something drawable.

mod utils {
    #[cfg(windows)]
    pub mod gdi_utils;
    pub mod image_utils;
    pub mod sync_utils;
}
mod cache;
mod encoded_image;
mod error;
mod service;
mod shell_icons;

pub use cache::IconCache;
pub use encoded_image::{
    EncodedImage, GENERIC_FILE_RESOURCE_NAME, ICON_RESOURCE_NAME, generic_file_icon,
};
pub use error::{EncodingError, ExtractionError, ExtractionStep, IconError, ResolutionError};
pub use service::IconResourceService;
pub use shell_icons::{
    BitmapExtractor, GdiBitmapExtractor, IconHandleResolver, IconSize, OwnedIcon,
    ShellIconResolver,
};
pub use utils::image_utils::{
    BitmapDescriptor, bottom_up_bgra_to_image, encode_png, restore_opaque_alpha,
};

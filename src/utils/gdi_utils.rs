use std::{
    ffi::OsStr,
    mem::{self, MaybeUninit},
    os::windows::ffi::OsStrExt,
    path::Path,
};

use image::RgbaImage;
use windows::{
    Win32::{
        Graphics::Gdi::{
            BI_RGB, BITMAP, BITMAPINFO, BITMAPINFOHEADER, CreateCompatibleDC, DIB_RGB_COLORS,
            DeleteDC, DeleteObject, GetDC, GetDIBits, GetObjectW, HBITMAP, HDC, HGDIOBJ, ReleaseDC,
            SelectObject,
        },
        Storage::FileSystem::FILE_FLAGS_AND_ATTRIBUTES,
        System::Com::{COINIT, COINIT_APARTMENTTHREADED, CoInitializeEx, CoUninitialize},
        UI::{
            Shell::{SHFILEINFOW, SHGFI_FLAGS, SHGFI_ICON, SHGetFileInfoW},
            WindowsAndMessaging::{DestroyIcon, GetIconInfo, HICON},
        },
    },
    core::{HRESULT, PCWSTR},
};

use crate::{
    error::{ExtractionError, ExtractionStep, ResolutionError},
    utils::image_utils::{BitmapDescriptor, bottom_up_bgra_to_image},
};

/// Per-thread COM initialization, undone on drop if it succeeded.
///
/// A thread already initialized in another apartment gets an error `HRESULT`
/// here and keeps its existing apartment.
pub struct ComInit {
    hr: HRESULT,
}

impl ComInit {
    pub fn new(coinit: COINIT) -> Self {
        let hr = unsafe { CoInitializeEx(None, coinit) };
        Self { hr }
    }

    pub fn is_initialized(&self) -> bool {
        self.hr.is_ok()
    }
}

impl Drop for ComInit {
    fn drop(&mut self) {
        if self.hr.is_ok() {
            unsafe {
                CoUninitialize();
            }
        }
    }
}

/// Screen DC from `GetDC`.
struct ScopedDc(HDC);

impl Drop for ScopedDc {
    fn drop(&mut self) {
        if !self.0.0.is_null() {
            unsafe {
                ReleaseDC(None, self.0);
            }
        }
    }
}

/// Memory DC from `CreateCompatibleDC`.
struct MemoryDc(HDC);

impl Drop for MemoryDc {
    fn drop(&mut self) {
        if !self.0.0.is_null() {
            unsafe {
                let _ = DeleteDC(self.0);
            }
        }
    }
}

/// Puts the previously selected object back into the DC.
struct Selection {
    dc: HDC,
    previous: HGDIOBJ,
}

impl Drop for Selection {
    fn drop(&mut self) {
        unsafe {
            let _ = SelectObject(self.dc, self.previous);
        }
    }
}

struct AutoBitmap(HBITMAP);

impl Drop for AutoBitmap {
    fn drop(&mut self) {
        if !self.0.0.is_null() {
            unsafe {
                let _ = DeleteObject(HGDIOBJ::from(self.0));
            }
        }
    }
}

/// Takes ownership of a shell icon and destroys it on drop.
#[derive(Debug)]
pub struct AutoIcon(HICON);

impl AutoIcon {
    pub fn raw(&self) -> HICON {
        self.0
    }
}

impl Drop for AutoIcon {
    fn drop(&mut self) {
        if !self.0.0.is_null() {
            unsafe {
                let _ = DestroyIcon(self.0);
            }
        }
    }
}

/// Asks the shell for the icon of `file_path`.
///
/// May run on any thread: COM is initialized for the duration of the call,
/// which `SHGetFileInfoW` needs for shortcuts and shell-extension handlers.
pub fn get_shell_icon(
    file_path: &Path,
    size_flag: SHGFI_FLAGS,
) -> Result<AutoIcon, ResolutionError> {
    let com = ComInit::new(COINIT_APARTMENTTHREADED);
    if !com.is_initialized() {
        log::debug!("Icon resolve: COM not initialized here, using the thread's apartment");
    }
    let wide_path: Vec<u16> = OsStr::new(file_path).encode_wide().chain(Some(0)).collect();
    let mut shfileinfo = SHFILEINFOW::default();

    let result = unsafe {
        SHGetFileInfoW(
            PCWSTR::from_raw(wide_path.as_ptr()),
            FILE_FLAGS_AND_ATTRIBUTES(0),
            Some(&mut shfileinfo as *mut _),
            u32::try_from(mem::size_of::<SHFILEINFOW>()).unwrap_or(u32::MAX),
            SHGFI_ICON | size_flag,
        )
    };

    if result == 0 || shfileinfo.hIcon.0.is_null() {
        let last_error = windows::core::Error::from_win32();
        return Err(ResolutionError::NoIcon {
            path: file_path.to_path_buf(),
            reason: format!("SHGetFileInfoW failed: {last_error}"),
        });
    }

    Ok(AutoIcon(shfileinfo.hIcon))
}

fn bitmap_descriptor(color: HBITMAP) -> Result<BitmapDescriptor, ExtractionError> {
    let bitmap_size = i32::try_from(mem::size_of::<BITMAP>())
        .map_err(|e| ExtractionError::new(ExtractionStep::BitmapInfo, e.to_string()))?;

    let mut bitmap: MaybeUninit<BITMAP> = MaybeUninit::uninit();
    let result = unsafe {
        GetObjectW(
            HGDIOBJ::from(color),
            bitmap_size,
            Some(bitmap.as_mut_ptr().cast()),
        )
    };
    if result != bitmap_size {
        return Err(ExtractionError::new(
            ExtractionStep::BitmapInfo,
            format!("GetObjectW failed, expected {bitmap_size}, got {result}"),
        ));
    }
    let bitmap = unsafe { bitmap.assume_init() };

    let descriptor = BitmapDescriptor {
        width: bitmap.bmWidth.unsigned_abs(),
        height: bitmap.bmHeight.unsigned_abs(),
        bit_depth: bitmap.bmBitsPixel,
        stride: bitmap.bmWidthBytes.unsigned_abs(),
    };
    if descriptor.is_empty() {
        return Err(ExtractionError::new(
            ExtractionStep::BitmapInfo,
            format!("empty {}x{} bitmap", descriptor.width, descriptor.height),
        ));
    }
    Ok(descriptor)
}

/// Reads the colour bitmap of `icon` into a top-down RGBA image.
///
/// Every handle acquired on the way (icon bitmaps, screen DC, memory DC and
/// the selection) is released before returning, on success and on failure.
/// The icon itself stays owned by the caller.
pub fn hicon_to_image(icon: HICON) -> Result<RgbaImage, ExtractionError> {
    let mut info = MaybeUninit::uninit();
    unsafe { GetIconInfo(icon, info.as_mut_ptr()) }.map_err(|e| {
        ExtractionError::new(ExtractionStep::IconInfo, format!("GetIconInfo failed: {e}"))
    })?;
    let info = unsafe { info.assume_init() };

    let _hbm_mask = AutoBitmap(info.hbmMask);
    let hbm_color = AutoBitmap(info.hbmColor);
    if hbm_color.0.0.is_null() {
        return Err(ExtractionError::new(
            ExtractionStep::IconInfo,
            "monochrome icon has no color bitmap",
        ));
    }

    let descriptor = bitmap_descriptor(hbm_color.0)?;
    let height_i32 = i32::try_from(descriptor.height)
        .map_err(|e| ExtractionError::new(ExtractionStep::BitmapInfo, e.to_string()))?;
    let width_i32 = i32::try_from(descriptor.width)
        .map_err(|e| ExtractionError::new(ExtractionStep::BitmapInfo, e.to_string()))?;
    let buf_size = descriptor
        .dib_len()
        .ok_or_else(|| ExtractionError::new(ExtractionStep::BitmapInfo, "buffer size overflow"))?;

    let dc = unsafe { GetDC(None) };
    if dc.0.is_null() {
        return Err(ExtractionError::new(
            ExtractionStep::SurfaceSetup,
            "GetDC returned null",
        ));
    }
    let _dc_guard = ScopedDc(dc);

    let mem_dc = unsafe { CreateCompatibleDC(Some(dc)) };
    if mem_dc.0.is_null() {
        return Err(ExtractionError::new(
            ExtractionStep::SurfaceSetup,
            "CreateCompatibleDC returned null",
        ));
    }
    let _mem_dc_guard = MemoryDc(mem_dc);

    let previous = unsafe { SelectObject(mem_dc, HGDIOBJ::from(hbm_color.0)) };
    if previous.0.is_null() || previous.0 as isize == -1 {
        return Err(ExtractionError::new(
            ExtractionStep::SurfaceSetup,
            "SelectObject failed",
        ));
    }
    let _selection = Selection {
        dc: mem_dc,
        previous,
    };

    // Positive height asks for a bottom-up DIB; the rows are flipped below.
    let mut bitmap_info = BITMAPINFO {
        bmiHeader: BITMAPINFOHEADER {
            biSize: u32::try_from(mem::size_of::<BITMAPINFOHEADER>()).unwrap_or(u32::MAX),
            biWidth: width_i32,
            biHeight: height_i32,
            biPlanes: 1,
            biBitCount: 32,
            biCompression: BI_RGB.0,
            ..Default::default()
        },
        ..Default::default()
    };

    let mut buf = vec![0u8; buf_size];
    let lines = unsafe {
        GetDIBits(
            mem_dc,
            hbm_color.0,
            0,
            descriptor.height,
            Some(buf.as_mut_ptr().cast()),
            &mut bitmap_info,
            DIB_RGB_COLORS,
        )
    };
    if lines == 0 {
        let last_error = windows::core::Error::from_win32();
        return Err(ExtractionError::new(
            ExtractionStep::PixelRead,
            format!("GetDIBits failed: {last_error}"),
        ));
    } else if lines != height_i32 {
        return Err(ExtractionError::new(
            ExtractionStep::PixelRead,
            format!("GetDIBits returned {lines} of {height_i32} scanlines"),
        ));
    }

    bottom_up_bgra_to_image(descriptor.width, descriptor.height, &buf).ok_or_else(|| {
        ExtractionError::new(ExtractionStep::PixelRead, "pixel buffer size mismatch")
    })
}

use std::{
    borrow::Cow,
    collections::HashMap,
    path::{Path, PathBuf},
    sync::RwLock,
};

use crate::{encoded_image::EncodedImage, utils::sync_utils::IgnorePoisonRw};

/// Key under which `path` is stored.
///
/// Windows paths compare case-insensitively, so valid Unicode paths are
/// lowercased there. Other platforms keep the path as given; `..` components
/// are not resolved anywhere since that would need symlink lookups.
pub(crate) fn cache_key(path: &Path) -> Cow<'_, Path> {
    #[cfg(windows)]
    {
        if let Some(text) = path.to_str() {
            let folded = text.to_lowercase();
            if folded != text {
                return Cow::Owned(PathBuf::from(folded));
            }
        }
    }
    Cow::Borrowed(path)
}

/// Encoded icons for one browsing session, keyed by absolute file path.
///
/// Lookups take a shared lock and never wait on icon extraction: writers only
/// hold the exclusive lock for the map mutation itself.
#[derive(Debug, Default)]
pub struct IconCache {
    entries: RwLock<HashMap<PathBuf, EncodedImage>>,
}

impl IconCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &Path) -> Option<EncodedImage> {
        self.entries
            .read_ignore_poison()
            .get(cache_key(path).as_ref())
            .cloned()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries
            .read_ignore_poison()
            .contains_key(cache_key(path).as_ref())
    }

    /// Inserts or overwrites, returning the previous entry.
    pub fn put(&self, path: PathBuf, image: EncodedImage) -> Option<EncodedImage> {
        let folded = match cache_key(&path) {
            Cow::Owned(folded) => Some(folded),
            Cow::Borrowed(_) => None,
        };
        let key = folded.unwrap_or(path);
        self.entries.write_ignore_poison().insert(key, image)
    }

    /// Drops every entry at once and returns how many there were.
    pub fn clear(&self) -> usize {
        let old = std::mem::take(&mut *self.entries.write_ignore_poison());
        old.len()
    }

    pub fn len(&self) -> usize {
        self.entries.read_ignore_poison().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read_ignore_poison().is_empty()
    }
}

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex, OnceLock,
        atomic::{AtomicU64, Ordering},
    },
};

use rayon::prelude::*;

use crate::{
    cache::{IconCache, cache_key},
    encoded_image::{EncodedImage, generic_file_icon},
    error::{IconError, ResolutionError},
    shell_icons::{BitmapExtractor, GdiBitmapExtractor, IconHandleResolver, ShellIconResolver},
    utils::{image_utils::encode_png, sync_utils::IgnorePoison},
};

/// Outcome shared by every caller that missed the cache for the same path
/// while one extraction was running. `None` means "use the default icon".
type Flight = Arc<OnceLock<Option<EncodedImage>>>;

/// Hands out displayable icons for file paths, backed by an [`IconCache`].
///
/// [`get_display_icon`](Self::get_display_icon) never fails: anything that
/// goes wrong on the native side is logged and answered with the generic file
/// icon, which is never cached so the path is retried next time.
pub struct IconResourceService<R, E> {
    resolver: R,
    extractor: E,
    cache: Arc<IconCache>,
    in_flight: Mutex<HashMap<PathBuf, Flight>>,
    /// Bumped by every invalidation; fetches started under an older value
    /// do not write into the cache.
    generation: AtomicU64,
}

impl IconResourceService<ShellIconResolver, GdiBitmapExtractor> {
    /// Service over the Windows shell with large icons.
    pub fn shell(cache: Arc<IconCache>) -> Self {
        Self::new(ShellIconResolver::new(), GdiBitmapExtractor, cache)
    }
}

impl<R, E> IconResourceService<R, E>
where
    R: IconHandleResolver,
    E: BitmapExtractor<R::Handle>,
{
    pub fn new(resolver: R, extractor: E, cache: Arc<IconCache>) -> Self {
        Self {
            resolver,
            extractor,
            cache,
            in_flight: Mutex::new(HashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    pub fn cache(&self) -> &Arc<IconCache> {
        &self.cache
    }

    pub fn get_display_icon(&self, path: impl AsRef<Path>) -> EncodedImage {
        self.cached_or_fetch(path.as_ref())
            .unwrap_or_else(|| generic_file_icon().clone())
    }

    /// Forgets every cached icon, e.g. when the browsed root folder changes.
    ///
    /// Requests made afterwards never join an extraction that started before.
    pub fn invalidate_all(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.in_flight.lock_ignore_poison().clear();
        let dropped = self.cache.clear();
        log::info!("Icon cache: invalidated, dropped {dropped} entries");
    }

    /// Warms the cache for `paths` in parallel and returns how many of them
    /// now have a cached icon.
    pub fn prefetch<I, P>(&self, paths: I) -> usize
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let paths: Vec<PathBuf> = paths
            .into_iter()
            .map(|p| p.as_ref().to_path_buf())
            .collect();
        let cached = paths
            .par_iter()
            .filter(|path| self.cached_or_fetch(path).is_some())
            .count();
        log::debug!("Icon cache: prefetched {cached}/{} paths", paths.len());
        cached
    }

    fn cached_or_fetch(&self, path: &Path) -> Option<EncodedImage> {
        let key = match std::path::absolute(path) {
            Ok(key) => key,
            Err(source) => {
                let err = ResolutionError::InvalidPath {
                    path: path.to_path_buf(),
                    source,
                };
                log::warn!("Icon lookup failed, using default icon: {err}");
                return None;
            }
        };

        if let Some(hit) = self.cache.get(&key) {
            log::debug!("Icon cache: hit for {}", key.display());
            return Some(hit);
        }

        let flight = self.join_flight(&key);
        let outcome = flight
            .get_or_init(|| {
                let generation = self.generation.load(Ordering::SeqCst);
                // Another flight may have filled the cache since our lookup.
                self.cache
                    .get(&key)
                    .or_else(|| self.fetch(&key, generation))
            })
            .clone();
        self.leave_flight(&key, &flight);
        outcome
    }

    fn join_flight(&self, key: &Path) -> Flight {
        let mut in_flight = self.in_flight.lock_ignore_poison();
        let key = cache_key(key).into_owned();
        Arc::clone(in_flight.entry(key).or_default())
    }

    fn leave_flight(&self, key: &Path, flight: &Flight) {
        let mut in_flight = self.in_flight.lock_ignore_poison();
        let key = cache_key(key);
        if in_flight
            .get(key.as_ref())
            .is_some_and(|current| Arc::ptr_eq(current, flight))
        {
            in_flight.remove(key.as_ref());
        }
    }

    fn fetch(&self, key: &Path, generation: u64) -> Option<EncodedImage> {
        log::debug!("Icon cache: miss for {}", key.display());
        match self.load(key) {
            Ok(image) => {
                if self.generation.load(Ordering::SeqCst) == generation {
                    self.cache.put(key.to_path_buf(), image.clone());
                } else {
                    log::debug!(
                        "Icon cache: dropping result for {} fetched before invalidation",
                        key.display()
                    );
                }
                Some(image)
            }
            Err(err) => {
                log::warn!(
                    "Icon lookup failed for {}, using default icon: {err}",
                    key.display()
                );
                None
            }
        }
    }

    fn load(&self, key: &Path) -> Result<EncodedImage, IconError> {
        let handle = self.resolver.resolve(key)?;
        let image = self.extractor.extract(&handle)?;
        drop(handle);
        Ok(encode_png(&image)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_path_gets_default_icon() {
        let service = IconResourceService::shell(Arc::new(IconCache::new()));
        let icon = service.get_display_icon("");
        assert_eq!(&icon, generic_file_icon());
        assert!(service.cache().is_empty());
    }

    #[test]
    fn flights_are_removed_once_finished() {
        let service = IconResourceService::shell(Arc::new(IconCache::new()));
        let dir = tempfile::tempdir().unwrap();
        let _ = service.get_display_icon(dir.path().join("missing.lnk"));
        assert!(service.in_flight.lock_ignore_poison().is_empty());
    }

    #[test]
    fn invalidation_drops_running_flights() {
        let service = IconResourceService::shell(Arc::new(IconCache::new()));
        let key = Path::new("/apps/editor.lnk");
        let stale = service.join_flight(key);
        service.invalidate_all();

        let fresh = service.join_flight(key);
        assert!(!Arc::ptr_eq(&stale, &fresh));
        // The old flight finishing must not evict the new one.
        service.leave_flight(key, &stale);
        assert_eq!(service.in_flight.lock_ignore_poison().len(), 1);
        service.leave_flight(key, &fresh);
        assert!(service.in_flight.lock_ignore_poison().is_empty());
    }

    #[cfg(windows)]
    #[test]
    fn caches_real_shell_icon() {
        let service = IconResourceService::shell(Arc::new(IconCache::new()));
        let notepad = Path::new(r"C:\Windows\System32\notepad.exe");
        let first = service.get_display_icon(notepad);
        assert_ne!(&first, generic_file_icon());
        assert_eq!(service.cache().len(), 1);
        assert_eq!(service.get_display_icon(notepad), first);
    }
}

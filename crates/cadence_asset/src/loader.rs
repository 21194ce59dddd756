// loader.rs - Files under an asset root, decoded into a ResourceCache
//
// Asset paths are relative, '/'-separated and keyed by HashKey::of_str(path),
// so the same path always maps to the same cache entry.

use crate::cache::{CacheError, ResourceCache, ResourceHandle};
use cadence_core::{HashKey, HashKeyBuilder};
use std::error::Error;
use std::io;
use std::path::{Component, Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("asset path `{0}` must be relative and stay inside the asset root")]
    InvalidPath(String),

    #[error("failed to read asset {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to decode asset {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },

    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Reads assets relative to a root directory.
#[derive(Debug, Clone)]
pub struct AssetLoader {
    root: PathBuf,
}

impl AssetLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Cache key for an asset path.
    pub fn key_for(path: &str) -> HashKey {
        HashKey::of_str(path)
    }

    /// Resolve `path` under the root, rejecting absolute paths and `..`.
    pub fn resolve(&self, path: &str) -> Result<PathBuf, AssetError> {
        let relative = Path::new(path);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if path.is_empty() || escapes {
            return Err(AssetError::InvalidPath(path.to_string()));
        }
        Ok(self.root.join(relative))
    }

    /// Read an asset's raw bytes, bypassing any cache.
    pub fn read(&self, path: &str) -> Result<Vec<u8>, AssetError> {
        let full = self.resolve(path)?;
        let bytes = std::fs::read(&full).map_err(|source| AssetError::Io {
            path: full.clone(),
            source,
        })?;
        tracing::debug!(path = %full.display(), bytes = bytes.len(), "asset read");
        Ok(bytes)
    }

    /// Load `path` into `cache`, decoding the file bytes with `decode`.
    ///
    /// A resident asset is shared without touching the filesystem.
    pub fn load<T, F, E>(
        &self,
        cache: &ResourceCache<T>,
        path: &str,
        decode: F,
    ) -> Result<ResourceHandle<T>, AssetError>
    where
        F: FnOnce(Vec<u8>) -> Result<T, E>,
        E: Into<Box<dyn Error + Send + Sync>>,
    {
        let full = self.resolve(path)?;
        let handle = cache.acquire(Self::key_for(path), || -> Result<T, AssetError> {
            let bytes = self.read(path)?;
            decode(bytes).map_err(|err| AssetError::Decode {
                path: full,
                source: err.into(),
            })
        })?;
        Ok(handle)
    }

    /// Like [`load`](Self::load), but a failed load is logged and replaced
    /// by a cached `placeholder` value so callers can carry on.
    ///
    /// Only fails if the placeholder itself cannot be cached (cancellation).
    pub fn load_or_placeholder<T, F, E, P>(
        &self,
        cache: &ResourceCache<T>,
        path: &str,
        decode: F,
        placeholder: P,
    ) -> Result<ResourceHandle<T>, AssetError>
    where
        F: FnOnce(Vec<u8>) -> Result<T, E>,
        E: Into<Box<dyn Error + Send + Sync>>,
        P: FnOnce() -> T,
    {
        match self.load(cache, path, decode) {
            Ok(handle) => Ok(handle),
            Err(err) => {
                tracing::warn!(path, error = %err, "asset unavailable, using placeholder");
                let key = HashKeyBuilder::new()
                    .write(b"placeholder:")
                    .write(path.as_bytes())
                    .finish();
                let handle =
                    cache.acquire(key, || Ok::<_, std::convert::Infallible>(placeholder()))?;
                Ok(handle)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir()
            .join("cadence_asset_tests")
            .join(format!("{name}_{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn utf8(bytes: Vec<u8>) -> Result<String, std::string::FromUtf8Error> {
        String::from_utf8(bytes)
    }

    #[test]
    fn loads_and_shares_file_contents() {
        let root = scratch_dir("shares");
        fs::write(root.join("greeting.txt"), "hello").unwrap();
        let loader = AssetLoader::new(&root);
        let cache = ResourceCache::new();

        let first = loader.load(&cache, "greeting.txt", utf8).unwrap();
        assert_eq!(&*first, "hello");

        // Resident assets are not re-read.
        fs::remove_file(root.join("greeting.txt")).unwrap();
        let second = loader.load(&cache, "greeting.txt", utf8).unwrap();
        assert!(first.ptr_eq(&second));
        assert_eq!(first.key(), AssetLoader::key_for("greeting.txt"));
    }

    #[test]
    fn missing_file_is_not_cached() {
        let root = scratch_dir("missing");
        let loader = AssetLoader::new(&root);
        let cache = ResourceCache::<String>::new();

        let err = loader.load(&cache, "missing.png", utf8).unwrap_err();
        assert!(matches!(err, AssetError::Cache(CacheError::LoadFailed { .. })));
        assert!(cache.is_empty());

        fs::write(root.join("missing.png"), "now here").unwrap();
        assert_eq!(&*loader.load(&cache, "missing.png", utf8).unwrap(), "now here");
    }

    #[test]
    fn decode_errors_are_reported() {
        let root = scratch_dir("decode");
        fs::write(root.join("binary.bin"), [0xffu8, 0xfe]).unwrap();
        let loader = AssetLoader::new(&root);
        let cache = ResourceCache::<String>::new();

        let err = loader.load(&cache, "binary.bin", utf8).unwrap_err();
        let AssetError::Cache(CacheError::LoadFailed { source, .. }) = &err else {
            panic!("expected load failure, got {err:?}");
        };
        assert!(source.to_string().contains("decode"));
    }

    #[test]
    fn placeholder_stands_in_for_missing_assets() {
        let root = scratch_dir("placeholder");
        let loader = AssetLoader::new(&root);
        let cache = ResourceCache::<String>::new();

        let handle = loader
            .load_or_placeholder(&cache, "sounds/bounce.wav", utf8, String::new)
            .unwrap();
        assert!(handle.is_empty());
        assert_eq!(cache.len(), 1);
        assert!(!cache.contains(AssetLoader::key_for("sounds/bounce.wav")));
    }

    #[test]
    fn rejects_paths_outside_root() {
        let loader = AssetLoader::new("assets");
        assert!(matches!(loader.resolve("../secret"), Err(AssetError::InvalidPath(_))));
        assert!(matches!(loader.resolve("/etc/passwd"), Err(AssetError::InvalidPath(_))));
        assert!(matches!(loader.resolve(""), Err(AssetError::InvalidPath(_))));
        assert_eq!(
            loader.resolve("sounds/bounce.wav").unwrap(),
            Path::new("assets").join("sounds/bounce.wav")
        );
    }
}

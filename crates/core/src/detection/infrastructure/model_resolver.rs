use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::shared::constants::APP_DIR_NAME;

#[derive(Error, Debug)]
pub enum ModelResolveError {
    #[error("model file not found: {0}")]
    Missing(PathBuf),
    #[error("model {name} is not cached and no download URL was given")]
    NotFound { name: String },
    #[error("failed to create cache directory: {0}")]
    CacheDir(#[source] std::io::Error),
    #[error("download failed for {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to write model to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not determine cache directory")]
    NoCacheDir,
}

/// Progress callback: `(bytes_downloaded, total_bytes)`.
/// `total_bytes` is 0 if the server didn't provide Content-Length.
pub type ProgressFn = Box<dyn Fn(u64, u64) + Send>;

/// Where to look for a model file.
#[derive(Default)]
pub struct ModelSource<'a> {
    /// A path given by the user. When set, nothing else is consulted.
    pub explicit: Option<&'a Path>,
    pub bundled_dir: Option<&'a Path>,
    pub url: Option<&'a str>,
}

/// Resolve a model file by name.
///
/// Resolution order:
/// 1. Explicit path (must exist)
/// 2. User cache directory (platform-specific)
/// 3. Bundled directory
/// 4. Download from URL into the cache
pub fn resolve(
    name: &str,
    source: ModelSource<'_>,
    progress: Option<ProgressFn>,
) -> Result<PathBuf, ModelResolveError> {
    if let Some(path) = source.explicit {
        return if path.exists() {
            Ok(path.to_path_buf())
        } else {
            Err(ModelResolveError::Missing(path.to_path_buf()))
        };
    }

    let cache_dir = model_cache_dir()?;
    let cached_path = cache_dir.join(name);
    if cached_path.exists() {
        return Ok(cached_path);
    }

    if let Some(dir) = source.bundled_dir {
        let bundled_path = dir.join(name);
        if bundled_path.exists() {
            return Ok(bundled_path);
        }
    }

    let Some(url) = source.url else {
        return Err(ModelResolveError::NotFound {
            name: name.to_string(),
        });
    };
    log::info!("Downloading {name} from {url}");
    fs::create_dir_all(&cache_dir).map_err(ModelResolveError::CacheDir)?;
    download(url, &cached_path, progress)?;
    Ok(cached_path)
}

/// Platform-specific model cache directory.
///
/// - macOS: `~/Library/Application Support/FaceOverlay/models/`
/// - Linux: `$XDG_CACHE_HOME/FaceOverlay/models/` or `~/.cache/FaceOverlay/models/`
/// - Windows: `%LOCALAPPDATA%/FaceOverlay/models/`
pub fn model_cache_dir() -> Result<PathBuf, ModelResolveError> {
    #[cfg(target_os = "macos")]
    let base = dirs::data_dir();
    #[cfg(not(target_os = "macos"))]
    let base = dirs::cache_dir();

    base.map(|d| d.join(APP_DIR_NAME).join("models"))
        .ok_or(ModelResolveError::NoCacheDir)
}

fn download(url: &str, dest: &Path, progress: Option<ProgressFn>) -> Result<(), ModelResolveError> {
    let temp_path = dest.with_extension("part");

    let result = download_inner(url, dest, &temp_path, progress);

    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }

    result
}

fn download_inner(
    url: &str,
    dest: &Path,
    temp_path: &Path,
    progress: Option<ProgressFn>,
) -> Result<(), ModelResolveError> {
    let mut response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .map_err(|e| ModelResolveError::Download {
            url: url.to_string(),
            source: e,
        })?;

    let total = response.content_length().unwrap_or(0);
    let mut downloaded: u64 = 0;
    let mut file = fs::File::create(temp_path).map_err(write_err(temp_path))?;

    let mut buf = vec![0u8; 256 * 1024];
    loop {
        let n = response.read(&mut buf).map_err(write_err(temp_path))?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n]).map_err(write_err(temp_path))?;
        downloaded += n as u64;
        if let Some(ref cb) = progress {
            cb(downloaded, total);
        }
    }

    file.flush().map_err(write_err(temp_path))?;
    drop(file);

    fs::rename(temp_path, dest).map_err(write_err(dest))
}

fn write_err(path: &Path) -> impl FnOnce(std::io::Error) -> ModelResolveError {
    let path = path.to_path_buf();
    move |source| ModelResolveError::Write { path, source }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_explicit_path_is_returned() {
        let tmp = TempDir::new().unwrap();
        let model = tmp.path().join("face.onnx");
        fs::write(&model, b"model").unwrap();

        let source = ModelSource {
            explicit: Some(&model),
            ..Default::default()
        };
        assert_eq!(resolve("ignored.onnx", source, None).unwrap(), model);
    }

    #[test]
    fn test_missing_explicit_path_errors() {
        let source = ModelSource {
            explicit: Some(Path::new("/nonexistent/face.onnx")),
            ..Default::default()
        };
        let err = resolve("face.onnx", source, None).unwrap_err();
        assert!(matches!(err, ModelResolveError::Missing(_)));
    }

    #[test]
    fn test_bundled_dir_is_consulted() {
        let tmp = TempDir::new().unwrap();
        let name = "faceoverlay_bundled_test_model.onnx";
        fs::write(tmp.path().join(name), b"bundled").unwrap();

        let source = ModelSource {
            bundled_dir: Some(tmp.path()),
            ..Default::default()
        };
        assert_eq!(resolve(name, source, None).unwrap(), tmp.path().join(name));
    }

    #[test]
    fn test_not_found_without_url() {
        let err = resolve(
            "faceoverlay_never_cached_model.onnx",
            ModelSource::default(),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, ModelResolveError::NotFound { .. }));
    }

    #[test]
    fn test_model_cache_dir_returns_path() {
        let path = model_cache_dir().unwrap();
        assert!(path.to_string_lossy().contains(APP_DIR_NAME));
        assert!(path.ends_with("models"));
    }

    #[test]
    fn test_download_atomic_no_partial_on_failure() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("model.onnx");
        let result = download("http://invalid.nonexistent.example.com/model", &dest, None);
        assert!(result.is_err());
        assert!(!dest.exists());
        assert!(!dest.with_extension("part").exists());
    }
}

//! On-disk cache of compile results, keyed by a SHA-256 of the document source.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::compile::CompileResult;

#[derive(Serialize, Deserialize)]
pub struct CacheEntry {
    pub hash: String,
    pub result: CompileResult,
}

pub struct IncrementalCache {
    cache_dir: PathBuf,
}

impl IncrementalCache {
    pub fn new(cache_dir: impl AsRef<Path>) -> Self {
        let cache_dir = cache_dir.as_ref().to_path_buf();
        if !cache_dir.exists() {
            if let Err(e) = fs::create_dir_all(&cache_dir) {
                warn!(dir = %cache_dir.display(), error = %e, "cannot create cache directory");
            }
        }
        Self { cache_dir }
    }

    pub fn compute_hash(source: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(source.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    fn get_cache_path(&self, source_id: &str) -> PathBuf {
        let safe_name = source_id
            .replace('/', "_")
            .replace('\\', "_")
            .replace(':', "_")
            .replace('?', "_");
        self.cache_dir.join(format!("{}.json", safe_name))
    }

    pub fn get(&self, source_id: &str, source: &str) -> Option<CompileResult> {
        let cache_path = self.get_cache_path(source_id);
        let data = fs::read_to_string(&cache_path).ok()?;

        let entry: CacheEntry = match serde_json::from_str(&data) {
            Ok(e) => e,
            Err(e) => {
                warn!(source_id, error = %e, "discarding corrupt cache entry");
                fs::remove_file(cache_path).ok();
                return None;
            }
        };

        if entry.hash == Self::compute_hash(source) {
            debug!(source_id, "cache hit");
            Some(entry.result)
        } else {
            None
        }
    }

    pub fn set(&self, source_id: &str, source: &str, result: &CompileResult) {
        let cache_path = self.get_cache_path(source_id);
        let entry = CacheEntry {
            hash: Self::compute_hash(source),
            result: result.clone(),
        };
        match serde_json::to_string(&entry) {
            Ok(data) => {
                if let Err(e) = fs::write(&cache_path, data) {
                    warn!(path = %cache_path.display(), error = %e, "cannot write cache entry");
                }
            }
            Err(e) => warn!(source_id, error = %e, "cannot serialize cache entry"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("treaty-cache-{}-{}", name, std::process::id()));
        fs::remove_dir_all(&dir).ok();
        dir
    }

    fn sample() -> CompileResult {
        CompileResult {
            code: "export default x;\n".into(),
            component_name: "x".into(),
            dependencies: vec!["Card".into()],
            warnings: Vec::new(),
        }
    }

    #[test]
    fn test_hit_and_miss_by_content() {
        let dir = scratch_dir("hit");
        let cache = IncrementalCache::new(&dir);
        cache.set("src/x.treaty", "<p>a</p>", &sample());
        assert_eq!(cache.get("src/x.treaty", "<p>a</p>"), Some(sample()));
        assert_eq!(cache.get("src/x.treaty", "<p>b</p>"), None);
        assert_eq!(cache.get("src/y.treaty", "<p>a</p>"), None);
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_corrupt_entry_is_discarded() {
        let dir = scratch_dir("corrupt");
        let cache = IncrementalCache::new(&dir);
        let path = cache.get_cache_path("bad.treaty");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(cache.get("bad.treaty", "x"), None);
        assert!(!path.exists());
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_hash_is_stable() {
        assert_eq!(
            IncrementalCache::compute_hash(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}

//! Batch compilation: discover documents under a directory and compile them in
//! parallel. One document failing never affects the others.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info_span, warn};
use walkdir::WalkDir;

use crate::cache::IncrementalCache;
use crate::compile::{compile_document, CompileOptions, CompileResult};
use crate::error::CompileError;
use crate::host::HostHandle;

/// Outcome for one document.
#[derive(Debug)]
pub struct BatchOutcome {
    pub path: PathBuf,
    pub result: Result<CompileResult, CompileError>,
    pub from_cache: bool,
}

/// Serializable summary of a batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub compiled: Vec<String>,
    pub cached: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl BatchSummary {
    pub fn from_outcomes(outcomes: &[BatchOutcome]) -> Self {
        let mut summary = BatchSummary::default();
        for outcome in outcomes {
            let path = outcome.path.to_string_lossy().to_string();
            match (&outcome.result, outcome.from_cache) {
                (Ok(_), true) => summary.cached.push(path),
                (Ok(_), false) => summary.compiled.push(path),
                (Err(e), _) => summary.failed.push((path, e.to_string())),
            }
        }
        summary
    }
}

/// All files under `root` with the given extension, sorted.
pub fn discover_documents(root: &Path, extension: &str) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(error = %e, "skipping unreadable entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| entry.path().extension().map_or(false, |ext| ext == extension))
        .map(|entry| entry.into_path())
        .collect();
    files.sort();
    files
}

/// Compile every path in parallel, consulting the cache when `cacheDir` is set.
pub fn compile_all(
    paths: &[PathBuf],
    host: &HostHandle,
    options: &CompileOptions,
) -> Vec<BatchOutcome> {
    let cache = options.cache_dir.as_ref().map(IncrementalCache::new);

    paths
        .par_iter()
        .map(|path| {
            let _span = info_span!("compile", path = %path.display()).entered();
            compile_one(path, host, options, cache.as_ref())
        })
        .collect()
}

fn compile_one(
    path: &Path,
    host: &HostHandle,
    options: &CompileOptions,
    cache: Option<&IncrementalCache>,
) -> BatchOutcome {
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(source) => {
            return BatchOutcome {
                path: path.to_path_buf(),
                result: Err(CompileError::Io {
                    path: path.to_path_buf(),
                    source,
                }),
                from_cache: false,
            }
        }
    };
    let source_id = path.to_string_lossy();

    if let Some(hit) = cache.and_then(|c| c.get(&source_id, &source)) {
        return BatchOutcome {
            path: path.to_path_buf(),
            result: Ok(hit),
            from_cache: true,
        };
    }

    let result = compile_document(&source, &source_id, host, options);
    if let (Some(cache), Ok(compiled)) = (cache, &result) {
        cache.set(&source_id, &source, compiled);
    }
    BatchOutcome {
        path: path.to_path_buf(),
        result,
        from_cache: false,
    }
}

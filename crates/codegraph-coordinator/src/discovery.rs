use codegraph_core::{CodeGraphError, ProcessingConfig, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Discover files under `root` matching `processing.include_globs` while respecting
/// `processing.exclude_globs` (§4.7 step 1). `.gitignore` is honored, matching the
/// surrounding toolchain's usual file-walking behavior.
pub fn discover_files(root: &Path, processing: &ProcessingConfig) -> Result<Vec<PathBuf>> {
    let include_set = build_globset(&processing.include_globs)?;
    let exclude_set = build_globset(&processing.exclude_globs)?;

    let walker = WalkBuilder::new(root)
        .hidden(false)
        .git_ignore(true)
        .git_exclude(true)
        .build();

    let mut files = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("file discovery walk error: {e}");
                continue;
            }
        };

        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if exclude_set.as_ref().is_some_and(|set| set.is_match(path)) {
            continue;
        }
        if let Some(set) = &include_set {
            if !set.is_match(path) {
                continue;
            }
        }

        files.push(path.to_path_buf());
    }

    debug!("discovered {} files under {:?}", files.len(), root);
    Ok(files)
}

fn build_globset(patterns: &[String]) -> Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| CodeGraphError::Configuration(format!("invalid glob '{pattern}': {e}")))?;
        builder.add(glob);
    }
    let set = builder
        .build()
        .map_err(|e| CodeGraphError::Configuration(format!("failed to build glob set: {e}")))?;
    Ok(Some(set))
}

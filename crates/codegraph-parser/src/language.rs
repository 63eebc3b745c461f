use codegraph_core::{CodeGraphError, Language, Result};
use semver::Version;
use std::path::{Path, PathBuf};

/// Where to look for grammar shared objects and what file they're expected to be named.
///
/// Each language lives under `search_root/<language>/<version>/<artifact>`, e.g.
/// `grammars/typescript/0.23.2/typescript.so`. The highest SemVer-sorted `<version>`
/// subdirectory that actually contains `<artifact>` wins (§4.1).
#[derive(Debug, Clone)]
pub struct GrammarSearchConfig {
    pub search_root: PathBuf,
}

struct LanguageDescriptor {
    directory: &'static str,
    artifact_stem: &'static str,
    symbol: &'static str,
    extensions: &'static [&'static str],
}

fn descriptor(language: Language) -> LanguageDescriptor {
    match language {
        Language::TypeScript => LanguageDescriptor {
            directory: "typescript",
            artifact_stem: "typescript",
            symbol: "tree_sitter_typescript",
            extensions: &["ts", "tsx"],
        },
        Language::JavaScript => LanguageDescriptor {
            directory: "javascript",
            artifact_stem: "javascript",
            symbol: "tree_sitter_javascript",
            extensions: &["js", "jsx"],
        },
    }
}

/// Platform-appropriate shared-object file name for a grammar artifact stem.
fn artifact_file_name(stem: &str) -> String {
    if cfg!(target_os = "windows") {
        format!("{stem}.dll")
    } else if cfg!(target_os = "macos") {
        format!("lib{stem}.dylib")
    } else {
        format!("lib{stem}.so")
    }
}

/// Detect the language id for a path by extension (§4.1). Case-insensitive; unknown
/// extensions default to TypeScript rather than failing, since the extractor's node-type
/// tables degrade gracefully on a grammar mismatch (everything just fails to match and
/// produces zero elements for that file).
pub fn detect_language(path: &str) -> Language {
    let extension = Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    match extension.as_deref() {
        Some("ts") | Some("tsx") => Language::TypeScript,
        Some("js") | Some("jsx") => Language::JavaScript,
        _ => Language::TypeScript,
    }
}

/// Find the newest SemVer-sorted subdirectory of `search_root/<language>/` containing the
/// expected grammar artifact.
pub fn resolve_grammar_path(config: &GrammarSearchConfig, language: Language) -> Result<PathBuf> {
    let descriptor = descriptor(language);
    let language_dir = config.search_root.join(descriptor.directory);
    let artifact_name = artifact_file_name(descriptor.artifact_stem);

    let entries = std::fs::read_dir(&language_dir).map_err(|_| CodeGraphError::GrammarNotFound {
        language: language.to_string(),
    })?;

    let mut candidates: Vec<(Version, PathBuf)> = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let Some(dir_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Ok(version) = Version::parse(dir_name) else {
            continue;
        };
        let artifact_path = path.join(&artifact_name);
        if artifact_path.is_file() {
            candidates.push((version, artifact_path));
        }
    }

    candidates.sort_by(|a, b| a.0.cmp(&b.0));
    candidates
        .pop()
        .map(|(_, path)| path)
        .ok_or_else(|| CodeGraphError::GrammarNotFound {
            language: language.to_string(),
        })
}

/// Load the `tree_sitter::Language` out of a grammar shared object at `path`.
///
/// The returned `libloading::Library` must be kept alive for as long as the `Language` is
/// in use: the grammar's function table lives inside the mapped library.
pub fn load_grammar(path: &Path, language: Language) -> Result<(libloading::Library, tree_sitter::Language)> {
    let descriptor = descriptor(language);
    let lib = unsafe { libloading::Library::new(path) }.map_err(|e| CodeGraphError::GrammarLoadFailed {
        language: language.to_string(),
        reason: e.to_string(),
    })?;

    let ts_language = unsafe {
        let symbol: libloading::Symbol<unsafe extern "C" fn() -> tree_sitter::Language> =
            lib.get(descriptor.symbol.as_bytes()).map_err(|e| CodeGraphError::GrammarLoadFailed {
                language: language.to_string(),
                reason: format!("missing symbol {}: {e}", descriptor.symbol),
            })?;
        symbol()
    };

    Ok((lib, ts_language))
}

pub fn extensions_for(language: Language) -> &'static [&'static str] {
    descriptor(language).extensions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_known_extensions_case_insensitively() {
        assert_eq!(detect_language("src/App.TSX"), Language::TypeScript);
        assert_eq!(detect_language("src/index.js"), Language::JavaScript);
        assert_eq!(detect_language("src/worker.JSX"), Language::JavaScript);
    }

    #[test]
    fn unknown_extension_defaults_to_typescript() {
        assert_eq!(detect_language("README.md"), Language::TypeScript);
        assert_eq!(detect_language("noext"), Language::TypeScript);
    }

    #[test]
    fn resolve_grammar_path_picks_highest_semver_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let ts_dir = tmp.path().join("typescript");
        for version in ["0.20.0", "0.23.2", "0.21.0"] {
            let dir = ts_dir.join(version);
            std::fs::create_dir_all(&dir).unwrap();
            std::fs::write(dir.join(artifact_file_name("typescript")), b"stub").unwrap();
        }
        let config = GrammarSearchConfig {
            search_root: tmp.path().to_path_buf(),
        };
        let resolved = resolve_grammar_path(&config, Language::TypeScript).unwrap();
        assert!(resolved.to_string_lossy().contains("0.23.2"));
    }

    #[test]
    fn resolve_grammar_path_fails_when_directory_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let config = GrammarSearchConfig {
            search_root: tmp.path().to_path_buf(),
        };
        assert!(matches!(
            resolve_grammar_path(&config, Language::JavaScript),
            Err(CodeGraphError::GrammarNotFound { .. })
        ));
    }
}

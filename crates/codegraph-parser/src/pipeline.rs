use crate::extractor::{extract_file, FileParseResult};
use crate::language::{detect_language, GrammarSearchConfig};
use crate::registry::ParserRegistry;
use codegraph_core::{CodeGraphError, Language, Result};
use tree_sitter::Tree;

/// Ties the parser registry (C1) and the element extractor (C2) together behind the one
/// call the indexing coordinator actually needs per file.
pub struct ParsingPipeline {
    registry: ParserRegistry,
}

impl ParsingPipeline {
    pub fn new(search: GrammarSearchConfig) -> Self {
        Self {
            registry: ParserRegistry::new(search),
        }
    }

    pub fn registry(&self) -> &ParserRegistry {
        &self.registry
    }

    /// Parse `source` with the grammar for `language_id`, producing a tree even for
    /// malformed input — error nodes are left for the extractor to report (§4.1).
    pub fn parse(&self, source: &str, language_id: Language) -> Result<Tree> {
        let mut parser = self.registry.get_parser(language_id)?;
        parser
            .parse(source, None)
            .ok_or_else(|| CodeGraphError::Parse {
                file_path: String::new(),
                reason: "tree-sitter returned no tree".to_string(),
            })
    }

    /// Detect the language, parse, and extract elements for one file in a single call.
    pub fn parse_file(&self, file_path: &str, source: &str) -> Result<FileParseResult> {
        let language = detect_language(file_path);
        let tree = self.parse(source, language).map_err(|e| match e {
            CodeGraphError::Parse { reason, .. } => CodeGraphError::Parse {
                file_path: file_path.to_string(),
                reason,
            },
            other => other,
        })?;
        Ok(extract_file(language, file_path, source, &tree))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_file_surfaces_grammar_not_found_when_no_grammars_are_installed() {
        let tmp = tempfile::tempdir().unwrap();
        let pipeline = ParsingPipeline::new(GrammarSearchConfig {
            search_root: tmp.path().to_path_buf(),
        });
        let err = pipeline.parse_file("src/a.ts", "export function f() {}").unwrap_err();
        assert!(matches!(err, CodeGraphError::GrammarNotFound { .. }));
    }
}

use codegraph_core::{CodeElement, ElementId};
use codegraph_parser::ImportStatement;
use dashmap::DashMap;

/// Cross-file name index feeding the resolution policy in §4.3.
///
/// Populated incrementally, one file's elements at a time, as the coordinator processes
/// the workspace; later files can resolve calls into earlier ones and vice versa once the
/// coordinator runs a second linking pass.
#[derive(Default)]
pub struct NameIndex {
    by_name: DashMap<String, Vec<(ElementId, String, bool)>>, // (id, file_path, exported)
}

impl NameIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn index_file(&self, elements: &[CodeElement]) {
        for element in elements {
            self.by_name
                .entry(element.element_name.clone())
                .or_default()
                .push((element.id.clone(), element.file_path.clone(), element.exported));
        }
    }

    /// Resolution policy (§4.3): same file first, then imports' origin module, then the
    /// global index preferring same file > same package (directory) > exported.
    pub fn resolve(&self, name: &str, current_file: &str, current_file_elements: &[CodeElement], imports: &[ImportStatement]) -> Option<ElementId> {
        if let Some(local) = current_file_elements.iter().find(|e| e.element_name == name) {
            return Some(local.id.clone());
        }

        let candidates = self.by_name.get(name)?;
        if candidates.is_empty() {
            return None;
        }

        let importing_module = imports
            .iter()
            .find(|i| i.specifiers.contains(name) || i.alias.as_deref() == Some(name))
            .map(|i| i.module_path.clone());

        if let Some(module) = importing_module {
            if let Some((id, ..)) = candidates.iter().find(|(_, file, _)| file.contains(module.trim_start_matches("./").trim_start_matches("../"))) {
                return Some(id.clone());
            }
        }

        let current_dir = current_file.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
        if let Some((id, ..)) = candidates.iter().find(|(_, file, _)| {
            file.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("") == current_dir
        }) {
            return Some(id.clone());
        }

        if let Some((id, ..)) = candidates.iter().find(|(_, _, exported)| *exported) {
            return Some(id.clone());
        }

        candidates.first().map(|(id, ..)| id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codegraph_core::{ElementKind, Span};
    use std::collections::HashSet;

    fn element(name: &str, file_path: &str, exported: bool) -> CodeElement {
        let now = chrono::Utc::now();
        CodeElement {
            id: ElementId::new(file_path, name, 0),
            file_path: file_path.to_string(),
            element_name: name.to_string(),
            element_type: ElementKind::Function,
            span: Span {
                start_byte: 0,
                end_byte: 1,
                start_line: 1,
                end_line: 1,
                start_column: 0,
                end_column: 1,
            },
            content: String::new(),
            content_hash: String::new(),
            description: None,
            search_phrases: HashSet::new(),
            exported,
            is_async: false,
            parameters: vec![],
            return_type: None,
            inheritance: vec![],
            visibility: None,
            content_embedding: None,
            semantic_embedding: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn resolves_same_file_before_consulting_the_global_index() {
        let index = NameIndex::new();
        let other = element("helper", "src/b.ts", true);
        index.index_file(&[other.clone()]);
        let local = element("helper", "src/a.ts", false);
        let resolved = index.resolve("helper", "src/a.ts", &[local.clone()], &[]);
        assert_eq!(resolved, Some(local.id));
    }

    #[test]
    fn falls_back_to_exported_candidate_when_nothing_else_matches() {
        let index = NameIndex::new();
        let private = element("util", "src/x.ts", false);
        let public = element("util", "src/y.ts", true);
        index.index_file(&[private, public.clone()]);
        let resolved = index.resolve("util", "src/z.ts", &[], &[]);
        assert_eq!(resolved, Some(public.id));
    }

    #[test]
    fn unresolved_name_returns_none() {
        let index = NameIndex::new();
        assert_eq!(index.resolve("missing", "src/a.ts", &[], &[]), None);
    }
}

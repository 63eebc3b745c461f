use codegraph_core::{CodeElement, ElementId, ElementKind, Language, Parameter, Span};
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tree_sitter::{Node, Tree, TreeCursor};

/// Kind of import clause (§4.3), recorded on [`ImportStatement`] for the relationship
/// analyzer to turn into a structural edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    Default,
    Named,
    Namespace,
    SideEffect,
}

#[derive(Debug, Clone)]
pub struct ImportStatement {
    pub module_path: String,
    pub import_kind: ImportKind,
    pub specifiers: HashSet<String>,
    pub alias: Option<String>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ExportStatement {
    pub re_export_from: Option<String>,
    pub specifiers: HashSet<String>,
    pub span: Span,
}

/// Output of extracting one file (§4.2).
#[derive(Debug, Clone)]
pub struct FileParseResult {
    pub file_path: String,
    pub elements: Vec<CodeElement>,
    pub imports: Vec<ImportStatement>,
    pub exports: Vec<ExportStatement>,
    pub errors: Vec<String>,
    pub processing_time: Duration,
}

fn node_kind_to_element_kind(kind: &str) -> Option<ElementKind> {
    match kind {
        "function_declaration" | "function_expression" | "arrow_function" => Some(ElementKind::Function),
        "method_definition" => Some(ElementKind::Method),
        "class_declaration" => Some(ElementKind::Class),
        "interface_declaration" => Some(ElementKind::Interface),
        "type_alias_declaration" => Some(ElementKind::Type),
        "enum_declaration" => Some(ElementKind::Enum),
        "variable_declaration" | "lexical_declaration" => Some(ElementKind::Variable),
        _ => None,
    }
}

fn span_of(node: &Node) -> Span {
    Span {
        start_byte: node.start_byte(),
        end_byte: node.end_byte(),
        start_line: node.start_position().row as u32 + 1,
        end_line: node.end_position().row as u32 + 1,
        start_column: node.start_position().column as u32,
        end_column: node.end_position().column as u32,
    }
}

/// First `identifier`/`type_identifier` child, recursing into the lone
/// `variable_declarator` for declaration statements (§4.2).
fn extract_name(node: &Node, source: &[u8]) -> Option<String> {
    if matches!(node.kind(), "variable_declaration" | "lexical_declaration") {
        let mut cursor = node.walk();
        let declarator = node.children(&mut cursor).find(|c| c.kind() == "variable_declarator")?;
        let name_node = declarator.child_by_field_name("name")?;
        return name_node.utf8_text(source).ok().map(str::to_string);
    }

    if let Some(name_node) = node.child_by_field_name("name") {
        return name_node.utf8_text(source).ok().map(str::to_string);
    }

    let mut cursor = node.walk();
    node.children(&mut cursor)
        .find(|c| matches!(c.kind(), "identifier" | "type_identifier"))
        .and_then(|c| c.utf8_text(source).ok())
        .map(str::to_string)
}

fn extract_parameters(node: &Node, source: &[u8]) -> Vec<Parameter> {
    let Some(params_node) = node.child_by_field_name("parameters") else {
        return Vec::new();
    };
    let mut cursor = params_node.walk();
    params_node
        .children(&mut cursor)
        .filter(|c| matches!(c.kind(), "required_parameter" | "optional_parameter" | "identifier"))
        .enumerate()
        .map(|(position, param_node)| {
            let name = param_node
                .child_by_field_name("pattern")
                .or(Some(param_node))
                .and_then(|n| n.utf8_text(source).ok())
                .unwrap_or("")
                .to_string();
            let type_annotation = param_node
                .child_by_field_name("type")
                .and_then(|n| n.utf8_text(source).ok())
                .map(str::to_string);
            Parameter {
                name,
                type_annotation,
                position,
            }
        })
        .collect()
}

fn has_ancestor_of_kind(node: &Node, kind: &str) -> bool {
    let mut current = node.parent();
    while let Some(n) = current {
        if n.kind() == kind {
            return true;
        }
        current = n.parent();
    }
    false
}

fn is_async(node: &Node, source: &[u8]) -> bool {
    let mut cursor = node.walk();
    if node.children(&mut cursor).any(|c| c.kind() == "async") {
        return true;
    }
    node.utf8_text(source)
        .map(|t| t.trim_start().starts_with("async"))
        .unwrap_or(false)
}

fn return_type_of(node: &Node, source: &[u8]) -> Option<String> {
    node.child_by_field_name("return_type")
        .and_then(|n| n.utf8_text(source).ok())
        .map(str::to_string)
}

fn visibility_of(node: &Node, source: &[u8]) -> Option<String> {
    let mut cursor = node.walk();
    node.children(&mut cursor)
        .find(|c| matches!(c.kind(), "accessibility_modifier"))
        .and_then(|c| c.utf8_text(source).ok())
        .map(str::to_string)
}

/// Split a heritage clause's raw text into one entry per named supertype/interface, e.g.
/// `"extends Base<T> implements A, B"` -> `["extends Base", "implements A", "implements B"]`
/// (§4.3 scenario S2: one structural edge per named type, not one edge for the whole clause).
fn split_heritage(text: &str) -> Vec<String> {
    let text = text.trim();
    let mut result = Vec::new();

    let (extends_part, implements_part) = match text.find("implements") {
        Some(idx) => (text[..idx].trim(), Some(text[idx..].trim())),
        None => (text, None),
    };

    if let Some(rest) = extends_part.strip_prefix("extends") {
        let name = rest.split('<').next().unwrap_or(rest).trim();
        if !name.is_empty() {
            result.push(format!("extends {name}"));
        }
    }

    if let Some(rest) = implements_part.and_then(|p| p.strip_prefix("implements")) {
        for part in rest.split(',') {
            let name = part.split('<').next().unwrap_or(part).trim();
            if !name.is_empty() {
                result.push(format!("implements {name}"));
            }
        }
    }

    result
}

fn inheritance_of(node: &Node, source: &[u8]) -> Vec<String> {
    node.child_by_field_name("heritage")
        .and_then(|heritage| heritage.utf8_text(source).ok())
        .map(split_heritage)
        .unwrap_or_default()
}

struct ExtractionContext<'a> {
    file_path: &'a str,
    source: &'a str,
    elements: Vec<CodeElement>,
    imports: Vec<ImportStatement>,
    exports: Vec<ExportStatement>,
    errors: Vec<String>,
    reported_error_node: bool,
}

/// Walk `tree` and emit the elements, import/export records, and diagnostics for one file
/// (§4.2). Errors from unrecoverable parse faults are collected but never abort extraction.
pub fn extract_file(_language: Language, file_path: &str, source: &str, tree: &Tree) -> FileParseResult {
    let started = Instant::now();
    let mut ctx = ExtractionContext {
        file_path,
        source,
        elements: Vec::new(),
        imports: Vec::new(),
        exports: Vec::new(),
        errors: Vec::new(),
        reported_error_node: false,
    };

    let mut cursor = tree.root_node().walk();
    walk(&mut cursor, &mut ctx);

    FileParseResult {
        file_path: file_path.to_string(),
        elements: ctx.elements,
        imports: ctx.imports,
        exports: ctx.exports,
        errors: ctx.errors,
        processing_time: started.elapsed(),
    }
}

fn walk(cursor: &mut TreeCursor, ctx: &mut ExtractionContext) {
    let node = cursor.node();
    let source_bytes = ctx.source.as_bytes();

    if node.is_error() && !ctx.reported_error_node {
        ctx.errors.push(format!(
            "{}: parse error near line {}",
            ctx.file_path,
            node.start_position().row + 1
        ));
        ctx.reported_error_node = true;
    }

    match node.kind() {
        "import_statement" => {
            if let Some(import) = extract_import(&node, source_bytes) {
                ctx.imports.push(import);
            }
        }
        "export_statement" => {
            if let Some(export) = extract_export(&node, source_bytes) {
                ctx.exports.push(export);
            }
        }
        kind => {
            if let Some(element_kind) = node_kind_to_element_kind(kind) {
                if let Some(element) = build_element(&node, element_kind, ctx.file_path, ctx.source) {
                    // Filtering rule: drop symbols whose name extraction failed (§4.2).
                    if element.element_name != "unknown" {
                        ctx.elements.push(element);
                    }
                }
            }
        }
    }

    if cursor.goto_first_child() {
        loop {
            walk(cursor, ctx);
            if !cursor.goto_next_sibling() {
                break;
            }
        }
        cursor.goto_parent();
    }
}

fn build_element(node: &Node, kind: ElementKind, file_path: &str, source: &str) -> Option<CodeElement> {
    let source_bytes = source.as_bytes();
    let name = extract_name(node, source_bytes).unwrap_or_else(|| "unknown".to_string());
    let span = span_of(node);
    let content = node.utf8_text(source_bytes).ok()?.to_string();
    let content_hash = CodeElement::compute_content_hash(&content);
    let id = CodeElement::compute_id(file_path, &name, span.start_byte);
    let exported = has_ancestor_of_kind(node, "export_statement");
    let now = chrono::Utc::now();

    Some(CodeElement {
        id,
        file_path: file_path.to_string(),
        element_name: name,
        element_type: kind,
        span,
        content,
        content_hash,
        description: None,
        search_phrases: HashSet::new(),
        exported,
        is_async: is_async(node, source_bytes),
        parameters: extract_parameters(node, source_bytes),
        return_type: return_type_of(node, source_bytes),
        inheritance: inheritance_of(node, source_bytes),
        visibility: visibility_of(node, source_bytes),
        content_embedding: None,
        semantic_embedding: None,
        created_at: now,
        updated_at: now,
    })
}

fn extract_import(node: &Node, source: &[u8]) -> Option<ImportStatement> {
    let module_path = node
        .child_by_field_name("source")
        .and_then(|n| n.utf8_text(source).ok())
        .map(|s| s.trim_matches(|c| c == '"' || c == '\'').to_string())
        .unwrap_or_default();

    let mut specifiers = HashSet::new();
    let mut alias = None;
    let mut kind = ImportKind::SideEffect;

    if let Some(clause) = node.child_by_field_name("import_clause") {
        let mut cursor = clause.walk();
        for child in clause.children(&mut cursor) {
            match child.kind() {
                "identifier" => {
                    kind = ImportKind::Default;
                    if let Ok(text) = child.utf8_text(source) {
                        specifiers.insert(text.to_string());
                        alias = Some(text.to_string());
                    }
                }
                "namespace_import" => {
                    kind = ImportKind::Namespace;
                    if let Ok(text) = child.utf8_text(source) {
                        alias = Some(text.trim_start_matches('*').trim_start_matches("as").trim().to_string());
                    }
                }
                "named_imports" => {
                    kind = ImportKind::Named;
                    let mut spec_cursor = child.walk();
                    for spec in child.children(&mut spec_cursor) {
                        if spec.kind() == "import_specifier" {
                            if let Ok(text) = spec.utf8_text(source) {
                                specifiers.insert(text.to_string());
                            }
                        }
                    }
                }
                _ => {}
            }
        }
    }

    Some(ImportStatement {
        module_path,
        import_kind: kind,
        specifiers,
        alias,
        span: span_of(node),
    })
}

fn extract_export(node: &Node, source: &[u8]) -> Option<ExportStatement> {
    let re_export_from = node
        .child_by_field_name("source")
        .and_then(|n| n.utf8_text(source).ok())
        .map(|s| s.trim_matches(|c| c == '"' || c == '\'').to_string());

    let mut specifiers = HashSet::new();
    if let Some(clause) = node.child_by_field_name("declaration").or_else(|| node.child(1)) {
        if let Ok(text) = clause.utf8_text(source) {
            specifiers.insert(text.lines().next().unwrap_or(text).trim().to_string());
        }
    }

    Some(ExportStatement {
        re_export_from,
        specifiers,
        span: span_of(node),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_kind_mapping_covers_recognized_types() {
        assert_eq!(node_kind_to_element_kind("function_declaration"), Some(ElementKind::Function));
        assert_eq!(node_kind_to_element_kind("class_declaration"), Some(ElementKind::Class));
        assert_eq!(node_kind_to_element_kind("export_statement"), None);
        assert_eq!(node_kind_to_element_kind("import_statement"), None);
    }

    #[test]
    fn split_heritage_emits_one_entry_per_superclass_and_interface() {
        assert_eq!(
            split_heritage("extends B implements C"),
            vec!["extends B".to_string(), "implements C".to_string()]
        );
    }

    #[test]
    fn split_heritage_splits_multiple_implemented_interfaces() {
        assert_eq!(
            split_heritage("implements A, B"),
            vec!["implements A".to_string(), "implements B".to_string()]
        );
    }

    #[test]
    fn split_heritage_strips_generic_type_arguments() {
        assert_eq!(split_heritage("extends Base<T>"), vec!["extends Base".to_string()]);
    }

    #[test]
    fn split_heritage_handles_extends_only() {
        assert_eq!(split_heritage("extends B"), vec!["extends B".to_string()]);
    }
}

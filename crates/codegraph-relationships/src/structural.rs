use crate::resolver::NameIndex;
use codegraph_core::{
    CodeElement, ElementId, ImportType, RelationshipContext, RelationshipType, StructuralRelationship,
};
use codegraph_parser::{ExportStatement, FileParseResult, ImportKind, ImportStatement};
use tree_sitter::{Node, Tree};

fn synthetic_id(key: &str, discriminator: &str) -> ElementId {
    ElementId::new(key, discriminator, 0)
}

/// The synthetic node standing in for a file when no single element owns an edge (§4.3).
pub fn file_element_id(file_path: &str) -> ElementId {
    synthetic_id(file_path, "<file>")
}

/// The synthetic node standing in for an external module referenced by path/specifier.
pub fn module_element_id(module_path: &str) -> ElementId {
    synthetic_id(module_path, "<module>")
}

fn to_import_type(kind: ImportKind) -> ImportType {
    match kind {
        ImportKind::Default => ImportType::Default,
        ImportKind::Named => ImportType::Named,
        ImportKind::Namespace => ImportType::Namespace,
        ImportKind::SideEffect => ImportType::SideEffect,
    }
}

fn import_edges(file_path: &str, imports: &[ImportStatement]) -> Vec<StructuralRelationship> {
    let from = file_element_id(file_path);
    imports
        .iter()
        .map(|import| {
            let to = module_element_id(&import.module_path);
            let now = chrono::Utc::now();
            StructuralRelationship {
                id: StructuralRelationship::compute_id(&from, &to, RelationshipType::Imports),
                from: from.clone(),
                to,
                relationship_type: RelationshipType::Imports,
                context: RelationshipContext {
                    import_type: Some(to_import_type(import.import_kind)),
                    specifiers: import.specifiers.clone(),
                    alias: import.alias.clone(),
                    ..Default::default()
                },
                semantic_description: None,
                architectural_purpose: None,
                complexity_score: 0.0,
                relationship_embedding: None,
                updated_at: now,
            }
        })
        .collect()
}

fn export_edges(file_path: &str, exports: &[ExportStatement], elements: &[CodeElement], index: &NameIndex) -> Vec<StructuralRelationship> {
    let from = file_element_id(file_path);
    let mut edges = Vec::new();

    for export in exports {
        let now = chrono::Utc::now();
        if let Some(re_export_from) = &export.re_export_from {
            let to = module_element_id(re_export_from);
            edges.push(StructuralRelationship {
                id: StructuralRelationship::compute_id(&from, &to, RelationshipType::Exports),
                from: from.clone(),
                to,
                relationship_type: RelationshipType::Exports,
                context: RelationshipContext {
                    specifiers: export.specifiers.clone(),
                    ..Default::default()
                },
                semantic_description: None,
                architectural_purpose: None,
                complexity_score: 0.0,
                relationship_embedding: None,
                updated_at: now,
            });
            continue;
        }

        for specifier in &export.specifiers {
            if let Some(target) = index.resolve(specifier, file_path, elements, &[]) {
                edges.push(StructuralRelationship {
                    id: StructuralRelationship::compute_id(&from, &target, RelationshipType::Exports),
                    from: from.clone(),
                    to: target,
                    relationship_type: RelationshipType::Exports,
                    context: RelationshipContext {
                        specifiers: export.specifiers.clone(),
                        ..Default::default()
                    },
                    semantic_description: None,
                    architectural_purpose: None,
                    complexity_score: 0.0,
                    relationship_embedding: None,
                    updated_at: now,
                });
            }
        }
    }

    edges
}

fn enclosing_element<'a>(elements: &'a [CodeElement], byte_offset: usize) -> Option<&'a CodeElement> {
    elements
        .iter()
        .filter(|e| e.span.start_byte <= byte_offset && byte_offset < e.span.end_byte)
        .min_by_key(|e| e.span.end_byte - e.span.start_byte)
}

fn is_conditional_context(node: &Node) -> bool {
    let mut current = node.parent();
    while let Some(n) = current {
        match n.kind() {
            "if_statement" | "while_statement" | "ternary_expression" | "for_statement" => return true,
            "binary_expression" => {
                // `&&`/`||` show up as anonymous child tokens regardless of source text.
                let mut cursor = n.walk();
                if n.children(&mut cursor).any(|c| matches!(c.kind(), "&&" | "||")) {
                    return true;
                }
            }
            "class_body" | "program" | "statement_block" => return false,
            _ => {}
        }
        current = n.parent();
    }
    false
}

fn callee_name(call: &Node, source: &[u8]) -> Option<(String, bool)> {
    let function = call.child_by_field_name("function")?;
    match function.kind() {
        "member_expression" => {
            let object = function.child_by_field_name("object")?;
            let property = function.child_by_field_name("property")?;
            let is_this = object.utf8_text(source).ok() == Some("this");
            property.utf8_text(source).ok().map(|p| (p.to_string(), is_this))
        }
        _ => function.utf8_text(source).ok().map(|n| (n.to_string(), false)),
    }
}

fn call_arguments(call: &Node, source: &[u8]) -> Vec<String> {
    let Some(args) = call.child_by_field_name("arguments") else {
        return Vec::new();
    };
    let mut cursor = args.walk();
    args.named_children(&mut cursor)
        .filter_map(|n| n.utf8_text(source).ok().map(str::to_string))
        .collect()
}

fn walk_calls(node: Node, source: &[u8], out: &mut Vec<Node>) {
    if node.kind() == "call_expression" {
        out.push(node);
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk_calls(child, source, out);
    }
}

fn call_edges(file_path: &str, elements: &[CodeElement], tree: &Tree, source: &str, index: &NameIndex, imports: &[ImportStatement]) -> Vec<StructuralRelationship> {
    let source_bytes = source.as_bytes();
    let mut call_nodes = Vec::new();
    walk_calls(tree.root_node(), source_bytes, &mut call_nodes);

    let mut edges = Vec::new();
    for call in call_nodes {
        let Some(from_element) = enclosing_element(elements, call.start_byte()) else {
            continue;
        };
        let Some((callee, is_this_call)) = callee_name(&call, source_bytes) else {
            continue;
        };

        let target = if is_this_call {
            elements
                .iter()
                .find(|e| e.file_path == file_path && e.element_name == callee)
                .map(|e| e.id.clone())
        } else {
            index.resolve(&callee, file_path, elements, imports)
        };

        let Some(target) = target else { continue };
        let now = chrono::Utc::now();
        let parameters_passed = call_arguments(&call, source_bytes);
        let conditional = is_conditional_context(&call);
        let complexity_score = (0.1 * parameters_passed.len() as f32 + if conditional { 0.3 } else { 0.0 }).min(1.0);

        edges.push(StructuralRelationship {
            id: StructuralRelationship::compute_id(&from_element.id, &target, RelationshipType::Calls),
            from: from_element.id.clone(),
            to: target,
            relationship_type: RelationshipType::Calls,
            context: RelationshipContext {
                call_site_line: Some(call.start_position().row as u32 + 1),
                parameters_passed,
                conditional,
                ..Default::default()
            },
            semantic_description: None,
            architectural_purpose: None,
            complexity_score,
            relationship_embedding: None,
            updated_at: now,
        });
    }
    edges
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

/// True if `node` names the thing being declared (a function/class/interface/type/enum
/// name, a `const`/`let` binding, or a parameter pattern) rather than a use of it.
fn is_declaration_name(node: &Node) -> bool {
    let Some(parent) = node.parent() else { return false };
    match parent.kind() {
        "function_declaration" | "class_declaration" | "interface_declaration" | "type_alias_declaration"
        | "enum_declaration" | "method_definition" | "variable_declarator" => {
            parent.child_by_field_name("name").is_some_and(|n| n == *node)
        }
        "required_parameter" | "optional_parameter" => {
            parent.child_by_field_name("pattern").is_some_and(|n| n == *node)
        }
        _ => false,
    }
}

/// True if `node` is a bare (non-member) call's callee, already covered by a `calls` edge.
fn is_call_callee(node: &Node) -> bool {
    node.parent()
        .filter(|p| p.kind() == "call_expression")
        .and_then(|p| p.child_by_field_name("function"))
        .is_some_and(|f| f == *node)
}

fn walk_identifiers<'a>(node: Node<'a>, out: &mut Vec<Node<'a>>) {
    if node.kind() == "identifier" {
        out.push(node);
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk_identifiers(child, out);
    }
}

/// Every identifier use that resolves to a named element in scope and is neither a
/// declaration's own name nor a call's callee (those are `calls`/declarations, not uses)
/// (§4.3 `references`). Edges are deduplicated per `(from, to)` pair since the same
/// identifier is commonly referenced many times within one element's body.
fn reference_edges(
    file_path: &str,
    elements: &[CodeElement],
    tree: &Tree,
    source: &str,
    index: &NameIndex,
    imports: &[ImportStatement],
) -> Vec<StructuralRelationship> {
    let source_bytes = source.as_bytes();
    let mut identifiers = Vec::new();
    walk_identifiers(tree.root_node(), &mut identifiers);

    let mut seen = std::collections::HashSet::new();
    let mut edges = Vec::new();
    for node in identifiers {
        if is_declaration_name(&node) || is_call_callee(&node) {
            continue;
        }
        if has_ancestor_of_kind(&node, "import_statement") || has_ancestor_of_kind(&node, "export_statement") {
            continue;
        }
        let Some(from_element) = enclosing_element(elements, node.start_byte()) else {
            continue;
        };
        let Ok(name) = node.utf8_text(source_bytes) else { continue };
        if name == from_element.element_name {
            continue;
        }
        let Some(target) = index.resolve(name, file_path, elements, imports) else {
            continue;
        };
        if target == from_element.id || !seen.insert((from_element.id.clone(), target.clone())) {
            continue;
        }

        let now = chrono::Utc::now();
        edges.push(StructuralRelationship {
            id: StructuralRelationship::compute_id(&from_element.id, &target, RelationshipType::References),
            from: from_element.id.clone(),
            to: target,
            relationship_type: RelationshipType::References,
            context: RelationshipContext::default(),
            semantic_description: None,
            architectural_purpose: None,
            complexity_score: 0.0,
            relationship_embedding: None,
            updated_at: now,
        });
    }
    edges
}

fn inheritance_edges(elements: &[CodeElement]) -> Vec<StructuralRelationship> {
    let mut edges = Vec::new();
    for element in elements.iter().filter(|e| e.element_type == codegraph_core::ElementKind::Class) {
        for clause in &element.inheritance {
            let relationship_type = if clause.trim_start().starts_with("implements") {
                RelationshipType::Implements
            } else {
                RelationshipType::Extends
            };
            let target_name = clause
                .trim_start_matches("extends")
                .trim_start_matches("implements")
                .trim();
            let target = synthetic_id(target_name, "<type>");
            let now = chrono::Utc::now();
            edges.push(StructuralRelationship {
                id: StructuralRelationship::compute_id(&element.id, &target, relationship_type),
                from: element.id.clone(),
                to: target,
                relationship_type,
                context: RelationshipContext::default(),
                semantic_description: None,
                architectural_purpose: None,
                complexity_score: 0.0,
                relationship_embedding: None,
                updated_at: now,
            });
        }
    }
    edges
}

/// Produce every structural edge for one file (§4.3): imports, exports, calls,
/// extends/implements, and references.
pub fn analyze_structural(
    file: &FileParseResult,
    tree: &Tree,
    source: &str,
    index: &NameIndex,
) -> Vec<StructuralRelationship> {
    let mut edges = Vec::new();
    edges.extend(import_edges(&file.file_path, &file.imports));
    edges.extend(export_edges(&file.file_path, &file.exports, &file.elements, index));
    edges.extend(call_edges(&file.file_path, &file.elements, tree, source, index, &file.imports));
    edges.extend(inheritance_edges(&file.elements));
    edges.extend(reference_edges(&file.file_path, &file.elements, tree, source, index, &file.imports));
    edges
}

#[cfg(test)]
mod tests {
    use super::*;
    use codegraph_core::{ElementId, ElementKind, Span};

    fn class_element(name: &str, inheritance: Vec<String>) -> CodeElement {
        let content = format!("class {name} {{}}");
        CodeElement {
            id: ElementId::new("src/lib.ts", name, 0),
            file_path: "src/lib.ts".to_string(),
            element_name: name.to_string(),
            element_type: ElementKind::Class,
            span: Span { start_byte: 0, end_byte: content.len(), start_line: 1, end_line: 1, start_column: 0, end_column: 0 },
            content_hash: CodeElement::compute_content_hash(&content),
            content,
            description: None,
            search_phrases: Default::default(),
            exported: true,
            is_async: false,
            parameters: Vec::new(),
            return_type: None,
            inheritance,
            visibility: None,
            content_embedding: None,
            semantic_embedding: None,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    /// S2: `export class A extends B implements C {}` yields two edges, one per supertype.
    #[test]
    fn inheritance_edges_emits_one_edge_per_superclass_and_interface() {
        let a = class_element("A", vec!["extends B".to_string(), "implements C".to_string()]);
        let edges = inheritance_edges(&[a.clone()]);

        assert_eq!(edges.len(), 2);
        assert_eq!(edges[0].relationship_type, RelationshipType::Extends);
        assert_eq!(edges[0].to, synthetic_id("B", "<type>"));
        assert_eq!(edges[1].relationship_type, RelationshipType::Implements);
        assert_eq!(edges[1].to, synthetic_id("C", "<type>"));
        assert!(edges.iter().all(|e| e.from == a.id));
    }

    #[test]
    fn inheritance_edges_handles_multiple_implemented_interfaces() {
        let a = class_element("A", vec!["implements X".to_string(), "implements Y".to_string()]);
        let edges = inheritance_edges(&[a]);

        assert_eq!(edges.len(), 2);
        assert!(edges.iter().all(|e| e.relationship_type == RelationshipType::Implements));
        assert_eq!(edges[0].to, synthetic_id("X", "<type>"));
        assert_eq!(edges[1].to, synthetic_id("Y", "<type>"));
    }

    #[test]
    fn inheritance_edges_ignores_non_class_elements() {
        let mut interface = class_element("Shape", vec!["extends Base".to_string()]);
        interface.element_type = ElementKind::Interface;
        assert!(inheritance_edges(&[interface]).is_empty());
    }
}

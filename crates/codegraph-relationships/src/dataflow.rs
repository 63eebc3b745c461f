use crate::resolver::NameIndex;
use codegraph_core::{CodeElement, DataFlowRelationship, ElementId, ElementKind, FlowMetadata, FlowType};
use codegraph_parser::{FileParseResult, ImportStatement};
use tree_sitter::{Node, Tree};

fn synthetic(key: &str, discriminator: &str) -> ElementId {
    ElementId::new(key, discriminator, 0)
}

/// A placeholder element for a synthetic data-flow endpoint (`<param:…>`, `<return>`,
/// `<var:…>`) that has no declaration node of its own. Carries the owning element's span
/// and file so every `DataFlowRelationship` endpoint resolves to a real `code_elements` row
/// once committed (§3, §4.3).
fn anchor_element(id: ElementId, name: &str, file_path: &str, span: codegraph_core::Span, now: chrono::DateTime<chrono::Utc>) -> CodeElement {
    let content = name.to_string();
    CodeElement {
        id,
        file_path: file_path.to_string(),
        element_name: name.to_string(),
        element_type: ElementKind::Variable,
        span,
        content_hash: CodeElement::compute_content_hash(&content),
        content,
        description: None,
        search_phrases: Default::default(),
        exported: false,
        is_async: false,
        parameters: Vec::new(),
        return_type: None,
        inheritance: Vec::new(),
        visibility: None,
        content_embedding: None,
        semantic_embedding: None,
        created_at: now,
        updated_at: now,
    }
}

fn parameter_input_edges(elements: &[CodeElement]) -> (Vec<DataFlowRelationship>, Vec<CodeElement>) {
    let mut edges = Vec::new();
    let mut anchors = Vec::new();
    for element in elements {
        for parameter in &element.parameters {
            let from = synthetic(element.id.as_str(), &format!("<param:{}>", parameter.name));
            let now = chrono::Utc::now();
            anchors.push(anchor_element(from.clone(), &parameter.name, &element.file_path, element.span, now));
            edges.push(DataFlowRelationship {
                id: DataFlowRelationship::compute_id(&from, &element.id, FlowType::ParameterInput, &parameter.name),
                from,
                to: element.id.clone(),
                flow_type: FlowType::ParameterInput,
                type_annotation: parameter.type_annotation.clone(),
                flow_metadata: FlowMetadata {
                    parameter_name: Some(parameter.name.clone()),
                    parameter_position: Some(parameter.position),
                    ..Default::default()
                },
                data_transformation_description: None,
                business_logic_purpose: None,
                side_effects: Vec::new(),
                data_flow_embedding: None,
                updated_at: now,
            });
        }
    }
    (edges, anchors)
}

fn return_output_edges(elements: &[CodeElement]) -> (Vec<DataFlowRelationship>, Vec<CodeElement>) {
    let mut edges = Vec::new();
    let mut anchors = Vec::new();
    for element in elements.iter().filter(|e| matches!(e.element_type, ElementKind::Function | ElementKind::Method)) {
        let to = synthetic(element.id.as_str(), "<return>");
        let type_annotation = element.return_type.clone().map(|t| {
            if element.is_async && !t.starts_with("Promise") {
                format!("Promise<{t}>")
            } else {
                t
            }
        });
        let now = chrono::Utc::now();
        anchors.push(anchor_element(to.clone(), "<return>", &element.file_path, element.span, now));
        edges.push(DataFlowRelationship {
            id: DataFlowRelationship::compute_id(&element.id, &to, FlowType::ReturnOutput, "return"),
            from: element.id.clone(),
            to,
            flow_type: FlowType::ReturnOutput,
            type_annotation,
            flow_metadata: FlowMetadata::default(),
            data_transformation_description: None,
            business_logic_purpose: None,
            side_effects: Vec::new(),
            data_flow_embedding: None,
            updated_at: now,
        });
    }
    (edges, anchors)
}

fn enclosing_element<'a>(elements: &'a [CodeElement], byte_offset: usize) -> Option<&'a CodeElement> {
    elements
        .iter()
        .filter(|e| e.span.start_byte <= byte_offset && byte_offset < e.span.end_byte)
        .min_by_key(|e| e.span.end_byte - e.span.start_byte)
}

fn enclosing_class<'a>(elements: &'a [CodeElement], byte_offset: usize) -> Option<&'a CodeElement> {
    elements
        .iter()
        .filter(|e| e.element_type == ElementKind::Class && e.span.start_byte <= byte_offset && byte_offset < e.span.end_byte)
        .min_by_key(|e| e.span.end_byte - e.span.start_byte)
}

fn walk<'a>(node: Node<'a>, f: &mut impl FnMut(Node<'a>)) {
    f(node);
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk(child, f);
    }
}

fn property_access_edges(elements: &[CodeElement], tree: &Tree, source: &str) -> Vec<DataFlowRelationship> {
    let source_bytes = source.as_bytes();
    let mut edges = Vec::new();
    walk(tree.root_node(), &mut |node| {
        if node.kind() != "member_expression" {
            return;
        }
        let Some(object) = node.child_by_field_name("object") else { return };
        let Some(property) = node.child_by_field_name("property") else { return };
        let Ok(object_text) = object.utf8_text(source_bytes) else { return };
        let Ok(property_text) = property.utf8_text(source_bytes) else { return };

        let Some(accessor) = enclosing_element(elements, node.start_byte()) else { return };

        let from = if object_text == "this" {
            match enclosing_class(elements, node.start_byte()) {
                Some(class) => class.id.clone(),
                None => return,
            }
        } else if let Some(source_element) = elements.iter().find(|e| e.element_name == object_text) {
            source_element.id.clone()
        } else {
            return;
        };

        let now = chrono::Utc::now();
        edges.push(DataFlowRelationship {
            id: DataFlowRelationship::compute_id(&from, &accessor.id, FlowType::PropertyAccess, property_text),
            from,
            to: accessor.id.clone(),
            flow_type: FlowType::PropertyAccess,
            type_annotation: None,
            flow_metadata: FlowMetadata {
                property_path: Some(property_text.to_string()),
                ..Default::default()
            },
            data_transformation_description: None,
            business_logic_purpose: None,
            side_effects: Vec::new(),
            data_flow_embedding: None,
            updated_at: now,
        });
    });
    edges
}

fn node_span(node: &Node) -> codegraph_core::Span {
    codegraph_core::Span {
        start_byte: node.start_byte(),
        end_byte: node.end_byte(),
        start_line: node.start_position().row as u32 + 1,
        end_line: node.end_position().row as u32 + 1,
        start_column: node.start_position().column as u32,
        end_column: node.end_position().column as u32,
    }
}

/// `assignment` edges for `let x = f(...)` style declarators whose initializer is a call,
/// plus the `transformation` chain formed when a later declarator's initializer references
/// an earlier one's variable name (§4.3).
fn assignment_and_transformation_edges(
    elements: &[CodeElement],
    tree: &Tree,
    source: &str,
    file_path: &str,
    imports: &[ImportStatement],
    index: &NameIndex,
) -> (Vec<DataFlowRelationship>, Vec<CodeElement>) {
    let source_bytes = source.as_bytes();
    let mut declarators: Vec<(String, Node, usize)> = Vec::new();
    walk(tree.root_node(), &mut |node| {
        if node.kind() != "variable_declarator" {
            return;
        }
        let Some(name_node) = node.child_by_field_name("name") else { return };
        let Ok(name) = name_node.utf8_text(source_bytes) else { return };
        declarators.push((name.to_string(), node, node.start_byte()));
    });
    declarators.sort_by_key(|(_, _, pos)| *pos);

    let mut edges = Vec::new();
    let mut anchors = Vec::new();
    let mut anchored_vars = std::collections::HashSet::new();
    let mut step_order: u32 = 0;

    for (i, (var_name, node, _)) in declarators.iter().enumerate() {
        let Some(value) = node.child_by_field_name("value") else { continue };
        let Some(owner) = enclosing_element(elements, node.start_byte()) else { continue };
        let var_anchor = synthetic(file_path, &format!("<var:{var_name}>"));
        if anchored_vars.insert(var_anchor.clone()) {
            anchors.push(anchor_element(var_anchor.clone(), var_name, file_path, node_span(node), chrono::Utc::now()));
        }

        if value.kind() == "call_expression" {
            if let Some((callee, _)) = value
                .child_by_field_name("function")
                .and_then(|f| f.utf8_text(source_bytes).ok())
                .map(|t| (t.to_string(), ()))
            {
                let target = index.resolve(&callee, file_path, elements, imports);
                let from = target.unwrap_or_else(|| owner.id.clone());
                let now = chrono::Utc::now();
                edges.push(DataFlowRelationship {
                    id: DataFlowRelationship::compute_id(&from, &var_anchor, FlowType::Assignment, var_name),
                    from,
                    to: var_anchor.clone(),
                    flow_type: FlowType::Assignment,
                    type_annotation: None,
                    flow_metadata: FlowMetadata {
                        variable_name: Some(var_name.clone()),
                        ..Default::default()
                    },
                    data_transformation_description: None,
                    business_logic_purpose: None,
                    side_effects: Vec::new(),
                    data_flow_embedding: None,
                    updated_at: now,
                });
            }
        }

        if let Ok(value_text) = value.utf8_text(source_bytes) {
            for (prev_name, ..) in declarators.iter().take(i) {
                if value_text.split_whitespace().any(|tok| tok.trim_matches(|c: char| !c.is_alphanumeric() && c != '_') == prev_name) {
                    let prev_anchor = synthetic(file_path, &format!("<var:{prev_name}>"));
                    step_order += 1;
                    let now = chrono::Utc::now();
                    edges.push(DataFlowRelationship {
                        id: DataFlowRelationship::compute_id(&prev_anchor, &var_anchor, FlowType::Transformation, &step_order.to_string()),
                        from: prev_anchor,
                        to: var_anchor.clone(),
                        flow_type: FlowType::Transformation,
                        type_annotation: None,
                        flow_metadata: FlowMetadata {
                            step_order: Some(step_order),
                            data_shape_before: Some("inferred".to_string()),
                            data_shape_after: Some("inferred".to_string()),
                            ..Default::default()
                        },
                        data_transformation_description: None,
                        business_logic_purpose: None,
                        side_effects: Vec::new(),
                        data_flow_embedding: None,
                        updated_at: now,
                    });
                    break;
                }
            }
        }
    }

    (edges, anchors)
}

fn argument_passing_edges(
    elements: &[CodeElement],
    tree: &Tree,
    source: &str,
    file_path: &str,
    imports: &[ImportStatement],
    index: &NameIndex,
) -> Vec<DataFlowRelationship> {
    let source_bytes = source.as_bytes();
    let mut edges = Vec::new();
    walk(tree.root_node(), &mut |node| {
        if node.kind() != "call_expression" {
            return;
        }
        let Some(callee_text) = node
            .child_by_field_name("function")
            .and_then(|f| f.utf8_text(source_bytes).ok())
        else {
            return;
        };
        let Some(target) = index.resolve(callee_text, file_path, elements, imports) else { return };
        let Some(args) = node.child_by_field_name("arguments") else { return };

        let mut cursor = args.walk();
        for (position, arg) in args.named_children(&mut cursor).enumerate() {
            if arg.kind() != "identifier" {
                continue;
            }
            let Ok(arg_name) = arg.utf8_text(source_bytes) else { continue };
            let Some(source_element) = elements.iter().find(|e| e.element_name == arg_name) else { continue };
            let now = chrono::Utc::now();
            edges.push(DataFlowRelationship {
                id: DataFlowRelationship::compute_id(&source_element.id, &target, FlowType::ArgumentPassing, &position.to_string()),
                from: source_element.id.clone(),
                to: target.clone(),
                flow_type: FlowType::ArgumentPassing,
                type_annotation: None,
                flow_metadata: FlowMetadata {
                    parameter_position: Some(position),
                    variable_name: Some(arg_name.to_string()),
                    ..Default::default()
                },
                data_transformation_description: None,
                business_logic_purpose: None,
                side_effects: Vec::new(),
                data_flow_embedding: None,
                updated_at: now,
            });
        }
    });
    edges
}

/// Produce every data-flow edge for one file, together with the placeholder elements that
/// back its synthetic endpoints (§4.3). Both must be committed so that every returned edge's
/// endpoints exist in `code_elements` (§3 `DataFlowRelationship`).
pub fn analyze_dataflow(file: &FileParseResult, tree: &Tree, source: &str, index: &NameIndex) -> (Vec<DataFlowRelationship>, Vec<CodeElement>) {
    let mut edges = Vec::new();
    let mut anchors = Vec::new();

    let (parameter_edges, parameter_anchors) = parameter_input_edges(&file.elements);
    edges.extend(parameter_edges);
    anchors.extend(parameter_anchors);

    let (return_edges, return_anchors) = return_output_edges(&file.elements);
    edges.extend(return_edges);
    anchors.extend(return_anchors);

    edges.extend(property_access_edges(&file.elements, tree, source));

    let (assignment_edges, assignment_anchors) =
        assignment_and_transformation_edges(&file.elements, tree, source, &file.file_path, &file.imports, index);
    edges.extend(assignment_edges);
    anchors.extend(assignment_anchors);

    edges.extend(argument_passing_edges(&file.elements, tree, source, &file.file_path, &file.imports, index));

    (edges, anchors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use codegraph_core::{ElementKind, Parameter, Span};
    use std::collections::HashSet;

    fn function_element(name: &str, parameters: Vec<Parameter>, return_type: Option<&str>) -> CodeElement {
        let content = format!("function {name}() {{}}");
        CodeElement {
            id: ElementId::new("src/lib.ts", name, 0),
            file_path: "src/lib.ts".to_string(),
            element_name: name.to_string(),
            element_type: ElementKind::Function,
            span: Span { start_byte: 0, end_byte: content.len(), start_line: 1, end_line: 1, start_column: 0, end_column: 0 },
            content_hash: CodeElement::compute_content_hash(&content),
            content,
            description: None,
            search_phrases: HashSet::new(),
            exported: true,
            is_async: false,
            parameters,
            return_type: return_type.map(str::to_string),
            inheritance: Vec::new(),
            visibility: None,
            content_embedding: None,
            semantic_embedding: None,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn parameter_input_edges_are_backed_by_a_matching_anchor_element() {
        let f = function_element("greet", vec![Parameter { name: "name".to_string(), type_annotation: Some("string".to_string()), position: 0 }], None);
        let (edges, anchors) = parameter_input_edges(&[f]);

        assert_eq!(edges.len(), 1);
        assert_eq!(anchors.len(), 1);
        assert_eq!(edges[0].from, anchors[0].id);
        assert_eq!(anchors[0].element_name, "name");
    }

    #[test]
    fn return_output_edges_are_backed_by_a_matching_anchor_element() {
        let f = function_element("greet", vec![], Some("string"));
        let (edges, anchors) = return_output_edges(&[f]);

        assert_eq!(edges.len(), 1);
        assert_eq!(anchors.len(), 1);
        assert_eq!(edges[0].to, anchors[0].id);
    }
}

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fmt;

/// Identifier for a [`CodeElement`].
///
/// Deterministic: `ElementId::new(file_path, qualified_name, start_byte)` always produces
/// the same id for the same three inputs, so re-indexing identical content is a no-op commit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementId(String);

impl ElementId {
    pub fn new(file_path: &str, qualified_name: &str, start_byte: usize) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(file_path.as_bytes());
        hasher.update(b"\0");
        hasher.update(qualified_name.as_bytes());
        hasher.update(b"\0");
        hasher.update(start_byte.to_le_bytes());
        Self(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Wrap an already-computed id string (e.g. a storage record key) without re-hashing.
    /// Callers are responsible for the value actually being a valid element id.
    pub fn from_raw(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier for a [`StructuralRelationship`] or [`DataFlowRelationship`].
///
/// Deterministic over the edge's defining fields, so re-analyzing the same source
/// upserts the same edge rather than duplicating it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeId(String);

impl EdgeId {
    pub fn new(parts: &[&str]) -> Self {
        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update(part.as_bytes());
            hasher.update(b"\0");
        }
        Self(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Wrap an already-computed id string (e.g. a storage record key) without re-hashing.
    pub fn from_raw(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Source language, detected by the parser registry from a file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    TypeScript,
    JavaScript,
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Language::TypeScript => "typescript",
            Language::JavaScript => "javascript",
        };
        write!(f, "{}", s)
    }
}

/// Kind of a named unit of code extracted from an AST.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Function,
    Class,
    Interface,
    Type,
    Enum,
    Method,
    Variable,
    /// Present in the data model for schema completeness; the extractor never emits an
    /// element of this kind (import statements feed the relationship analyzer instead).
    Import,
    /// See [`ElementKind::Import`].
    Export,
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ElementKind::Function => "function",
            ElementKind::Class => "class",
            ElementKind::Interface => "interface",
            ElementKind::Type => "type",
            ElementKind::Enum => "enum",
            ElementKind::Method => "method",
            ElementKind::Variable => "variable",
            ElementKind::Import => "import",
            ElementKind::Export => "export",
        };
        write!(f, "{}", s)
    }
}

/// A byte/line/column span within a source file. Rows are 1-indexed, columns 0-indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start_byte: usize,
    pub end_byte: usize,
    pub start_line: u32,
    pub end_line: u32,
    pub start_column: u32,
    pub end_column: u32,
}

/// A named unit of code extracted from an AST (§3 `CodeElement`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeElement {
    pub id: ElementId,
    pub file_path: String,
    pub element_name: String,
    pub element_type: ElementKind,
    pub span: Span,
    pub content: String,
    pub content_hash: String,
    pub description: Option<String>,
    pub search_phrases: HashSet<String>,
    pub exported: bool,
    pub is_async: bool,
    pub parameters: Vec<Parameter>,
    pub return_type: Option<String>,
    pub inheritance: Vec<String>,
    pub visibility: Option<String>,
    pub content_embedding: Option<Vec<f32>>,
    pub semantic_embedding: Option<Vec<f32>>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub type_annotation: Option<String>,
    pub position: usize,
}

impl CodeElement {
    /// Compute the deterministic id for an element at `start_byte` in `file_path`
    /// with the given qualified name.
    pub fn compute_id(file_path: &str, qualified_name: &str, start_byte: usize) -> ElementId {
        ElementId::new(file_path, qualified_name, start_byte)
    }

    pub fn compute_content_hash(content: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// Kind of structural edge between two [`CodeElement`]s (§3 `StructuralRelationship`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipType {
    Calls,
    Extends,
    Implements,
    Imports,
    Exports,
    References,
}

impl fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RelationshipType::Calls => "calls",
            RelationshipType::Extends => "extends",
            RelationshipType::Implements => "implements",
            RelationshipType::Imports => "imports",
            RelationshipType::Exports => "exports",
            RelationshipType::References => "references",
        };
        write!(f, "{}", s)
    }
}

/// Free-form context attached to a [`StructuralRelationship`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelationshipContext {
    pub call_site_line: Option<u32>,
    pub parameters_passed: Vec<String>,
    pub conditional: bool,
    pub import_type: Option<ImportType>,
    pub specifiers: HashSet<String>,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportType {
    Default,
    Named,
    Namespace,
    SideEffect,
}

/// A directed edge between two [`CodeElement`]s derived from syntactic structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuralRelationship {
    pub id: EdgeId,
    pub from: ElementId,
    pub to: ElementId,
    pub relationship_type: RelationshipType,
    pub context: RelationshipContext,
    pub semantic_description: Option<String>,
    pub architectural_purpose: Option<String>,
    /// Informational heuristic in `[0, 1]`; the precise assignment rule is
    /// unspecified upstream (see DESIGN.md), only the range is load-bearing.
    pub complexity_score: f32,
    pub relationship_embedding: Option<Vec<f32>>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl StructuralRelationship {
    pub fn compute_id(from: &ElementId, to: &ElementId, relationship_type: RelationshipType) -> EdgeId {
        EdgeId::new(&[from.as_str(), to.as_str(), &relationship_type.to_string()])
    }
}

/// Kind of data-flow edge (§3 `DataFlowRelationship`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowType {
    ParameterInput,
    ReturnOutput,
    PropertyAccess,
    Assignment,
    Transformation,
    ArgumentPassing,
}

impl fmt::Display for FlowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FlowType::ParameterInput => "parameter_input",
            FlowType::ReturnOutput => "return_output",
            FlowType::PropertyAccess => "property_access",
            FlowType::Assignment => "assignment",
            FlowType::Transformation => "transformation",
            FlowType::ArgumentPassing => "argument_passing",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlowMetadata {
    pub parameter_name: Option<String>,
    pub parameter_position: Option<usize>,
    pub property_path: Option<String>,
    pub variable_name: Option<String>,
    pub step_order: Option<u32>,
    pub data_shape_before: Option<String>,
    pub data_shape_after: Option<String>,
    pub transformation_type: Option<String>,
}

/// A directed edge describing how a value moves between elements.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataFlowRelationship {
    pub id: EdgeId,
    pub from: ElementId,
    pub to: ElementId,
    pub flow_type: FlowType,
    pub type_annotation: Option<String>,
    pub flow_metadata: FlowMetadata,
    pub data_transformation_description: Option<String>,
    pub business_logic_purpose: Option<String>,
    /// Ordered sequence; order is semantically meaningful (occurrence order along the flow).
    pub side_effects: Vec<String>,
    pub data_flow_embedding: Option<Vec<f32>>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl DataFlowRelationship {
    pub fn compute_id(from: &ElementId, to: &ElementId, flow_type: FlowType, disambiguator: &str) -> EdgeId {
        EdgeId::new(&[from.as_str(), to.as_str(), &flow_type.to_string(), disambiguator])
    }
}

/// Per-file bookkeeping (§3 `FileMetadata`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileMetadata {
    pub path: String,
    pub size: u64,
    pub modified_at: chrono::DateTime<chrono::Utc>,
    pub language: Language,
    pub checksum: String,
    pub symbol_count: usize,
    pub processing_time_ms: u64,
    pub last_indexed: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexingStrategy {
    Full,
    Incremental,
}

/// Singleton per-workspace bookkeeping (§3 `WorkspaceInfo`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceInfo {
    pub path: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub last_indexed: chrono::DateTime<chrono::Utc>,
    pub total_files: usize,
    pub total_elements: usize,
    pub indexing_strategy: IndexingStrategy,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_id_is_deterministic() {
        let a = ElementId::new("src/a.ts", "Foo.bar", 10);
        let b = ElementId::new("src/a.ts", "Foo.bar", 10);
        assert_eq!(a, b);
    }

    #[test]
    fn element_id_differs_on_any_input() {
        let base = ElementId::new("src/a.ts", "Foo.bar", 10);
        assert_ne!(base, ElementId::new("src/b.ts", "Foo.bar", 10));
        assert_ne!(base, ElementId::new("src/a.ts", "Foo.baz", 10));
        assert_ne!(base, ElementId::new("src/a.ts", "Foo.bar", 11));
    }

    #[test]
    fn content_hash_is_stable() {
        let h1 = CodeElement::compute_content_hash("export function main() {}");
        let h2 = CodeElement::compute_content_hash("export function main() {}");
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
    }
}

pub mod extractor;
pub mod language;
pub mod pipeline;
pub mod registry;

pub use extractor::*;
pub use language::{detect_language, extensions_for, load_grammar, resolve_grammar_path, GrammarSearchConfig};
pub use pipeline::ParsingPipeline;
pub use registry::ParserRegistry;

pub mod dataflow;
pub mod resolver;
pub mod structural;

pub use dataflow::analyze_dataflow;
pub use resolver::NameIndex;
pub use structural::{analyze_structural, file_element_id, module_element_id};

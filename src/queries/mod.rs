pub mod python;

use crate::error::{Result, SnakeLspError};
use tower_lsp::lsp_types::{Position, Range};
use tree_sitter::{Language, Query};

/// Converts a tree-sitter range to an LSP range.
pub fn range_from_ts(range: tree_sitter::Range) -> Range {
    Range {
        start: Position::new(range.start_point.row as u32, range.start_point.column as u32),
        end: Position::new(range.end_point.row as u32, range.end_point.column as u32),
    }
}

/// Loads a tree-sitter query from an SCM string. A compile failure here is a
/// programming error surfaced at startup.
pub fn load_query(language: &Language, scm: &str) -> Result<Query> {
    Query::new(language, scm).map_err(|e| SnakeLspError::Query(format!("invalid query: {e:?}")))
}

/// Gets the index of a capture name in a query.
pub fn get_capture_index(query: &Query, name: &str) -> Result<u32> {
    query
        .capture_index_for_name(name)
        .ok_or_else(|| SnakeLspError::Query(format!("capture name '{name}' not found in SCM")))
}

/// Declares a struct of capture indices and a `new` that resolves them
/// against a compiled query.
#[macro_export]
macro_rules! decl_indices {
    ($name:ident, { $($field:ident => $capture:expr),+ $(,)? }) => {
        #[derive(Clone)]
        pub struct $name {
            $(pub $field: u32,)+
        }

        impl $name {
            pub fn new(query: &tree_sitter::Query) -> $crate::error::Result<Self> {
                Ok(Self {
                    $($field: $crate::queries::get_capture_index(query, $capture)?,)+
                })
            }
        }
    };
}

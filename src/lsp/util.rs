use tower_lsp::lsp_types::{Location, Range};

use crate::workspace::symbols::Symbol;

/// The full extent of a definition: from the defining identifier through
/// the end of the body, so the selection range is always contained.
pub fn full_range(symbol: &Symbol) -> Range {
    let start = symbol.name_range.start;
    let body_end = symbol.body_range.end;
    let end = if (body_end.line, body_end.character) >= (start.line, start.character) {
        body_end
    } else {
        symbol.name_range.end
    };
    Range { start, end }
}

pub fn name_location(symbol: &Symbol) -> Location {
    Location {
        uri: symbol.file.clone(),
        range: symbol.name_range,
    }
}

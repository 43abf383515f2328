use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;
use tracing::debug;
use tree_sitter::{Node, Point};

use crate::lsp::Backend;
use crate::queries::range_from_ts;

/// Go-to-definition over the raw syntax tree: take the narrowest named node
/// under the cursor, walk the enclosing scopes upward looking for a
/// definition of that name, and fall back to a breadth-first scan of the
/// whole file.
pub async fn definition(
    backend: &Backend,
    params: GotoDefinitionParams,
) -> Result<Option<GotoDefinitionResponse>> {
    let uri = params.text_document_position_params.text_document.uri;
    let position = params.text_document_position_params.position;

    let file = match backend.workspace.get_file(&uri) {
        Ok(file) => file,
        Err(e) => {
            debug!(uri = %uri, error = %e, "definition for unknown document");
            return Ok(None);
        }
    };
    let Some(tree) = file.ast_or_parse() else {
        return Ok(None);
    };
    let text = file.text();
    let source = text.as_bytes();

    let point = Point::new(position.line as usize, position.character as usize);
    let root = tree.root_node();
    let Some(cursor_node) = root.named_descendant_for_point_range(point, point) else {
        return Ok(None);
    };
    let Ok(symbol_text) = cursor_node.utf8_text(source) else {
        return Ok(None);
    };

    let Some(definition) = find_definition(root, symbol_text, cursor_node, source) else {
        debug!(symbol = %symbol_text, "definition not found");
        return Ok(None);
    };

    let target_range = range_from_ts(definition.range());
    let link = LocationLink {
        origin_selection_range: None,
        target_uri: uri,
        target_range,
        target_selection_range: target_range,
    };
    Ok(Some(GotoDefinitionResponse::Link(vec![link])))
}

/// Returns the identifier node defining `symbol`, if any.
fn find_definition<'tree>(
    root: Node<'tree>,
    symbol: &str,
    cursor_node: Node<'tree>,
    source: &[u8],
) -> Option<Node<'tree>> {
    // Search the enclosing scopes upward first.
    let mut current = Some(cursor_node);
    while let Some(node) = current {
        if let Some(found) = definition_name_node(node, symbol, source) {
            return Some(found);
        }
        current = node.parent();
    }

    debug!("no definition in enclosing scopes, falling back to BFS");

    let mut queue = vec![root];
    let mut next = 0;
    while next < queue.len() {
        let node = queue[next];
        next += 1;

        if let Some(found) = definition_name_node(node, symbol, source) {
            return Some(found);
        }

        for i in 0..node.named_child_count() {
            if let Some(child) = node.named_child(i) {
                queue.push(child);
            }
        }
    }

    None
}

/// If `node` is a definition of `symbol` (function, class, or assignment
/// target), returns the defining identifier node.
fn definition_name_node<'tree>(
    node: Node<'tree>,
    symbol: &str,
    source: &[u8],
) -> Option<Node<'tree>> {
    match node.kind() {
        "function_definition" | "class_definition" => {
            let name_node = node.child_by_field_name("name")?;
            (name_node.utf8_text(source).ok()? == symbol).then_some(name_node)
        }
        "assignment" => {
            let left = node.child(0)?;
            if left.kind() != "identifier" {
                return None;
            }
            (left.utf8_text(source).ok()? == symbol).then_some(left)
        }
        _ => None,
    }
}

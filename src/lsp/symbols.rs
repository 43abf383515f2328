use tower_lsp::jsonrpc::{Error, ErrorCode, Result};
use tower_lsp::lsp_types::*;
use tracing::debug;
use uuid::Uuid;

use crate::lsp::util::{full_range, name_location};
use crate::lsp::Backend;
use crate::progress::PartialResultSender;
use crate::workspace::symbols::{fuzzy_match, Symbol};

const CHUNK_SIZE: usize = 100;

pub async fn document_symbol(
    backend: &Backend,
    params: DocumentSymbolParams,
) -> Result<Option<DocumentSymbolResponse>> {
    let uri = params.text_document.uri;
    let file = match backend.workspace.get_file(&uri) {
        Ok(file) => file,
        Err(e) => {
            debug!(uri = %uri, error = %e, "documentSymbol for unknown document");
            return Ok(None);
        }
    };

    // Demand-extracts files the bulk pass has not covered.
    let top_level = backend.workspace.file_symbols(&file);

    let index = backend.workspace.index.read().expect("index lock poisoned");
    let response: Vec<DocumentSymbol> = top_level
        .iter()
        .map(|symbol| {
            let children: Vec<DocumentSymbol> = symbol
                .children
                .iter()
                .filter_map(|id| index.get(id))
                .map(|child| convert_symbol(child, Vec::new()))
                .collect();
            convert_symbol(symbol, children)
        })
        .collect();

    Ok(Some(DocumentSymbolResponse::Nested(response)))
}

fn convert_symbol(symbol: &Symbol, children: Vec<DocumentSymbol>) -> DocumentSymbol {
    #[allow(deprecated)]
    DocumentSymbol {
        name: symbol.name.clone(),
        detail: (!symbol.parameters.is_empty()).then(|| symbol.full_name.clone()),
        kind: symbol.kind.to_lsp(),
        tags: None,
        deprecated: None,
        range: full_range(symbol),
        selection_range: symbol.name_range,
        children: (!children.is_empty()).then_some(children),
    }
}

struct FlatEntry {
    name: String,
    match_key: String,
    kind: SymbolKind,
    location: Location,
    container: Option<String>,
}

/// Scans the flat index in insertion order, fuzzy-filtering in chunks.
/// With a partial-result token the chunks are streamed as `$/progress`
/// notifications and the final response is empty; cancellation is checked
/// before every chunk.
pub async fn workspace_symbol(
    backend: &Backend,
    params: WorkspaceSymbolParams,
) -> Result<Option<Vec<SymbolInformation>>> {
    let entries: Vec<FlatEntry> = {
        let index = backend.workspace.index.read().expect("index lock poisoned");
        index
            .iter_flat()
            // External files are navigable but stay out of workspace-wide
            // symbol search.
            .filter(|symbol| {
                backend
                    .workspace
                    .get_file(&symbol.file)
                    .map(|file| !file.external)
                    .unwrap_or(false)
            })
            .map(|symbol| {
                let parent = symbol.parent.and_then(|id| index.get(&id));
                let name = match parent {
                    Some(parent) => format!("{}.{}", parent.name, symbol.full_name),
                    None => symbol.full_name.clone(),
                };
                FlatEntry {
                    name,
                    match_key: index.match_key(symbol),
                    kind: symbol.kind.to_lsp(),
                    location: name_location(symbol),
                    container: parent.map(|p| p.name.clone()),
                }
            })
            .collect()
    };

    let partial_token = params.partial_result_params.partial_result_token.clone();
    let request_id = match &partial_token {
        Some(NumberOrString::Number(n)) => n.to_string(),
        Some(NumberOrString::String(s)) => s.clone(),
        None => Uuid::new_v4().to_string(),
    };
    let guard = backend.requests.register(request_id);
    let partial = PartialResultSender::new(backend.client.clone(), partial_token);

    let query = params.query;
    let mut response = Vec::new();
    for chunk in entries.chunks(CHUNK_SIZE) {
        if guard.is_cancelled() {
            debug!("workspace/symbol cancelled");
            return Err(request_cancelled());
        }

        let matched: Vec<SymbolInformation> = chunk
            .iter()
            .filter(|entry| fuzzy_match(&query, &entry.match_key))
            .map(|entry| {
                #[allow(deprecated)]
                SymbolInformation {
                    name: entry.name.clone(),
                    kind: entry.kind,
                    tags: None,
                    deprecated: None,
                    location: entry.location.clone(),
                    container_name: entry.container.clone(),
                }
            })
            .collect();

        if partial.is_active() {
            if !matched.is_empty() {
                partial.send(&matched).await;
            }
        } else {
            response.extend(matched);
        }

        // Give an inbound cancel a chance to land between chunks.
        tokio::task::yield_now().await;
    }

    if partial.is_active() {
        // Streamed responses finish with an empty final result.
        return Ok(Some(Vec::new()));
    }
    Ok(Some(response))
}

fn request_cancelled() -> Error {
    Error {
        code: ErrorCode::ServerError(-32800),
        message: "request cancelled".into(),
        data: None,
    }
}

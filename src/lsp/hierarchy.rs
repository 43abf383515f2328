use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::request::{
    GotoDeclarationParams, GotoDeclarationResponse, GotoImplementationParams,
    GotoImplementationResponse,
};
use tower_lsp::lsp_types::*;
use tracing::debug;
use uuid::Uuid;

use crate::lsp::util::{full_range, name_location};
use crate::lsp::Backend;
use crate::workspace::symbols::Symbol;

/// All symbols that name this one as superclass or overridden method:
/// the overrides of a base method, the subclasses of a base class.
pub async fn implementation(
    backend: &Backend,
    params: GotoImplementationParams,
) -> Result<Option<GotoImplementationResponse>> {
    let uri = params.text_document_position_params.text_document.uri;
    let position = params.text_document_position_params.position;

    let Some(symbol) = backend
        .workspace
        .symbol_at(&uri, position.line, position.character)
    else {
        debug!(uri = %uri, "no symbol at implementation cursor");
        return Ok(None);
    };

    let locations: Vec<Location> = {
        let index = backend.workspace.index.read().expect("index lock poisoned");
        index
            .iter_flat()
            .filter(|other| other.super_objects.contains(&symbol.id))
            .map(name_location)
            .collect()
    };

    match locations.len() {
        0 => Ok(None),
        1 => Ok(Some(GotoDefinitionResponse::Scalar(
            locations.into_iter().next().unwrap(),
        ))),
        _ => Ok(Some(GotoDefinitionResponse::Array(locations))),
    }
}

/// The symbol this one is derived from: the first superclass of a class,
/// or the overridden method of a method.
pub async fn declaration(
    backend: &Backend,
    params: GotoDeclarationParams,
) -> Result<Option<GotoDeclarationResponse>> {
    let uri = params.text_document_position_params.text_document.uri;
    let position = params.text_document_position_params.position;

    let Some(symbol) = backend
        .workspace
        .symbol_at(&uri, position.line, position.character)
    else {
        debug!(uri = %uri, "no symbol at declaration cursor");
        return Ok(None);
    };

    let Some(first) = symbol.super_objects.first() else {
        return Ok(None);
    };
    let Some(target) = backend.workspace.symbol_by_id(first) else {
        return Ok(None);
    };

    Ok(Some(GotoDefinitionResponse::Scalar(name_location(&target))))
}

pub async fn prepare_type_hierarchy(
    backend: &Backend,
    params: TypeHierarchyPrepareParams,
) -> Result<Option<Vec<TypeHierarchyItem>>> {
    let uri = params.text_document_position_params.text_document.uri;
    let position = params.text_document_position_params.position;

    let Some(symbol) = backend
        .workspace
        .symbol_at(&uri, position.line, position.character)
    else {
        debug!(uri = %uri, "no symbol at type hierarchy cursor");
        return Ok(None);
    };

    Ok(Some(vec![hierarchy_item(&symbol)]))
}

/// Resolves the item handed back by the client through its `data` id and
/// returns the linked superclasses (or overridden method).
pub async fn supertypes(
    backend: &Backend,
    params: TypeHierarchySupertypesParams,
) -> Result<Option<Vec<TypeHierarchyItem>>> {
    let Some(id) = params
        .item
        .data
        .as_ref()
        .and_then(|data| data.as_str())
        .and_then(|raw| Uuid::parse_str(raw).ok())
    else {
        debug!("type hierarchy item without a usable id");
        return Ok(None);
    };

    let Some(symbol) = backend.workspace.symbol_by_id(&id) else {
        debug!(%id, "type hierarchy id no longer resolves");
        return Ok(None);
    };

    let items: Vec<TypeHierarchyItem> = symbol
        .super_objects
        .iter()
        .filter_map(|super_id| backend.workspace.symbol_by_id(super_id))
        .map(|super_symbol| hierarchy_item(&super_symbol))
        .collect();

    Ok(Some(items))
}

fn hierarchy_item(symbol: &Symbol) -> TypeHierarchyItem {
    TypeHierarchyItem {
        name: symbol.name.clone(),
        kind: symbol.kind.to_lsp(),
        tags: None,
        detail: Some(symbol.full_name.clone()),
        uri: symbol.file.clone(),
        range: full_range(symbol),
        selection_range: symbol.name_range,
        data: Some(serde_json::Value::String(symbol.id.to_string())),
    }
}

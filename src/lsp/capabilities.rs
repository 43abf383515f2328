use tower_lsp::lsp_types::*;

/// Capabilities are advertised conservatively: a provider is reported only
/// when the client declared support for the corresponding request.
/// Implementation lookup is always on, matching the editor integrations
/// this server ships with.
pub fn server_capabilities(client: &ClientCapabilities) -> ServerCapabilities {
    let text_document = client.text_document.as_ref();
    let workspace = client.workspace.as_ref();

    ServerCapabilities {
        text_document_sync: Some(TextDocumentSyncCapability::Options(
            TextDocumentSyncOptions {
                open_close: Some(true),
                change: Some(TextDocumentSyncKind::INCREMENTAL),
                ..Default::default()
            },
        )),
        definition_provider: Some(OneOf::Left(
            text_document.map_or(false, |td| td.definition.is_some()),
        )),
        workspace_symbol_provider: Some(OneOf::Left(
            workspace.map_or(false, |w| w.symbol.is_some()),
        )),
        document_symbol_provider: Some(OneOf::Left(
            text_document.map_or(false, |td| td.document_symbol.is_some()),
        )),
        implementation_provider: Some(ImplementationProviderCapability::Simple(true)),
        declaration_provider: Some(DeclarationCapability::Simple(
            text_document.map_or(false, |td| td.declaration.is_some()),
        )),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_client_gets_conservative_capabilities() {
        let caps = server_capabilities(&ClientCapabilities::default());
        assert_eq!(caps.definition_provider, Some(OneOf::Left(false)));
        assert_eq!(caps.workspace_symbol_provider, Some(OneOf::Left(false)));
        assert!(matches!(
            caps.implementation_provider,
            Some(ImplementationProviderCapability::Simple(true))
        ));
    }

    #[test]
    fn advertised_support_enables_providers() {
        let client = ClientCapabilities {
            text_document: Some(TextDocumentClientCapabilities {
                definition: Some(GotoCapability::default()),
                document_symbol: Some(DocumentSymbolClientCapabilities::default()),
                declaration: Some(GotoCapability::default()),
                ..Default::default()
            }),
            workspace: Some(WorkspaceClientCapabilities {
                symbol: Some(WorkspaceSymbolClientCapabilities::default()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let caps = server_capabilities(&client);
        assert_eq!(caps.definition_provider, Some(OneOf::Left(true)));
        assert_eq!(caps.workspace_symbol_provider, Some(OneOf::Left(true)));
        assert_eq!(caps.document_symbol_provider, Some(OneOf::Left(true)));
        assert!(matches!(
            caps.declaration_provider,
            Some(DeclarationCapability::Simple(true))
        ));
    }
}

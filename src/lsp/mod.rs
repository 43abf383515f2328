pub mod capabilities;
pub mod goto;
pub mod hierarchy;
pub mod symbols;
pub mod util;

use std::path::PathBuf;
use std::sync::Arc;
use tower_lsp::jsonrpc::{Error, Result};
use tower_lsp::lsp_types::request::{
    GotoDeclarationParams, GotoDeclarationResponse, GotoImplementationParams,
    GotoImplementationResponse,
};
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer, LspService, Server};
use tracing::{debug, info, warn};

use crate::progress::WorkDone;
use crate::request::RequestRegistry;
use crate::workspace::settings::ClientSettings;
use crate::workspace::{uri_in_workspace, Workspace};

pub struct Backend {
    pub client: Client,
    pub workspace: Arc<Workspace>,
    pub requests: Arc<RequestRegistry>,
}

impl Backend {
    pub fn new(client: Client, workspace: Arc<Workspace>) -> Self {
        Self {
            client,
            workspace,
            requests: Arc::new(RequestRegistry::new()),
        }
    }

    fn virtualenv_path(options: Option<&serde_json::Value>) -> Option<PathBuf> {
        let path = options?
            .get("virtualenv_path")?
            .as_str()
            .filter(|s| !s.is_empty())?;
        Some(PathBuf::from(path))
    }

    fn root_path(params: &InitializeParams) -> Option<PathBuf> {
        if let Some(uri) = &params.root_uri {
            if let Ok(path) = uri.to_file_path() {
                return Some(path);
            }
        }
        #[allow(deprecated)]
        params
            .root_path
            .as_ref()
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        let Some(root) = Self::root_path(&params) else {
            return Err(Error::invalid_params("rootPath is required"));
        };
        let virtualenv = Self::virtualenv_path(params.initialization_options.as_ref());
        info!(root = %root.display(), ?virtualenv, "initializing workspace");

        self.workspace
            .set_settings(ClientSettings::new(virtualenv.clone(), root.clone()));

        let workspace = self.workspace.clone();
        let client = self.client.clone();
        tokio::spawn(async move {
            let sink: Arc<Client> = Arc::new(client);

            let files_progress = WorkDone::new(sink.clone());
            let files = workspace.walk_project(&root, virtualenv.as_deref());
            workspace.bulk_parse(&files, &files_progress).await;

            let imports_progress = WorkDone::new(sink.clone());
            workspace.bulk_parse_imports(&imports_progress).await;

            let symbols_progress = WorkDone::new(sink.clone());
            workspace.bulk_parse_symbols(&symbols_progress).await;
            info!(files = files.len(), "initial indexing complete");
        });

        Ok(InitializeResult {
            server_info: Some(ServerInfo {
                name: "SnakeLSP".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
            capabilities: capabilities::server_capabilities(&params.capabilities),
        })
    }

    async fn initialized(&self, _params: InitializedParams) {
        debug!("client initialized");
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let doc = params.text_document;
        if doc.language_id != "python" {
            return;
        }
        let external = match self.workspace.settings() {
            Some(settings) => !uri_in_workspace(&doc.uri, &settings.workspace_root),
            None => false,
        };
        debug!(uri = %doc.uri, external, "didOpen");
        self.workspace.open_file(doc.uri, doc.text, external);
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;
        let file = match self.workspace.get_file(&uri) {
            Ok(file) => file,
            Err(e) => {
                debug!(uri = %uri, error = %e, "didChange for unknown document");
                return;
            }
        };
        if !file.is_opened() {
            warn!(uri = %uri, "didChange for a document that was never opened");
            return;
        }

        file.apply_changes(&params.content_changes);

        let workspace = self.workspace.clone();
        let changed = file.clone();
        file.debouncer.debounce(async move {
            workspace.reparse_file(&changed);
        });
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        match self.workspace.get_file(&uri) {
            Ok(file) => file.close(),
            Err(e) => debug!(uri = %uri, error = %e, "didClose for unknown document"),
        }
    }

    async fn goto_definition(
        &self,
        params: GotoDefinitionParams,
    ) -> Result<Option<GotoDefinitionResponse>> {
        debug!("LSP request: textDocument/definition");
        goto::definition(self, params).await
    }

    async fn document_symbol(
        &self,
        params: DocumentSymbolParams,
    ) -> Result<Option<DocumentSymbolResponse>> {
        debug!("LSP request: textDocument/documentSymbol");
        symbols::document_symbol(self, params).await
    }

    async fn symbol(
        &self,
        params: WorkspaceSymbolParams,
    ) -> Result<Option<Vec<SymbolInformation>>> {
        debug!(query = %params.query, "LSP request: workspace/symbol");
        symbols::workspace_symbol(self, params).await
    }

    async fn goto_implementation(
        &self,
        params: GotoImplementationParams,
    ) -> Result<Option<GotoImplementationResponse>> {
        debug!("LSP request: textDocument/implementation");
        hierarchy::implementation(self, params).await
    }

    async fn goto_declaration(
        &self,
        params: GotoDeclarationParams,
    ) -> Result<Option<GotoDeclarationResponse>> {
        debug!("LSP request: textDocument/declaration");
        hierarchy::declaration(self, params).await
    }

    async fn prepare_type_hierarchy(
        &self,
        params: TypeHierarchyPrepareParams,
    ) -> Result<Option<Vec<TypeHierarchyItem>>> {
        debug!("LSP request: textDocument/prepareTypeHierarchy");
        hierarchy::prepare_type_hierarchy(self, params).await
    }

    async fn supertypes(
        &self,
        params: TypeHierarchySupertypesParams,
    ) -> Result<Option<Vec<TypeHierarchyItem>>> {
        debug!("LSP request: typeHierarchy/supertypes");
        hierarchy::supertypes(self, params).await
    }
}

pub async fn run_server(workspace: Arc<Workspace>) {
    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let (service, socket) = LspService::new(|client| Backend::new(client, workspace));
    Server::new(stdin, stdout, socket).serve(service).await;
}

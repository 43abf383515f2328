use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_lsp::lsp_types::Url;
use tracing::warn;

use crate::workspace::imports::Import;
use crate::workspace::symbols::Symbol;
use crate::workspace::Workspace;

/// Read-only debugging surface: lists what the index currently knows.
/// Never mutates workspace state.
pub fn spawn(addr: String, workspace: Arc<Workspace>) {
    tokio::spawn(async move {
        let app = Router::new()
            .route("/", get(list_files))
            .route("/file", get(file_detail))
            .with_state(workspace);

        let listener = match tokio::net::TcpListener::bind(&addr).await {
            Ok(listener) => listener,
            Err(e) => {
                warn!(addr = %addr, error = %e, "introspection server failed to bind");
                return;
            }
        };
        if let Err(e) = axum::serve(listener, app).await {
            warn!(error = %e, "introspection server stopped");
        }
    });
}

#[derive(Serialize)]
struct FileSummary {
    url: String,
    external: bool,
    opened: bool,
}

async fn list_files(State(workspace): State<Arc<Workspace>>) -> Json<Vec<FileSummary>> {
    let mut files: Vec<FileSummary> = workspace
        .all_files()
        .into_iter()
        .map(|file| FileSummary {
            url: file.url.to_string(),
            external: file.external,
            opened: file.is_opened(),
        })
        .collect();
    files.sort_by(|a, b| a.url.cmp(&b.url));
    Json(files)
}

#[derive(Deserialize)]
struct FileQuery {
    url: String,
}

#[derive(Serialize)]
struct FileDetail {
    url: String,
    external: bool,
    opened: bool,
    symbols: Vec<Symbol>,
    imports: Vec<Import>,
}

async fn file_detail(
    State(workspace): State<Arc<Workspace>>,
    Query(query): Query<FileQuery>,
) -> Result<Json<FileDetail>, (StatusCode, String)> {
    let url = Url::parse(&query.url)
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("invalid url: {e}")))?;
    let file = workspace
        .get_file(&url)
        .map_err(|_| (StatusCode::NOT_FOUND, "file not found".to_string()))?;

    let symbols: Vec<Symbol> = {
        let index = workspace.index.read().expect("index lock poisoned");
        index
            .file_top_level(&url)
            .into_iter()
            .flat_map(|symbol| {
                let mut with_children = vec![symbol.clone()];
                with_children.extend(
                    symbol
                        .children
                        .iter()
                        .filter_map(|id| index.get(id))
                        .cloned(),
                );
                with_children
            })
            .collect()
    };

    Ok(Json(FileDetail {
        url: file.url.to_string(),
        external: file.external,
        opened: file.is_opened(),
        symbols,
        imports: file.imports().unwrap_or_default(),
    }))
}

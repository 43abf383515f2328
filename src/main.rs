use clap::Parser;
use snakelsp::workspace::Workspace;
use std::sync::Arc;

#[derive(Parser)]
#[command(
    name = "snakelsp",
    version,
    about = "A Python language server built on tree-sitter",
    long_about = "SnakeLSP indexes a Python workspace with tree-sitter and answers \
                  editor requests (definitions, symbols, type hierarchy) over an \
                  LSP stdio transport."
)]
struct Cli {
    /// Bind address for the read-only introspection server (requires the
    /// `introspect` build feature)
    #[arg(long, default_value = "127.0.0.1:8051")]
    introspect_addr: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let _log_guard = snakelsp::logging::init_logging();

    // A query that fails to compile makes the server useless; bail before
    // accepting the connection.
    let workspace = Arc::new(Workspace::new()?);

    #[cfg(feature = "introspect")]
    snakelsp::introspect::spawn(cli.introspect_addr.clone(), workspace.clone());
    #[cfg(not(feature = "introspect"))]
    let _ = &cli.introspect_addr;

    snakelsp::lsp::run_server(workspace).await;
    Ok(())
}

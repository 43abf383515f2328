pub mod file;
pub mod imports;
pub mod linker;
pub mod settings;
pub mod symbols;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use ignore::WalkBuilder;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tower_lsp::lsp_types::Url;
use tracing::{debug, warn};
use tree_sitter::Query;

use crate::error::{Result, SnakeLspError};
use crate::progress::WorkDone;
use crate::queries::python::{
    language, DefinitionIndices, ImportIndices, DEFINITIONS_QUERY, IMPORTS_QUERY,
};
use crate::queries::load_query;
use crate::workspace::file::PythonFile;
use crate::workspace::imports::{extract_imports, Import};
use crate::workspace::settings::ClientSettings;
use crate::workspace::symbols::{extract_symbols, ExtractedSymbols, Symbol, SymbolIndex};

/// Directory names never descended into during the workspace walk.
const EXCLUDED_DIRS: &[&str] = &[".git", ".venv", ".mypy_cache"];

/// The engine: every tracked file, the workspace-wide symbol index, and the
/// client settings. Shared across request handlers behind an `Arc`; the
/// symbol index lock is only ever held for synchronous sections.
pub struct Workspace {
    files: DashMap<Url, Arc<PythonFile>>,
    pub index: RwLock<SymbolIndex>,
    settings: RwLock<Option<ClientSettings>>,
    definitions_query: Query,
    definition_indices: DefinitionIndices,
    imports_query: Query,
    import_indices: ImportIndices,
}

impl Workspace {
    /// Compiles the extraction queries. A failure here is fatal: the server
    /// cannot do anything useful without them.
    pub fn new() -> Result<Self> {
        let lang = language();
        let definitions_query = load_query(&lang, DEFINITIONS_QUERY)?;
        let definition_indices = DefinitionIndices::new(&definitions_query)?;
        let imports_query = load_query(&lang, IMPORTS_QUERY)?;
        let import_indices = ImportIndices::new(&imports_query)?;

        Ok(Self {
            files: DashMap::new(),
            index: RwLock::new(SymbolIndex::new()),
            settings: RwLock::new(None),
            definitions_query,
            definition_indices,
            imports_query,
            import_indices,
        })
    }

    pub fn set_settings(&self, settings: ClientSettings) {
        *self.settings.write().expect("settings lock poisoned") = Some(settings);
    }

    pub fn settings(&self) -> Option<ClientSettings> {
        self.settings.read().expect("settings lock poisoned").clone()
    }

    pub fn get_file(&self, url: &Url) -> Result<Arc<PythonFile>> {
        self.files
            .get(url)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| SnakeLspError::FileNotFound(url.to_string()))
    }

    /// Registers a file without opening it (workspace walk, import pull-in).
    /// An already-tracked URI keeps its existing record.
    pub fn track_file(&self, url: Url, text: String, external: bool) -> Arc<PythonFile> {
        match self.files.entry(url.clone()) {
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(entry) => {
                let file = Arc::new(PythonFile::new(url, text, external, false));
                entry.insert(file.clone());
                file
            }
        }
    }

    /// Creates or re-opens the record for an editor `didOpen`. The editor's
    /// copy of the text is authoritative.
    pub fn open_file(&self, url: Url, text: String, external: bool) -> Arc<PythonFile> {
        match self.files.entry(url.clone()) {
            Entry::Occupied(entry) => {
                let file = entry.get().clone();
                file.replace_text(text);
                file.set_opened(true);
                file
            }
            Entry::Vacant(entry) => {
                let file = Arc::new(PythonFile::new(url, text, external, true));
                entry.insert(file.clone());
                file
            }
        }
    }

    pub fn load_file_from_disk(&self, path: &Path, external: bool) -> Result<Arc<PythonFile>> {
        let url = Url::from_file_path(path)
            .map_err(|_| SnakeLspError::Parsing(format!("not an absolute path: {path:?}")))?;
        if let Some(existing) = self.files.get(&url) {
            return Ok(existing.value().clone());
        }
        let text = std::fs::read_to_string(path)?;
        Ok(self.track_file(url, text, external))
    }

    pub fn all_files(&self) -> Vec<Arc<PythonFile>> {
        self.files.iter().map(|entry| entry.value().clone()).collect()
    }

    pub fn project_files(&self) -> Vec<Arc<PythonFile>> {
        self.files
            .iter()
            .filter(|entry| !entry.value().external)
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Walks the workspace root collecting Python files. Per-file read
    /// failures are logged and skipped; one bad file never aborts the walk.
    pub fn walk_project(&self, root: &Path, venv_path: Option<&Path>) -> Vec<Arc<PythonFile>> {
        let venv = venv_path.map(Path::to_path_buf);
        let mut builder = WalkBuilder::new(root);
        builder.git_ignore(true).hidden(false);
        builder.filter_entry(move |entry| {
            if entry.file_type().map_or(false, |t| t.is_dir()) {
                let name = entry.file_name().to_string_lossy();
                if EXCLUDED_DIRS.contains(&name.as_ref()) {
                    return false;
                }
                if let Some(venv) = &venv {
                    if entry.path() == venv {
                        return false;
                    }
                }
            }
            true
        });

        let mut collected = Vec::new();
        for result in builder.build() {
            let entry = match result {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "workspace walk entry error");
                    continue;
                }
            };
            if !entry.file_type().map_or(false, |t| t.is_file()) {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("py") {
                continue;
            }
            match self.load_file_from_disk(path, false) {
                Ok(file) => collected.push(file),
                Err(e) => warn!(path = %path.display(), error = %e, "could not read file"),
            }
        }
        collected
    }

    /// Parses a list of files sequentially, reporting progress per file.
    pub async fn bulk_parse(&self, files: &[Arc<PythonFile>], progress: &WorkDone) {
        progress.start("Parsing project files").await;
        let total = files.len();
        for (i, file) in files.iter().enumerate() {
            progress
                .report(
                    &format!("Processing file {} of {}", i + 1, total),
                    percent(i + 1, total),
                )
                .await;
            if let Some(tree) = file::parse_python(&file.text()) {
                file.store_ast(tree);
            } else {
                warn!(file = %file.url, "parser produced no tree");
            }
        }
        progress.end("Finished parsing project files").await;
    }

    /// Extracts and resolves imports for every project file.
    pub async fn bulk_parse_imports(&self, progress: &WorkDone) {
        debug!("bulk import extraction");
        progress.start("Parsing imports").await;
        let files = self.project_files();
        let total = files.len();
        for (i, file) in files.iter().enumerate() {
            progress
                .report(
                    &format!("Resolving imports {} of {}", i + 1, total),
                    percent(i + 1, total),
                )
                .await;
            let imports = self.resolve_imports_for_file(file);
            file.store_imports(imports);
        }
        progress.end("Imports parsed").await;
    }

    /// Extracts symbols for every project file and links the results.
    pub async fn bulk_parse_symbols(&self, progress: &WorkDone) {
        debug!("bulk symbol extraction");
        progress.start("Parsing symbols").await;
        let files = self.project_files();
        let total = files.len();
        for (i, file) in files.iter().enumerate() {
            progress
                .report(
                    &format!("Indexing symbols {} of {}", i + 1, total),
                    percent(i + 1, total),
                )
                .await;
            let extracted = self.extract_file_symbols(file);
            let mut index = self.index.write().expect("index lock poisoned");
            index.replace_file_symbols(&file.url, extracted);
        }
        self.link();
        progress.end("Symbols parsed").await;
    }

    /// Re-resolves superclass and override references across the whole
    /// index. Cheap enough to run after every reparse.
    pub fn link(&self) {
        let imports_of = |url: &Url| -> Vec<Import> {
            self.files
                .get(url)
                .and_then(|file| file.imports())
                .unwrap_or_default()
        };
        let mut index = self.index.write().expect("index lock poisoned");
        linker::link(&mut index, &imports_of);
    }

    fn extract_file_symbols(&self, file: &Arc<PythonFile>) -> ExtractedSymbols {
        let Some(tree) = file.ast_or_parse() else {
            warn!(file = %file.url, "no syntax tree, skipping extraction");
            return ExtractedSymbols::default();
        };
        extract_symbols(
            &file.url,
            &file.text(),
            &tree,
            &self.definitions_query,
            &self.definition_indices,
        )
    }

    fn extract_file_imports(&self, file: &Arc<PythonFile>) -> Vec<Import> {
        let Some(tree) = file.ast_or_parse() else {
            return Vec::new();
        };
        extract_imports(
            &file.text(),
            &tree,
            &self.imports_query,
            &self.import_indices,
        )
    }

    /// Extracts the file's imports and resolves each against the module
    /// search path.
    pub fn resolve_imports_for_file(&self, file: &Arc<PythonFile>) -> Vec<Import> {
        let mut imports = self.extract_file_imports(file);
        for import in &mut imports {
            let mut visited = HashSet::new();
            if let Err(e) = self.resolve_import(import, &mut visited) {
                warn!(
                    module = %import.source_module,
                    name = %import.imported_name,
                    error = %e,
                    "import left unresolved"
                );
            }
        }
        imports
    }

    /// Resolves one import record: module file lookup, demand-extraction of
    /// the target's symbols, then re-export chasing with a cycle guard.
    fn resolve_import(&self, import: &mut Import, visited: &mut HashSet<(Url, String)>) -> Result<()> {
        let settings = self
            .settings()
            .ok_or_else(|| SnakeLspError::ModuleNotResolved("no client settings".to_string()))?;

        let module_path = settings
            .resolve_module(&import.source_module)
            .ok_or_else(|| SnakeLspError::ModuleNotResolved(import.source_module.clone()))?;

        let external = !module_path.starts_with(&settings.workspace_root);
        let target = self.load_file_from_disk(&module_path, external)?;
        import.file = Some(target.url.clone());

        if import.imported_name.is_empty() {
            // `import X` binds a module, not a symbol.
            return Ok(());
        }

        if !visited.insert((target.url.clone(), import.imported_name.clone())) {
            return Err(SnakeLspError::ModuleNotResolved(format!(
                "import cycle through {}",
                target.url
            )));
        }

        let symbols = self.file_symbols(&target);
        if let Some(found) = symbols.iter().find(|s| s.name == import.imported_name) {
            import.symbol = Some(found.id);
            import.file = Some(found.file.clone());
            return Ok(());
        }

        // Follow re-exports: the target may itself import the name.
        let nested_imports = match target.imports() {
            Some(imports) => imports,
            None => self.extract_file_imports(&target),
        };
        for nested in nested_imports {
            if nested.imported_name != import.imported_name {
                continue;
            }
            debug!(
                name = %nested.imported_name,
                module = %nested.source_module,
                "following re-export"
            );
            let mut chased = nested.clone();
            match self.resolve_import(&mut chased, visited) {
                Ok(()) if chased.symbol.is_some() => {
                    import.symbol = chased.symbol;
                    import.file = chased.file;
                    return Ok(());
                }
                Ok(()) => {}
                Err(e) => debug!(error = %e, "re-export chase failed"),
            }
        }

        Err(SnakeLspError::SymbolNotFound)
    }

    /// The file's top-level symbols, demand-extracting (and registering in
    /// the flat index) files not indexed yet, external ones included.
    pub fn file_symbols(&self, file: &Arc<PythonFile>) -> Vec<Symbol> {
        {
            let index = self.index.read().expect("index lock poisoned");
            if index.has_file(&file.url) {
                return index
                    .file_top_level(&file.url)
                    .into_iter()
                    .cloned()
                    .collect();
            }
        }

        let extracted = self.extract_file_symbols(file);
        let mut index = self.index.write().expect("index lock poisoned");
        index.replace_file_symbols(&file.url, extracted);
        index
            .file_top_level(&file.url)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Full post-edit refresh of one file: fresh tree, imports, symbols
    /// (identity-preserving replacement), then a relink pass.
    pub fn reparse_file(&self, file: &Arc<PythonFile>) {
        debug!(file = %file.url, "reparsing after edit");
        file.invalidate_ast();
        if file.ast_or_parse().is_none() {
            warn!(file = %file.url, "reparse produced no tree");
            return;
        }
        let imports = self.resolve_imports_for_file(file);
        file.store_imports(imports);

        let extracted = self.extract_file_symbols(file);
        {
            let mut index = self.index.write().expect("index lock poisoned");
            index.replace_file_symbols(&file.url, extracted);
        }
        self.link();
    }

    pub fn symbol_by_id(&self, id: &uuid::Uuid) -> Option<Symbol> {
        self.index
            .read()
            .expect("index lock poisoned")
            .get(id)
            .cloned()
    }

    pub fn symbol_at(&self, url: &Url, line: u32, character: u32) -> Option<Symbol> {
        self.index
            .read()
            .expect("index lock poisoned")
            .find_by_position(url, line, character)
            .cloned()
    }
}

fn percent(done: usize, total: usize) -> u32 {
    if total == 0 {
        return 100;
    }
    ((done as f64 / total as f64) * 100.0) as u32
}

/// True when the URI lies under the workspace root.
pub fn uri_in_workspace(url: &Url, workspace_root: &Path) -> bool {
    url.to_file_path()
        .map(|path| path.starts_with(workspace_root))
        .unwrap_or(false)
}

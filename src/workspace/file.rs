use crate::debounce::Debouncer;
use crate::workspace::imports::Import;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, RwLock};
use std::time::Duration;
use tower_lsp::lsp_types::{Range, TextDocumentContentChangeEvent, Url};
use tracing::{debug, warn};
use tree_sitter::{Parser, Tree};

const DEBOUNCE_TIMEOUT: Duration = Duration::from_secs(2);

/// One tracked Python source file: project files, opened buffers, and
/// third-party files pulled in through import resolution.
pub struct PythonFile {
    pub url: Url,
    pub external: bool,
    text: RwLock<String>,
    opened: AtomicBool,
    ast: Mutex<Option<Tree>>,
    imports: RwLock<Option<Vec<Import>>>,
    pub debouncer: Debouncer,
}

impl PythonFile {
    pub fn new(url: Url, text: String, external: bool, opened: bool) -> Self {
        Self {
            url,
            external,
            text: RwLock::new(text),
            opened: AtomicBool::new(opened),
            ast: Mutex::new(None),
            imports: RwLock::new(None),
            debouncer: Debouncer::new(DEBOUNCE_TIMEOUT),
        }
    }

    pub fn text(&self) -> String {
        self.text.read().expect("text lock poisoned").clone()
    }

    /// Replaces the whole document text, invalidating the cached tree.
    pub fn replace_text(&self, text: String) {
        *self.text.write().expect("text lock poisoned") = text;
        self.invalidate_ast();
    }

    pub fn is_opened(&self) -> bool {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn set_opened(&self, opened: bool) {
        self.opened.store(opened, Ordering::SeqCst);
    }

    /// Applies LSP content changes in notification order. Each change sees
    /// the text produced by the previous one. Invalidates the cached AST.
    pub fn apply_changes(&self, changes: &[TextDocumentContentChangeEvent]) {
        let mut text = self.text.write().expect("text lock poisoned");
        for change in changes {
            match change.range {
                Some(range) => *text = apply_change(&text, range, &change.text),
                // A change without a range replaces the whole document.
                None => *text = change.text.clone(),
            }
        }
        debug!(file = %self.url, "applied content changes");
        drop(text);
        self.invalidate_ast();
    }

    /// Returns the cached syntax tree, parsing on first demand. Trees are
    /// cheap to clone and safe to read outside the lock.
    pub fn ast_or_parse(&self) -> Option<Tree> {
        let mut slot = self.ast.lock().expect("ast lock poisoned");
        if slot.is_none() {
            *slot = parse_python(&self.text());
        }
        slot.clone()
    }

    pub fn store_ast(&self, tree: Tree) {
        *self.ast.lock().expect("ast lock poisoned") = Some(tree);
    }

    pub fn invalidate_ast(&self) {
        *self.ast.lock().expect("ast lock poisoned") = None;
    }

    pub fn has_ast(&self) -> bool {
        self.ast.lock().expect("ast lock poisoned").is_some()
    }

    /// Marks the file closed in the editor and releases its tree. The record
    /// itself stays in the workspace and remains queryable.
    pub fn close(&self) {
        self.set_opened(false);
        self.invalidate_ast();
        self.debouncer.cancel();
    }

    pub fn imports(&self) -> Option<Vec<Import>> {
        self.imports.read().expect("imports lock poisoned").clone()
    }

    pub fn store_imports(&self, imports: Vec<Import>) {
        *self.imports.write().expect("imports lock poisoned") = Some(imports);
    }
}

pub fn parse_python(text: &str) -> Option<Tree> {
    let mut parser = Parser::new();
    parser
        .set_language(&crate::queries::python::language())
        .ok()?;
    parser.parse(text, None)
}

/// Applies a single LSP range edit to `content`. Coordinates are zero-based
/// line and character positions. Out-of-bounds positions leave the content
/// untouched.
pub fn apply_change(content: &str, range: Range, new_text: &str) -> String {
    let lines: Vec<&str> = content.split('\n').collect();

    let start_line = range.start.line as usize;
    let end_line = range.end.line as usize;
    let start_character = range.start.character as usize;
    let end_character = range.end.character as usize;

    if start_line >= lines.len() || end_line >= lines.len() {
        warn!("invalid line numbers in content change");
        return content.to_string();
    }

    let start_target_line = lines[start_line];
    let end_target_line = lines[end_line];

    if start_character > start_target_line.len() || end_character > end_target_line.len() {
        warn!("invalid character positions in content change");
        return content.to_string();
    }

    let updated = if start_line == end_line {
        format!(
            "{}{}{}",
            &start_target_line[..start_character],
            new_text,
            &start_target_line[end_character..]
        )
    } else {
        format!(
            "{}{}{}",
            &start_target_line[..start_character],
            new_text,
            &end_target_line[end_character..]
        )
    };

    let mut out: Vec<&str> = Vec::with_capacity(lines.len());
    out.extend_from_slice(&lines[..start_line]);
    out.push(&updated);
    out.extend_from_slice(&lines[end_line + 1..]);
    out.join("\n")
}

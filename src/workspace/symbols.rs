use indexmap::IndexMap;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tower_lsp::lsp_types::{Range, Url};
use tree_sitter::{Query, QueryCursor, StreamingIterator, Tree};
use uuid::Uuid;

use crate::queries::python::DefinitionIndices;
use crate::queries::range_from_ts;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SymbolKind {
    Class,
    Method,
    Function,
}

impl SymbolKind {
    pub fn to_lsp(self) -> tower_lsp::lsp_types::SymbolKind {
        match self {
            SymbolKind::Class => tower_lsp::lsp_types::SymbolKind::CLASS,
            SymbolKind::Method => tower_lsp::lsp_types::SymbolKind::METHOD,
            SymbolKind::Function => tower_lsp::lsp_types::SymbolKind::FUNCTION,
        }
    }
}

/// An indexed definition. Relationships are stored as ids resolved through
/// the [`SymbolIndex`], never as owning references.
#[derive(Debug, Clone, Serialize)]
pub struct Symbol {
    pub id: Uuid,
    pub kind: SymbolKind,
    pub name: String,
    /// Verbatim parameter list text, parentheses included.
    pub parameters: String,
    /// Verbatim return annotation, empty when absent.
    pub return_type: String,
    pub full_name: String,
    pub file: Url,
    pub body_range: Range,
    pub name_range: Range,
    pub children: Vec<Uuid>,
    pub parent: Option<Uuid>,
    /// Raw superclass (or overridden-method) names, retained for late
    /// binding by the linker.
    pub super_names: Vec<String>,
    pub super_objects: Vec<Uuid>,
}

impl Symbol {
    fn new(
        kind: SymbolKind,
        name: String,
        parameters: String,
        return_type: String,
        file: Url,
        body_range: Range,
        name_range: Range,
    ) -> Self {
        let mut full_name = format!("{name}{parameters}");
        if !return_type.is_empty() {
            full_name.push_str(&format!(" -> {return_type}"));
        }
        Self {
            id: Uuid::new_v4(),
            kind,
            name,
            parameters,
            return_type,
            full_name,
            file,
            body_range,
            name_range,
            children: Vec::new(),
            parent: None,
            super_names: Vec::new(),
            super_objects: Vec::new(),
        }
    }

    /// Position key used both for class deduplication during extraction and
    /// for matching symbols across reparses.
    fn position_key(&self) -> (String, u32, u32) {
        (
            self.name.clone(),
            self.name_range.start.line,
            self.name_range.start.character,
        )
    }
}

/// The symbols extracted from one file: every symbol in flat-insertion
/// order (each class immediately followed by its methods), plus the ids of
/// the top-level ones.
#[derive(Debug, Default)]
pub struct ExtractedSymbols {
    pub all: Vec<Symbol>,
    pub top_level: Vec<Uuid>,
}

/// Runs the definitions query over a parsed file and builds the symbol
/// records: classes deduplicated by name and position (repeated matches
/// contribute additional superclass names), methods attached to the
/// narrowest class whose body spans them, module functions as top-level
/// siblings.
pub fn extract_symbols(
    file_url: &Url,
    text: &str,
    tree: &Tree,
    query: &Query,
    idx: &DefinitionIndices,
) -> ExtractedSymbols {
    let source = text.as_bytes();
    let mut classes: IndexMap<(String, u32, u32), Symbol> = IndexMap::new();
    let mut methods: Vec<Symbol> = Vec::new();
    let mut functions: Vec<Symbol> = Vec::new();

    let mut cursor = QueryCursor::new();
    let mut matches = cursor.matches(query, tree.root_node(), source);
    while let Some(mat) = matches.next() {
        let mut name = String::new();
        let mut params = String::new();
        let mut return_type = String::new();
        let mut superclass = String::new();
        let mut kind = None;
        let mut body_range = Range::default();
        let mut name_range = Range::default();

        for capture in mat.captures {
            let text = capture.node.utf8_text(source).unwrap_or("").to_string();
            let i = capture.index;

            if i == idx.class_name || i == idx.method_name || i == idx.function_name {
                name = text;
                name_range = range_from_ts(capture.node.range());
                kind = Some(if i == idx.class_name {
                    SymbolKind::Class
                } else if i == idx.method_name {
                    SymbolKind::Method
                } else {
                    SymbolKind::Function
                });
            } else if i == idx.method_params || i == idx.function_params {
                params = text;
            } else if i == idx.method_return_type || i == idx.function_return_type {
                return_type = text;
            } else if i == idx.class_superclass {
                superclass = text;
            } else if i == idx.class_body || i == idx.method_body || i == idx.function_body {
                body_range = range_from_ts(capture.node.range());
            }
        }

        let Some(kind) = kind else { continue };
        if name.is_empty() {
            continue;
        }

        match kind {
            SymbolKind::Class => {
                let key = (
                    name.clone(),
                    name_range.start.line,
                    name_range.start.character,
                );
                match classes.get_mut(&key) {
                    Some(existing) => {
                        // A repeated match for the same class carries the
                        // next superclass capture.
                        if !superclass.is_empty() {
                            existing.super_names.push(superclass);
                        }
                    }
                    None => {
                        let mut symbol = Symbol::new(
                            kind,
                            name,
                            params,
                            return_type,
                            file_url.clone(),
                            body_range,
                            name_range,
                        );
                        if !superclass.is_empty() {
                            symbol.super_names.push(superclass);
                        }
                        classes.insert(key, symbol);
                    }
                }
            }
            SymbolKind::Method => {
                methods.push(Symbol::new(
                    kind,
                    name,
                    params,
                    return_type,
                    file_url.clone(),
                    body_range,
                    name_range,
                ));
            }
            SymbolKind::Function => {
                functions.push(Symbol::new(
                    kind,
                    name,
                    params,
                    return_type,
                    file_url.clone(),
                    body_range,
                    name_range,
                ));
            }
        }
    }

    // Attach each method to the narrowest class whose body line span
    // contains the method start.
    let mut children_of: HashMap<Uuid, Vec<Symbol>> = HashMap::new();
    for mut method in methods {
        let start = method.body_range.start.line;
        let owner = classes
            .values()
            .filter(|class| {
                start >= class.body_range.start.line && start <= class.body_range.end.line
            })
            .min_by_key(|class| class.body_range.end.line - class.body_range.start.line);
        if let Some(owner) = owner {
            method.parent = Some(owner.id);
            children_of.entry(owner.id).or_default().push(method);
        }
        // A method with no containing class can only come from a broken
        // parse; it is dropped with the rest of the error region.
    }

    let mut result = ExtractedSymbols::default();
    for (_, mut class) in classes {
        let class_id = class.id;
        let children = children_of.remove(&class_id).unwrap_or_default();
        class.children = children.iter().map(|c| c.id).collect();
        result.top_level.push(class_id);
        result.all.push(class);
        result.all.extend(children);
    }
    for function in functions {
        result.top_level.push(function.id);
        result.all.push(function);
    }
    result
}

/// Case-insensitive subsequence match. An empty query matches everything.
pub fn fuzzy_match(query: &str, target: &str) -> bool {
    let mut target_chars = target.chars().flat_map(char::to_lowercase);
    'query: for q in query.chars().flat_map(char::to_lowercase) {
        for t in target_chars.by_ref() {
            if t == q {
                continue 'query;
            }
        }
        return false;
    }
    true
}

/// Workspace-wide symbol store: an insertion-ordered arena of every indexed
/// symbol plus the per-file top-level lists. All cross-symbol references are
/// ids resolved here.
#[derive(Default)]
pub struct SymbolIndex {
    flat: IndexMap<Uuid, Symbol>,
    by_file: HashMap<Url, Vec<Uuid>>,
}

impl SymbolIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &Uuid) -> Option<&Symbol> {
        self.flat.get(id)
    }

    pub fn get_mut(&mut self, id: &Uuid) -> Option<&mut Symbol> {
        self.flat.get_mut(id)
    }

    pub fn has_file(&self, url: &Url) -> bool {
        self.by_file.contains_key(url)
    }

    pub fn file_top_level(&self, url: &Url) -> Vec<&Symbol> {
        self.by_file
            .get(url)
            .into_iter()
            .flatten()
            .filter_map(|id| self.flat.get(id))
            .collect()
    }

    /// All indexed symbols in stable insertion order.
    pub fn iter_flat(&self) -> impl Iterator<Item = &Symbol> {
        self.flat.values()
    }

    pub fn len(&self) -> usize {
        self.flat.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flat.is_empty()
    }

    /// Finds the symbol whose defining identifier spans the given position.
    pub fn find_by_position(&self, url: &Url, line: u32, character: u32) -> Option<&Symbol> {
        self.flat.values().find(|symbol| {
            symbol.file == *url
                && symbol.name_range.start.line <= line
                && symbol.name_range.end.line >= line
                && symbol.name_range.start.character <= character
                && symbol.name_range.end.character >= character
        })
    }

    /// `Parent.name` for contained symbols, bare `name` otherwise.
    pub fn name_with_parent(&self, symbol: &Symbol) -> String {
        match symbol.parent.and_then(|id| self.flat.get(&id)) {
            Some(parent) => format!("{}.{}", parent.name, symbol.name),
            None => symbol.name.clone(),
        }
    }

    /// The string a fuzzy query is matched against.
    pub fn match_key(&self, symbol: &Symbol) -> String {
        match symbol.parent.and_then(|id| self.flat.get(&id)) {
            Some(parent) => format!("{}.{}{}", parent.name, symbol.name, symbol.parameters),
            None => symbol.name.clone(),
        }
    }

    pub fn filter<'a>(&self, symbols: &[&'a Symbol], query: &str) -> Vec<&'a Symbol> {
        if query.is_empty() {
            return symbols.to_vec();
        }
        symbols
            .iter()
            .copied()
            .filter(|symbol| fuzzy_match(query, &self.match_key(symbol)))
            .collect()
    }

    /// Every id currently indexed for a file, children included.
    fn file_symbol_ids(&self, url: &Url) -> Vec<Uuid> {
        let mut ids = Vec::new();
        for top in self.by_file.get(url).into_iter().flatten() {
            ids.push(*top);
            if let Some(symbol) = self.flat.get(top) {
                ids.extend(symbol.children.iter().copied());
            }
        }
        ids
    }

    /// Replaces a file's symbols, preserving the identity of symbols whose
    /// name and defining position survived: matched entries are updated in
    /// place (same id, same flat-index slot), new symbols are appended, and
    /// vanished symbols drop out without disturbing the order of survivors.
    pub fn replace_file_symbols(&mut self, url: &Url, extracted: ExtractedSymbols) {
        let old_ids = self.file_symbol_ids(url);
        let mut old_by_key: HashMap<(String, u32, u32), Uuid> = HashMap::new();
        let mut old_by_pos: HashMap<(u32, u32), Uuid> = HashMap::new();
        for id in &old_ids {
            if let Some(symbol) = self.flat.get(id) {
                old_by_key.insert(symbol.position_key(), *id);
                old_by_pos.insert(
                    (symbol.name_range.start.line, symbol.name_range.start.character),
                    *id,
                );
            }
        }

        // Resolve the final id of every incoming symbol before rewriting
        // references between them. Exact (name, position) matches first,
        // then a positional pass so a rename at an unchanged position keeps
        // its identity.
        let mut final_ids: HashMap<Uuid, Uuid> = HashMap::new();
        let mut consumed: HashSet<Uuid> = HashSet::new();
        for symbol in &extracted.all {
            if let Some(&old) = old_by_key.get(&symbol.position_key()) {
                if consumed.insert(old) {
                    final_ids.insert(symbol.id, old);
                }
            }
        }
        for symbol in &extracted.all {
            if final_ids.contains_key(&symbol.id) {
                continue;
            }
            let pos = (symbol.name_range.start.line, symbol.name_range.start.character);
            if let Some(&old) = old_by_pos.get(&pos) {
                if consumed.insert(old) {
                    final_ids.insert(symbol.id, old);
                    continue;
                }
            }
            final_ids.insert(symbol.id, symbol.id);
        }

        let mut kept: HashSet<Uuid> = HashSet::new();
        for mut symbol in extracted.all {
            let remap = |id: &Uuid| final_ids.get(id).copied().unwrap_or(*id);
            symbol.id = remap(&symbol.id);
            symbol.parent = symbol.parent.as_ref().map(remap);
            symbol.children = symbol.children.iter().map(remap).collect();
            symbol.super_objects = symbol.super_objects.iter().map(remap).collect();
            kept.insert(symbol.id);

            // IndexMap keeps the original slot on key reuse, which is what
            // makes the update in-place.
            self.flat.insert(symbol.id, symbol);
        }

        for id in old_ids {
            if !kept.contains(&id) {
                self.flat.shift_remove(&id);
            }
        }

        let top_level = extracted
            .top_level
            .iter()
            .map(|id| final_ids.get(id).copied().unwrap_or(*id))
            .collect();
        self.by_file.insert(url.clone(), top_level);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::python::{language, DEFINITIONS_QUERY};
    use crate::queries::load_query;
    use crate::workspace::file::parse_python;

    fn extract(source: &str) -> (SymbolIndex, Url) {
        let url = Url::parse("file:///tmp/m.py").unwrap();
        let mut index = SymbolIndex::new();
        index.replace_file_symbols(&url, extract_from(source, &url));
        (index, url)
    }

    fn extract_from(source: &str, url: &Url) -> ExtractedSymbols {
        let query = load_query(&language(), DEFINITIONS_QUERY).unwrap();
        let idx = DefinitionIndices::new(&query).unwrap();
        let tree = parse_python(source).unwrap();
        extract_symbols(url, source, &tree, &query, &idx)
    }

    const BASIC: &str = "\
class MyClass:
    def method_one(self, p1): pass
    @deco
    def decorated(self, p2): pass
def standalone(p): return p
";

    #[test]
    fn extracts_classes_methods_and_functions() {
        let (index, url) = extract(BASIC);

        assert_eq!(index.len(), 4);

        let top = index.file_top_level(&url);
        assert_eq!(top.len(), 2);
        let class = top[0];
        assert_eq!(class.name, "MyClass");
        assert_eq!(class.kind, SymbolKind::Class);
        assert_eq!(class.children.len(), 2);

        let child_names: Vec<_> = class
            .children
            .iter()
            .map(|id| index.get(id).unwrap().name.as_str())
            .collect();
        assert_eq!(child_names, vec!["method_one", "decorated"]);

        let function = top[1];
        assert_eq!(function.name, "standalone");
        assert_eq!(function.kind, SymbolKind::Function);
        assert_eq!(function.full_name, "standalone(p)");
    }

    #[test]
    fn parent_and_children_are_consistent() {
        let (index, _) = extract(BASIC);
        for symbol in index.iter_flat() {
            for child_id in &symbol.children {
                let child = index.get(child_id).unwrap();
                assert_eq!(child.parent, Some(symbol.id));
                assert!(child.body_range.start.line >= symbol.body_range.start.line);
                assert!(child.body_range.end.line <= symbol.body_range.end.line);
            }
            if let Some(parent_id) = symbol.parent {
                let parent = index.get(&parent_id).unwrap();
                assert!(parent.children.contains(&symbol.id));
            }
        }
    }

    #[test]
    fn superclass_names_are_captured() {
        let source = "\
class Base:
    def greet(self): pass

class Child(Base):
    def greet(self): pass

class Multi(Base, object):
    pass
";
        let (index, url) = extract(source);
        let top = index.file_top_level(&url);

        let child = top.iter().find(|s| s.name == "Child").unwrap();
        assert_eq!(child.super_names, vec!["Base"]);

        let multi = top.iter().find(|s| s.name == "Multi").unwrap();
        assert_eq!(multi.super_names, vec!["Base", "object"]);
    }

    #[test]
    fn return_types_are_verbatim() {
        let source = "\
def typed_function(param: int) -> str:
    return \"test\"

class TypedClass:
    def typed_method(self, x: float) -> bool:
        return True
";
        let (index, url) = extract(source);
        let top = index.file_top_level(&url);

        let function = top.iter().find(|s| s.name == "typed_function").unwrap();
        assert_eq!(function.return_type, "str");
        assert_eq!(function.full_name, "typed_function(param: int) -> str");

        let class = top.iter().find(|s| s.name == "TypedClass").unwrap();
        let method = index.get(&class.children[0]).unwrap();
        assert_eq!(method.return_type, "bool");
    }

    #[test]
    fn nested_class_methods_attach_to_innermost() {
        let source = "\
class Outer:
    def outer_method(self):
        pass

    class Inner:
        def inner_method(self):
            pass
";
        let (index, url) = extract(source);
        let top = index.file_top_level(&url);
        let outer = top.iter().find(|s| s.name == "Outer").unwrap();
        let inner = top.iter().find(|s| s.name == "Inner").unwrap();

        let outer_children: Vec<_> = outer
            .children
            .iter()
            .map(|id| index.get(id).unwrap().name.as_str())
            .collect();
        assert_eq!(outer_children, vec!["outer_method"]);

        let inner_children: Vec<_> = inner
            .children
            .iter()
            .map(|id| index.get(id).unwrap().name.as_str())
            .collect();
        assert_eq!(inner_children, vec!["inner_method"]);
    }

    #[test]
    fn empty_file_has_no_symbols() {
        let (index, _) = extract("");
        assert!(index.is_empty());
    }

    #[test]
    fn nested_functions_are_not_captured() {
        let source = "\
def module_function():
    def nested_function():
        pass
    return nested_function
";
        let (index, url) = extract(source);
        let names: Vec<_> = index.iter_flat().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["module_function"]);
        assert_eq!(index.file_top_level(&url).len(), 1);
    }

    #[test]
    fn flat_iteration_order_is_stable() {
        let (index, _) = extract(BASIC);
        let first: Vec<Uuid> = index.iter_flat().map(|s| s.id).collect();
        let second: Vec<Uuid> = index.iter_flat().map(|s| s.id).collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 4);
    }

    #[test]
    fn find_by_position_matches_name_range() {
        let (index, url) = extract(BASIC);
        // "method_one" starts on line 1, column 8.
        let found = index.find_by_position(&url, 1, 10).unwrap();
        assert_eq!(found.name, "method_one");
        assert!(index.find_by_position(&url, 90, 0).is_none());
    }

    #[test]
    fn replace_in_place_preserves_ids_by_position() {
        let url = Url::parse("file:///tmp/m.py").unwrap();
        let mut index = SymbolIndex::new();
        index.replace_file_symbols(&url, extract_from(BASIC, &url));

        let old_ids: HashMap<String, Uuid> = index
            .iter_flat()
            .map(|s| (s.name.clone(), s.id))
            .collect();

        // Rename method_one -> method_renamed at the same position.
        let renamed = BASIC.replace("method_one", "method_renamed");
        index.replace_file_symbols(&url, extract_from(&renamed, &url));

        // Matched by start position: the renamed method keeps its id, as do
        // all symbols whose name and position are unchanged.
        let renamed_symbol = index
            .iter_flat()
            .find(|s| s.name == "method_renamed")
            .unwrap();
        assert_eq!(renamed_symbol.id, old_ids["method_one"]);

        let class = index.iter_flat().find(|s| s.name == "MyClass").unwrap();
        assert_eq!(class.id, old_ids["MyClass"]);
        let decorated = index.iter_flat().find(|s| s.name == "decorated").unwrap();
        assert_eq!(decorated.id, old_ids["decorated"]);
        let standalone = index.iter_flat().find(|s| s.name == "standalone").unwrap();
        assert_eq!(standalone.id, old_ids["standalone"]);

        assert_eq!(index.len(), 4);
        // The held id resolves to the updated record in place.
        assert_eq!(
            index.get(&old_ids["method_one"]).unwrap().name,
            "method_renamed"
        );
    }

    #[test]
    fn replace_preserves_flat_order_of_survivors() {
        let url = Url::parse("file:///tmp/m.py").unwrap();
        let mut index = SymbolIndex::new();
        index.replace_file_symbols(&url, extract_from(BASIC, &url));
        let before: Vec<String> = index.iter_flat().map(|s| s.name.clone()).collect();

        // Identical reparse: nothing reorders.
        index.replace_file_symbols(&url, extract_from(BASIC, &url));
        let after: Vec<String> = index.iter_flat().map(|s| s.name.clone()).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn fuzzy_match_is_case_insensitive_subsequence() {
        assert!(fuzzy_match("stnd", "standalone"));
        assert!(fuzzy_match("MYC", "MyClass.method_one(self, p1)"));
        assert!(fuzzy_match("", "anything"));
        assert!(!fuzzy_match("xyz", "standalone"));
        assert!(!fuzzy_match("standalonee", "standalone"));
    }

    #[test]
    fn filter_uses_parent_qualified_names() {
        let (index, _) = extract(BASIC);
        let all: Vec<&Symbol> = index.iter_flat().collect();

        let hits = index.filter(&all, "myclass.method");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "method_one");

        let everything = index.filter(&all, "");
        assert_eq!(everything.len(), 4);
    }
}

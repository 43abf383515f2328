use serde::Serialize;
use tower_lsp::lsp_types::Url;
use tree_sitter::{Query, QueryCursor, StreamingIterator, Tree};
use uuid::Uuid;

use crate::queries::python::ImportIndices;

/// One import statement, optionally resolved to the file and symbol it
/// names. Unresolvable imports keep their raw fields so resolution can be
/// retried on the next reparse.
#[derive(Debug, Clone, Serialize)]
pub struct Import {
    /// Local binding introduced by `as`, empty otherwise.
    pub alias: String,
    /// Dotted module path, e.g. `pkg.sub`.
    pub source_module: String,
    /// The specific name for `from X import Y`, empty for `import X`.
    pub imported_name: String,
    pub file: Option<Url>,
    pub symbol: Option<Uuid>,
}

/// Runs the imports query over a parsed file. Resolution is a separate
/// step; this only collects the raw records.
pub fn extract_imports(text: &str, tree: &Tree, query: &Query, idx: &ImportIndices) -> Vec<Import> {
    let source = text.as_bytes();
    let mut imports = Vec::new();

    let mut cursor = QueryCursor::new();
    let mut matches = cursor.matches(query, tree.root_node(), source);
    while let Some(mat) = matches.next() {
        let mut source_module = String::new();
        let mut alias = String::new();
        let mut imported_name = String::new();

        for capture in mat.captures {
            let text = capture.node.utf8_text(source).unwrap_or("").to_string();
            if capture.index == idx.module {
                source_module = text;
            } else if capture.index == idx.alias {
                alias = text;
            } else if capture.index == idx.imported_name {
                imported_name = text;
            }
        }

        if !source_module.is_empty() {
            imports.push(Import {
                alias,
                source_module,
                imported_name,
                file: None,
                symbol: None,
            });
        }
    }
    imports
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::load_query;
    use crate::queries::python::{language, IMPORTS_QUERY};
    use crate::workspace::file::parse_python;

    fn extract(source: &str) -> Vec<Import> {
        let query = load_query(&language(), IMPORTS_QUERY).unwrap();
        let idx = ImportIndices::new(&query).unwrap();
        let tree = parse_python(source).unwrap();
        extract_imports(source, &tree, &query, &idx)
    }

    #[test]
    fn bare_import() {
        let imports = extract("import pandas\n");
        assert_eq!(imports.len(), 1);
        assert_eq!(imports[0].source_module, "pandas");
        assert_eq!(imports[0].alias, "");
        assert_eq!(imports[0].imported_name, "");
    }

    #[test]
    fn aliased_import() {
        let imports = extract("import pandas as pd\n");
        assert_eq!(imports.len(), 1);
        assert_eq!(imports[0].source_module, "pandas");
        assert_eq!(imports[0].alias, "pd");
    }

    #[test]
    fn from_import() {
        let imports = extract("from pkg.sub import Thing\n");
        assert_eq!(imports.len(), 1);
        assert_eq!(imports[0].source_module, "pkg.sub");
        assert_eq!(imports[0].imported_name, "Thing");
        assert_eq!(imports[0].alias, "");
    }

    #[test]
    fn from_import_with_alias() {
        let imports = extract("from pkg.sub import Thing as T\n");
        assert_eq!(imports.len(), 1);
        assert_eq!(imports[0].source_module, "pkg.sub");
        assert_eq!(imports[0].imported_name, "Thing");
        assert_eq!(imports[0].alias, "T");
    }

    #[test]
    fn mixed_imports_keep_statement_order() {
        let imports = extract(
            "import os\nfrom base import Base\nimport numpy as np\n",
        );
        let modules: Vec<_> = imports.iter().map(|i| i.source_module.as_str()).collect();
        assert_eq!(modules, vec!["os", "base", "numpy"]);
    }
}

use tower_lsp::lsp_types::Url;
use uuid::Uuid;

use crate::workspace::imports::Import;
use crate::workspace::symbols::{SymbolIndex, SymbolKind};

/// Resolves the raw names captured at extraction time into symbol ids:
/// superclasses for classes, then the nearest overridden method for
/// methods. Both passes recompute from scratch, so relinking after a
/// reparse is idempotent.
pub fn link(index: &mut SymbolIndex, imports_of: &dyn Fn(&Url) -> Vec<Import>) {
    link_superclasses(index, imports_of);
    link_overrides(index);
}

/// For each class, each name in `super_names` is looked up first among the
/// same file's top-level symbols, then among the file's resolved imports.
fn link_superclasses(index: &mut SymbolIndex, imports_of: &dyn Fn(&Url) -> Vec<Import>) {
    let class_ids: Vec<Uuid> = index
        .iter_flat()
        .filter(|s| s.kind == SymbolKind::Class)
        .map(|s| s.id)
        .collect();

    for class_id in class_ids {
        let Some(class) = index.get(&class_id) else {
            continue;
        };
        let file = class.file.clone();
        let super_names = class.super_names.clone();
        if super_names.is_empty() {
            continue;
        }

        let siblings: Vec<(String, Uuid)> = index
            .file_top_level(&file)
            .into_iter()
            .map(|s| (s.name.clone(), s.id))
            .collect();
        let imports = imports_of(&file);

        let mut resolved = Vec::new();
        for super_name in &super_names {
            let same_file = siblings
                .iter()
                .find(|(name, id)| name == super_name && *id != class_id)
                .map(|(_, id)| *id);
            let found = same_file.or_else(|| {
                imports
                    .iter()
                    .find(|import| import.imported_name == *super_name)
                    .and_then(|import| import.symbol)
            });
            // Only ids that still resolve may be linked.
            if let Some(id) = found.filter(|id| index.get(id).is_some()) {
                resolved.push(id);
            }
        }

        if let Some(class) = index.get_mut(&class_id) {
            class.super_objects = resolved;
        }
    }
}

/// For each method whose class has a resolved first superclass, links the
/// method overridden there. One level deep only: the nearest override.
fn link_overrides(index: &mut SymbolIndex) {
    let method_ids: Vec<Uuid> = index
        .iter_flat()
        .filter(|s| s.kind == SymbolKind::Method && s.parent.is_some())
        .map(|s| s.id)
        .collect();

    for method_id in method_ids {
        let overridden = index.get(&method_id).and_then(|method| {
            let parent = index.get(&method.parent?)?;
            let superclass = index.get(parent.super_objects.first()?)?;
            superclass
                .children
                .iter()
                .find(|child_id| {
                    index
                        .get(child_id)
                        .map(|child| child.name == method.name)
                        .unwrap_or(false)
                })
                .copied()
        });

        if let Some(method) = index.get_mut(&method_id) {
            method.super_objects = match overridden {
                Some(id) => vec![id],
                None => Vec::new(),
            };
        }
    }
}

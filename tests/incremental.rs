mod common;

use common::setup_workspace;
use tower_lsp::lsp_types::{Position, Range, TextDocumentContentChangeEvent};

const MODULE: &str = "\
class MyClass:
    def method_one(self, p1): pass
    @deco
    def decorated(self, p2): pass
def standalone(p): return p
";

fn change(sl: u32, sc: u32, el: u32, ec: u32, text: &str) -> TextDocumentContentChangeEvent {
    TextDocumentContentChangeEvent {
        range: Some(Range {
            start: Position::new(sl, sc),
            end: Position::new(el, ec),
        }),
        range_length: None,
        text: text.to_string(),
    }
}

#[tokio::test]
async fn rename_edit_preserves_symbol_ids() {
    let tw = setup_workspace(&[("m.py", MODULE)]).await;
    let url = tw.url_for("m.py");
    let file = tw.workspace.get_file(&url).unwrap();
    file.set_opened(true);

    let before: Vec<(String, uuid::Uuid)> = {
        let index = tw.workspace.index.read().unwrap();
        index
            .iter_flat()
            .map(|s| (s.name.clone(), s.id))
            .collect()
    };
    let id_of = |name: &str| {
        before
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, id)| *id)
            .unwrap()
    };

    // "method_one" occupies columns 8..18 on line 1.
    file.apply_changes(&[change(1, 8, 1, 18, "method_renamed")]);
    tw.workspace.reparse_file(&file);

    let index = tw.workspace.index.read().unwrap();
    assert_eq!(index.len(), 4);

    let renamed = index
        .iter_flat()
        .find(|s| s.name == "method_renamed")
        .unwrap();
    assert_eq!(renamed.id, id_of("method_one"));

    let decorated = index.iter_flat().find(|s| s.name == "decorated").unwrap();
    assert_eq!(decorated.id, id_of("decorated"));
    let standalone = index.iter_flat().find(|s| s.name == "standalone").unwrap();
    assert_eq!(standalone.id, id_of("standalone"));
    let class = index.iter_flat().find(|s| s.name == "MyClass").unwrap();
    assert_eq!(class.id, id_of("MyClass"));

    // The class's child list tracks the in-place update.
    assert!(class.children.contains(&renamed.id));
}

#[tokio::test]
async fn out_of_bounds_edit_is_a_noop() {
    let tw = setup_workspace(&[("m.py", MODULE)]).await;
    let url = tw.url_for("m.py");
    let file = tw.workspace.get_file(&url).unwrap();
    file.set_opened(true);

    let text_before = file.text();
    let symbols_before: Vec<String> = {
        let index = tw.workspace.index.read().unwrap();
        index.iter_flat().map(|s| s.full_name.clone()).collect()
    };

    // startLine far beyond the end of the file.
    file.apply_changes(&[change(40, 0, 40, 0, "def bogus(): pass")]);
    tw.workspace.reparse_file(&file);

    assert_eq!(file.text(), text_before);
    let index = tw.workspace.index.read().unwrap();
    let symbols_after: Vec<String> = index.iter_flat().map(|s| s.full_name.clone()).collect();
    assert_eq!(symbols_before, symbols_after);
}

#[tokio::test]
async fn added_definition_appears_after_reparse() {
    let tw = setup_workspace(&[("m.py", "def first(): pass\n")]).await;
    let url = tw.url_for("m.py");
    let file = tw.workspace.get_file(&url).unwrap();
    file.set_opened(true);

    // Append a new function on the empty trailing line.
    file.apply_changes(&[change(1, 0, 1, 0, "def second(): pass\n")]);
    tw.workspace.reparse_file(&file);

    let index = tw.workspace.index.read().unwrap();
    let names: Vec<_> = index
        .iter_flat()
        .filter(|s| s.file == url)
        .map(|s| s.name.as_str())
        .collect();
    assert_eq!(names, vec!["first", "second"]);
}

#[tokio::test]
async fn removed_definition_leaves_the_flat_index() {
    let tw = setup_workspace(&[("m.py", MODULE)]).await;
    let url = tw.url_for("m.py");
    let file = tw.workspace.get_file(&url).unwrap();
    file.set_opened(true);

    let standalone_id = {
        let index = tw.workspace.index.read().unwrap();
        let id = index
            .iter_flat()
            .find(|s| s.name == "standalone")
            .unwrap()
            .id;
        id
    };

    // Delete the standalone function line.
    file.apply_changes(&[change(3, 33, 4, 27, "")]);
    tw.workspace.reparse_file(&file);

    let index = tw.workspace.index.read().unwrap();
    assert!(index.get(&standalone_id).is_none());
    assert_eq!(index.len(), 3);
}

#[tokio::test]
async fn close_keeps_the_record_queryable() {
    let tw = setup_workspace(&[("m.py", MODULE)]).await;
    let url = tw.url_for("m.py");
    let file = tw.workspace.get_file(&url).unwrap();
    file.set_opened(true);
    file.close();

    assert!(!file.is_opened());
    assert!(!file.has_ast());

    // Symbols survive the close.
    let index = tw.workspace.index.read().unwrap();
    assert_eq!(index.file_top_level(&url).len(), 2);
}

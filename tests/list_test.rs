use pretty_assertions::assert_eq;
use wikisplice_lib::{Document, ElementKind, ExtractError, List, SubElement, SubText};

#[test]
fn test_nested_list_scenario() {
    let list = List::new("* a\n** b\n* c\n", "*").unwrap();
    assert_eq!(list.items().unwrap(), vec!["a", "c"]);

    let sublists = list.sublists(0, "*").unwrap();
    assert_eq!(sublists.len(), 1);
    assert_eq!(sublists[0].string().unwrap(), "** b\n");
    assert!(list.sublists(1, "*").unwrap().is_empty());
}

#[test]
fn test_three_levels() {
    let list = List::new("# a\n#* b\n#*: c\n#* d\n# e\n", "#").unwrap();
    assert_eq!(list.items().unwrap(), vec!["a", "e"]);

    let second = list.sublists(0, "*").unwrap();
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].level().unwrap(), 2);
    assert_eq!(second[0].items().unwrap(), vec!["b", "d"]);
    assert_eq!(second[0].fullitems().unwrap(), vec![" b\n#*: c\n", " d\n"]);

    let third = second[0].sublists(0, ":").unwrap();
    assert_eq!(third.len(), 1);
    assert_eq!(third[0].level().unwrap(), 3);
    assert_eq!(third[0].items().unwrap(), vec!["c"]);
}

#[test]
fn test_level_equals_marker_length() {
    for (text, pattern) in [("* x\n", "*"), ("#: x\n", "#:"), ("**; t : d\n", "**;")] {
        let list = List::new(text, pattern).unwrap();
        assert_eq!(list.level().unwrap(), pattern.len());
        assert_eq!(list.items().unwrap().len(), list.fullitems().unwrap().len());
    }
}

#[test]
fn test_definition_list_inside_document() {
    let doc = SubText::new("Intro\n; Term : First meaning\n; Other\n: Separate\n");
    let definitions = doc.lists(";").unwrap();
    assert_eq!(definitions.len(), 1);
    assert_eq!(definitions[0].items().unwrap(), vec!["Term ", "First meaning", "Other"]);

    let all = doc.lists_default().unwrap();
    let patterns: Vec<String> = all.iter().map(|l| l.pattern().unwrap()).collect();
    assert_eq!(patterns, vec![";", ":"]);
}

#[test]
fn test_convert_idempotent() {
    let mut list = List::new("# a\n#* b\n# c", "#").unwrap();
    list.convert("*").unwrap();
    let once = list.string().unwrap();
    list.convert("*").unwrap();
    assert_eq!(list.string().unwrap(), once);
    assert_eq!(once, "* a\n** b\n* c");
}

#[test]
fn test_convert_then_sublists_use_new_marker() {
    let mut list = List::new("* a\n** b\n", "*").unwrap();
    list.convert("#").unwrap();
    assert_eq!(list.string().unwrap(), "# a\n#* b\n");

    let sublists = list.sublists(0, "*").unwrap();
    assert_eq!(sublists.len(), 1);
    assert_eq!(sublists[0].pattern().unwrap(), "#*");
}

#[test]
fn test_lists_skip_templates_and_comments() {
    let doc = SubText::new("{{box|\n* hidden\n}}\n<!-- * also hidden -->\n* shown {{x|\n* inner}}\n");
    let lists = doc.lists("*").unwrap();
    assert_eq!(lists.len(), 1);
    assert_eq!(lists[0].items().unwrap(), vec!["shown {{x|\n* inner}}"]);
}

#[test]
fn test_sibling_edit_keeps_list_usable() {
    let doc = Document::new("<b>x</b>\n* a\n* b\n");
    let root = SubText::from_id(doc.clone(), doc.root());
    let list = root.lists("*").unwrap().remove(0);
    let mut tag = root.tags().unwrap().remove(0);

    tag.set_contents("longer").unwrap();
    assert_eq!(list.string().unwrap(), "* a\n* b\n");
    assert_eq!(list.span().unwrap().start, 14);
    assert_eq!(list.items().unwrap(), vec!["a", "b"]);
}

#[test]
fn test_views_share_the_registered_pattern() {
    let doc = Document::new("* a\n");
    let root = SubText::from_id(doc.clone(), doc.root());
    let mut first = root.lists("*").unwrap().remove(0);
    let second = List::from_id(doc.clone(), first.id());

    first.convert("#").unwrap();
    assert_eq!(second.pattern().unwrap(), "#");
    assert_eq!(second.items().unwrap(), vec!["a"]);
    assert_eq!(doc.count(ElementKind::List), 1);
}

#[test]
fn test_direct_indexing_bounds() {
    let list = List::new("* a\n", "*").unwrap();
    assert_eq!(list.item(0).unwrap(), "a");
    assert!(matches!(list.fullitem(1), Err(ExtractError::InvalidIndex { index: 1, len: 1 })));
    assert!(list.sublists(7, "*").unwrap().is_empty());
}

//! Property-based tests for the tag and list extractors
//!
//! These cover the laws every edit must keep:
//! - attribute writes are observed by the next read
//! - list levels, item counts and marker conversion
//! - edits through one element never disturb the text of another

use proptest::prelude::*;
use wikisplice_lib::{Document, List, SubElement, SubText, Tag};

fn marker_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("*".to_string()),
        Just("#".to_string()),
        Just(":".to_string()),
        Just("*#".to_string()),
        Just("#:".to_string()),
    ]
}

fn items_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-z][a-z0-9]{0,8}", 1..6)
}

fn list_text(marker: &str, items: &[String]) -> String {
    items.iter().map(|item| format!("{marker} {item}\n")).collect()
}

proptest! {
    #[test]
    fn list_items_and_level(marker in marker_strategy(), items in items_strategy()) {
        let list = List::new(list_text(&marker, &items), &marker).unwrap();
        prop_assert_eq!(list.items().unwrap(), items.clone());
        prop_assert_eq!(list.fullitems().unwrap().len(), items.len());
        prop_assert_eq!(list.level().unwrap(), marker.len());
    }

    #[test]
    fn convert_is_idempotent(from in marker_strategy(), to in marker_strategy(), items in items_strategy()) {
        let mut list = List::new(list_text(&from, &items), &from).unwrap();
        list.convert(&to).unwrap();
        let once = list.string().unwrap();
        list.convert(&to).unwrap();
        prop_assert_eq!(list.string().unwrap(), once.clone());
        prop_assert_eq!(once, list_text(&to, &items));
        prop_assert_eq!(list.items().unwrap(), items);
    }

    #[test]
    fn set_then_get(name in "[a-z]{1,6}", value in "[a-zA-Z0-9 ]{0,10}") {
        let mut tag = Tag::new("<t x=1 y='2'>c</t>").unwrap();
        tag.set(&name, &value).unwrap();
        prop_assert_eq!(tag.get(&name).unwrap(), Some(value.clone()));
        prop_assert_eq!(tag.contents().unwrap(), Some("c".to_string()));
    }

    #[test]
    fn delete_then_has(name in "[a-z]{1,6}") {
        let mut tag = Tag::new(format!("<t {name}=1 z=2 {name}>c</t>")).unwrap();
        tag.delete(&name).unwrap();
        prop_assert!(!tag.has(&name).unwrap());
    }

    #[test]
    fn edits_preserve_siblings(inserted in "[a-z ]{0,12}") {
        let doc = Document::new("<a>1</a> * <b>2</b>\n* x\n");
        let root = SubText::from_id(doc.clone(), doc.root());
        let mut tags = root.tags().unwrap();
        let list = root.lists("*").unwrap().remove(0);
        let before = tags[1].span().unwrap();

        tags[0].set_contents(&inserted).unwrap();

        let after = tags[1].span().unwrap();
        prop_assert_eq!(tags[1].string().unwrap(), "<b>2</b>");
        prop_assert_eq!(after.start, before.start + inserted.len() - 1);
        prop_assert_eq!(list.items().unwrap(), vec!["x".to_string()]);
    }
}

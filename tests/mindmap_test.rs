//! Document level scenarios: create, edit, save and reload.

mod common;

use common::{pinned_map, write_temp_map, PROJECT_MAP};
use freeplane_dom::{Mindmap, MindmapError, NewNode, NodeFilter, NodeState};
use tempfile::TempDir;
use test_log::test;

#[test]
fn create_save_reload() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("new.mm");

    let map = pinned_map();
    let mut root = map.rootnode();
    root.set_plaintext("ROOT");
    let child = root
        .add_child(NewNode::new("Child").id("ID_9999999999"))
        .unwrap();
    child.set_details("some details");
    child.add_icon("yes");
    child.set_attribute("owner", "ann");
    map.save(&path).unwrap();

    let reloaded = Mindmap::open(&path).unwrap();
    assert_eq!(reloaded.version().as_str(), "1.3.0");
    let root = reloaded.rootnode();
    assert_eq!(root.plaintext(), "ROOT");
    let children = root.children();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].id(), "ID_9999999999");
    assert_eq!(children[0].details(), "some details");
    assert_eq!(children[0].icons(), vec!["yes"]);
    assert_eq!(children[0].attributes()["owner"], "ann");
    assert!(reloaded.check_parent_map().is_empty());
}

#[test]
fn open_missing_file() {
    let dir = TempDir::new().unwrap();
    let res = Mindmap::open(&dir.path().join("absent.mm"));
    assert!(matches!(res, Err(MindmapError::NotFound(_))));
}

#[test]
fn loaded_map_content() {
    let (_dir, path) = write_temp_map(PROJECT_MAP.as_bytes());
    let map = Mindmap::open(&path).unwrap();
    assert_eq!(map.version().as_str(), "1.9.13");
    assert!(map.check_parent_map().is_empty());

    let root = map.rootnode();
    assert_eq!(root.plaintext(), "Project");
    assert_eq!(root.children().len(), 3);

    let tasks = map.node_by_id("ID_101").unwrap();
    assert_eq!(tasks.comment(), "Write report");

    let report = map.node_by_id("ID_102").unwrap();
    assert_eq!(report.details(), "due friday");
    assert_eq!(report.style(), "Important");
    assert_eq!(report.parent(), Some(tasks.clone()));
    assert_eq!(report.creation_date().unwrap().timestamp_millis(), 1_700_000_000_000);

    let review = map.node_by_id("ID_103").unwrap();
    assert_eq!(review.notes(), "ask bob");
    assert_eq!(report.next(), Some(review.clone()));

    let rich = map.node_by_id("ID_104").unwrap();
    assert_eq!(rich.plaintext(), "Rich heading");
    assert_eq!(report.arrowlinks(), vec![rich.clone()]);
    assert_eq!(rich.arrowlinked(), vec![report.clone()]);

    let formula = map.node_by_id("ID_105").unwrap();
    assert_eq!(formula.corelink(), "ID_101");
    assert_eq!(formula.follow_corelink(), Some(tasks));
    assert_eq!(formula.visibletext(), "Tasks");
    assert_eq!(root.get_indexchain_until(&review), vec![0, 1]);
}

#[test]
fn reload_after_save_keeps_content() {
    let map = Mindmap::from_bytes(PROJECT_MAP.as_bytes()).unwrap();
    let again = Mindmap::from_bytes(&map.to_bytes()).unwrap();
    let texts = |m: &Mindmap| -> Vec<(String, String)> {
        m.find_nodes(&NodeFilter::new())
            .iter()
            .map(|n| (n.id(), n.plaintext()))
            .collect()
    };
    assert_eq!(texts(&map), texts(&again));
    assert_eq!(again.node_by_id("ID_102").unwrap().details(), "due friday");
    // a second pass is stable byte for byte
    assert_eq!(again.to_bytes(), map.to_bytes());
}

#[test]
fn detached_branch_joins_the_map() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("branch.mm");
    let map = pinned_map();

    let mut head = map.create_node(NewNode::new("Ideas").style("styles.topic")).unwrap();
    let mut first = head.add_child("first idea").unwrap();
    first.add_child("detail").unwrap();
    head.add_child("second idea").unwrap();
    assert_eq!(first.state(), NodeState::DetachedInterior);
    assert!(map.find_nodes(&NodeFilter::new().core("idea")).is_empty());

    let mut root = map.rootnode();
    assert!(root.attach(&mut head, None));
    assert!(!root.attach(&mut head, None));
    first.resolve();
    assert_eq!(first.state(), NodeState::Attached);
    assert_eq!(map.find_nodes(&NodeFilter::new().core("idea")).len(), 3);
    assert!(map.check_parent_map().is_empty());

    map.save(&path).unwrap();
    let reloaded = Mindmap::open(&path).unwrap();
    let found = reloaded.find_nodes(&NodeFilter::new().core("detail"));
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].parent().unwrap().plaintext(), "first idea");
    assert_eq!(reloaded.rootnode().get_indexchain_until(&found[0]), vec![0, 0, 0]);
}

#[test]
fn parent_map_stays_consistent() {
    let map = Mindmap::from_bytes(PROJECT_MAP.as_bytes()).unwrap();
    let mut tasks = map.node_by_id("ID_101").unwrap();
    let mut review = map.node_by_id("ID_103").unwrap();

    review.add_child("follow up").unwrap();
    tasks.add_child(NewNode::new("plan").pos(0)).unwrap();
    assert!(map.check_parent_map().is_empty());

    assert!(review.remove());
    assert!(map.check_parent_map().is_empty());
    assert!(map.node_by_id("ID_103").is_none());

    let mut rich = map.node_by_id("ID_104").unwrap();
    assert!(rich.attach(&mut review, Some(0)));
    assert!(map.check_parent_map().is_empty());
    assert_eq!(review.parent(), Some(rich));
    assert_eq!(review.children()[0].plaintext(), "follow up");

    let mut sibling = map.node_by_id("ID_105").unwrap();
    sibling.add_sibling("last").unwrap();
    assert!(map.check_parent_map().is_empty());
    assert_eq!(map.rootnode().children().len(), 4);
}

#[test]
fn style_registry() {
    let map = Mindmap::from_bytes(PROJECT_MAP.as_bytes()).unwrap();
    assert!(map.styles().is_empty());
    assert!(!map.add_style("x", &Default::default()));

    let fresh = pinned_map();
    let settings = freeplane_dom::StyleSettings {
        bgcolor: Some("#ffff00".to_string()),
        fontsize: Some("16".to_string()),
        ..Default::default()
    };
    assert!(fresh.add_style("Highlight", &settings));
    let mut node = fresh.rootnode().add_child("marked").unwrap();
    node.set_style("highlight");

    let reloaded = Mindmap::from_bytes(&fresh.to_bytes()).unwrap();
    assert_eq!(reloaded.styles()["Highlight"], settings);
    let found = reloaded.find_nodes(&NodeFilter::new().style("HIGHLIGHT"));
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].plaintext(), "marked");
}

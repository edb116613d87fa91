use super::{MergePlanner, ProcessingNode};
use bson::bson;

fn exists(path: &str) -> ProcessingNode {
    ProcessingNode::Exists {
        path: path.to_string(),
    }
}

fn unwind(path: &str) -> ProcessingNode {
    ProcessingNode::Unwind {
        path: path.to_string(),
    }
}

#[test]
fn flatten_replaces_existence_filter() {
    let mut planner = MergePlanner::new();
    planner.add_existence_filter("orders");
    planner.add_existence_filter("profile");
    planner.add_array_flatten("orders");
    assert_eq!(
        vec![exists("profile"), unwind("orders")],
        planner.nodes().cloned().collect::<Vec<_>>()
    );
}

#[test]
fn existence_filter_after_flatten_is_a_noop() {
    let mut planner = MergePlanner::new();
    planner.add_array_flatten("orders");
    planner.add_existence_filter("orders");
    assert_eq!(
        vec![unwind("orders")],
        planner.nodes().cloned().collect::<Vec<_>>()
    );
}

#[test]
fn nodes_are_deduplicated_by_document() {
    let mut planner = MergePlanner::new();
    planner.add_array_flatten("orders");
    planner.add_array_flatten("orders.lineitem");
    planner.add_array_flatten("orders");
    planner.add_existence_filter("profile");
    planner.add_existence_filter("profile");
    assert_eq!(
        vec![unwind("orders"), unwind("orders.lineitem"), exists("profile")],
        planner.nodes().cloned().collect::<Vec<_>>()
    );
}

#[test]
fn projection_fragments_share_one_node() {
    let mut planner = MergePlanner::new();
    planner.add_projection_fragment(bson!({"$ifNull": ["$orders", [{}]]}), "__orders");
    planner.add_array_flatten("__orders");
    planner.add_projection_fragment(bson!({"$ifNull": ["$notes", [{}]]}), "__notes");
    let nodes = planner.nodes().cloned().collect::<Vec<_>>();
    assert_eq!(2, nodes.len());
    match &nodes[0] {
        ProcessingNode::Project { fragments } => {
            assert_eq!(
                vec!["__orders", "__notes"],
                fragments.keys().collect::<Vec<_>>()
            );
        }
        other => panic!("expected a projection, found {other:?}"),
    }
    assert_eq!(unwind("__orders"), nodes[1]);
}

//! Bounded normalization of the comment listing.
//!
//! The listing is a tree of `Listing` containers and `t1` comment nodes. The
//! walk is depth-first in source order with one remaining-count budget shared
//! across every branch. Anything malformed is skipped, never reported.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::REDDIT_ORIGIN;

/// A normalized comment with its bounded reply subtree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentNode {
    pub id: Option<String>,
    pub author: Option<String>,
    pub author_fullname: Option<String>,
    pub body: Option<String>,
    pub body_html: Option<String>,
    pub score: Option<i64>,
    pub created_utc: Option<f64>,
    /// Absolute URL.
    pub permalink: Option<String>,
    pub is_submitter: bool,
    pub parent_id: Option<String>,
    #[serde(default)]
    pub replies: Vec<CommentNode>,
}

impl CommentNode {
    fn from_data(data: &serde_json::Map<String, Value>) -> Self {
        let text = |key: &str| data.get(key).and_then(Value::as_str).map(str::to_string);

        Self {
            id: text("id"),
            author: text("author"),
            author_fullname: text("author_fullname"),
            body: text("body"),
            body_html: text("body_html"),
            score: data.get("score").and_then(Value::as_i64),
            created_utc: data.get("created_utc").and_then(Value::as_f64),
            permalink: text("permalink").map(|p| absolute_permalink(&p)),
            is_submitter: data
                .get("is_submitter")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            parent_id: text("parent_id"),
            replies: Vec::new(),
        }
    }

    /// Number of nodes in this subtree, including `self`.
    #[must_use]
    pub fn subtree_len(&self) -> usize {
        1 + self.replies.iter().map(Self::subtree_len).sum::<usize>()
    }
}

fn absolute_permalink(permalink: &str) -> String {
    if permalink.starts_with("http://") || permalink.starts_with("https://") {
        permalink.to_string()
    } else {
        format!("{REDDIT_ORIGIN}{permalink}")
    }
}

/// Normalize a comment listing into at most `max_count` nodes no deeper than
/// `max_depth` (top-level comments are depth 1).
#[must_use]
pub fn normalize(listing: &Value, max_depth: usize, max_count: usize) -> Vec<CommentNode> {
    let mut remaining = max_count;
    let mut out = Vec::new();
    walk(listing, 1, max_depth, &mut remaining, &mut out);
    out
}

fn walk(
    node: &Value,
    depth: usize,
    max_depth: usize,
    remaining: &mut usize,
    out: &mut Vec<CommentNode>,
) {
    if *remaining == 0 || depth > max_depth {
        return;
    }
    let Some(obj) = node.as_object() else {
        return;
    };

    match obj.get("kind").and_then(Value::as_str) {
        Some("Listing") => {
            let children = obj
                .get("data")
                .and_then(|d| d.get("children"))
                .and_then(Value::as_array);
            for child in children.into_iter().flatten() {
                if *remaining == 0 {
                    break;
                }
                walk(child, depth, max_depth, remaining, out);
            }
        }
        Some("t1") => {
            let Some(data) = obj.get("data").and_then(Value::as_object) else {
                return;
            };
            *remaining -= 1;
            let mut comment = CommentNode::from_data(data);
            // `replies` is "" on leaves and a Listing otherwise.
            if let Some(replies) = data.get("replies") {
                walk(replies, depth + 1, max_depth, remaining, &mut comment.replies);
            }
            out.push(comment);
        }
        // "more" stubs and anything else.
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn comment(id: &str, replies: Value) -> Value {
        json!({
            "kind": "t1",
            "data": {
                "id": id,
                "author": "someone",
                "body": format!("body of {id}"),
                "score": 3,
                "permalink": format!("/r/rust/comments/p/t/{id}/"),
                "parent_id": "t3_p",
                "replies": replies,
            }
        })
    }

    fn listing(children: Vec<Value>) -> Value {
        json!({"kind": "Listing", "data": {"children": children}})
    }

    #[test]
    fn test_budget_limits_flat_listing() {
        let root = listing((0..10).map(|i| comment(&format!("c{i}"), json!(""))).collect());
        let nodes = normalize(&root, 2, 4);
        assert_eq!(nodes.len(), 4);
        let ids: Vec<_> = nodes.iter().map(|n| n.id.as_deref().unwrap()).collect();
        assert_eq!(ids, ["c0", "c1", "c2", "c3"]);
    }

    #[test]
    fn test_budget_is_shared_across_branches() {
        let root = listing(vec![
            comment("a", listing(vec![comment("a1", json!("")), comment("a2", json!(""))])),
            comment("b", json!("")),
            comment("c", json!("")),
        ]);
        let nodes = normalize(&root, 5, 4);
        let total: usize = nodes.iter().map(CommentNode::subtree_len).sum();
        assert_eq!(total, 4);
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].replies.len(), 2);
        assert_eq!(nodes[1].id.as_deref(), Some("b"));
    }

    #[test]
    fn test_depth_pruning_does_not_consume_budget() {
        let deep = listing(vec![comment("deep", json!(""))]);
        let root = listing(vec![
            comment("a", listing(vec![comment("a1", deep)])),
            comment("b", json!("")),
        ]);
        let nodes = normalize(&root, 2, 3);
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].replies[0].id.as_deref(), Some("a1"));
        assert!(nodes[0].replies[0].replies.is_empty());
        assert_eq!(nodes[1].id.as_deref(), Some("b"));
    }

    #[test]
    fn test_replies_always_present() {
        let root = listing(vec![comment("x", json!(""))]);
        let nodes = normalize(&root, 2, 10);
        let encoded = serde_json::to_value(&nodes[0]).unwrap();
        assert_eq!(encoded["replies"], json!([]));
    }

    #[test]
    fn test_malformed_nodes_are_skipped() {
        let root = listing(vec![
            json!(null),
            json!("junk"),
            json!({"kind": "more", "data": {"children": ["zz"]}}),
            json!({"kind": "t1"}),
            json!({"kind": "t1", "data": []}),
            comment("ok", json!({"kind": "Listing"})),
        ]);
        let nodes = normalize(&root, 2, 10);
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].id.as_deref(), Some("ok"));
        assert!(nodes[0].replies.is_empty());

        assert!(normalize(&json!([1, 2, 3]), 2, 10).is_empty());
        assert!(normalize(&json!({"kind": "Listing", "data": null}), 2, 10).is_empty());
    }

    #[test]
    fn test_permalink_made_absolute() {
        let root = listing(vec![comment("x", json!(""))]);
        let nodes = normalize(&root, 1, 1);
        assert_eq!(
            nodes[0].permalink.as_deref(),
            Some("https://www.reddit.com/r/rust/comments/p/t/x/")
        );
    }

    #[test]
    fn test_zero_budget_yields_nothing() {
        let root = listing(vec![comment("x", json!(""))]);
        assert!(normalize(&root, 2, 0).is_empty());
    }
}

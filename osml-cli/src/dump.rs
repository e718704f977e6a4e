//! Graph dump formats
//!
//! Three thin views over a parsed graph: an indented tree for the terminal,
//! a JSON rendition for tooling, and a flat event trace that mirrors the
//! order in which the parser built the nodes.

use osml_core::managed::{Manager, Rooted};
use osml_core::variant::Variant;
use serde_json::{json, Map, Value};
use std::fmt::Write;

pub fn tree(roots: &[Rooted], manager: &Manager) -> String {
    let mut out = String::new();
    for root in roots {
        tree_node(&mut out, root, manager, "", true);
    }
    out
}

fn tree_node(out: &mut String, node: &Rooted, manager: &Manager, prefix: &str, last: bool) {
    let branch = if prefix.is_empty() {
        ""
    } else if last {
        "└── "
    } else {
        "├── "
    };
    let _ = write!(out, "{}{}{}", prefix, branch, node.rtti().name());
    let name = node.name();
    if !name.is_empty() {
        let _ = write!(out, " \"{}\"", name);
    }
    let data = node.borrow().data().clone();
    for (key, value) in &data {
        let _ = write!(out, " {}={}", key, variant_text(value));
    }
    out.push('\n');
    let children: Vec<Rooted> = node
        .children()
        .iter()
        .filter_map(|id| manager.rooted(*id))
        .collect();
    let child_prefix = format!("{}{}", prefix, tree_gap(prefix, last));
    for (i, child) in children.iter().enumerate() {
        tree_node(out, child, manager, &child_prefix, i + 1 == children.len());
    }
}

fn tree_gap(prefix: &str, last: bool) -> &'static str {
    if prefix.is_empty() {
        // Children of a root get their first branch glyph, nothing more.
        " "
    } else if last {
        "    "
    } else {
        "│   "
    }
}

/// Compact single-line rendering for tree and event dumps.
fn variant_text(value: &Variant) -> String {
    match value.to_string_value() {
        Ok(text) => text,
        Err(_) => serde_json::to_string(&variant_json(value))
            .unwrap_or_else(|_| "?".to_owned()),
    }
}

pub fn json(roots: &[Rooted], manager: &Manager) -> Value {
    Value::Array(roots.iter().map(|r| json_node(r, manager)).collect())
}

fn json_node(node: &Rooted, manager: &Manager) -> Value {
    let mut data = Map::new();
    for (key, value) in node.borrow().data() {
        data.insert(key.clone(), variant_json(value));
    }
    let children: Vec<Value> = node
        .children()
        .iter()
        .filter_map(|id| manager.rooted(*id))
        .map(|child| json_node(&child, manager))
        .collect();
    json!({
        "type": node.rtti().name(),
        "name": node.name(),
        "data": Value::Object(data),
        "children": children,
    })
}

fn variant_json(value: &Variant) -> Value {
    match value {
        Variant::Null => Value::Null,
        Variant::Bool(b) => json!(b),
        Variant::Int(i) => json!(i),
        Variant::Double(d) => json!(d),
        Variant::String(s) => json!(s),
        Variant::Array(items) => Value::Array(items.iter().map(variant_json).collect()),
        Variant::Map(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), variant_json(v)))
                .collect(),
        ),
        Variant::Cardinality(c) => json!(c.to_string()),
        Variant::Object(handle) => json!({ "node": handle.id() }),
    }
}

pub fn events(roots: &[Rooted], manager: &Manager) -> String {
    let mut out = String::new();
    for root in roots {
        event_node(&mut out, root, manager, 0);
    }
    out
}

fn event_node(out: &mut String, node: &Rooted, manager: &Manager, depth: usize) {
    let indent = "  ".repeat(depth);
    let _ = writeln!(out, "{}start {} \"{}\"", indent, node.rtti().name(), node.name());
    let data = node.borrow().data().clone();
    for (key, value) in &data {
        let _ = writeln!(out, "{}  data {}={}", indent, key, variant_text(value));
    }
    for child in node.children().iter().filter_map(|id| manager.rooted(*id)) {
        event_node(out, &child, manager, depth + 1);
    }
    let _ = writeln!(out, "{}end {}", indent, node.rtti().name());
}

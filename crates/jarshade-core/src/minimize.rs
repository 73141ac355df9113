//! Reachability-based class elimination.
//!
//! Mark-and-sweep over the bundled class graph: an edge A -> B exists when
//! A's symbol table mentions B's declared type. Roots are the retention
//! spec's entry-point matches plus every keep-list match; keep-list entries
//! survive with zero inbound edges because reflective or dynamically-loaded
//! usage is invisible to static reference scanning. Never fails; an empty
//! result just means the archive carries only resources.

use jarshade_schema::name::{ClassName, NamePattern};
use jarshade_schema::profile::RetentionSpec;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// One node of the reference graph: a declared class and the classes it
/// mentions.
#[derive(Debug, Clone)]
pub struct RefNode {
    /// Declared (post-rewrite) class name.
    pub name: ClassName,
    /// Every class name the unit references.
    pub refs: Vec<ClassName>,
}

/// Compute the set of classes to retain.
///
/// Returns exactly the reachable set: entry-point and keep-list matches,
/// plus everything transitively referenced from them through nodes in
/// `nodes`. References to classes outside the node set (host classes, JDK)
/// fall off the graph silently.
pub fn reachable(nodes: &[RefNode], spec: &RetentionSpec) -> BTreeSet<ClassName> {
    let by_name: BTreeMap<&ClassName, &RefNode> =
        nodes.iter().map(|n| (&n.name, n)).collect();

    let mut kept: BTreeSet<ClassName> = BTreeSet::new();
    let mut queue: VecDeque<&ClassName> = VecDeque::new();

    for node in nodes {
        let is_root = NamePattern::any_match(&spec.entry_points, &node.name)
            || NamePattern::any_match(&spec.keep, &node.name);
        if is_root && kept.insert(node.name.clone()) {
            queue.push_back(&node.name);
        }
    }

    while let Some(name) = queue.pop_front() {
        let Some(node) = by_name.get(name) else {
            continue;
        };
        for target in &node.refs {
            if by_name.contains_key(target) && !kept.contains(target) {
                kept.insert(target.clone());
                queue.push_back(target);
            }
        }
    }

    kept
}

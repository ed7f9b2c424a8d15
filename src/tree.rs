// Copyright 2015-2024 The contributors to zone-xfr
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// https://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// https://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The owner-name-indexed zone tree (C2).
//!
//! Modeled as an ordered map keyed by [`LookupKey`] instead of the original
//! C implementation's trie with explicit circular `prev` pointers (see
//! `DESIGN.md`, Open Question 3): `BTreeMap::range` gives predecessor
//! lookups directly from the map's own ordering, so no separate pointer
//! maintenance is needed on insert/remove.

use std::collections::BTreeMap;

use bitflags::bitflags;

use crate::error::XfrResult;
use crate::name::{LookupKey, Name};
use crate::rr::{RecordSet, RecordType};

bitflags! {
    /// Per-node flags (spec §3 "small flag set").
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct NodeFlags: u8 {
        /// Set on a node when it has at least one wildcard child.
        const HAS_WILDCARD_CHILD = 0b0000_0001;
    }
}

/// A single zone tree node: the RRSets sharing one owner name, plus the
/// bookkeeping the tree needs for predecessor lookup and empty-node
/// pruning.
#[derive(Clone, Debug)]
pub struct ZoneNode {
    owner: Name,
    rrsets: Vec<RecordSet>,
    parent: Option<LookupKey>,
    children: usize,
    flags: NodeFlags,
}

impl ZoneNode {
    /// Creates a new, empty node for the given owner.
    pub fn new(owner: Name) -> Self {
        Self {
            owner,
            rrsets: Vec::new(),
            parent: None,
            children: 0,
            flags: NodeFlags::empty(),
        }
    }

    /// The node's owner name.
    pub fn owner(&self) -> &Name {
        &self.owner
    }

    /// All RRSets at this node, in insertion order (the order the differ
    /// and the IXFR-out responder observe, per spec §4.3/§4.4).
    pub fn rrsets(&self) -> &[RecordSet] {
        &self.rrsets
    }

    /// Looks up the RRSet of the given type at this node.
    pub fn rrset(&self, record_type: RecordType) -> Option<&RecordSet> {
        self.rrsets.iter().find(|r| r.record_type() == record_type)
    }

    /// Mutable lookup of the RRSet of the given type at this node.
    pub fn rrset_mut(&mut self, record_type: RecordType) -> Option<&mut RecordSet> {
        self.rrsets.iter_mut().find(|r| r.record_type() == record_type)
    }

    /// Inserts or replaces the RRSet of the given type, preserving the
    /// insertion-order position of an existing RRSet of that type.
    pub fn put_rrset(&mut self, rrset: RecordSet) {
        if let Some(existing) = self
            .rrsets
            .iter_mut()
            .find(|r| r.record_type() == rrset.record_type())
        {
            *existing = rrset;
        } else {
            self.rrsets.push(rrset);
        }
    }

    /// The number of non-empty RRSets at this node. An "empty non-terminal"
    /// node (spec §3) has zero here but `children() > 0`.
    pub fn rrset_count(&self) -> usize {
        self.rrsets.iter().filter(|r| !r.is_empty()).count()
    }

    /// The number of direct children this node has in the tree.
    pub fn children(&self) -> usize {
        self.children
    }

    /// True if this node has no RRSets but has children (spec §3 "empty
    /// non-terminal").
    pub fn is_empty_non_terminal(&self) -> bool {
        self.rrset_count() == 0 && self.children > 0
    }

    /// This node's flags.
    pub fn flags(&self) -> NodeFlags {
        self.flags
    }

    /// This node's parent key, if any (the root/apex has none recorded
    /// once it is the tree's topmost stored node).
    pub fn parent_key(&self) -> Option<&LookupKey> {
        self.parent.as_ref()
    }
}

/// Result of a [`ZoneTree::predecessor_or_equal`] query.
pub struct PredecessorOrEqual<'a> {
    /// The exact-match node, if the queried key was present.
    pub found: Option<&'a ZoneNode>,
    /// The in-order predecessor, wrapping to the rightmost node when the
    /// queried key precedes every stored key (spec §4.1).
    pub previous: &'a ZoneNode,
}

/// An ordered, owner-name-indexed container of zone nodes (C2).
#[derive(Clone, Debug, Default)]
pub struct ZoneTree {
    nodes: BTreeMap<LookupKey, ZoneNode>,
}

impl ZoneTree {
    /// Creates an empty zone tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of nodes in the tree.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True if the tree has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Inserts a node, replacing any existing node with the same owner.
    ///
    /// On a genuinely new insert (not a replace), the new node's parent
    /// (if already present in the tree) has its child count and wildcard
    /// flag updated.
    pub fn insert(&mut self, mut node: ZoneNode) {
        let key = node.owner.lookup_key();
        let is_new = !self.nodes.contains_key(&key);

        if is_new {
            if let Some(parent_name) = node.owner.parent() {
                let parent_key = parent_name.lookup_key();
                if let Some(parent) = self.nodes.get_mut(&parent_key) {
                    parent.children += 1;
                    if node.owner.is_wildcard() {
                        parent.flags.insert(NodeFlags::HAS_WILDCARD_CHILD);
                    }
                }
                node.parent = Some(parent_key);
            }
        }

        self.nodes.insert(key, node);
    }

    /// Exact lookup by owner name.
    pub fn get(&self, owner: &Name) -> Option<&ZoneNode> {
        self.nodes.get(&owner.lookup_key())
    }

    /// Mutable exact lookup by owner name.
    pub fn get_mut(&mut self, owner: &Name) -> Option<&mut ZoneNode> {
        self.nodes.get_mut(&owner.lookup_key())
    }

    /// Removes and returns the node at `owner`, if present.
    pub fn remove(&mut self, owner: &Name) -> Option<ZoneNode> {
        self.nodes.remove(&owner.lookup_key())
    }

    /// Returns the in-order predecessor of `key`, wrapping to the rightmost
    /// node if `key` is less than or equal to the leftmost stored key.
    /// Panics if the tree is empty; callers must check `is_empty()` first.
    fn previous_of(&self, key: &LookupKey) -> &ZoneNode {
        self.nodes
            .range(..key.clone())
            .next_back()
            .map(|(_, node)| node)
            .unwrap_or_else(|| self.nodes.values().next_back().expect("tree is non-empty"))
    }

    /// Finds the node at `owner`, or its in-order predecessor (spec §4.1).
    ///
    /// Returns `None` if the tree is empty ("no-node").
    pub fn predecessor_or_equal(&self, owner: &Name) -> Option<PredecessorOrEqual<'_>> {
        if self.nodes.is_empty() {
            return None;
        }
        let key = owner.lookup_key();
        if let Some(found) = self.nodes.get(&key) {
            Some(PredecessorOrEqual {
                found: Some(found),
                previous: self.previous_of(&key),
            })
        } else {
            Some(PredecessorOrEqual {
                found: None,
                previous: self.previous_of(&key),
            })
        }
    }

    /// In-order traversal, invoking `f` on every node. `f` may not
    /// structurally mutate the tree (it receives shared references).
    pub fn apply<F: FnMut(&ZoneNode)>(&self, mut f: F) {
        for node in self.nodes.values() {
            f(node);
        }
    }

    /// In-order iterator over the tree's nodes.
    pub fn iter(&self) -> impl Iterator<Item = &ZoneNode> {
        self.nodes.values()
    }

    /// Deletes `owner` if it is empty (no RRSets, no children), cascading
    /// up the ancestor chain: the parent's child count is decremented, its
    /// wildcard flag cleared if appropriate, and the parent is recursively
    /// considered for deletion too — stopping at (and never deleting)
    /// `apex`.
    ///
    /// Idempotent: calling this twice on the same owner is a no-op the
    /// second time (spec invariant 4). A no-op is not an error: this
    /// returns `Ok(())` whether or not anything was actually deleted.
    pub fn delete_empty_node(&mut self, owner: &Name, apex: &Name) -> XfrResult<()> {
        if owner == apex {
            // The apex is never pruned, matching the C source's recursion
            // guard ("Is not apex").
            return Ok(());
        }

        let key = owner.lookup_key();
        let should_delete = match self.nodes.get(&key) {
            Some(node) => node.rrset_count() == 0 && node.children == 0,
            None => return Ok(()),
        };
        if !should_delete {
            return Ok(());
        }

        // Mirrors the C source: if the parent isn't actually present in the
        // tree (e.g. a standalone node with no materialized ancestor), the
        // cascade is simply skipped rather than treated as an error — the
        // node itself is still removed below.
        if let Some(parent_name) = owner.parent() {
            let parent_key = parent_name.lookup_key();
            if let Some(parent) = self.nodes.get_mut(&parent_key) {
                parent.children = parent.children.saturating_sub(1);
                if owner.is_wildcard() {
                    parent.flags.remove(NodeFlags::HAS_WILDCARD_CHILD);
                }

                if parent_name != *apex {
                    self.delete_empty_node(&parent_name, apex)?;
                }
            }
        }

        self.nodes.remove(&key);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn node(owner: &str) -> ZoneNode {
        ZoneNode::new(Name::parse(owner))
    }

    fn build_sample_tree() -> ZoneTree {
        let mut tree = ZoneTree::new();
        tree.insert(node("example.com."));
        tree.insert(node("b.example.com."));
        tree.insert(node("c.example.com."));
        tree.insert(node("d.example.com."));
        tree
    }

    #[test]
    fn exact_get() {
        let tree = build_sample_tree();
        assert!(tree.get(&Name::parse("c.example.com.")).is_some());
        assert!(tree.get(&Name::parse("zzz.example.com.")).is_none());
    }

    #[test]
    fn predecessor_wrap_around() {
        // Scenario F: b, c, d stored; query a. wraps to d.
        let mut tree = ZoneTree::new();
        tree.insert(node("b."));
        tree.insert(node("c."));
        tree.insert(node("d."));

        let result = tree.predecessor_or_equal(&Name::parse("a.")).unwrap();
        assert!(result.found.is_none());
        assert_eq!(result.previous.owner(), &Name::parse("d."));
    }

    #[test]
    fn predecessor_exact_match() {
        let mut tree = ZoneTree::new();
        tree.insert(node("a."));
        tree.insert(node("b."));
        tree.insert(node("c."));

        let result = tree.predecessor_or_equal(&Name::parse("b.")).unwrap();
        assert_eq!(result.found.unwrap().owner(), &Name::parse("b."));
        assert_eq!(result.previous.owner(), &Name::parse("a."));
    }

    #[test]
    fn predecessor_exact_match_on_leftmost_wraps() {
        let mut tree = ZoneTree::new();
        tree.insert(node("a."));
        tree.insert(node("b."));
        tree.insert(node("c."));

        let result = tree.predecessor_or_equal(&Name::parse("a.")).unwrap();
        assert_eq!(result.found.unwrap().owner(), &Name::parse("a."));
        assert_eq!(result.previous.owner(), &Name::parse("c."));
    }

    #[test]
    fn predecessor_on_empty_tree_is_no_node() {
        let tree = ZoneTree::new();
        assert!(tree.predecessor_or_equal(&Name::parse("a.")).is_none());
    }

    #[test]
    fn in_order_traversal() {
        let tree = build_sample_tree();
        let owners: Vec<String> = {
            let mut out = Vec::new();
            tree.apply(|n| out.push(n.owner().to_string()));
            out
        };
        let mut sorted = owners.clone();
        sorted.sort();
        assert_eq!(owners, sorted);
    }

    #[test]
    fn delete_empty_node_cascades_to_parent() {
        let apex = Name::parse("example.com.");
        let mut tree = ZoneTree::new();
        tree.insert(ZoneNode::new(apex.clone()));
        tree.insert(node("child.example.com."));
        tree.insert(node("grandchild.child.example.com."));

        assert_eq!(tree.get(&Name::parse("child.example.com.")).unwrap().children(), 1);

        tree.delete_empty_node(&Name::parse("grandchild.child.example.com."), &apex)
            .unwrap();

        // grandchild gone, and since child is now empty (no rrsets, no children)
        // it should have cascaded away too, but the apex must survive.
        assert!(tree.get(&Name::parse("grandchild.child.example.com.")).is_none());
        assert!(tree.get(&Name::parse("child.example.com.")).is_none());
        assert!(tree.get(&apex).is_some());
    }

    #[test]
    fn delete_empty_node_is_idempotent() {
        let apex = Name::parse("example.com.");
        let mut tree = ZoneTree::new();
        tree.insert(ZoneNode::new(apex.clone()));
        tree.insert(node("child.example.com."));

        tree.delete_empty_node(&Name::parse("child.example.com."), &apex)
            .unwrap();
        let snapshot_len = tree.len();

        // Second call on the now-absent node must be a safe no-op.
        tree.delete_empty_node(&Name::parse("child.example.com."), &apex)
            .unwrap();
        assert_eq!(tree.len(), snapshot_len);
    }

    #[test]
    fn delete_empty_node_never_removes_apex() {
        let apex = Name::parse("example.com.");
        let mut tree = ZoneTree::new();
        tree.insert(ZoneNode::new(apex.clone()));

        tree.delete_empty_node(&apex, &apex).unwrap();
        assert!(tree.get(&apex).is_some());
    }

    #[test]
    fn delete_empty_node_clears_wildcard_flag() {
        let apex = Name::parse("example.com.");
        let mut tree = ZoneTree::new();
        tree.insert(ZoneNode::new(apex.clone()));
        tree.insert(node("*.example.com."));

        assert!(tree
            .get(&apex)
            .unwrap()
            .flags()
            .contains(NodeFlags::HAS_WILDCARD_CHILD));

        tree.delete_empty_node(&Name::parse("*.example.com."), &apex)
            .unwrap();

        assert!(!tree
            .get(&apex)
            .unwrap()
            .flags()
            .contains(NodeFlags::HAS_WILDCARD_CHILD));
    }

    #[test]
    fn delete_leaves_non_empty_node_untouched() {
        let apex = Name::parse("example.com.");
        let mut tree = ZoneTree::new();
        tree.insert(ZoneNode::new(apex.clone()));
        let mut child = node("child.example.com.");
        child.put_rrset(RecordSet::new(
            Name::parse("child.example.com."),
            crate::rr::NS,
        ));
        // An RRSet with zero records is still "legal in transit" but should
        // not make rrset_count() report non-zero; insert an actual record
        // via the public differ/ixfr paths is covered elsewhere. Here we
        // simply assert a node with children is untouched.
        tree.insert(child);
        tree.insert(node("grandchild.child.example.com."));

        tree.delete_empty_node(&Name::parse("child.example.com."), &apex)
            .unwrap();
        // child still has a child of its own (grandchild), so it survives.
        assert!(tree.get(&Name::parse("child.example.com.")).is_some());
    }
}

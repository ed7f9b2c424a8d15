// Copyright 2015-2024 The contributors to zone-xfr
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// https://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// https://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Domain names and their zone-tree "lookup form" key.

use std::fmt;

/// A domain name: an ordered sequence of labels, root-terminated.
///
/// Labels are stored lowercased (DNS name comparison is case-insensitive)
/// in their wire order (`www`, `example`, `com` for `www.example.com.`).
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Name {
    labels: Vec<Vec<u8>>,
}

impl Name {
    /// The DNS root name.
    pub fn root() -> Self {
        Self { labels: Vec::new() }
    }

    /// Parses a presentation-format name such as `"www.example.com."`.
    ///
    /// A trailing dot is optional; the empty string and a lone `"."` both
    /// parse to the root name.
    pub fn parse(text: &str) -> Self {
        let trimmed = text.strip_suffix('.').unwrap_or(text);
        if trimmed.is_empty() {
            return Self::root();
        }
        let labels = trimmed
            .split('.')
            .map(|label| label.as_bytes().to_ascii_lowercase())
            .collect();
        Self { labels }
    }

    /// Returns the labels, outermost (leftmost) first.
    pub fn labels(&self) -> &[Vec<u8>] {
        &self.labels
    }

    /// Returns true if `self` is the root name.
    pub fn is_root(&self) -> bool {
        self.labels.is_empty()
    }

    /// Returns true if `self` is equal to, or a proper subdomain of, `other`.
    pub fn is_subdomain_of_or_equal(&self, other: &Self) -> bool {
        if other.labels.len() > self.labels.len() {
            return false;
        }
        let offset = self.labels.len() - other.labels.len();
        self.labels[offset..] == other.labels[..]
    }

    /// Returns true if the leftmost label is the wildcard label `*`.
    pub fn is_wildcard(&self) -> bool {
        matches!(self.labels.first(), Some(label) if label == b"*")
    }

    /// Returns the immediate parent name, or `None` if `self` is the root.
    pub fn parent(&self) -> Option<Self> {
        if self.labels.is_empty() {
            None
        } else {
            Some(Self {
                labels: self.labels[1..].to_vec(),
            })
        }
    }

    /// Computes the "lookup form" key used to order and index this name in
    /// a [`crate::tree::ZoneTree`].
    ///
    /// The key is the label sequence reversed (root-to-leaf order becomes
    /// leaf-to-root... inverted: outermost label last) with each label
    /// prefixed by its length, and an explicit terminator byte `0x00` — one
    /// lower than any valid label-length byte — separating the key from
    /// nothing after the final (root-adjacent) label. This gives
    /// lexicographic byte-order over keys that matches "siblings share a
    /// common prefix": `a.example.com.` and `b.example.com.` share the
    /// prefix for `example.com.` once reversed.
    pub fn lookup_key(&self) -> LookupKey {
        let mut bytes = Vec::with_capacity(self.labels.iter().map(|l| l.len() + 1).sum());
        for label in self.labels.iter().rev() {
            // Length-prefix so a short label can never be a byte-wise
            // prefix of a longer sibling label (e.g. "ab" vs "abc").
            bytes.push(label.len() as u8);
            bytes.extend_from_slice(label);
        }
        LookupKey(bytes)
    }

    /// Prepends a label, producing `label.self`.
    pub fn prepend_label(&self, label: &[u8]) -> Self {
        let mut labels = Vec::with_capacity(self.labels.len() + 1);
        labels.push(label.to_ascii_lowercase());
        labels.extend(self.labels.iter().cloned());
        Self { labels }
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.labels.is_empty() {
            return write!(f, ".");
        }
        for label in &self.labels {
            write!(f, "{}.", String::from_utf8_lossy(label))?;
        }
        Ok(())
    }
}

/// The byte-comparable lookup-form key for a [`Name`], used as the sort key
/// in a [`crate::tree::ZoneTree`].
///
/// Ordering this type via its natural `Ord` (byte-lexicographic) is what
/// gives the zone tree its canonical traversal order.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LookupKey(Vec<u8>);

impl LookupKey {
    /// Borrows the raw key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

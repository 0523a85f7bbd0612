//! Parent/child relationships across decoded nodes.
//!
//! The decoder checks nothing beyond the type tag, so this is where an inconsistent tree shows up:
//! several roots, parents which were never decoded, reused sequence numbers.
//! Findings are reported, not acted on.

use std::collections::HashMap;

use crate::node::{NodeRecord, ParentRef, SeqNumber};

#[derive(Clone, Default)]
pub struct TreeIndex {
    /// Position (block index) of the first record with each seq number.
    positions: HashMap<SeqNumber, usize, ahash::RandomState>,
    /// Children by parent, in walk order.
    children: im_rc::OrdMap<SeqNumber, im_rc::Vector<SeqNumber>>,
    roots: Vec<SeqNumber>,
    duplicates: Vec<SeqNumber>,
}

impl TreeIndex {
    pub fn new<'a>(records: impl IntoIterator<Item = &'a NodeRecord>) -> Self {
        let mut index = TreeIndex::default();
        for (position, record) in records.into_iter().enumerate() {
            index.insert(position, record);
        }
        index
    }

    fn insert(&mut self, position: usize, record: &NodeRecord) {
        let seq = record.seq_number;
        if self.positions.contains_key(&seq) {
            self.duplicates.push(seq);
        } else {
            self.positions.insert(seq, position);
        }
        match record.parent {
            ParentRef::Root => self.roots.push(seq),
            ParentRef::ChildOf(parent) => {
                self.children
                    .entry(parent)
                    .or_insert_with(im_rc::Vector::new)
                    .push_back(seq);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Block index of the node with sequence number `seq`.
    pub fn position(&self, seq: SeqNumber) -> Option<usize> {
        self.positions.get(&seq).copied()
    }

    pub fn roots(&self) -> &[SeqNumber] {
        &self.roots
    }

    /// The root, if there is exactly one.
    pub fn root(&self) -> Option<SeqNumber> {
        match self.roots.as_slice() {
            [root] => Some(*root),
            _ => None,
        }
    }

    pub fn children_of(&self, seq: SeqNumber) -> impl Iterator<Item = SeqNumber> + '_ {
        self.children.get(&seq).into_iter().flatten().copied()
    }

    /// Seq numbers used by more than one block, once per extra use.
    pub fn duplicates(&self) -> &[SeqNumber] {
        &self.duplicates
    }

    /// Nodes whose parent was not decoded, with that parent.
    pub fn orphans(&self) -> impl Iterator<Item = (SeqNumber, SeqNumber)> + '_ {
        self.children.iter().flat_map(move |(parent, children)| {
            let parent = *parent;
            let known = self.positions.contains_key(&parent);
            children
                .iter()
                .filter(move |_| !known)
                .map(move |child| (*child, parent))
        })
    }

    /// Logs everything which does not look like a single consistent tree rooted at `root_seq`.
    /// Returns whether anything was found.
    pub fn report(&self, root_seq: SeqNumber) -> bool {
        let mut found = false;
        match self.roots.as_slice() {
            [] if !self.is_empty() => {
                log::warn!("no root node");
                found = true;
            }
            [] => {}
            [root] if *root != root_seq => {
                log::warn!("root node is {} but the header says {}", root, root_seq);
                found = true;
            }
            [_] => {}
            roots => {
                log::warn!("{} root nodes: {:?}", roots.len(), roots);
                found = true;
            }
        }
        for seq in &self.duplicates {
            log::warn!("seq number {} used by more than one node", seq);
            found = true;
        }
        for (child, parent) in self.orphans() {
            log::warn!("node {} has parent {} which is not in the file", child, parent);
            found = true;
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture;

    #[test]
    fn two_nodes() {
        let records = fixture::two_node_tree();
        let index = TreeIndex::new(&records);
        assert_eq!(index.len(), 2);
        assert_eq!(index.root(), Some(SeqNumber(0)));
        assert_eq!(index.position(SeqNumber(1)), Some(1));
        assert_eq!(
            index.children_of(SeqNumber(0)).collect::<Vec<_>>(),
            [SeqNumber(1)]
        );
        assert_eq!(index.children_of(SeqNumber(1)).count(), 0);
        assert_eq!(index.orphans().count(), 0);
        assert!(!index.report(SeqNumber(0)));
        assert!(index.report(SeqNumber(1)));
    }

    #[test]
    fn random_tree_is_consistent() {
        let mut rng = rand::thread_rng();
        let records = fixture::random_tree(&mut rng, 200, 3, 0);
        let index = TreeIndex::new(&records);
        assert_eq!(index.roots(), [SeqNumber(0)]);
        assert!(index.duplicates().is_empty());
        assert_eq!(index.orphans().count(), 0);
        for r in &records {
            let listed: Vec<_> = index.children_of(r.seq_number).collect();
            let stored: Vec<_> = r.children.iter().map(|c| c.seq_number).collect();
            assert_eq!(listed, stored);
        }
    }

    #[test]
    fn inconsistencies() {
        let mut records = fixture::two_node_tree();
        let mut extra = records[1].clone();
        extra.parent = ParentRef::ChildOf(SeqNumber(40));
        records.push(extra.clone());
        extra.seq_number = SeqNumber(8);
        extra.parent = ParentRef::Root;
        records.push(extra);

        let index = TreeIndex::new(&records);
        assert_eq!(index.roots(), [SeqNumber(0), SeqNumber(8)]);
        assert_eq!(index.root(), None);
        assert_eq!(index.duplicates(), [SeqNumber(1)]);
        assert_eq!(
            index.orphans().collect::<Vec<_>>(),
            [(SeqNumber(1), SeqNumber(40))]
        );
        assert!(index.report(SeqNumber(0)));
    }
}

//! Identity and wrapper cache.
//!
//! One record per reached node, keyed by [`NodeId`]. A record keeps every
//! path the node was reached at, the most recent one (the primary path), a
//! weak handle to its canonical wrapper and a lazily filled snapshot of its
//! own property descriptors. Records hold the node weakly and are pruned
//! once it is gone, so the cache never extends a value's lifetime.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use on_change_path::{Key, Path};
use tracing::trace;

use crate::observe::ObservedInner;
use crate::value::{Descriptor, Node, NodeId, WeakNode};

const INITIAL_PRUNE_AT: usize = 64;

struct Record {
    node: WeakNode,
    path: Path,
    paths: Vec<Path>,
    wrapper: Weak<ObservedInner>,
    descriptors: HashMap<Key, Option<Descriptor>>,
}

impl Record {
    fn new(node: &Node, path: Path) -> Self {
        Self {
            node: node.downgrade(),
            paths: vec![path.clone()],
            path,
            wrapper: Weak::new(),
            descriptors: HashMap::new(),
        }
    }

    fn holds(&self, node: &Node) -> bool {
        self.node.upgrade().is_some_and(|held| held.ptr_eq(node))
    }
}

pub(crate) struct Cache {
    records: HashMap<NodeId, Record>,
    unsubscribed: bool,
    prune_at: usize,
}

impl Cache {
    pub fn new() -> Self {
        Self {
            records: HashMap::new(),
            unsubscribed: false,
            prune_at: INITIAL_PRUNE_AT,
        }
    }

    pub fn is_unsubscribed(&self) -> bool {
        self.unsubscribed
    }

    /// Records `path` for `node` and returns its canonical wrapper, creating
    /// one with `make` if none is alive. Returns `None` once unsubscribed.
    pub fn get_proxy(
        &mut self,
        node: &Node,
        path: Path,
        make: impl FnOnce() -> Rc<ObservedInner>,
    ) -> Option<Rc<ObservedInner>> {
        if self.unsubscribed {
            return None;
        }
        self.prune();
        let record = match self.records.entry(node.id()) {
            Entry::Occupied(entry) if entry.get().holds(node) => {
                let record = entry.into_mut();
                if !record.paths.contains(&path) {
                    record.paths.push(path.clone());
                }
                record.path = path;
                record
            }
            Entry::Occupied(mut entry) => {
                entry.insert(Record::new(node, path));
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(Record::new(node, path)),
        };
        if let Some(wrapper) = record.wrapper.upgrade() {
            return Some(wrapper);
        }
        let wrapper = make();
        trace!(path = %record.path, "wrapper created");
        record.wrapper = Rc::downgrade(&wrapper);
        Some(wrapper)
    }

    fn record(&self, node: &Node) -> Option<&Record> {
        if self.unsubscribed {
            return None;
        }
        self.records
            .get(&node.id())
            .filter(|record| record.holds(node))
    }

    fn record_mut(&mut self, node: &Node) -> Option<&mut Record> {
        if self.unsubscribed {
            return None;
        }
        self.records
            .get_mut(&node.id())
            .filter(|record| record.holds(node))
    }

    /// The primary path, or `None` if the node was never reached or the
    /// cache is torn down.
    pub fn path(&self, node: &Node) -> Option<Path> {
        self.record(node).map(|record| record.path.clone())
    }

    pub fn all_paths(&self, node: &Node) -> Vec<Path> {
        self.record(node)
            .map(|record| record.paths.clone())
            .unwrap_or_default()
    }

    /// The paths to report a change of `node` at.
    ///
    /// A node known at a single path reports there. An aliased node reports
    /// at every recorded path that still leads to it from `root`, or at its
    /// primary path when none does. Paths found dead are forgotten.
    pub fn notify_paths(&mut self, node: &Node, root: &Node) -> Vec<Path> {
        let Some(record) = self.record_mut(node) else {
            return Vec::new();
        };
        if record.paths.len() <= 1 {
            return vec![record.path.clone()];
        }
        let live: Vec<Path> = record
            .paths
            .iter()
            .filter(|path| leads_to(root, path, node))
            .cloned()
            .collect();
        let Some(latest) = live.last() else {
            return vec![record.path.clone()];
        };
        if !live.contains(&record.path) {
            record.path = latest.clone();
        }
        record.paths.clone_from(&live);
        live
    }

    /// True if following the primary path from `root` no longer reaches
    /// `node`. Unknown nodes are not detached.
    pub fn is_detached(&self, node: &Node, root: &Node) -> bool {
        if node.ptr_eq(root) {
            return false;
        }
        match self.record(node) {
            Some(record) => !leads_to(root, &record.path, node),
            None => false,
        }
    }

    /// Drops recorded paths that no longer lead to `node`, keeping at least
    /// the primary one.
    pub fn retain_paths(&mut self, node: &Node, root: &Node) {
        let Some(record) = self.record_mut(node) else {
            return;
        };
        let primary = record.path.clone();
        record
            .paths
            .retain(|path| *path == primary || leads_to(root, path, node));
        if !leads_to(root, &primary, node) {
            if let Some(live) = record.paths.iter().find(|path| **path != primary).cloned() {
                record.paths.retain(|path| *path != primary);
                record.path = live;
            }
        }
    }

    fn descriptor(&mut self, node: &Node, key: &Key) -> Option<Descriptor> {
        match self.record_mut(node) {
            Some(record) => record
                .descriptors
                .entry(key.clone())
                .or_insert_with(|| node.own_descriptor(key))
                .clone(),
            None => node.own_descriptor(key),
        }
    }

    /// True for properties that must be read back unwrapped: they exist
    /// and are neither configurable nor writable.
    pub fn is_get_invariant(&mut self, node: &Node, key: &Key) -> bool {
        self.descriptor(node, key)
            .is_some_and(|descriptor| !descriptor.configurable && !descriptor.is_writable())
    }

    pub fn is_same_descriptor(&mut self, node: &Node, key: &Key, descriptor: &Descriptor) -> bool {
        let proposed = descriptor.clone().with_raw_value();
        self.descriptor(node, key)
            .is_some_and(|current| current.same_as(&proposed))
    }

    pub fn forget_descriptor(&mut self, node: &Node, key: &Key) {
        if let Some(record) = self.record_mut(node) {
            record.descriptors.remove(key);
        }
    }

    pub fn forget_descriptors(&mut self, node: &Node) {
        if let Some(record) = self.record_mut(node) {
            record.descriptors.clear();
        }
    }

    /// Clears every record. Terminal.
    pub fn unsubscribe(&mut self) {
        self.records.clear();
        self.unsubscribed = true;
    }

    fn prune(&mut self) {
        if self.records.len() < self.prune_at {
            return;
        }
        self.records.retain(|_, record| record.node.is_alive());
        self.prune_at = (self.records.len() * 2).max(INITIAL_PRUNE_AT);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.records.len()
    }
}

fn leads_to(root: &Node, path: &Path, node: &Node) -> bool {
    root.resolve_plain(path)
        .is_some_and(|found| found.ptr_eq(node))
}

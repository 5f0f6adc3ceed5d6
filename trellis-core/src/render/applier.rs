//! Render Applier
//!
//! Turns render infos into operations on an [`OutputBackend`].
//!
//! # Order
//!
//! Infos are applied in the order pairing produced them. Creations and moves
//! only *queue* their output nodes; once the whole batch is through, the
//! queue is sorted into reverse tree order, every queued node that is
//! attached somewhere is detached, and then each is inserted before its next
//! real sibling. Going backwards means the reference sibling is always in
//! place already.
//!
//! # Snapshots
//!
//! Prop updates diff against the props this applier last wrote to the node,
//! never against the live node. Only REFRESH (and reassimilation) reads the
//! live props back.

use std::collections::{HashMap, HashSet};

use tracing::{trace, trace_span, warn};

use super::info::{ApplyReport, RenderFlags, RenderInfo};
use super::output::{OutputBackend, RealNode};
use crate::settings::DuplicatePolicy;
use crate::tree::{NodeId, NodeKind, Tree};
use crate::value::{CompareDepth, Props};

/// Applies render infos to one output container.
pub struct Applier<B> {
    pub(crate) backend: B,
    pub(crate) container: RealNode,
    pub(super) paused: bool,
    /// Removals that arrived while paused.
    pub(super) retained: Vec<RenderInfo>,
    duplicates: DuplicatePolicy,
    dom_compare: CompareDepth,
    /// Tree node currently showing each external output node.
    owners: HashMap<RealNode, NodeId>,
    log: Option<Vec<RenderInfo>>,
}

impl<B: OutputBackend> Applier<B> {
    pub fn new(backend: B, container: RealNode, duplicates: DuplicatePolicy, dom_compare: CompareDepth) -> Self {
        Self {
            backend,
            container,
            paused: false,
            retained: Vec::new(),
            duplicates,
            dom_compare,
            owners: HashMap::new(),
            log: None,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn container(&self) -> RealNode {
        self.container
    }

    pub(crate) fn set_container(&mut self, container: RealNode) {
        self.container = container;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Stop touching the output. Removals are remembered for [`Applier::resume`].
    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Start or stop recording every applied render info.
    pub fn record(&mut self, on: bool) {
        self.log = on.then(Vec::new);
    }

    pub fn take_log(&mut self) -> Vec<RenderInfo> {
        self.log.as_mut().map(std::mem::take).unwrap_or_default()
    }

    /// Apply one batch of render infos.
    pub fn apply(&mut self, tree: &mut Tree, infos: Vec<RenderInfo>) -> ApplyReport {
        let _span = trace_span!("apply", infos = infos.len()).entered();
        if let Some(log) = &mut self.log {
            log.extend(infos.iter().copied());
        }
        let mut report = ApplyReport::default();
        if self.paused {
            self.retained.extend(infos.into_iter().filter(|i| i.is(RenderFlags::REMOVE)));
            return report;
        }

        let mut queue = Vec::new();
        for info in infos {
            if info.is(RenderFlags::REMOVE) {
                self.remove(tree, info, &mut report);
                continue;
            }
            // Unmounted later in the same batch.
            if !tree.is_live(info.node) {
                continue;
            }
            if info.is(RenderFlags::CREATE) && self.create(tree, info.node) {
                queue.push(info.node);
                report.created += 1;
            }
            if info.is(RenderFlags::SWAP) {
                self.swap(tree, info.node);
            }
            if info.is(RenderFlags::CONTENT) {
                self.write_content(tree, info.node);
            }
            if info.is(RenderFlags::UPDATE) || info.is(RenderFlags::REFRESH) {
                if self.write_props(tree, info.node, info.is(RenderFlags::REFRESH)) {
                    report.updated += 1;
                }
            }
            if info.is(RenderFlags::MOVE) {
                queue.extend(tree.real_roots(info.node, false));
                report.moved += 1;
            }
            if info.is(RenderFlags::MOVE) || info.is(RenderFlags::EMPTY_MOVE) {
                if let Some(parent) = tree.parent(info.node) {
                    tree.propagate_dom(parent);
                }
                if let Some(from) = info.from_parent {
                    tree.propagate_dom(from);
                }
            }
        }
        report.inserted += self.place(tree, queue);
        trace!(?report, "applied render infos");
        report
    }

    // ------------------------------------------------------------------------
    // Single operations
    // ------------------------------------------------------------------------

    pub(super) fn remove(&mut self, tree: &mut Tree, info: RenderInfo, report: &mut ApplyReport) {
        // Purged with an ancestor removed earlier in the batch.
        if !tree.contains(info.node) {
            return;
        }
        for root in tree.real_roots(info.node, true) {
            let Some(node) = tree.get(root) else {
                continue;
            };
            let Some(dom) = node.dom else {
                continue;
            };
            let salvaged = node.data.attachments.on_remove.as_ref().is_some_and(|hook| hook.call(dom));
            if !salvaged {
                self.backend.detach(dom);
            }
        }
        for removed in tree.purge(info.node) {
            for r in &removed.data.attachments.refs {
                r.set(None);
            }
            if removed.data.external.is_some() {
                self.owners.retain(|_, owner| *owner != removed.id);
            }
        }
        if let Some(parent) = info.from_parent {
            tree.propagate_dom(parent);
        }
        report.removed += 1;
    }

    /// Create the output node of `id`. Returns whether a node was created.
    pub(crate) fn create(&mut self, tree: &mut Tree, id: NodeId) -> bool {
        let Some(node) = tree.get(id) else {
            return false;
        };
        let (tag, content, external) = (node.data.tag.clone(), node.data.content.clone(), node.data.external);
        let props = node.data.props.clone();

        let (dom, applied_props, applied_content) = if let Some(tag) = tag {
            let dom = self.backend.create_element(&tag);
            let diff = Props::new().diff(&props, self.dom_compare);
            self.backend.apply_props(dom, &diff);
            (dom, Some(props), None)
        } else if let Some(content) = content {
            let dom = if content.raw {
                self.backend.create_markup(&content.text)
            } else {
                self.backend.create_text(&content.text)
            };
            (dom, None, Some(content))
        } else if let Some(external) = external {
            let Some(dom) = self.claim_external(tree, id, external) else {
                return false;
            };
            self.reconcile_external(dom, &props);
            (dom, Some(props), None)
        } else {
            return false;
        };

        if let Some(node) = tree.get_mut(id) {
            node.dom = Some(dom);
            node.data.applied_props = applied_props;
            node.data.applied_content = applied_content;
            node.data.applied_external = external;
            for r in &node.data.attachments.refs {
                r.set(Some(dom));
            }
        }
        tree.propagate_dom(id);
        true
    }

    /// Resolve which output node an external def at `id` may show.
    fn claim_external(&mut self, tree: &mut Tree, id: NodeId, external: RealNode) -> Option<RealNode> {
        let owner = self.owners.get(&external).copied();
        let Some(owner) = owner.filter(|&o| o != id && tree.is_live(o)) else {
            self.owners.insert(external, id);
            return Some(external);
        };
        match self.duplicates {
            DuplicatePolicy::Clone => {
                let copy = self.backend.clone_node(external, true);
                self.owners.insert(copy, id);
                Some(copy)
            }
            DuplicatePolicy::Steal => {
                warn!(node = external.raw(), "external node rendered twice; moving it");
                if let Some(prev) = tree.get_mut(owner) {
                    prev.dom = None;
                    for r in &prev.data.attachments.refs {
                        r.set(None);
                    }
                }
                tree.propagate_dom(owner);
                self.owners.insert(external, id);
                Some(external)
            }
            DuplicatePolicy::Skip => {
                warn!(node = external.raw(), "external node rendered twice; skipping");
                None
            }
        }
    }

    /// Write target props onto an adopted node without removing what it
    /// already carries.
    fn reconcile_external(&mut self, dom: RealNode, props: &Props) {
        let mut diff = self.backend.read_props(dom).diff(props, self.dom_compare);
        diff.removed.clear();
        if !diff.is_empty() {
            self.backend.apply_props(dom, &diff);
        }
    }

    fn swap(&mut self, tree: &mut Tree, id: NodeId) {
        let Some(node) = tree.get(id) else {
            return;
        };
        let (old, props) = (node.dom, node.data.props.clone());
        let Some(external) = node.data.external else {
            return;
        };
        let claimed = self.claim_external(tree, id, external);
        if let Some(node) = tree.get_mut(id) {
            node.data.applied_external = Some(external);
        }
        let Some(new) = claimed else {
            return;
        };
        if let Some(old) = old.filter(|&old| old != new) {
            for child in self.backend.children(old) {
                self.backend.insert(new, child, None);
            }
            if let Some(parent) = self.backend.parent(old) {
                let before = self.backend.next_sibling(old).filter(|&s| s != new);
                self.backend.insert(parent, new, before);
                self.backend.detach(old);
            }
            if self.owners.get(&old) == Some(&id) {
                self.owners.remove(&old);
            }
        }
        self.reconcile_external(new, &props);
        if let Some(node) = tree.get_mut(id) {
            node.dom = Some(new);
            node.data.applied_props = Some(props);
            for r in &node.data.attachments.refs {
                r.set(Some(new));
            }
        }
        tree.propagate_dom(id);
    }

    fn write_content(&mut self, tree: &mut Tree, id: NodeId) {
        let Some(node) = tree.get(id) else {
            return;
        };
        let (Some(dom), Some(content)) = (node.dom, node.data.content.clone()) else {
            return;
        };
        let same_kind = node.data.applied_content.as_ref().is_some_and(|a| a.raw == content.raw);
        if same_kind {
            self.backend.set_text(dom, &content.text);
        } else {
            let fresh = if content.raw {
                self.backend.create_markup(&content.text)
            } else {
                self.backend.create_text(&content.text)
            };
            if let Some(parent) = self.backend.parent(dom) {
                self.backend.insert(parent, fresh, Some(dom));
                self.backend.detach(dom);
            }
            if let Some(node) = tree.get_mut(id) {
                node.dom = Some(fresh);
                for r in &node.data.attachments.refs {
                    r.set(Some(fresh));
                }
            }
            tree.propagate_dom(id);
        }
        if let Some(node) = tree.get_mut(id) {
            node.data.applied_content = Some(content);
        }
    }

    /// Write the prop difference to the output node. With `refresh`, the
    /// baseline is read back from the live node first.
    fn write_props(&mut self, tree: &mut Tree, id: NodeId, refresh: bool) -> bool {
        let Some(node) = tree.get_mut(id) else {
            return false;
        };
        let Some(dom) = node.dom.filter(|_| node.kind == NodeKind::Real) else {
            return false;
        };
        if node.data.tag.is_none() && node.data.external.is_none() {
            return false;
        }
        let baseline = if refresh {
            self.backend.read_props(dom)
        } else {
            node.data.applied_props.clone().unwrap_or_default()
        };
        let diff = baseline.diff(&node.data.props, self.dom_compare);
        node.data.applied_props = Some(node.data.props.clone());
        if diff.is_empty() {
            return false;
        }
        self.backend.apply_props(dom, &diff);
        true
    }

    // ------------------------------------------------------------------------
    // Placement
    // ------------------------------------------------------------------------

    /// Insert queued real nodes at their tree positions. Returns the number
    /// of insertions.
    fn place(&mut self, tree: &Tree, queue: Vec<NodeId>) -> usize {
        if queue.is_empty() {
            return 0;
        }
        let mut ordered: Vec<_> = queue
            .into_iter()
            .filter(|&id| tree.is_live(id))
            .map(|id| (tree.path(id), id))
            .collect();
        ordered.sort_by(|a, b| b.0.cmp(&a.0));
        ordered.dedup_by_key(|(_, id)| *id);

        let doms: Vec<(NodeId, RealNode)> = ordered
            .into_iter()
            .filter_map(|(_, id)| tree.get(id).and_then(|n| n.dom).map(|dom| (id, dom)))
            .collect();
        for &(_, dom) in &doms {
            self.backend.detach(dom);
        }

        let mut inserted = 0;
        for (id, dom) in doms {
            let Some(parent) = tree.real_parent(id, self.container) else {
                continue;
            };
            let before = tree.next_real_sibling(id).filter(|&b| {
                let attached = self.backend.parent(b) == Some(parent);
                if !attached {
                    warn!(node = id.raw(), "insertion reference is not a child of the target parent; appending");
                }
                attached
            });
            self.backend.insert(parent, dom, before);
            inserted += 1;
        }
        inserted
    }

    // ------------------------------------------------------------------------
    // Pause / resume
    // ------------------------------------------------------------------------

    /// Resume after [`Applier::pause`]: replay the retained removals, then
    /// bring the output in line with the whole tree.
    ///
    /// With `remove_unused`, output nodes the tree does not know about are
    /// detached from the tracked parents.
    pub fn resume(&mut self, tree: &mut Tree, remove_unused: bool) -> ApplyReport {
        self.paused = false;
        let mut report = ApplyReport::default();
        for info in std::mem::take(&mut self.retained) {
            self.remove(tree, info, &mut report);
        }
        report.merge(&self.sync_all(tree, remove_unused));
        report
    }

    /// Drop the retained removals without touching the output.
    pub(crate) fn discard_retained(&mut self, tree: &mut Tree) {
        for info in std::mem::take(&mut self.retained) {
            for removed in tree.purge(info.node) {
                for r in &removed.data.attachments.refs {
                    r.set(None);
                }
            }
        }
        self.owners.clear();
    }

    /// Create, update and place every real node of the tree as needed.
    pub(crate) fn sync_all(&mut self, tree: &mut Tree, remove_unused: bool) -> ApplyReport {
        let mut report = ApplyReport::default();
        let order = tree.descendants(tree.root());
        for &id in &order {
            let Some(node) = tree.get(id) else {
                continue;
            };
            if node.kind != NodeKind::Real {
                continue;
            }
            if node.dom.is_none() {
                if self.create(tree, id) {
                    report.created += 1;
                }
                continue;
            }
            // Swapped while paused.
            if node.data.external.is_some() && node.data.external != node.data.applied_external {
                self.swap(tree, id);
                report.updated += 1;
                continue;
            }
            let stale_content = node.data.content.is_some() && node.data.content != node.data.applied_content;
            if stale_content {
                self.write_content(tree, id);
                report.updated += 1;
            } else if self.write_props(tree, id, false) {
                report.updated += 1;
            }
        }
        tree.rebuild_dom_cache();

        for &id in order.iter().rev() {
            let Some(dom) = tree.get(id).filter(|n| n.kind == NodeKind::Real).and_then(|n| n.dom) else {
                continue;
            };
            let Some(parent) = tree.real_parent(id, self.container) else {
                continue;
            };
            let before = tree
                .next_real_sibling(id)
                .filter(|&b| self.backend.parent(b) == Some(parent));
            if self.backend.parent(dom) != Some(parent) || self.backend.next_sibling(dom) != before {
                self.backend.insert(parent, dom, before);
                report.inserted += 1;
            }
        }

        if remove_unused {
            report.removed += self.remove_unused(tree);
        }
        report
    }

    /// Detach untracked children of the container and of tracked elements.
    pub(crate) fn remove_unused(&mut self, tree: &Tree) -> usize {
        let mut tracked = HashSet::new();
        let mut parents = vec![self.container];
        for id in tree.descendants(tree.root()) {
            let Some(node) = tree.get(id) else {
                continue;
            };
            match (node.kind, node.dom) {
                (NodeKind::Real, Some(dom)) => {
                    tracked.insert(dom);
                    if node.data.tag.is_some() {
                        parents.push(dom);
                    }
                }
                (NodeKind::Portal, Some(dom)) => parents.push(dom),
                _ => {}
            }
        }
        let mut removed = 0;
        for parent in parents {
            for child in self.backend.children(parent) {
                if !tracked.contains(&child) {
                    self.backend.detach(child);
                    removed += 1;
                }
            }
        }
        removed
    }
}

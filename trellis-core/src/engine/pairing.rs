//! Pairing Engine
//!
//! Matches a boundary's old applied child defs against freshly rendered
//! target defs, one child list (a *level*) at a time.
//!
//! # Groups
//!
//! Unkeyed defs group by signature (kind plus tag identity). A new unkeyed def
//! first tries the old def with the same ordinal in its group, then the first
//! compatible unused one in old order. Keyed defs are looked up in a
//! [`KeyPool`] by key.
//!
//! # Key spaces
//!
//! Element, portal and nested-host children, boundary output, and isolated
//! fragments each open a fresh pool. Wide fragments share the pool of the
//! level around them, so a keyed def can move between sibling fragments.
//! Leftovers are only unmounted once the level owning the pool is done, after
//! every possible taker had its chance.
//!
//! # Moves
//!
//! A reused node that stays under the same parent is moved when its next
//! reused sibling differs between old and new order. A forward scan then
//! marks anything whose old position is not increasing as moved too. Nodes
//! taken from another parent are always moved.

use std::collections::HashMap;

use indexmap::IndexMap;
use tracing::debug;

use super::{Engine, LifecycleCall};
use crate::boundary::{Boundary, BoundaryId, BoundaryKind};
use crate::cycle::DirtySet;
use crate::def::{AppliedDef, DefAction, DefKind, Key, KeyScope, Signature, TargetDef};
use crate::render::{RenderFlags, RenderInfo};
use crate::tree::{NodeData, NodeId, NodeKind};

/// Where a child list is being paired.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Level {
    /// Boundary whose render produced the defs.
    pub(crate) owner: BoundaryId,
    /// Boundary whose content a content-pass def at this level forwards.
    pub(crate) scope: Option<BoundaryId>,
}

/// Whether an old applied def can be reused for a new target def.
fn compatible(old: &AppliedDef, new: &TargetDef) -> bool {
    if old.kind.signature() != new.kind.signature() {
        return false;
    }
    match &old.kind {
        DefKind::Boundary(ty) => ty.constants_hold(&old.props, &new.props),
        _ => true,
    }
}

fn shares_pool(kind: &DefKind, isolate_arrays: bool) -> bool {
    match kind {
        DefKind::Fragment(KeyScope::Wide) => true,
        DefKind::Fragment(KeyScope::Array) => !isolate_arrays,
        _ => false,
    }
}

/// Old defs available for reuse within one key space.
#[derive(Default)]
pub(crate) struct KeyPool {
    keyed: IndexMap<Key, Vec<AppliedDef>>,
    leftovers: Vec<AppliedDef>,
}

impl KeyPool {
    /// Move keyed defs (including those inside wide fragments) into the pool
    /// and return the unkeyed rest.
    fn collect(&mut self, old: Vec<AppliedDef>, isolate_arrays: bool) -> Vec<AppliedDef> {
        let mut rest = Vec::with_capacity(old.len());
        for mut item in old {
            if let Some(key) = item.key.clone() {
                self.keyed.entry(key).or_default().push(item);
                continue;
            }
            if shares_pool(&item.kind, isolate_arrays) {
                let children = std::mem::take(&mut item.children);
                item.children = self.collect(children, isolate_arrays);
            }
            rest.push(item);
        }
        rest
    }

    fn take(&mut self, def: &TargetDef) -> Option<AppliedDef> {
        let key = def.key.as_ref()?;
        let candidates = self.keyed.get_mut(key)?;
        let index = candidates.iter().position(|old| compatible(old, def))?;
        Some(candidates.remove(index))
    }

    fn drain(&mut self) -> Vec<AppliedDef> {
        let mut out: Vec<_> = self.keyed.drain(..).flat_map(|(_, defs)| defs).collect();
        out.append(&mut self.leftovers);
        out
    }
}

/// Unkeyed old defs of one level, grouped by signature.
struct Groups {
    slots: Vec<Option<AppliedDef>>,
    by_signature: HashMap<Signature, Vec<usize>>,
    seen: HashMap<Signature, usize>,
}

impl Groups {
    fn new(old: Vec<AppliedDef>) -> Self {
        let mut by_signature: HashMap<Signature, Vec<usize>> = HashMap::new();
        for (i, item) in old.iter().enumerate() {
            by_signature.entry(item.kind.signature()).or_default().push(i);
        }
        Self {
            slots: old.into_iter().map(Some).collect(),
            by_signature,
            seen: HashMap::new(),
        }
    }

    fn take(&mut self, def: &TargetDef) -> Option<AppliedDef> {
        let signature = def.kind.signature();
        let ordinal = {
            let seen = self.seen.entry(signature.clone()).or_insert(0);
            *seen += 1;
            *seen - 1
        };
        let candidates = self.by_signature.get(&signature)?;
        let usable = |i: usize| self.slots[i].as_ref().is_some_and(|old| compatible(old, def));
        let pick = candidates
            .get(ordinal)
            .copied()
            .filter(|&i| usable(i))
            .or_else(|| candidates.iter().copied().find(|&i| usable(i)))?;
        self.slots[pick].take()
    }

    fn into_leftovers(self) -> impl Iterator<Item = AppliedDef> {
        self.slots.into_iter().flatten()
    }
}

/// One position of the new child list.
struct Placed {
    applied: AppliedDef,
    reused: bool,
    /// Tree parent of a reused node before this pairing.
    from_parent: Option<NodeId>,
}

impl Engine {
    /// Pair `old` against `new` as the children of `parent`.
    ///
    /// With `pool`, keyed lookups go to the surrounding key space and
    /// leftovers are handed to it; otherwise this level owns a fresh pool and
    /// unmounts what nobody reused.
    pub(crate) fn pair_level(
        &mut self,
        parent: NodeId,
        old: Vec<AppliedDef>,
        new: Vec<TargetDef>,
        level: Level,
        pool: Option<&mut KeyPool>,
        dirty: &mut DirtySet,
    ) -> Vec<AppliedDef> {
        let owns_pool = pool.is_none();
        let mut own = KeyPool::default();
        let pool = match pool {
            Some(pool) => pool,
            None => &mut own,
        };

        let old_positions: HashMap<NodeId, usize> = self
            .tree
            .children(parent)
            .iter()
            .enumerate()
            .map(|(i, &c)| (c, i))
            .collect();
        let unkeyed = pool.collect(old, self.settings.isolate_arrays);
        let mut groups = Groups::new(unkeyed);

        let mut placed = Vec::with_capacity(new.len());
        for def in new {
            let matched = match def.key {
                Some(_) => pool.take(&def),
                None => groups.take(&def),
            };
            placed.push(match matched {
                Some(old) => {
                    let from_parent = self.tree.parent(old.node);
                    Placed {
                        applied: self.reuse(old, def, level, pool, dirty),
                        reused: true,
                        from_parent,
                    }
                }
                None => Placed {
                    applied: self.mount(def, parent, level, pool, dirty),
                    reused: false,
                    from_parent: None,
                },
            });
        }
        pool.leftovers.extend(groups.into_leftovers());

        let ids = placed.iter().map(|p| p.applied.node).collect();
        self.tree.set_children(parent, ids);
        self.detect_moves(parent, &mut placed, &old_positions);

        if owns_pool {
            for old in pool.drain() {
                self.unmount_node(old.node, dirty);
            }
        }
        placed.into_iter().map(|p| p.applied).collect()
    }

    fn detect_moves(&mut self, parent: NodeId, placed: &mut [Placed], old_positions: &HashMap<NodeId, usize>) {
        let mut moved = vec![false; placed.len()];

        // Reused in place: (index into `placed`, old position).
        let stayed: Vec<(usize, usize)> = placed
            .iter()
            .enumerate()
            .filter(|(_, p)| p.reused && p.from_parent == Some(parent))
            .filter_map(|(i, p)| old_positions.get(&p.applied.node).map(|&pos| (i, pos)))
            .collect();

        let mut old_order = stayed.clone();
        old_order.sort_by_key(|&(_, pos)| pos);
        let next_in = |order: &[(usize, usize)]| -> HashMap<usize, Option<usize>> {
            order
                .iter()
                .enumerate()
                .map(|(k, &(i, _))| (i, order.get(k + 1).map(|&(j, _)| j)))
                .collect()
        };
        let next_old = next_in(&old_order);
        let next_new = next_in(&stayed);
        for &(i, _) in &stayed {
            moved[i] = next_old.get(&i) != next_new.get(&i);
        }

        let mut highest = None;
        for &(i, pos) in &stayed {
            if moved[i] {
                continue;
            }
            if highest.is_some_and(|h| pos < h) {
                moved[i] = true;
            } else {
                highest = Some(pos);
            }
        }

        for (i, p) in placed.iter().enumerate() {
            if p.reused && p.from_parent != Some(parent) {
                moved[i] = true;
            }
        }

        for (i, p) in placed.iter_mut().enumerate() {
            if moved[i] {
                self.record_move(p, parent);
            }
        }
    }

    fn record_move(&mut self, placed: &mut Placed, parent: NodeId) {
        let node = placed.applied.node;
        placed.applied.action = DefAction::Moved;

        let kind = self.tree.kind(node);
        let empty = kind.is_some_and(NodeKind::is_passthrough) && self.tree.real_roots(node, false).is_empty();
        let flags = if empty {
            RenderFlags::EMPTY_MOVE
        } else {
            RenderFlags::MOVE
        };
        self.out.infos.push(RenderInfo {
            node,
            flags,
            from_parent: placed.from_parent.filter(|&p| p != parent),
        });

        if kind == Some(NodeKind::Boundary) {
            if let Some(b) = self.tree.get(node).and_then(|n| n.boundary()) {
                self.out.calls.push(LifecycleCall::DidMove(b));
            }
        }
    }

    /// Keep the node of `old` for `def`.
    fn reuse(
        &mut self,
        old: AppliedDef,
        def: TargetDef,
        level: Level,
        pool: &mut KeyPool,
        dirty: &mut DirtySet,
    ) -> AppliedDef {
        let node = old.node;
        let TargetDef {
            kind,
            key,
            props,
            children,
            attachments,
        } = def;
        let mut applied = AppliedDef {
            kind: kind.clone(),
            key: key.clone(),
            props: props.clone(),
            action: DefAction::Updated,
            node,
            children: Vec::new(),
        };

        let mut flags = RenderFlags::empty();
        if let Some(tree_node) = self.tree.get_mut(node) {
            let data = &mut tree_node.data;
            data.key = key;
            match &kind {
                DefKind::Element(_) | DefKind::External(_) => {
                    if old.props.changed(&props, self.settings.dom_compare) {
                        flags |= RenderFlags::UPDATE;
                    }
                    data.props = props.clone();
                }
                _ => data.props = props.clone(),
            }
            if let DefKind::Content(content) = &kind {
                if data.content.as_ref() != Some(content) {
                    data.content = Some(content.clone());
                    flags |= RenderFlags::CONTENT;
                }
            }
            if let DefKind::External(external) = &kind {
                if data.external != Some(*external) {
                    data.external = Some(*external);
                    flags |= RenderFlags::SWAP;
                }
            }
            if !attachments.is_empty() || !data.attachments.is_empty() {
                if tree_node.kind == NodeKind::Real {
                    for r in &attachments.refs {
                        r.set(tree_node.dom);
                    }
                }
                tree_node.data.attachments = attachments;
            }
        }
        if !flags.is_empty() {
            self.out.infos.push(RenderInfo::new(node, flags));
        }

        match kind {
            DefKind::Element(_) | DefKind::External(_) | DefKind::Portal(_) => {
                applied.children = self.pair_level(node, old.children, children, level, None, dirty);
            }
            DefKind::Fragment(scope) => {
                let shared = shares_pool(&DefKind::Fragment(scope), self.settings.isolate_arrays);
                let pool = if shared { Some(pool) } else { None };
                applied.children = self.pair_level(node, old.children, children, level, pool, dirty);
            }
            DefKind::Nested => {
                let nested = Level { scope: None, ..level };
                applied.children = self.pair_level(node, old.children, children, nested, None, dirty);
            }
            DefKind::Boundary(_) => {
                let id = self.tree.get(node).and_then(|n| n.boundary());
                if let Some(b) = id.and_then(|id| self.boundaries.get_mut(&id)) {
                    b.next_props = Some(props);
                    b.next_content = Some(children);
                    b.content_scope = level.scope;
                }
                if let Some(id) = id {
                    self.update_boundary(id, false, dirty);
                }
            }
            DefKind::ContentPass => {
                if let Some(id) = self.tree.get(node).and_then(|n| n.boundary()) {
                    self.update_boundary(id, false, dirty);
                }
            }
            DefKind::Content(_) => {}
        }
        applied
    }

    /// Create the node (and boundary) for a def nobody could reuse.
    fn mount(
        &mut self,
        def: TargetDef,
        parent: NodeId,
        level: Level,
        pool: &mut KeyPool,
        dirty: &mut DirtySet,
    ) -> AppliedDef {
        let TargetDef {
            kind,
            key,
            props,
            children,
            attachments,
        } = def;

        let node_kind = match &kind {
            DefKind::Element(_) | DefKind::Content(_) | DefKind::External(_) => NodeKind::Real,
            DefKind::Portal(_) => NodeKind::Portal,
            DefKind::Boundary(_) => NodeKind::Boundary,
            DefKind::ContentPass => NodeKind::ContentPass,
            DefKind::Nested => NodeKind::NestedHost,
            DefKind::Fragment(_) => NodeKind::Fragment,
        };
        let mut data = NodeData {
            key: key.clone(),
            props: props.clone(),
            attachments,
            ..NodeData::default()
        };
        match &kind {
            DefKind::Element(tag) => data.tag = Some(tag.clone()),
            DefKind::Content(content) => data.content = Some(content.clone()),
            DefKind::External(external) => data.external = Some(*external),
            _ => {}
        }

        let node = self.tree.insert(&self.ids, parent, node_kind, Some(level.owner), data);
        if node_kind == NodeKind::Real {
            self.out.infos.push(RenderInfo::new(node, RenderFlags::CREATE));
        }

        let mut applied = AppliedDef {
            kind: kind.clone(),
            key,
            props: props.clone(),
            action: DefAction::Mounted,
            node,
            children: Vec::new(),
        };

        match kind {
            DefKind::Element(_) | DefKind::External(_) => {
                applied.children = self.pair_level(node, Vec::new(), children, level, None, dirty);
            }
            DefKind::Portal(container) => {
                if let Some(n) = self.tree.get_mut(node) {
                    n.dom = Some(container);
                }
                applied.children = self.pair_level(node, Vec::new(), children, level, None, dirty);
            }
            DefKind::Fragment(scope) => {
                let shared = shares_pool(&DefKind::Fragment(scope), self.settings.isolate_arrays);
                let pool = if shared { Some(pool) } else { None };
                applied.children = self.pair_level(node, Vec::new(), children, level, pool, dirty);
            }
            DefKind::Nested => {
                let nested = Level { scope: None, ..level };
                applied.children = self.pair_level(node, Vec::new(), children, nested, None, dirty);
            }
            DefKind::Boundary(ty) => {
                let id = BoundaryId::from(self.ids.next_raw());
                debug!(boundary = id.raw(), component = ty.name(), "mounting boundary");
                let component = ty.instantiate(&props);
                let mut b = Boundary::new(
                    id,
                    BoundaryKind::Source { component, ty },
                    node,
                    props,
                    self.channel.clone(),
                );
                b.content = children;
                b.content_scope = level.scope;
                self.attach_boundary(node, b);
                self.out.calls.push(LifecycleCall::DidMount(id));
                self.update_boundary(id, false, dirty);
            }
            DefKind::ContentPass => {
                let id = BoundaryId::from(self.ids.next_raw());
                let forwards = level.scope.filter(|s| self.boundaries.contains_key(s));
                let mut b = Boundary::new(
                    id,
                    BoundaryKind::Content { forwards },
                    node,
                    crate::value::Props::new(),
                    self.channel.clone(),
                );
                if let Some(source) = forwards.and_then(|s| self.boundaries.get_mut(&s)) {
                    source.content_passes.push(id);
                    b.content = source.content.clone();
                }
                self.attach_boundary(node, b);
                self.update_boundary(id, false, dirty);
            }
            DefKind::Content(_) => {}
        }
        applied
    }

    fn attach_boundary(&mut self, node: NodeId, b: Boundary) {
        if let Some(n) = self.tree.get_mut(node) {
            n.boundary = Some(b.id);
        }
        self.boundaries.insert(b.id, b);
    }
}

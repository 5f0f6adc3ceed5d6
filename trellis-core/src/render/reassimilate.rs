//! Reassimilation
//!
//! Takes over an output subtree that already exists (server-rendered markup,
//! or the output of an earlier host) instead of creating it from scratch.
//!
//! The existing subtree is mirrored once into a flat list of virtual items.
//! The tree is then walked in document order and every real node is matched
//! against the mirror: first the next fitting child after the last match
//! under the same parent, then (for keyed nodes) any unclaimed item with the
//! same tag and key. Whatever the walk could not match is created and
//! placed as usual.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use tracing::debug;

use super::applier::Applier;
use super::info::{ApplyReport, RenderFlags, RenderInfo};
use super::output::{OutputBackend, RealNode};
use crate::def::{ContentDef, Key};
use crate::tree::{NodeId, NodeKind, Tree, TreeNode};

/// Decides whether a proposed match may be adopted.
pub type Validator = Rc<dyn Fn(&TreeNode, RealNode) -> bool>;

/// Proposes a match when the built-in lookup found none. Gets the unclaimed
/// output nodes under the expected parent.
pub type Suggester = Rc<dyn Fn(&TreeNode, &[RealNode]) -> Option<RealNode>>;

#[derive(Clone, Default)]
pub struct ReassimilateOptions {
    /// Read the live props and text of adopted nodes and reconcile them
    /// with the targets.
    pub read_props: bool,
    /// Detach existing nodes nothing was matched to.
    pub remove_unused: bool,
    /// Attribute holding the key of existing nodes; the host setting when
    /// `None`.
    pub key_attribute: Option<String>,
    pub validator: Option<Validator>,
    pub suggester: Option<Suggester>,
}

impl fmt::Debug for ReassimilateOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReassimilateOptions")
            .field("read_props", &self.read_props)
            .field("remove_unused", &self.remove_unused)
            .field("key_attribute", &self.key_attribute)
            .field("validator", &self.validator.is_some())
            .field("suggester", &self.suggester.is_some())
            .finish()
    }
}

/// One node of the mirrored output subtree.
#[derive(Debug)]
struct VirtualItem {
    dom: RealNode,
    tag: Option<Rc<str>>,
    key: Option<String>,
    children: Vec<usize>,
    claimed: bool,
}

#[derive(Debug, Default)]
struct Mirror {
    items: Vec<VirtualItem>,
    /// Keyed items by tag and key.
    keyed: HashMap<(Option<Rc<str>>, String), Vec<usize>>,
    by_dom: HashMap<RealNode, usize>,
    /// Next structural position per item.
    cursors: HashMap<usize, usize>,
}

impl Mirror {
    fn build<B: OutputBackend>(backend: &B, root: RealNode, key_attribute: &str) -> Self {
        let mut mirror = Mirror::default();
        mirror.add(backend, root, key_attribute);
        mirror
    }

    fn add<B: OutputBackend>(&mut self, backend: &B, dom: RealNode, key_attribute: &str) -> usize {
        let tag = backend.tag(dom);
        let key = backend
            .read_props(dom)
            .get(key_attribute)
            .and_then(|v| v.to_text());
        let index = self.items.len();
        self.items.push(VirtualItem {
            dom,
            tag: tag.clone(),
            key: key.clone(),
            children: Vec::new(),
            claimed: false,
        });
        self.by_dom.insert(dom, index);
        if let Some(key) = key {
            self.keyed.entry((tag, key)).or_default().push(index);
        }
        let children = backend
            .children(dom)
            .into_iter()
            .map(|child| self.add(backend, child, key_attribute))
            .collect();
        self.items[index].children = children;
        index
    }

    fn unclaimed_children(&self, parent: usize) -> Vec<RealNode> {
        self.items[parent]
            .children
            .iter()
            .map(|&c| &self.items[c])
            .filter(|item| !item.claimed)
            .map(|item| item.dom)
            .collect()
    }
}

fn key_text(key: &Key) -> String {
    match key {
        Key::Int(i) => i.to_string(),
        Key::Str(s) => s.to_string(),
    }
}

/// Whether an existing item can realize `node`.
fn fits(node: &TreeNode, item: &VirtualItem) -> bool {
    let same_kind = match (&node.data.tag, &item.tag) {
        (Some(tag), Some(existing)) => tag == existing,
        (None, None) => node.data.content.is_some(),
        _ => false,
    };
    let same_key = match &item.key {
        Some(existing) => node.data.key.as_ref().is_some_and(|k| key_text(k) == *existing),
        None => true,
    };
    same_kind && same_key
}

impl<B: OutputBackend> Applier<B> {
    /// Adopt the existing output below `container` for the current tree.
    ///
    /// The tree's output pointers should be cleared beforehand; nodes that
    /// still carry one and find no match keep it and are moved into
    /// `container`.
    pub fn reassimilate(
        &mut self,
        tree: &mut Tree,
        container: RealNode,
        options: &ReassimilateOptions,
        default_key_attribute: &str,
    ) -> ApplyReport {
        let mut report = ApplyReport::default();
        let pending = std::mem::take(&mut self.retained);
        self.paused = false;
        for info in pending {
            self.remove(tree, info, &mut report);
        }

        self.container = container;
        let key_attribute = options.key_attribute.as_deref().unwrap_or(default_key_attribute);
        let mut mirror = Mirror::build(&self.backend, container, key_attribute);

        let mut refresh = Vec::new();
        let root = tree.root();
        report.adopted = self.adopt_children(tree, &mut mirror, root, Some(0), options, &mut refresh);
        debug!(adopted = report.adopted, mirrored = mirror.items.len(), "reassimilated output");

        if !refresh.is_empty() {
            report.merge(&self.apply(tree, refresh));
        }
        report.merge(&self.sync_all(tree, options.remove_unused));
        report
    }

    fn adopt_children(
        &mut self,
        tree: &mut Tree,
        mirror: &mut Mirror,
        id: NodeId,
        parent_item: Option<usize>,
        options: &ReassimilateOptions,
        refresh: &mut Vec<RenderInfo>,
    ) -> usize {
        let mut adopted = 0;
        for child in tree.children(id).to_vec() {
            let Some(node) = tree.get(child) else {
                continue;
            };
            match node.kind {
                // Portal content lives in another container.
                NodeKind::Portal => {}
                NodeKind::Real if node.data.external.is_some() => {}
                NodeKind::Real => {
                    let matched = self.find_match(node, mirror, parent_item, options);
                    if let Some(item) = matched {
                        self.adopt(tree, child, mirror, item, options, refresh);
                        adopted += 1;
                    }
                    adopted += self.adopt_children(tree, mirror, child, matched, options, refresh);
                }
                _ => adopted += self.adopt_children(tree, mirror, child, parent_item, options, refresh),
            }
        }
        adopted
    }

    fn find_match(
        &self,
        node: &TreeNode,
        mirror: &mut Mirror,
        parent_item: Option<usize>,
        options: &ReassimilateOptions,
    ) -> Option<usize> {
        let accept = |item: &VirtualItem| {
            !item.claimed && fits(node, item) && options.validator.as_ref().map_or(true, |v| v(node, item.dom))
        };

        if let Some(parent) = parent_item {
            let kids = &mirror.items[parent].children;
            let cursor = mirror.cursors.get(&parent).copied().unwrap_or(0);
            let found = kids
                .iter()
                .enumerate()
                .skip(cursor)
                .find(|&(_, &c)| accept(&mirror.items[c]))
                .map(|(pos, &c)| (pos, c));
            if let Some((pos, index)) = found {
                mirror.cursors.insert(parent, pos + 1);
                return Some(index);
            }
        }

        if let Some(key) = &node.data.key {
            let lookup = (node.data.tag.clone(), key_text(key));
            let found = mirror
                .keyed
                .get(&lookup)
                .and_then(|list| list.iter().copied().find(|&i| accept(&mirror.items[i])));
            if found.is_some() {
                return found;
            }
        }

        let suggest = options.suggester.as_ref()?;
        let candidates = parent_item.map(|p| mirror.unclaimed_children(p)).unwrap_or_default();
        let dom = suggest(node, &candidates)?;
        mirror.by_dom.get(&dom).copied().filter(|&i| !mirror.items[i].claimed)
    }

    fn adopt(
        &mut self,
        tree: &mut Tree,
        id: NodeId,
        mirror: &mut Mirror,
        item: usize,
        options: &ReassimilateOptions,
        refresh: &mut Vec<RenderInfo>,
    ) {
        mirror.items[item].claimed = true;
        let dom = mirror.items[item].dom;
        let live_text = self.backend.text(dom);
        let Some(node) = tree.get_mut(id) else {
            return;
        };
        node.dom = Some(dom);
        node.data.applied_external = node.data.external;
        for r in &node.data.attachments.refs {
            r.set(Some(dom));
        }
        if let Some(content) = &node.data.content {
            node.data.applied_content = if options.read_props {
                Some(ContentDef {
                    text: Rc::from(live_text.unwrap_or_default()),
                    raw: content.raw,
                })
            } else {
                Some(content.clone())
            };
        } else if options.read_props {
            refresh.push(RenderInfo::new(id, RenderFlags::REFRESH));
        } else {
            node.data.applied_props = Some(node.data.props.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::def::TargetDef;
    use crate::engine::tests::render_root;
    use crate::render::applier::tests::Rig;
    use crate::render::MemoryDom;
    use crate::value::{CompareDepth, Props};

    fn element(dom: &mut MemoryDom, parent: RealNode, tag: &str, props: Props) -> RealNode {
        let node = dom.create_element(tag);
        dom.apply_props(node, &Props::new().diff(&props, CompareDepth::Deep));
        dom.insert(parent, node, None);
        node
    }

    fn text(dom: &mut MemoryDom, parent: RealNode, text: &str) -> RealNode {
        let node = dom.create_text(text);
        dom.insert(parent, node, None);
        node
    }

    /// A rig whose tree holds `defs` but whose output is still empty.
    fn unapplied(defs: Vec<TargetDef>) -> Rig {
        let mut rig = Rig::new();
        render_root(&mut rig.engine, defs);
        rig
    }

    fn keyed_list(keys: &[i64]) -> Vec<TargetDef> {
        vec![TargetDef::element("ul").children(
            keys.iter()
                .map(|&k| TargetDef::element("li").key(k).child(k.to_string())),
        )]
    }

    #[test]
    fn adopts_matching_markup() {
        let mut rig = unapplied(keyed_list(&[1, 2]));
        let container = rig.applier.container();
        let dom = rig.applier.backend_mut();
        let ul = element(dom, container, "ul", Props::new());
        let li = element(dom, ul, "li", Props::new());
        text(dom, li, "1");
        let li2 = element(dom, ul, "li", Props::new());
        text(dom, li2, "2");
        dom.reset_stats();

        let report = rig
            .applier
            .reassimilate(&mut rig.engine.tree, container, &ReassimilateOptions::default(), "data-key");
        assert_eq!(report.adopted, 5);
        assert_eq!(rig.applier.backend().stats().created, 0);
        assert_eq!(rig.applier.backend().stats().inserted, 0);
        assert_eq!(rig.markup(), "<ul><li>1</li><li>2</li></ul>");
        assert_eq!(rig.engine.tree.verify_dom_cache(), Ok(()));
    }

    #[test]
    fn keyed_items_are_found_out_of_order() {
        let mut rig = unapplied(keyed_list(&[1, 2]));
        let container = rig.applier.container();
        let dom = rig.applier.backend_mut();
        let ul = element(dom, container, "ul", Props::new());
        let second = element(dom, ul, "li", Props::new().with("data-key", "2"));
        text(dom, second, "2");
        let first = element(dom, ul, "li", Props::new().with("data-key", 1));
        text(dom, first, "1");
        dom.reset_stats();

        rig.applier
            .reassimilate(&mut rig.engine.tree, container, &ReassimilateOptions::default(), "data-key");
        assert_eq!(rig.applier.backend().stats().created, 0);
        assert_eq!(rig.applier.backend().children(ul), vec![first, second]);
    }

    #[test]
    fn read_props_reconciles_live_values() {
        let defs = || vec![TargetDef::element("p").prop("class", "new").child("text")];

        let mut rig = unapplied(defs());
        rig.applier.record(true);
        let container = rig.applier.container();
        let p = element(rig.applier.backend_mut(), container, "p", Props::new().with("class", "old"));
        text(rig.applier.backend_mut(), p, "stale");

        let options = ReassimilateOptions {
            read_props: true,
            ..Default::default()
        };
        rig.applier.reassimilate(&mut rig.engine.tree, container, &options, "data-key");
        assert_eq!(rig.markup(), "<p class=\"new\">text</p>");
        assert!(rig.applier.take_log().iter().any(|i| i.is(RenderFlags::REFRESH)));

        // Without reading back, the existing node is trusted as-is.
        let mut rig = unapplied(defs());
        let container = rig.applier.container();
        let p = element(rig.applier.backend_mut(), container, "p", Props::new().with("class", "old"));
        text(rig.applier.backend_mut(), p, "text");
        rig.applier
            .reassimilate(&mut rig.engine.tree, container, &ReassimilateOptions::default(), "data-key");
        assert_eq!(rig.markup(), "<p class=\"old\">text</p>");
    }

    #[test]
    fn unmatched_nodes_can_be_removed() {
        let mut rig = unapplied(vec![TargetDef::element("main")]);
        let container = rig.applier.container();
        let dom = rig.applier.backend_mut();
        element(dom, container, "aside", Props::new());
        element(dom, container, "main", Props::new());

        let options = ReassimilateOptions {
            remove_unused: true,
            ..Default::default()
        };
        let report = rig.applier.reassimilate(&mut rig.engine.tree, container, &options, "data-key");
        assert_eq!(report.adopted, 1);
        assert_eq!(report.removed, 1);
        assert_eq!(rig.markup(), "<main></main>");
    }

    #[test]
    fn validator_and_suggester_override_matching() {
        let mut rig = unapplied(vec![TargetDef::element("main")]);
        let container = rig.applier.container();
        element(rig.applier.backend_mut(), container, "main", Props::new());

        let options = ReassimilateOptions {
            validator: Some(Rc::new(|_: &TreeNode, _: RealNode| false)),
            ..Default::default()
        };
        let report = rig.applier.reassimilate(&mut rig.engine.tree, container, &options, "data-key");
        assert_eq!(report.adopted, 0);
        assert_eq!(report.created, 1);

        let mut rig = unapplied(vec![TargetDef::element("main")]);
        let container = rig.applier.container();
        let dom = rig.applier.backend_mut();
        element(dom, container, "nav", Props::new());
        let wanted = element(dom, container, "section", Props::new());
        let options = ReassimilateOptions {
            suggester: Some(Rc::new(|_: &TreeNode, candidates: &[RealNode]| candidates.last().copied())),
            ..Default::default()
        };
        let report = rig.applier.reassimilate(&mut rig.engine.tree, container, &options, "data-key");
        assert_eq!(report.adopted, 1);
        let root = rig.engine.tree.root();
        let main = rig.engine.tree.children(root)[0];
        assert_eq!(rig.engine.tree.get(main).and_then(|n| n.dom()), Some(wanted));
    }
}

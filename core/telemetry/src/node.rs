// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

// Schema tree nodes. A node is either an interior element, a keyed element
// (whose children are instances selected by a key value, with "*" naming
// the wildcard template), or a key instance. Leaves carry up to three
// handler disciplines (poll, timer, change), a target-defined-mode rewrite,
// and the set of event variants they register for on change subscriptions.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use futures::FutureExt;
use parking_lot::RwLock;

use gneiss_hal::event::EventKind;
use gneiss_proto::api::gnmi::{Path, PathElem, Subscription};

use crate::errors::TelemetryError;
use crate::paths::SUBTREE;
use crate::registry::EventHandlerRegistries;
use crate::subscription::{GnmiHandler, SubscriptionHandle};

pub type TargetDefinedModeFn =
    Arc<dyn Fn(&mut Subscription) -> Result<(), TelemetryError> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
enum NodeKind {
    Interior,
    Keyed { key_name: String },
    KeyInstance,
}

/// Handler capabilities of one node. Support flags are independent of the
/// installed handlers: template leaves advertise support while their
/// handlers stay silent.
#[derive(Default)]
pub struct NodeCapabilities {
    pub on_poll: Option<GnmiHandler>,
    pub on_timer: Option<GnmiHandler>,
    pub on_change: Option<GnmiHandler>,
    pub supports_on_poll: bool,
    pub supports_on_timer: bool,
    pub supports_on_change: bool,
    pub target_defined_mode: Option<TargetDefinedModeFn>,
    pub registrations: Vec<EventKind>,
}

pub struct TreeNode {
    name: String,
    kind: NodeKind,
    // Self-reference so &self methods can hand out owning pointers.
    this: Weak<TreeNode>,
    parent: RwLock<Weak<TreeNode>>,
    children: RwLock<HashMap<String, Arc<TreeNode>>>,
    caps: RwLock<NodeCapabilities>,
}

impl TreeNode {
    fn new(name: &str, kind: NodeKind, caps: NodeCapabilities) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            name: name.to_string(),
            kind,
            this: this.clone(),
            parent: RwLock::new(Weak::new()),
            children: RwLock::new(HashMap::new()),
            caps: RwLock::new(caps),
        })
    }

    fn arc(&self) -> Arc<TreeNode> {
        // A &TreeNode is only reachable through a live Arc.
        self.this.upgrade().expect("tree node is alive")
    }

    /// The immortal, unnamed root.
    pub fn root() -> Arc<Self> {
        Self::new("", NodeKind::Interior, NodeCapabilities::default())
    }

    pub fn interior(name: &str) -> Arc<Self> {
        Self::new(name, NodeKind::Interior, NodeCapabilities::default())
    }

    pub fn keyed(name: &str, key_name: &str) -> Arc<Self> {
        Self::new(
            name,
            NodeKind::Keyed {
                key_name: key_name.to_string(),
            },
            NodeCapabilities::default(),
        )
    }

    pub fn key_instance(key_value: &str) -> Arc<Self> {
        Self::new(key_value, NodeKind::KeyInstance, NodeCapabilities::default())
    }

    pub fn leaf(name: &str, caps: NodeCapabilities) -> Arc<Self> {
        Self::new(name, NodeKind::Interior, caps)
    }

    /// A leaf-shaped node that also carries children (alarm nodes: the node
    /// itself answers with the whole group, its children answer per field).
    pub fn group(name: &str, caps: NodeCapabilities) -> Arc<Self> {
        Self::new(name, NodeKind::Interior, caps)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_keyed(&self) -> bool {
        matches!(self.kind, NodeKind::Keyed { .. })
    }

    pub fn is_key_instance(&self) -> bool {
        self.kind == NodeKind::KeyInstance
    }

    pub fn key_name(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Keyed { key_name } => Some(key_name),
            _ => None,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.read().is_empty()
    }

    /// Insert `child` below `self`, replacing any previous child with the
    /// same name. Returns the inserted child for chaining.
    pub fn attach(&self, child: Arc<TreeNode>) -> Arc<TreeNode> {
        *child.parent.write() = self.this.clone();
        self.children
            .write()
            .insert(child.name.clone(), child.clone());
        child
    }

    /// Existing child by name, or a fresh interior node attached in place.
    pub fn interior_child(&self, name: &str) -> Arc<TreeNode> {
        if let Some(child) = self.children.read().get(name) {
            return child.clone();
        }
        self.attach(TreeNode::interior(name))
    }

    pub fn child(&self, name: &str) -> Option<Arc<TreeNode>> {
        self.children.read().get(name).cloned()
    }

    /// Children in deterministic (name-sorted) order.
    pub fn children_sorted(&self) -> Vec<Arc<TreeNode>> {
        let children = self.children.read();
        let mut names: Vec<&String> = children.keys().collect();
        names.sort();
        names.iter().map(|n| children[*n].clone()).collect()
    }

    /// Resolve `path` from this node.
    ///
    /// - An element name consumes one tree level.
    /// - On a keyed node, an element carrying the node's key descends into
    ///   the matching instance ("*" names the wildcard template). A trailing
    ///   element without a key addresses the keyed node itself; mid-path,
    ///   the missing key selects the wildcard template.
    /// - A `...` element stands for the remaining subtree: the node reached
    ///   so far is returned.
    /// - Anything that does not resolve returns None.
    pub fn find_node(&self, path: &Path) -> Option<Arc<TreeNode>> {
        let mut node = self.arc();
        let mut elems = path.elem.iter().peekable();
        while let Some(elem) = elems.next() {
            if elem.name == SUBTREE {
                return Some(node);
            }
            let next = node.children.read().get(&elem.name)?.clone();
            node = next;
            if node.is_keyed() {
                if elem.key.is_empty() {
                    if elems.peek().is_none() {
                        return Some(node);
                    }
                    let wildcard = node.children.read().get(crate::paths::WILDCARD)?.clone();
                    node = wildcard;
                } else {
                    if elem.key.len() != 1 {
                        return None;
                    }
                    let key_name = node.key_name()?;
                    let key_value = elem.key.get(key_name)?;
                    let instance = node.children.read().get(key_value)?.clone();
                    node = instance;
                }
            } else if !elem.key.is_empty() {
                return None;
            }
        }
        Some(node)
    }

    /// Rebuild the full path of this node by ascending to the root. Key
    /// instances fold into their parent's element as `[key=value]`.
    pub fn get_path(&self) -> Path {
        let mut chain: Vec<Arc<TreeNode>> = Vec::new();
        let mut node = Some(self.arc());
        while let Some(n) = node {
            let parent = n.parent.read().upgrade();
            if parent.is_some() || !n.name.is_empty() {
                chain.push(n.clone());
            }
            node = parent;
        }
        chain.reverse();

        let mut elems: Vec<PathElem> = Vec::with_capacity(chain.len());
        for n in &chain {
            match &n.kind {
                NodeKind::KeyInstance => {
                    // The preceding element is the keyed parent.
                    if let Some(last) = elems.last_mut() {
                        let key_name = n
                            .parent
                            .read()
                            .upgrade()
                            .and_then(|p| p.key_name().map(str::to_string))
                            .unwrap_or_default();
                        last.key.insert(key_name, n.name.clone());
                    }
                }
                _ => elems.push(PathElem {
                    name: n.name.clone(),
                    key: HashMap::new(),
                }),
            }
        }
        Path {
            elem: elems,
            ..Default::default()
        }
    }

    fn all_leaves(&self, pred: &dyn Fn(&NodeCapabilities) -> bool) -> bool {
        let children = self.children.read();
        if children.is_empty() {
            let caps = self.caps.read();
            // A bare structural node is not a data leaf; it satisfies every
            // capability predicate vacuously.
            let is_data_leaf = caps.supports_on_poll
                || caps.supports_on_timer
                || caps.supports_on_change;
            return !is_data_leaf || pred(&caps);
        }
        children.values().all(|c| c.all_leaves(pred))
    }

    pub fn all_subtree_leaves_support_on_poll(&self) -> bool {
        self.all_leaves(&|caps| caps.supports_on_poll)
    }

    pub fn all_subtree_leaves_support_on_timer(&self) -> bool {
        self.all_leaves(&|caps| caps.supports_on_timer)
    }

    pub fn all_subtree_leaves_support_on_change(&self) -> bool {
        self.all_leaves(&|caps| caps.supports_on_change)
    }

    fn collect_handlers(
        &self,
        select: &dyn Fn(&NodeCapabilities) -> Option<GnmiHandler>,
        out: &mut Vec<GnmiHandler>,
    ) {
        if let Some(handler) = select(&self.caps.read()) {
            out.push(handler);
            return;
        }
        for child in self.children_sorted() {
            child.collect_handlers(select, out);
        }
    }

    fn handler_for(
        &self,
        discipline: &'static str,
        select: &dyn Fn(&NodeCapabilities) -> Option<GnmiHandler>,
    ) -> Result<GnmiHandler, TelemetryError> {
        let mut handlers = Vec::new();
        self.collect_handlers(select, &mut handlers);
        match handlers.len() {
            0 => Err(TelemetryError::InvalidArgument(format!(
                "node '{}' has no {} handler",
                self.name, discipline
            ))),
            1 => Ok(handlers.remove(0)),
            // Interior node: fan the event to every leaf handler in
            // deterministic order. Leaf handlers ignore events that are not
            // theirs, so only the affected leaves write.
            _ => Ok(Arc::new(move |event, stream| {
                let handlers = handlers.clone();
                async move {
                    for handler in handlers {
                        handler(event.clone(), stream.clone()).await?;
                    }
                    Ok(())
                }
                .boxed()
            })),
        }
    }

    pub fn get_on_poll_handler(&self) -> Result<GnmiHandler, TelemetryError> {
        self.handler_for("on-poll", &|caps| caps.on_poll.clone())
    }

    pub fn get_on_timer_handler(&self) -> Result<GnmiHandler, TelemetryError> {
        self.handler_for("on-timer", &|caps| caps.on_timer.clone())
    }

    pub fn get_on_change_handler(&self) -> Result<GnmiHandler, TelemetryError> {
        self.handler_for("on-change", &|caps| caps.on_change.clone())
    }

    /// Rewrite `subscription` with the server-chosen mode for this node.
    /// The default is the identity.
    pub fn apply_target_defined_mode_to_subscription(
        &self,
        subscription: &mut Subscription,
    ) -> Result<(), TelemetryError> {
        let mode = self.caps.read().target_defined_mode.clone();
        match mode {
            Some(rewrite) => rewrite(subscription),
            None => Ok(()),
        }
    }

    /// Builder-style mutator; returns `self` for chaining.
    pub fn set_target_defined_mode(&self, rewrite: TargetDefinedModeFn) -> &Self {
        self.caps.write().target_defined_mode = Some(rewrite);
        self
    }

    pub fn set_capabilities(&self, caps: NodeCapabilities) {
        *self.caps.write() = caps;
    }

    /// Register `handle` with the registry of every event variant any node
    /// in this subtree declares interest in. Registries deduplicate, so a
    /// record lands at most once per variant.
    pub fn do_on_change_registration(
        &self,
        registries: &EventHandlerRegistries,
        handle: &SubscriptionHandle,
    ) {
        for kind in self.caps.read().registrations.iter() {
            registries.register(*kind, handle);
        }
        for child in self.children_sorted() {
            child.do_on_change_registration(registries, handle);
        }
    }
}

impl std::fmt::Debug for TreeNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeNode")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("children", &self.children.read().len())
            .finish()
    }
}

// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

// The management parse tree: wildcard templates built at construction,
// concrete per-port and per-chassis subtrees instantiated as configuration
// arrives. A single writer lock guards schema mutation and whole-tree
// actions; path resolution takes it shared.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use gneiss_hal::data::{Chassis, DeviceConfig, NodeConfig, SingletonPort};
use gneiss_hal::switch::SwitchInterface;
use gneiss_proto::api::gnmi::Path;

use crate::errors::TelemetryError;
use crate::node::TreeNode;
use crate::paths::{path_to_string, WILDCARD};
use crate::schema;

pub struct ParseTree {
    root: Arc<TreeNode>,
    switch: Arc<dyn SwitchInterface>,
    root_lock: RwLock<()>,
}

impl ParseTree {
    /// Build the static schema. The root lives for the whole process;
    /// subtrees only ever get added.
    pub fn new(switch: Arc<dyn SwitchInterface>) -> Self {
        let root = TreeNode::root();
        schema::build_static_schema(&root, &switch);
        Self {
            root,
            switch,
            root_lock: RwLock::new(()),
        }
    }

    pub fn root(&self) -> &Arc<TreeNode> {
        &self.root
    }

    pub fn find_node(&self, path: &Path) -> Option<Arc<TreeNode>> {
        let _guard = self.root_lock.read();
        self.root.find_node(path)
    }

    /// Instantiate the interfaces, ethernet, lacp, and qos subtrees for one
    /// port. Re-adding a port name replaces its subtrees in place.
    pub fn add_subtree_interface_from_singleton(
        &self,
        port: &SingletonPort,
        node_config: &NodeConfig,
    ) {
        let _guard = self.root_lock.write();
        debug!(port = %port.name, node_id = port.node_id, "adding interface subtrees");
        schema::add_interface_subtrees(&self.root, &self.switch, port, node_config);
    }

    /// Instantiate the chassis component subtree.
    pub fn add_subtree_chassis(&self, chassis: &Chassis) {
        let _guard = self.root_lock.write();
        debug!(chassis = %chassis.name, "adding chassis subtree");
        schema::add_chassis_subtree(&self.root, &self.switch, chassis);
    }

    /// Rebuild the dynamic subtrees from a pushed device configuration.
    pub fn process_pushed_config(&self, config: &DeviceConfig) {
        for port in &config.ports {
            let node_config = config.node_config(port.node_id);
            self.add_subtree_interface_from_singleton(port, &node_config);
        }
        if !config.chassis.name.is_empty() {
            self.add_subtree_chassis(&config.chassis);
        }
    }

    /// Invoke `action` on the node at `subpath` beneath every concrete
    /// (non-wildcard) instance matching `base_path`. The first non-OK status
    /// short-circuits. Instances missing the subpath are skipped.
    pub fn perform_action_for_all_non_wildcard_nodes(
        &self,
        base_path: &Path,
        subpath: &Path,
        action: &dyn Fn(&Arc<TreeNode>) -> Result<(), TelemetryError>,
    ) -> Result<(), TelemetryError> {
        let _guard = self.root_lock.write();
        let base = self.root.find_node(base_path).ok_or_else(|| {
            TelemetryError::InvalidArgument(format!(
                "unsupported path: {}",
                path_to_string(base_path)
            ))
        })?;
        for child in base.children_sorted() {
            if !child.is_key_instance() || child.name() == WILDCARD {
                continue;
            }
            if let Some(node) = child.find_node(subpath) {
                action(&node)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use gneiss_hal::mock::MockSwitch;
    use gneiss_proto::api::gnmi::{Subscription, SubscriptionMode};

    use crate::paths::PathBuilder;

    fn tree() -> ParseTree {
        ParseTree::new(Arc::new(MockSwitch::new()))
    }

    fn add_interface(tree: &ParseTree, name: &str) {
        let port = SingletonPort {
            name: name.to_string(),
            node_id: 3,
            port_id: 3,
            speed_bps: 25_000_000_000,
        };
        let node_config = NodeConfig {
            qos_configs: vec![gneiss_hal::data::QosQueueConfig {
                queue_id: 0,
                purpose: "BE1".to_string(),
            }],
        };
        tree.add_subtree_interface_from_singleton(&port, &node_config);
    }

    #[test]
    fn test_static_schema_predicates() {
        let tree = tree();
        let root = tree.root();
        assert!(root.all_subtree_leaves_support_on_poll());
        assert!(root.all_subtree_leaves_support_on_change());
        // ifindex and name leaves never support the timer discipline.
        assert!(!root.all_subtree_leaves_support_on_timer());
    }

    #[test]
    fn test_wildcard_resolves_concrete_does_not_until_added() {
        let tree = tree();
        let wildcard = PathBuilder::new()
            .elem("interfaces")
            .keyed_elem("interface", "name", "*")
            .elem("state")
            .elem("ifindex")
            .build();
        assert!(tree.find_node(&wildcard).is_some());

        let concrete = PathBuilder::new()
            .elem("interfaces")
            .keyed_elem("interface", "name", "interface-1")
            .elem("state")
            .elem("ifindex")
            .build();
        assert!(tree.find_node(&concrete).is_none());

        add_interface(&tree, "interface-1");
        assert!(tree.find_node(&concrete).is_some());
    }

    #[test]
    fn test_perform_action_none_present() {
        let tree = tree();
        let count = Mutex::new(0);
        tree.perform_action_for_all_non_wildcard_nodes(
            &PathBuilder::new().elem("interfaces").elem("interface").build(),
            &PathBuilder::new().elem("state").elem("ifindex").build(),
            &|_leaf| {
                *count.lock().unwrap() += 1;
                Ok(())
            },
        )
        .unwrap();
        assert_eq!(*count.lock().unwrap(), 0);
    }

    #[test]
    fn test_perform_action_one_present() {
        let tree = tree();
        add_interface(&tree, "interface-1");

        let paths = Mutex::new(Vec::new());
        tree.perform_action_for_all_non_wildcard_nodes(
            &PathBuilder::new().elem("interfaces").elem("interface").build(),
            &PathBuilder::new().elem("state").elem("ifindex").build(),
            &|leaf| {
                paths.lock().unwrap().push(path_to_string(&leaf.get_path()));
                Ok(())
            },
        )
        .unwrap();

        assert_eq!(
            *paths.lock().unwrap(),
            vec!["/interfaces/interface[name=interface-1]/state/ifindex".to_string()]
        );
    }

    #[test]
    fn test_perform_action_short_circuits() {
        let tree = tree();
        add_interface(&tree, "interface-1");
        add_interface(&tree, "interface-2");

        let count = Mutex::new(0);
        let err = tree.perform_action_for_all_non_wildcard_nodes(
            &PathBuilder::new().elem("interfaces").elem("interface").build(),
            &PathBuilder::new().elem("state").elem("ifindex").build(),
            &|_leaf| {
                *count.lock().unwrap() += 1;
                Err(TelemetryError::Internal("stop".to_string()))
            },
        );
        assert!(err.is_err());
        assert_eq!(*count.lock().unwrap(), 1);
    }

    #[test]
    fn test_counters_target_defined_mode_is_sample() {
        let tree = tree();
        add_interface(&tree, "interface-1");

        let counters = tree
            .find_node(
                &PathBuilder::new()
                    .elem("interfaces")
                    .keyed_elem("interface", "name", "interface-1")
                    .elem("state")
                    .elem("counters")
                    .build(),
            )
            .unwrap();

        let mut sub = Subscription::default();
        counters
            .apply_target_defined_mode_to_subscription(&mut sub)
            .unwrap();
        assert_eq!(sub.mode, SubscriptionMode::Sample as i32);
        assert_eq!(sub.sample_interval, 10_000);
    }

    #[test]
    fn test_other_leaves_keep_default_mode() {
        let tree = tree();
        add_interface(&tree, "interface-1");

        let leaf = tree
            .find_node(
                &PathBuilder::new()
                    .elem("interfaces")
                    .keyed_elem("interface", "name", "interface-1")
                    .elem("state")
                    .elem("oper-status")
                    .build(),
            )
            .unwrap();

        let mut sub = Subscription::default();
        leaf.apply_target_defined_mode_to_subscription(&mut sub).unwrap();
        assert_ne!(sub.mode, SubscriptionMode::Sample as i32);
    }

    #[test]
    fn test_readding_port_replaces_subtree() {
        let tree = tree();
        add_interface(&tree, "interface-1");
        let first = tree
            .find_node(
                &PathBuilder::new()
                    .elem("interfaces")
                    .keyed_elem("interface", "name", "interface-1")
                    .build(),
            )
            .unwrap();

        add_interface(&tree, "interface-1");
        let second = tree
            .find_node(
                &PathBuilder::new()
                    .elem("interfaces")
                    .keyed_elem("interface", "name", "interface-1")
                    .build(),
            )
            .unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_process_pushed_config_builds_subtrees() {
        let tree = tree();
        let config = DeviceConfig {
            chassis: Chassis {
                name: "chassis-1".to_string(),
            },
            ports: vec![SingletonPort {
                name: "port-1".to_string(),
                node_id: 1,
                port_id: 7,
                speed_bps: 100_000_000_000,
            }],
            node_configs: vec![],
        };
        tree.process_pushed_config(&config);

        assert!(tree
            .find_node(
                &PathBuilder::new()
                    .elem("interfaces")
                    .keyed_elem("interface", "name", "port-1")
                    .elem("state")
                    .elem("oper-status")
                    .build()
            )
            .is_some());
        assert!(tree
            .find_node(
                &PathBuilder::new()
                    .elem("components")
                    .keyed_elem("component", "name", "chassis-1")
                    .elem("chassis")
                    .elem("alarms")
                    .elem("memory-error")
                    .build()
            )
            .is_some());
    }
}

//! Builds a [`Platform`](super::Platform) arena from a parsed
//! [`PlatformDescription`] and [`TypeLibrary`], grounded on
//! `ModelBuilder.build_resource`'s recursive expansion of `number`
//! multipliers at each tree level.

use crate::error::{Error, Result};
use crate::loader::platform::{ClusterDescription, NodeDescription, PlatformDescription, TypeLibrary};
use crate::platform::contention::PowerConstants;
use crate::platform::{CoreLeaf, NodeKind, PoolLeaf, ResourceNode};
use crate::platform::{ContentionKind, Platform, PowerKind};

pub fn build(description: &PlatformDescription, library: &TypeLibrary) -> Result<Platform> {
    let mut nodes = Vec::new();
    let root = ResourceNode { id: description.id.clone(), parent: None, children: vec![], kind: NodeKind::Inner };
    nodes.push(root);

    for cluster in &description.clusters {
        for i in 0..cluster.number {
            let cluster_idx = push_inner(&mut nodes, 0, format!("{}{}", cluster.id, i));
            build_cluster_children(&mut nodes, cluster_idx, cluster, library)?;
        }
    }

    Ok(Platform::from_nodes(nodes))
}

fn push_inner(nodes: &mut Vec<ResourceNode>, parent: usize, id: String) -> usize {
    let idx = nodes.len();
    nodes.push(ResourceNode { id, parent: Some(parent), children: vec![], kind: NodeKind::Inner });
    nodes[parent].children.push(idx);
    idx
}

fn build_cluster_children(
    nodes: &mut Vec<ResourceNode>,
    cluster_idx: usize,
    cluster: &ClusterDescription,
    library: &TypeLibrary,
) -> Result<()> {
    for node_desc in &cluster.nodes {
        for i in 0..node_desc.number {
            let node_id = format!("{}{}", node_desc.id, i);
            build_node(nodes, cluster_idx, node_id, node_desc, library)?;
        }
    }
    Ok(())
}

fn build_node(
    nodes: &mut Vec<ResourceNode>,
    parent: usize,
    id: String,
    desc: &NodeDescription,
    library: &TypeLibrary,
) -> Result<()> {
    if !desc.processors.is_empty() {
        // model v1: node is a pure inner node owning typed processors
        let node_idx = push_inner(nodes, parent, id);
        for proc_desc in &desc.processors {
            let proc_type = library
                .processor
                .get(&proc_desc.type_name)
                .ok_or_else(|| Error::config(format!("unknown processor type {:?}", proc_desc.type_name)))?;
            for i in 0..proc_desc.number {
                let proc_id = format!("{}{}", proc_desc.id, i);
                let proc_idx = nodes.len();
                nodes.push(ResourceNode {
                    id: proc_id,
                    parent: Some(node_idx),
                    children: vec![],
                    kind: NodeKind::Processor(proc_type.smootherstep()),
                });
                nodes[node_idx].children.push(proc_idx);

                for c in 0..proc_type.cores {
                    let core_idx = nodes.len();
                    nodes.push(ResourceNode {
                        id: format!("core{}", c),
                        parent: Some(proc_idx),
                        children: vec![],
                        kind: NodeKind::CoreLeaf(CoreLeaf {
                            mops_per_core: proc_type.mops_per_core(),
                            constants: proc_type.smootherstep(),
                            power: proc_type.power(),
                            task: None,
                            speedup: 1.0,
                        }),
                    });
                    nodes[proc_idx].children.push(core_idx);
                }
            }
        }
        return Ok(());
    }

    let type_name = desc
        .type_name
        .as_ref()
        .ok_or_else(|| Error::config(format!("node {:?} has neither processors nor a leaf type", id)))?;
    let node_type = library
        .node
        .get(type_name)
        .ok_or_else(|| Error::config(format!("unknown node type {:?}", type_name)))?;

    let (contention, power, dynamic_power, static_power, min_power) = match node_type {
        crate::loader::platform::NodeType::Smootherstep {
            dynamic_power, static_power, min_power, b, c, da, db, dc, dd, ..
        } => (
            ContentionKind::Smootherstep(crate::platform::contention::SmootherstepConstants {
                b: *b, c: *c, da: *da, db: *db, dc: *dc, dd: *dd,
            }),
            PowerKind::ThreeState(PowerConstants {
                dynamic_power: *dynamic_power,
                static_power: *static_power,
                min_power: *min_power,
            }),
            *dynamic_power,
            *static_power,
            *min_power,
        ),
        crate::loader::platform::NodeType::Sigmoid { .. } => (
            ContentionKind::Sigmoid(node_type.sigmoid_constants().unwrap()),
            PowerKind::Quadratic(node_type.quadratic_power().unwrap()),
            0.0,
            0.0,
            0.0,
        ),
    };

    let idx = nodes.len();
    nodes.push(ResourceNode {
        id,
        parent: Some(parent),
        children: vec![],
        kind: NodeKind::PoolLeaf(PoolLeaf {
            cores: node_type.cores(),
            gops: node_type.gops(),
            contention,
            power,
            dynamic_power,
            static_power,
            min_power,
            processes: vec![],
        }),
    });
    nodes[parent].children.push(idx);
    Ok(())
}

//! Resource tree: an arena-plus-indices rewrite of the reference's
//! parent/child object graph (spec.md §9 "Cyclic parent/child resource
//! graph"). Grounded on `platform/Resource.py` (structural walk methods)
//! and `models/modelV1/{Processor,Core,Node}.py` /
//! `models/modelV1_1/Node.py` (contention + power bookkeeping).

pub mod builder;
pub mod contention;

use crate::error::{Error, Result};
use crate::time::{Duration, Time};
use contention::{PowerConstants, QuadraticPowerConstants, SigmoidConstants, SmootherstepConstants};

pub type ResourceIndex = usize;
pub type ResourcePath = [String];

/// Scalar values a leaf needs to track a running task without owning it;
/// copied in at `schedule`, mutated locally by `advance`, discarded at
/// `reap`. See spec.md §9: "a non-owning reference... valid only between
/// schedule and reap".
#[derive(Debug, Clone, Copy)]
pub struct TaskRuntime {
    pub job_id: u64,
    pub task_id: usize,
    pub remaining_ops: f64,
    pub memory_volume: f64,
    pub memory: f64,
}

/// Per-task throughput progress reported by a completed `advance` call, to
/// be applied onto the authoritative `Task` held by the job queue.
#[derive(Debug, Clone, Copy)]
pub struct Progress {
    pub job_id: u64,
    pub task_id: usize,
    pub delta_ops: f64,
}

/// A leaf finished its task (`remaining_ops` reached zero) during the last
/// `advance`; the simulator must `reap` it and sync the job queue.
#[derive(Debug, Clone)]
pub struct Completion {
    pub path: Vec<String>,
    pub job_id: u64,
    pub task_id: usize,
}

/// Aggregate view of a schedulable node (the unit a workload manager
/// places a whole job's tasks onto), used by the node-selection
/// strategies of `Heuristic`/`Backfill`/`Energy`.
#[derive(Debug, Clone)]
pub struct NodeSummary {
    pub path: Vec<String>,
    pub total_cores: u32,
    pub idle_cores: u32,
    pub mops_per_core: f64,
    pub clock_rate: f64,
    pub static_power: f64,
    pub dynamic_power: f64,
    pub requested_bw: f64,
}

#[derive(Debug, Clone, Copy)]
pub enum ContentionKind {
    Smootherstep(SmootherstepConstants),
    Sigmoid(SigmoidConstants),
}

#[derive(Debug, Clone, Copy)]
pub enum PowerKind {
    ThreeState(PowerConstants),
    Quadratic(QuadraticPowerConstants),
}

/// Model v1 leaf: exactly one task slot.
#[derive(Debug, Clone)]
pub struct CoreLeaf {
    pub mops_per_core: f64,
    pub constants: SmootherstepConstants,
    pub power: PowerConstants,
    pub task: Option<TaskRuntime>,
    pub speedup: f64,
}

impl CoreLeaf {
    fn requested_bw(&self) -> f64 {
        match &self.task {
            Some(t) if t.remaining_ops > 0.0 => {
                t.memory_volume / (t.remaining_ops / (self.mops_per_core * 1e6))
            }
            _ => 0.0,
        }
    }
}

/// Model v1_1/v2 leaf: a node-wide pool of up to `cores` concurrent tasks.
#[derive(Debug, Clone)]
pub struct PoolLeaf {
    pub cores: u32,
    pub gops: f64,
    pub contention: ContentionKind,
    pub power: PowerKind,
    pub dynamic_power: f64,
    pub static_power: f64,
    pub min_power: f64,
    pub processes: Vec<(TaskRuntime, f64)>,
}

impl PoolLeaf {
    fn requested_bw(&self, t: &TaskRuntime) -> f64 {
        if t.remaining_ops <= 0.0 {
            return 0.0;
        }
        t.memory_volume / (t.remaining_ops / (self.gops * 1e9))
    }

    fn aggregate_bw(&self) -> f64 {
        self.processes.iter().map(|(t, _)| self.requested_bw(t)).sum()
    }

    fn update_speedups(&mut self) {
        let all_bw = self.aggregate_bw();
        let own_bws: Vec<f64> = self.processes.iter().map(|(t, _)| self.requested_bw(t)).collect();
        let others = self.processes.len().saturating_sub(1);
        for (i, (_, speedup)) in self.processes.iter_mut().enumerate() {
            *speedup = match self.contention {
                ContentionKind::Smootherstep(k) => k.speedup(all_bw, own_bws[i], others),
                ContentionKind::Sigmoid(k) => k.speedup(all_bw, own_bws[i], others),
            };
        }
    }
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Inner,
    Processor(SmootherstepConstants),
    CoreLeaf(CoreLeaf),
    PoolLeaf(PoolLeaf),
}

#[derive(Debug, Clone)]
pub struct ResourceNode {
    pub id: String,
    pub parent: Option<ResourceIndex>,
    pub children: Vec<ResourceIndex>,
    pub kind: NodeKind,
}

impl ResourceNode {
    fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::CoreLeaf(_) | NodeKind::PoolLeaf(_))
    }
}

/// The whole resource tree, owned exclusively by the `Platform`. Index 0
/// is always the root.
pub struct Platform {
    nodes: Vec<ResourceNode>,
}

impl Platform {
    pub(crate) fn from_nodes(nodes: Vec<ResourceNode>) -> Self {
        Platform { nodes }
    }

    /// Whether the leaf at `path` has a free task slot. For a v1 core
    /// that means idle; for a v1_1/v2 pool node, any slot still open.
    pub fn idle_at(&self, path: &ResourcePath) -> bool {
        match self.resolve(path) {
            Ok(idx) => match &self.nodes[idx].kind {
                NodeKind::CoreLeaf(leaf) => leaf.task.is_none(),
                NodeKind::PoolLeaf(leaf) => (leaf.processes.len() as u32) < leaf.cores,
                _ => false,
            },
            Err(_) => false,
        }
    }

    fn find_child(&self, parent: ResourceIndex, id: &str) -> Result<ResourceIndex> {
        self.nodes[parent]
            .children
            .iter()
            .copied()
            .find(|&c| self.nodes[c].id == id)
            .ok_or_else(|| Error::unknown_child(&[self.nodes[parent].id.clone(), id.to_string()]))
    }

    fn resolve(&self, path: &ResourcePath) -> Result<ResourceIndex> {
        let mut cur = 0usize;
        for segment in path {
            cur = self.find_child(cur, segment)?;
        }
        Ok(cur)
    }

    /// Paths of every leaf, root excluded (a path is resolved by walking
    /// children from the root, so the root's own id never appears in it).
    pub fn enumerate_ids(&self) -> Vec<Vec<String>> {
        fn walk(p: &Platform, idx: ResourceIndex, prefix: &mut Vec<String>, out: &mut Vec<Vec<String>>) {
            if p.nodes[idx].is_leaf() {
                out.push(prefix.clone());
                return;
            }
            for &c in &p.nodes[idx].children {
                prefix.push(p.nodes[c].id.clone());
                walk(p, c, prefix, out);
                prefix.pop();
            }
        }
        let mut out = Vec::new();
        let mut prefix = Vec::new();
        walk(self, 0, &mut prefix, &mut out);
        out
    }

    pub fn leaf_indices(&self) -> Vec<ResourceIndex> {
        self.nodes.iter().enumerate().filter(|(_, n)| n.is_leaf()).map(|(i, _)| i).collect()
    }

    pub fn leaf_path(&self, mut idx: ResourceIndex) -> Vec<String> {
        let mut rev = Vec::new();
        while let Some(parent) = self.nodes[idx].parent {
            rev.push(self.nodes[idx].id.clone());
            idx = parent;
        }
        rev.reverse();
        rev
    }

    /// Nodes at the granularity a workload manager schedules onto: the
    /// processor-owning inner node in v1, or the pool leaf itself in
    /// v1_1/v2. One core (v1) or one pool slot (v1_1/v2) hosts one task.
    pub fn schedulable_nodes(&self) -> Vec<NodeSummary> {
        let mut out = Vec::new();
        for (idx, node) in self.nodes.iter().enumerate() {
            match &node.kind {
                NodeKind::PoolLeaf(leaf) => out.push(NodeSummary {
                    path: self.leaf_path(idx),
                    total_cores: leaf.cores,
                    idle_cores: leaf.cores - leaf.processes.len() as u32,
                    mops_per_core: leaf.gops * 1e3,
                    clock_rate: leaf.gops,
                    static_power: leaf.static_power,
                    dynamic_power: leaf.dynamic_power,
                    requested_bw: leaf.aggregate_bw(),
                }),
                NodeKind::Inner if self.owns_processors(idx) => {
                    let (total, idle, mops, clock, static_power, dynamic_power, bw) = self.processor_node_stats(idx);
                    out.push(NodeSummary {
                        path: self.leaf_path(idx),
                        total_cores: total,
                        idle_cores: idle,
                        mops_per_core: mops,
                        clock_rate: clock,
                        static_power,
                        dynamic_power,
                        requested_bw: bw,
                    });
                }
                _ => {}
            }
        }
        out
    }

    fn owns_processors(&self, idx: ResourceIndex) -> bool {
        self.nodes[idx]
            .children
            .first()
            .map(|&c| matches!(self.nodes[c].kind, NodeKind::Processor(_)))
            .unwrap_or(false)
    }

    #[allow(clippy::type_complexity)]
    fn processor_node_stats(&self, idx: ResourceIndex) -> (u32, u32, f64, f64, f64, f64, f64) {
        let mut total = 0u32;
        let mut idle = 0u32;
        let mut mops = 0.0;
        let mut clock = 0.0;
        let mut static_power = 0.0;
        let mut dynamic_power = 0.0;
        let mut bw = 0.0;
        for &proc_idx in &self.nodes[idx].children {
            for &core_idx in &self.nodes[proc_idx].children {
                if let NodeKind::CoreLeaf(leaf) = &self.nodes[core_idx].kind {
                    total += 1;
                    mops = leaf.mops_per_core;
                    clock = leaf.mops_per_core / 1e3;
                    static_power = leaf.power.static_power;
                    dynamic_power = leaf.power.dynamic_power;
                    bw += leaf.requested_bw();
                    if leaf.task.is_none() {
                        idle += 1;
                    }
                }
            }
        }
        (total, idle, mops, clock, static_power, dynamic_power, bw)
    }

    /// Path of the schedulable node that owns the leaf at `path` (itself,
    /// for v1_1/v2; its processor's parent, for v1).
    pub fn owning_node_path(&self, path: &ResourcePath) -> Result<Vec<String>> {
        let idx = self.resolve(path)?;
        let owner = match &self.nodes[idx].kind {
            NodeKind::PoolLeaf(_) => idx,
            NodeKind::CoreLeaf(_) => self.nodes[self.nodes[idx].parent.ok_or_else(|| Error::unknown_child(path))?]
                .parent
                .ok_or_else(|| Error::unknown_child(path))?,
            _ => return Err(Error::unknown_child(path)),
        };
        Ok(self.leaf_path(owner))
    }

    /// Idle leaf slots under the schedulable node at `node_path`, in a
    /// stable order (lowest core/processor id first).
    pub fn idle_slots(&self, node_path: &ResourcePath) -> Result<Vec<Vec<String>>> {
        let idx = self.resolve(node_path)?;
        let mut out = Vec::new();
        match &self.nodes[idx].kind {
            NodeKind::PoolLeaf(leaf) => {
                for _ in 0..(leaf.cores - leaf.processes.len() as u32) {
                    out.push(self.leaf_path(idx));
                }
            }
            NodeKind::Inner => {
                for &proc_idx in &self.nodes[idx].children {
                    for &core_idx in &self.nodes[proc_idx].children {
                        if let NodeKind::CoreLeaf(leaf) = &self.nodes[core_idx].kind {
                            if leaf.task.is_none() {
                                out.push(self.leaf_path(core_idx));
                            }
                        }
                    }
                }
            }
            _ => return Err(Error::unknown_child(node_path)),
        }
        Ok(out)
    }

    /// Places a task on the leaf addressed by `path`. `ops`, `memory_volume`
    /// and `memory` are the scalars the leaf needs to compute contention
    /// and throughput without owning the `Task`.
    pub fn schedule(
        &mut self,
        path: &ResourcePath,
        job_id: u64,
        task_id: usize,
        ops: f64,
        memory_volume: f64,
        memory: f64,
    ) -> Result<()> {
        let idx = self.resolve(path)?;
        let runtime = TaskRuntime {
            job_id,
            task_id,
            remaining_ops: ops,
            memory_volume,
            memory,
        };
        match &mut self.nodes[idx].kind {
            NodeKind::CoreLeaf(leaf) => {
                if leaf.task.is_some() {
                    return Err(Error::already_occupied(path));
                }
                leaf.task = Some(runtime);
            }
            NodeKind::PoolLeaf(leaf) => {
                if leaf.processes.len() as u32 >= leaf.cores {
                    return Err(Error::already_occupied(path));
                }
                leaf.processes.push((runtime, 1.0));
                leaf.update_speedups();
            }
            _ => return Err(Error::unknown_child(path)),
        }
        if let NodeKind::CoreLeaf(_) = &self.nodes[idx].kind {
            self.recompute_processor_speedups(idx);
        }
        Ok(())
    }

    pub fn reap(&mut self, path: &ResourcePath, job_id: u64, task_id: usize) -> Result<()> {
        let idx = self.resolve(path)?;
        match &mut self.nodes[idx].kind {
            NodeKind::CoreLeaf(leaf) => match &leaf.task {
                Some(t) if t.job_id == job_id && t.task_id == task_id => {
                    leaf.task = None;
                }
                _ => return Err(Error::not_placed(path)),
            },
            NodeKind::PoolLeaf(leaf) => {
                let before = leaf.processes.len();
                leaf.processes.retain(|(t, _)| !(t.job_id == job_id && t.task_id == task_id));
                if leaf.processes.len() == before {
                    return Err(Error::not_placed(path));
                }
                leaf.update_speedups();
            }
            _ => return Err(Error::unknown_child(path)),
        }
        if let NodeKind::CoreLeaf(_) = &self.nodes[idx].kind {
            self.recompute_processor_speedups(idx);
        }
        Ok(())
    }

    fn recompute_processor_speedups(&mut self, leaf_idx: ResourceIndex) {
        let Some(proc_idx) = self.nodes[leaf_idx].parent else { return };
        let constants = match self.nodes[proc_idx].kind {
            NodeKind::Processor(k) => k,
            _ => return,
        };
        let children = self.nodes[proc_idx].children.clone();
        let aggregate_bw: f64 = children
            .iter()
            .filter_map(|&c| match &self.nodes[c].kind {
                NodeKind::CoreLeaf(leaf) => Some(leaf.requested_bw()),
                _ => None,
            })
            .sum();
        let running = children
            .iter()
            .filter(|&&c| matches!(&self.nodes[c].kind, NodeKind::CoreLeaf(l) if l.task.is_some()))
            .count();
        for &c in &children {
            if let NodeKind::CoreLeaf(leaf) = &mut self.nodes[c].kind {
                if leaf.task.is_some() {
                    let own_bw = leaf.requested_bw();
                    let siblings = running.saturating_sub(1);
                    leaf.speedup = constants.speedup(aggregate_bw, own_bw, siblings);
                } else {
                    leaf.speedup = 1.0;
                }
            }
        }
    }

    /// Minimum time until any running leaf completes, or +∞ if idle.
    pub fn next_step(&self) -> Duration {
        let mut best = Duration::infinite();
        for node in &self.nodes {
            let candidate = match &node.kind {
                NodeKind::CoreLeaf(leaf) => match &leaf.task {
                    Some(t) if t.remaining_ops > 0.0 => {
                        Duration(t.remaining_ops / (leaf.mops_per_core * 1e6 * leaf.speedup))
                    }
                    _ => Duration::infinite(),
                },
                NodeKind::PoolLeaf(leaf) => leaf
                    .processes
                    .iter()
                    .map(|(t, speedup)| Duration(t.remaining_ops / (leaf.gops * 1e9 * speedup)))
                    .fold(Duration::infinite(), Duration::min),
                _ => Duration::infinite(),
            };
            best = best.min(candidate);
        }
        best
    }

    /// Advances every leaf by `dt`, returning the per-task ops consumed
    /// (for the caller to apply to the authoritative `Task`) and the list
    /// of leaves whose task just finished.
    pub fn advance(&mut self, dt: Duration) -> (Vec<Progress>, Vec<Completion>) {
        let mut progress = Vec::new();
        let mut completions = Vec::new();
        let leaf_indices = self.leaf_indices();
        for idx in leaf_indices {
            match &mut self.nodes[idx].kind {
                NodeKind::CoreLeaf(leaf) => {
                    if let Some(t) = &mut leaf.task {
                        if t.remaining_ops > 0.0 {
                            let delta_ops = leaf.mops_per_core * 1e6 * leaf.speedup * dt.0;
                            t.remaining_ops = (t.remaining_ops - delta_ops.floor()).max(0.0);
                            progress.push(Progress {
                                job_id: t.job_id,
                                task_id: t.task_id,
                                delta_ops,
                            });
                            if t.remaining_ops <= 0.0 {
                                completions.push((idx, t.job_id, t.task_id));
                            }
                        }
                    }
                }
                NodeKind::PoolLeaf(leaf) => {
                    for (t, speedup) in &mut leaf.processes {
                        if t.remaining_ops > 0.0 {
                            let delta_ops = leaf.gops * 1e9 * *speedup * dt.0;
                            t.remaining_ops = (t.remaining_ops - delta_ops.floor()).max(0.0);
                            progress.push(Progress {
                                job_id: t.job_id,
                                task_id: t.task_id,
                                delta_ops,
                            });
                            if t.remaining_ops <= 0.0 {
                                completions.push((idx, t.job_id, t.task_id));
                            }
                        }
                    }
                }
                _ => {}
            }
        }
        let completions = completions
            .into_iter()
            .map(|(idx, job_id, task_id)| Completion {
                path: self.leaf_path(idx),
                job_id,
                task_id,
            })
            .collect();
        (progress, completions)
    }

    /// Sum of instantaneous power across every leaf, times `dt`.
    pub fn joules(&self, dt: Duration) -> f64 {
        let mut total = 0.0;
        for node in &self.nodes {
            total += match &node.kind {
                NodeKind::CoreLeaf(leaf) => match &leaf.task {
                    Some(_) => leaf.power.running(),
                    None => self.neighbour_or_idle(node, leaf),
                },
                NodeKind::PoolLeaf(leaf) => match &leaf.power {
                    PowerKind::ThreeState(p) => {
                        let n = leaf.processes.len();
                        if n == 0 {
                            p.idle()
                        } else {
                            leaf.dynamic_power * n as f64 + leaf.static_power * leaf.cores as f64
                        }
                    }
                    PowerKind::Quadratic(p) => {
                        p.power(leaf.aggregate_bw(), leaf.processes.len(), leaf.cores as f64) * leaf.cores as f64
                    }
                },
                _ => 0.0,
            };
        }
        total * dt.0
    }

    fn neighbour_or_idle(&self, node: &ResourceNode, leaf: &CoreLeaf) -> f64 {
        let sibling_running = node
            .parent
            .map(|p| {
                self.nodes[p].children.iter().any(|&c| {
                    matches!(&self.nodes[c].kind, NodeKind::CoreLeaf(l) if l.task.is_some())
                })
            })
            .unwrap_or(false);
        if sibling_running {
            leaf.power.neighbour_running()
        } else {
            leaf.power.idle()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contention::PowerConstants;

    fn single_core_platform() -> Platform {
        let core = ResourceNode {
            id: "core0".into(),
            parent: Some(2),
            children: vec![],
            kind: NodeKind::CoreLeaf(CoreLeaf {
                mops_per_core: 1000.0,
                constants: SmootherstepConstants { b: 0.1, c: 10.0, da: 8.0, db: 1.0, dc: 20.0, dd: 1.0 },
                power: PowerConstants { dynamic_power: 100.0, static_power: 50.0, min_power: 0.05 },
                task: None,
                speedup: 1.0,
            }),
        };
        let proc = ResourceNode {
            id: "proc0".into(),
            parent: Some(1),
            children: vec![3],
            kind: NodeKind::Processor(SmootherstepConstants { b: 0.1, c: 10.0, da: 8.0, db: 1.0, dc: 20.0, dd: 1.0 }),
        };
        let node = ResourceNode { id: "node0".into(), parent: Some(0), children: vec![2], kind: NodeKind::Inner };
        let root = ResourceNode { id: "platform".into(), parent: None, children: vec![1], kind: NodeKind::Inner };
        // pushed in root, node, proc, core order so indices are 0..3 respectively
        Platform::from_nodes(vec![root, node, proc, core])
    }

    #[test]
    fn scenario_single_core_single_job_matches_spec_numbers() {
        let mut p = single_core_platform();
        let path = vec!["node0".to_string(), "proc0".to_string(), "core0".to_string()];
        p.schedule(&path, 0, 0, 1.0e9, 0.0, 0.0).unwrap();
        assert_eq!(p.next_step(), Duration(1.0));
        let (_progress, completions) = p.advance(Duration(1.0));
        assert_eq!(completions.len(), 1);
        let energy = p.joules(Duration(1.0));
        assert_eq!(energy, 150.0);
        p.reap(&path, 0, 0).unwrap();
        assert_eq!(p.joules(Duration(1.0)), 2.5);
    }

    #[test]
    fn reaping_a_mismatched_task_is_an_error() {
        let mut p = single_core_platform();
        let path = vec!["node0".to_string(), "proc0".to_string(), "core0".to_string()];
        p.schedule(&path, 0, 0, 1.0e9, 0.0, 0.0).unwrap();
        assert!(p.reap(&path, 1, 0).is_err());
    }
}

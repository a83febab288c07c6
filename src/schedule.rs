//! Deterministic topological scheduling and the compiled schedule artifact.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use crate::alloc::{LifetimeInterval, SlotIndex};
use crate::error::CompileWarning;
use crate::pass::PassId;
use crate::resource::{ResourceId, ResourceKind};
use crate::tracker::Transition;

/// Compute a topological order over the validated dependency edges.
///
/// Kahn's algorithm over in-degree. Ties between ready passes are broken by
/// registration order (lowest [`PassId`] first), so the same declarations
/// always compile to the same schedule. The caller has already rejected
/// cycles; this asserts the invariant rather than re-reporting it.
pub(crate) fn topological_order(
    pass_count: usize,
    edges: &[(PassId, PassId)],
) -> Vec<PassId> {
    let mut in_degree = vec![0usize; pass_count];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); pass_count];
    for &(dependent, dependency) in edges {
        in_degree[dependent.index()] += 1;
        dependents[dependency.index()].push(dependent.index());
    }

    let mut ready: BinaryHeap<Reverse<usize>> = (0..pass_count)
        .filter(|&i| in_degree[i] == 0)
        .map(Reverse)
        .collect();

    let mut order = Vec::with_capacity(pass_count);
    while let Some(Reverse(index)) = ready.pop() {
        order.push(PassId(index as u32));
        for &dependent in &dependents[index] {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                ready.push(Reverse(dependent));
            }
        }
    }

    debug_assert_eq!(order.len(), pass_count, "cycle survived validation");
    order
}

/// One step of the compiled schedule: the transitions to apply, then the
/// pass to run.
#[derive(Debug, Clone)]
pub struct ScheduleStep {
    pub(crate) pass: PassId,
    pub(crate) transitions: Vec<Transition>,
}

impl ScheduleStep {
    pub fn pass(&self) -> PassId {
        self.pass
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }
}

/// A validated, ordered, fully annotated schedule.
///
/// Produced by [`RenderGraph::compile`](crate::RenderGraph::compile) and
/// replayed by the [`Executor`](crate::Executor) every frame until the
/// graph's topology changes.
#[derive(Debug, Clone)]
pub struct CompiledGraph {
    pub(crate) generation: u64,
    pub(crate) steps: Vec<ScheduleStep>,
    pub(crate) lifetimes: HashMap<ResourceId, LifetimeInterval>,
    pub(crate) slots: Vec<ResourceKind>,
    pub(crate) slot_assignments: HashMap<ResourceId, SlotIndex>,
    pub(crate) warnings: Vec<CompileWarning>,
}

impl CompiledGraph {
    /// Pass execution order.
    pub fn pass_order(&self) -> impl Iterator<Item = PassId> + '_ {
        self.steps.iter().map(|s| s.pass)
    }

    /// The annotated schedule steps, in execution order.
    pub fn steps(&self) -> &[ScheduleStep] {
        &self.steps
    }

    /// Live interval of a resource, if the schedule touches it.
    pub fn lifetime(&self, resource: ResourceId) -> Option<LifetimeInterval> {
        self.lifetimes.get(&resource).copied()
    }

    /// Check if a resource is live at the given schedule step.
    pub fn is_resource_alive(&self, resource: ResourceId, step: usize) -> bool {
        self.lifetime(resource)
            .is_some_and(|lt| step >= lt.first_use && step <= lt.last_use)
    }

    /// Backing slot assigned to a transient resource.
    pub fn slot_of(&self, resource: ResourceId) -> Option<SlotIndex> {
        self.slot_assignments.get(&resource).copied()
    }

    /// Number of backing slots the schedule needs.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Descriptors of the backing slots, indexed by [`SlotIndex`].
    pub fn slot_kinds(&self) -> &[ResourceKind] {
        &self.slots
    }

    /// Non-fatal diagnostics gathered during compilation.
    pub fn warnings(&self) -> &[CompileWarning] {
        &self.warnings
    }

    /// Revision of the graph this schedule was compiled from.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

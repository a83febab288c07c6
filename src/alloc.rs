//! Transient resource lifetimes and backing-slot assignment.
//!
//! Every transient resource is live from the step of its producing pass to
//! the step of its last consumer. Two transients whose live intervals do not
//! overlap can share one backing allocation, provided their descriptors are
//! identical. Assignment is greedy over resources ordered by first use; this
//! is not a minimal coloring of the interval graph, but it is deterministic
//! and never reuses a slot that is still live.

use std::collections::HashMap;

use crate::error::CompileWarning;
use crate::pass::{PassId, PassNode};
use crate::resource::{ResourceId, ResourceKind, ResourceRegistry};

/// Inclusive step range within the schedule during which a resource is live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifetimeInterval {
    /// Schedule index of the producing pass (or first touch, for
    /// persistent resources).
    pub first_use: usize,
    /// Schedule index of the last consuming pass.
    pub last_use: usize,
}

impl LifetimeInterval {
    pub fn overlaps(&self, other: &LifetimeInterval) -> bool {
        self.first_use <= other.last_use && other.first_use <= self.last_use
    }
}

/// Index of a backing slot in the transient storage arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotIndex(pub(crate) u32);

impl SlotIndex {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Compute the live interval of every resource the schedule touches.
///
/// A transient output with no consumer is flagged as a [`CompileWarning::DeadOutput`];
/// its interval collapses to the producing step.
pub(crate) fn compute_lifetimes(
    nodes: &[PassNode],
    order: &[PassId],
    registry: &ResourceRegistry,
) -> (HashMap<ResourceId, LifetimeInterval>, Vec<CompileWarning>) {
    let mut lifetimes: HashMap<ResourceId, LifetimeInterval> = HashMap::new();
    let mut consumed: HashMap<ResourceId, bool> = HashMap::new();

    for (step, &pass_id) in order.iter().enumerate() {
        let node = &nodes[pass_id.index()];
        for access in node.inputs.iter().chain(node.outputs.iter()) {
            let interval = lifetimes
                .entry(access.resource)
                .or_insert(LifetimeInterval {
                    first_use: step,
                    last_use: step,
                });
            interval.last_use = step;
        }
        for access in &node.inputs {
            consumed.insert(access.resource, true);
        }
    }

    let mut warnings = Vec::new();
    for (step, &pass_id) in order.iter().enumerate() {
        let node = &nodes[pass_id.index()];
        for access in &node.outputs {
            let info = registry
                .get(access.resource)
                .expect("declarations are validated before lifetime analysis");
            if info.lifetime.is_transient() && !consumed.get(&access.resource).copied().unwrap_or(false)
            {
                log::warn!(
                    "transient output '{}' of pass '{}' (step {}) is never consumed",
                    info.name,
                    node.name,
                    step
                );
                warnings.push(CompileWarning::DeadOutput {
                    pass: node.name.clone(),
                    resource: info.name.clone(),
                });
            }
        }
    }

    (lifetimes, warnings)
}

/// Greedily assign transient resources to backing slots.
///
/// Resources are visited in `(first_use, id)` order; each takes the
/// lowest-indexed slot of identical [`ResourceKind`] whose previous occupant
/// died strictly before this resource's first use, else opens a new slot.
///
/// Slot sharing between live intervals is the one thing this module must
/// never do: it would silently corrupt rendered output.
pub(crate) fn assign_slots(
    lifetimes: &HashMap<ResourceId, LifetimeInterval>,
    registry: &ResourceRegistry,
) -> (Vec<ResourceKind>, HashMap<ResourceId, SlotIndex>) {
    let mut transients: Vec<(ResourceId, LifetimeInterval, ResourceKind)> = registry
        .iter()
        .filter(|info| info.lifetime.is_transient())
        .filter_map(|info| lifetimes.get(&info.id).map(|&lt| (info.id, lt, info.kind)))
        .collect();
    transients.sort_by_key(|&(id, lt, _)| (lt.first_use, id));

    let mut slots: Vec<ResourceKind> = Vec::new();
    let mut slot_last_use: Vec<usize> = Vec::new();
    let mut assignments: HashMap<ResourceId, SlotIndex> = HashMap::new();

    for (id, interval, kind) in transients {
        let reusable = slots
            .iter()
            .enumerate()
            .position(|(i, slot)| *slot == kind && slot_last_use[i] < interval.first_use);

        let slot = match reusable {
            Some(i) => {
                slot_last_use[i] = interval.last_use;
                SlotIndex(i as u32)
            }
            None => {
                slots.push(kind);
                slot_last_use.push(interval.last_use);
                SlotIndex((slots.len() - 1) as u32)
            }
        };
        log::trace!(
            "transient '{}' [{}..{}] -> slot {}",
            registry.name(id),
            interval.first_use,
            interval.last_use,
            slot.0
        );
        assignments.insert(id, slot);
    }

    (slots, assignments)
}

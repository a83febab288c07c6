//! Resource state tracking and transition placement.
//!
//! Walks the scheduled pass order and compares each declared usage against
//! the resource's last known state. A state change emits exactly one
//! transition action, attached to the consuming pass's step; a touch in the
//! same state emits nothing.

use std::collections::HashMap;

use crate::error::{CompileError, CompileResult};
use crate::pass::{PassId, PassNode};
use crate::resource::{ResourceId, ResourceLifetime, ResourceRegistry, ResourceState};

/// A state transition to apply immediately before a scheduled pass runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub resource: ResourceId,
    pub from: ResourceState,
    pub to: ResourceState,
}

/// Compute the transitions required before each step of the schedule.
///
/// Persistent resources start in their caller-declared initial state;
/// transients start `Undefined`. The first touch of a transient emits no
/// transition since its contents are undefined and storage has already been
/// bound by the allocator.
pub(crate) fn place_transitions(
    nodes: &[PassNode],
    order: &[PassId],
    registry: &ResourceRegistry,
) -> CompileResult<Vec<Vec<Transition>>> {
    let mut states: HashMap<ResourceId, ResourceState> = HashMap::new();
    for info in registry.iter() {
        let initial = match info.lifetime {
            ResourceLifetime::Transient => ResourceState::Undefined,
            ResourceLifetime::Persistent { initial_state } => initial_state,
        };
        states.insert(info.id, initial);
    }

    let mut steps = Vec::with_capacity(order.len());
    for &pass_id in order {
        let node = &nodes[pass_id.index()];
        let mut transitions = Vec::new();

        for access in node.inputs.iter().chain(node.outputs.iter()) {
            if access.state == ResourceState::Undefined {
                return Err(CompileError::UnsupportedUsage {
                    resource: registry.name(access.resource).to_string(),
                    state: access.state,
                });
            }

            let last = states
                .get_mut(&access.resource)
                .expect("declarations are validated before tracking");
            if *last != access.state {
                // First touch of a transient: storage is bound, contents
                // undefined, nothing to synchronize against.
                if *last != ResourceState::Undefined {
                    log::trace!(
                        "transition '{}' {:?} -> {:?} before pass '{}'",
                        registry.name(access.resource),
                        *last,
                        access.state,
                        node.name
                    );
                    transitions.push(Transition {
                        resource: access.resource,
                        from: *last,
                        to: access.state,
                    });
                }
                *last = access.state;
            }
        }

        steps.push(transitions);
    }

    Ok(steps)
}

//! Render pass trait and per-pass metadata.

use std::collections::HashMap;

use crate::backend::{BackingHandle, RenderBackend};
use crate::error::PassError;
use crate::resource::{ResourceAccess, ResourceId};

/// Unique identifier for a render pass. Identity is registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PassId(pub(crate) u32);

impl PassId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// A unit of GPU work scheduled by the graph.
///
/// The graph decides *when* a pass runs and how its declared resources are
/// synchronized; what the pass actually records into the encoder is its own
/// business. Implementations declare their inputs and outputs through
/// [`RenderGraph::register_input`](crate::RenderGraph::register_input) and
/// [`register_output`](crate::RenderGraph::register_output) after
/// registration.
pub trait RenderPass<B: RenderBackend>: Send + Sync {
    /// Called exactly once per compiled schedule, in schedule order, before
    /// the first frame runs.
    fn init(&mut self, _encoder: &mut B::Encoder) -> Result<(), PassError> {
        Ok(())
    }

    /// Called once per frame with the resolved resource bindings.
    fn execute(&self, ctx: &PassContext<'_>, encoder: &mut B::Encoder) -> Result<(), PassError>;
}

/// Declaration metadata for one registered pass.
#[derive(Debug, Clone)]
pub struct PassNode {
    pub id: PassId,
    pub name: String,
    /// Declaration order is preserved; it is part of the graph's identity.
    pub inputs: Vec<ResourceAccess>,
    pub outputs: Vec<ResourceAccess>,
}

impl PassNode {
    pub(crate) fn new(id: PassId, name: String) -> Self {
        Self {
            id,
            name,
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn reads_resource(&self, resource: ResourceId) -> bool {
        self.inputs.iter().any(|a| a.resource == resource)
    }

    pub fn writes_resource(&self, resource: ResourceId) -> bool {
        self.outputs.iter().any(|a| a.resource == resource)
    }
}

/// Execution context handed to a pass's `execute` hook.
///
/// Resolves declared resource ids to the backing storage chosen for this
/// frame: transients to their aliased slot, persistents to the handle the
/// caller bound.
pub struct PassContext<'a> {
    pub(crate) node: &'a PassNode,
    pub(crate) bindings: &'a HashMap<ResourceId, BackingHandle>,
}

impl PassContext<'_> {
    /// Name of the executing pass.
    pub fn name(&self) -> &str {
        &self.node.name
    }

    /// The pass's declared inputs, in declaration order.
    pub fn inputs(&self) -> &[ResourceAccess] {
        &self.node.inputs
    }

    /// The pass's declared outputs, in declaration order.
    pub fn outputs(&self) -> &[ResourceAccess] {
        &self.node.outputs
    }

    /// Resolve a declared resource to its backing handle.
    ///
    /// Returns `None` for ids the pass did not declare.
    pub fn resolve(&self, resource: ResourceId) -> Option<BackingHandle> {
        if !self.node.reads_resource(resource) && !self.node.writes_resource(resource) {
            return None;
        }
        self.bindings.get(&resource).copied()
    }
}

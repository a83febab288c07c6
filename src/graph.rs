//! Render graph registration, validation and compilation.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use crate::alloc;
use crate::backend::RenderBackend;
use crate::error::{CompileError, CompileResult, Direction};
use crate::pass::{PassId, PassNode, RenderPass};
use crate::resource::{
    ResourceAccess, ResourceId, ResourceKind, ResourceRegistry, ResourceState,
};
use crate::schedule::{self, CompiledGraph, ScheduleStep};
use crate::tracker;

/// The render graph: registered passes, registered resources, and the
/// machinery to compile them into a schedule.
///
/// # Construction
///
/// Register resources and passes, then declare each pass's inputs and
/// outputs. Dependencies are never declared directly; they are inferred
/// from matching resource ids between one pass's outputs and another's
/// inputs.
///
/// ```ignore
/// let mut graph = RenderGraph::<MyBackend>::new();
/// let depth = graph.add_transient("Depth", depth_desc);
/// let prepass = graph.add_pass("DepthPrepass", Box::new(DepthPrepass::new()));
/// graph.register_output(prepass, depth, ResourceState::DepthWrite)?;
/// let compiled = graph.compile()?;
/// ```
///
/// # Compilation
///
/// [`compile`](Self::compile) validates the declarations (unique producers,
/// resolvable inputs, acyclicity), fixes a deterministic execution order,
/// places resource state transitions and assigns aliased backing slots to
/// transient resources. The result is cached until registration changes.
pub struct RenderGraph<B: RenderBackend> {
    passes: Vec<Box<dyn RenderPass<B>>>,
    nodes: Vec<PassNode>,
    resources: ResourceRegistry,
    /// Bumped on every registration change; compiled schedules carry the
    /// generation they were built from.
    generation: u64,
    compiled: Option<CompiledGraph>,
}

impl<B: RenderBackend> Default for RenderGraph<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: RenderBackend> RenderGraph<B> {
    pub fn new() -> Self {
        Self {
            passes: Vec::new(),
            nodes: Vec::new(),
            resources: ResourceRegistry::new(),
            generation: 0,
            compiled: None,
        }
    }

    /// Register a graph-owned transient resource.
    pub fn add_transient(&mut self, name: impl Into<String>, kind: ResourceKind) -> ResourceId {
        self.invalidate();
        self.resources.add_transient(name, kind)
    }

    /// Register a caller-supplied persistent resource (e.g. the swapchain
    /// image) with the state it is in at frame start.
    pub fn add_persistent(
        &mut self,
        name: impl Into<String>,
        kind: ResourceKind,
        initial_state: ResourceState,
    ) -> ResourceId {
        self.invalidate();
        self.resources.add_persistent(name, kind, initial_state)
    }

    /// Add a pass to the graph. Returns the handle used for declaring its
    /// resources.
    pub fn add_pass(&mut self, name: impl Into<String>, pass: Box<dyn RenderPass<B>>) -> PassId {
        self.invalidate();
        let id = PassId(self.nodes.len() as u32);
        self.nodes.push(PassNode::new(id, name.into()));
        self.passes.push(pass);
        id
    }

    /// Rename a pass. Idempotent and purely cosmetic: names feed
    /// diagnostics and logs, never scheduling.
    pub fn set_pass_name(&mut self, pass: PassId, name: impl Into<String>) -> CompileResult<()> {
        match self.nodes.get_mut(pass.index()) {
            Some(node) => {
                node.name = name.into();
                Ok(())
            }
            None => Err(Self::unknown_pass(pass)),
        }
    }

    /// Declare that a pass consumes a resource in the given state.
    pub fn register_input(
        &mut self,
        pass: PassId,
        resource: ResourceId,
        state: ResourceState,
    ) -> CompileResult<()> {
        self.register_access(pass, resource, state, Direction::Input)
    }

    /// Declare that a pass produces a resource in the given state.
    pub fn register_output(
        &mut self,
        pass: PassId,
        resource: ResourceId,
        state: ResourceState,
    ) -> CompileResult<()> {
        self.register_access(pass, resource, state, Direction::Output)
    }

    fn register_access(
        &mut self,
        pass: PassId,
        resource: ResourceId,
        state: ResourceState,
        direction: Direction,
    ) -> CompileResult<()> {
        let node = match self.nodes.get(pass.index()) {
            Some(node) => node,
            None => return Err(Self::unknown_pass(pass)),
        };

        if state == ResourceState::Undefined {
            return Err(CompileError::InvalidDeclaration {
                pass: node.name.clone(),
                reason: format!(
                    "resource '{}' declared with the Undefined state",
                    self.resources.name(resource)
                ),
            });
        }
        if !self.resources.contains(resource) {
            return Err(CompileError::InvalidDeclaration {
                pass: node.name.clone(),
                reason: format!("unknown resource id {resource:?}"),
            });
        }

        let already = match direction {
            Direction::Input => node.reads_resource(resource),
            Direction::Output => node.writes_resource(resource),
        };
        if already {
            return Err(CompileError::DuplicateDeclaration {
                pass: node.name.clone(),
                resource: self.resources.name(resource).to_string(),
                direction,
            });
        }

        let access = ResourceAccess { resource, state };
        let node = &mut self.nodes[pass.index()];
        match direction {
            Direction::Input => node.inputs.push(access),
            Direction::Output => node.outputs.push(access),
        }
        self.invalidate();
        Ok(())
    }

    pub fn pass_count(&self) -> usize {
        self.nodes.len()
    }

    /// Declaration metadata of all passes, in registration order.
    pub fn nodes(&self) -> &[PassNode] {
        &self.nodes
    }

    pub fn registry(&self) -> &ResourceRegistry {
        &self.resources
    }

    /// Current registration revision. A [`CompiledGraph`] is valid only
    /// while its generation matches.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn node(&self, pass: PassId) -> &PassNode {
        &self.nodes[pass.index()]
    }

    pub(crate) fn pass(&self, pass: PassId) -> &dyn RenderPass<B> {
        self.passes[pass.index()].as_ref()
    }

    pub(crate) fn pass_mut(&mut self, pass: PassId) -> &mut dyn RenderPass<B> {
        self.passes[pass.index()].as_mut()
    }

    fn unknown_pass(pass: PassId) -> CompileError {
        CompileError::InvalidDeclaration {
            pass: format!("{pass:?}"),
            reason: "unknown pass handle".to_string(),
        }
    }

    fn invalidate(&mut self) {
        self.generation += 1;
        self.compiled = None;
    }

    /// Validate the declared topology and produce the annotated schedule.
    ///
    /// The result is cached; repeated calls without intervening
    /// registration return the same schedule.
    pub fn compile(&mut self) -> CompileResult<CompiledGraph> {
        if let Some(compiled) = &self.compiled {
            if compiled.generation == self.generation {
                return Ok(compiled.clone());
            }
        }

        let edges = self.build_edges()?;
        self.check_cycles(&edges)?;

        let order = schedule::topological_order(self.nodes.len(), &edges);
        log::debug!(
            "compiled schedule: [{}]",
            order
                .iter()
                .map(|&id| self.nodes[id.index()].name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        let transitions = tracker::place_transitions(&self.nodes, &order, &self.resources)?;
        let (lifetimes, warnings) = alloc::compute_lifetimes(&self.nodes, &order, &self.resources);
        let (slots, slot_assignments) = alloc::assign_slots(&lifetimes, &self.resources);
        log::debug!(
            "{} transient resources aliased onto {} slots",
            slot_assignments.len(),
            slots.len()
        );

        let steps = order
            .into_iter()
            .zip(transitions)
            .map(|(pass, transitions)| ScheduleStep { pass, transitions })
            .collect();

        let compiled = CompiledGraph {
            generation: self.generation,
            steps,
            lifetimes,
            slots,
            slot_assignments,
            warnings,
        };
        self.compiled = Some(compiled.clone());
        Ok(compiled)
    }

    /// Derive dependency edges `(consumer, producer)` from matching
    /// resource ids, rejecting duplicate producers, self-consumption and
    /// inputs with no resolvable source.
    fn build_edges(&self) -> CompileResult<Vec<(PassId, PassId)>> {
        let mut producers: HashMap<ResourceId, PassId> = HashMap::new();
        for node in &self.nodes {
            for access in &node.outputs {
                match producers.entry(access.resource) {
                    Entry::Occupied(entry) => {
                        return Err(CompileError::DuplicateProducer {
                            resource: self.resources.name(access.resource).to_string(),
                            first: self.nodes[entry.get().index()].name.clone(),
                            second: node.name.clone(),
                        });
                    }
                    Entry::Vacant(entry) => {
                        entry.insert(node.id);
                    }
                }
            }
        }

        let mut edges: Vec<(PassId, PassId)> = Vec::new();
        for node in &self.nodes {
            for access in &node.inputs {
                match producers.get(&access.resource) {
                    Some(&producer) if producer == node.id => {
                        return Err(CompileError::SelfDependency {
                            pass: node.name.clone(),
                            resource: self.resources.name(access.resource).to_string(),
                        });
                    }
                    Some(&producer) => {
                        // Several inputs may come from one producer.
                        if !edges.contains(&(node.id, producer)) {
                            edges.push((node.id, producer));
                        }
                    }
                    None => {
                        let info = self
                            .resources
                            .get(access.resource)
                            .expect("ids are validated at registration");
                        if info.lifetime.is_transient() {
                            return Err(CompileError::UnresolvedDependency {
                                pass: node.name.clone(),
                                resource: info.name.clone(),
                            });
                        }
                        // Persistent resources are pre-bound by the caller.
                    }
                }
            }
        }
        Ok(edges)
    }

    /// Depth-first search with a visiting mark; any back edge is a cycle.
    fn check_cycles(&self, edges: &[(PassId, PassId)]) -> CompileResult<()> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Unvisited,
            Visiting,
            Done,
        }

        let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); self.nodes.len()];
        for &(dependent, dependency) in edges {
            adjacency[dependent.index()].push(dependency.index());
        }

        fn visit(
            index: usize,
            adjacency: &[Vec<usize>],
            marks: &mut [Mark],
            stack: &mut Vec<usize>,
        ) -> Option<Vec<usize>> {
            marks[index] = Mark::Visiting;
            stack.push(index);
            for &next in &adjacency[index] {
                match marks[next] {
                    Mark::Visiting => {
                        let start = stack
                            .iter()
                            .position(|&i| i == next)
                            .expect("visiting nodes are on the stack");
                        let mut cycle = stack[start..].to_vec();
                        cycle.push(next);
                        return Some(cycle);
                    }
                    Mark::Unvisited => {
                        if let Some(cycle) = visit(next, adjacency, marks, stack) {
                            return Some(cycle);
                        }
                    }
                    Mark::Done => {}
                }
            }
            stack.pop();
            marks[index] = Mark::Done;
            None
        }

        let mut marks = vec![Mark::Unvisited; self.nodes.len()];
        let mut stack = Vec::new();
        for index in 0..self.nodes.len() {
            if marks[index] == Mark::Unvisited {
                if let Some(cycle) = visit(index, &adjacency, &mut marks, &mut stack) {
                    return Err(CompileError::CyclicDependency {
                        passes: cycle
                            .into_iter()
                            .map(|i| self.nodes[i].name.clone())
                            .collect(),
                    });
                }
            }
        }
        Ok(())
    }
}

//! Replay of compiled schedules.

use std::collections::HashMap;

use crate::backend::{BackingHandle, RenderBackend};
use crate::error::{FrameError, FrameResult};
use crate::graph::RenderGraph;
use crate::pass::PassContext;
use crate::resource::ResourceId;
use crate::schedule::CompiledGraph;

/// Per-frame table of backing handles for persistent resources.
///
/// The caller owns persistent storage (swapchain images, long-lived
/// buffers) and re-binds it each frame; handles may change between frames,
/// e.g. as the swapchain rotates.
#[derive(Debug, Default)]
pub struct FrameBindings {
    externals: HashMap<ResourceId, BackingHandle>,
}

impl FrameBindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind the backing handle for a persistent resource.
    pub fn bind(&mut self, resource: ResourceId, backing: BackingHandle) {
        self.externals.insert(resource, backing);
    }

    pub fn get(&self, resource: ResourceId) -> Option<BackingHandle> {
        self.externals.get(&resource).copied()
    }
}

/// Walks a compiled schedule: allocates transient slots, runs each pass's
/// `init` hook once, then per frame applies the recorded transitions and
/// invokes `execute` hooks in schedule order.
///
/// The executor never retries or skips a pass; any hook failure fails the
/// frame.
#[derive(Debug, Default)]
pub struct Executor {
    slot_backings: Vec<BackingHandle>,
    /// Generation of the schedule the slots and init hooks were prepared
    /// for, if any.
    prepared: Option<u64>,
}

impl Executor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Execute one frame of the compiled schedule.
    ///
    /// The first frame against a given schedule allocates one backing per
    /// transient slot and runs every pass's `init` hook, in schedule order.
    /// `encoder` is the opaque command-recording handle; it is threaded
    /// unchanged into transitions and pass hooks.
    pub fn run_frame<B: RenderBackend>(
        &mut self,
        graph: &mut RenderGraph<B>,
        compiled: &CompiledGraph,
        backend: &mut B,
        encoder: &mut B::Encoder,
        bindings: &FrameBindings,
    ) -> FrameResult<()> {
        if compiled.generation() != graph.generation() {
            return Err(FrameError::StaleSchedule);
        }

        if self.prepared != Some(compiled.generation()) {
            self.prepare(graph, compiled, backend, encoder)?;
        }

        let resolved = self.resolve_bindings(graph, compiled, bindings)?;

        for step in compiled.steps() {
            for transition in step.transitions() {
                let backing = resolved[&transition.resource];
                backend.transition(encoder, backing, transition.from, transition.to);
            }

            let node = graph.node(step.pass());
            let ctx = PassContext {
                node,
                bindings: &resolved,
            };
            graph
                .pass(step.pass())
                .execute(&ctx, encoder)
                .map_err(|source| FrameError::PassExecution {
                    pass: node.name.clone(),
                    source,
                })?;
        }

        Ok(())
    }

    /// Release all transient slot backings, e.g. before a topology rebuild.
    pub fn reset<B: RenderBackend>(&mut self, backend: &mut B) {
        self.release_slots(backend);
        self.prepared = None;
    }

    fn prepare<B: RenderBackend>(
        &mut self,
        graph: &mut RenderGraph<B>,
        compiled: &CompiledGraph,
        backend: &mut B,
        encoder: &mut B::Encoder,
    ) -> FrameResult<()> {
        self.release_slots(backend);
        for kind in compiled.slot_kinds() {
            match backend.allocate(kind) {
                Ok(backing) => self.slot_backings.push(backing),
                Err(err) => {
                    self.release_slots(backend);
                    return Err(err.into());
                }
            }
        }
        log::debug!("allocated {} transient slots", self.slot_backings.len());

        for pass_id in compiled.pass_order() {
            let name = graph.node(pass_id).name.clone();
            graph
                .pass_mut(pass_id)
                .init(encoder)
                .map_err(|source| FrameError::PassExecution { pass: name, source })?;
        }

        self.prepared = Some(compiled.generation());
        Ok(())
    }

    /// Resolve every resource the schedule touches to its backing handle:
    /// transients via their slot, persistents via the caller's table.
    fn resolve_bindings<B: RenderBackend>(
        &self,
        graph: &RenderGraph<B>,
        compiled: &CompiledGraph,
        bindings: &FrameBindings,
    ) -> FrameResult<HashMap<ResourceId, BackingHandle>> {
        let mut resolved = HashMap::new();
        for info in graph.registry().iter() {
            if compiled.lifetime(info.id).is_none() {
                continue;
            }
            let backing = if info.lifetime.is_transient() {
                let slot = compiled
                    .slot_of(info.id)
                    .expect("every touched transient has a slot");
                self.slot_backings[slot.index()]
            } else {
                bindings
                    .get(info.id)
                    .ok_or_else(|| FrameError::MissingBinding {
                        resource: info.name.clone(),
                    })?
            };
            resolved.insert(info.id, backing);
        }
        Ok(resolved)
    }

    fn release_slots<B: RenderBackend>(&mut self, backend: &mut B) {
        for backing in self.slot_backings.drain(..) {
            backend.release(backing);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendError;
    use crate::error::PassError;
    use crate::pass::RenderPass;
    use crate::resource::{
        ResourceKind, ResourceState, TextureDesc, TextureFormat, TextureUsage,
    };

    /// Test backend whose encoder is a plain event log, so transition and
    /// execution interleaving is observable.
    #[derive(Default)]
    struct RecordingBackend {
        next_handle: u64,
        allocated: Vec<BackingHandle>,
        released: Vec<BackingHandle>,
        fail_allocation: bool,
    }

    impl RenderBackend for RecordingBackend {
        type Encoder = Vec<String>;

        fn allocate(&mut self, _kind: &ResourceKind) -> Result<BackingHandle, BackendError> {
            if self.fail_allocation {
                return Err(BackendError::OutOfMemory);
            }
            let backing = BackingHandle::new(self.next_handle);
            self.next_handle += 1;
            self.allocated.push(backing);
            Ok(backing)
        }

        fn release(&mut self, backing: BackingHandle) {
            self.released.push(backing);
        }

        fn transition(
            &mut self,
            encoder: &mut Vec<String>,
            backing: BackingHandle,
            from: ResourceState,
            to: ResourceState,
        ) {
            encoder.push(format!("transition #{} {from:?}->{to:?}", backing.raw()));
        }
    }

    struct LoggingPass {
        label: String,
        fail: bool,
    }

    impl LoggingPass {
        fn new(label: &str) -> Box<Self> {
            Box::new(Self {
                label: label.to_string(),
                fail: false,
            })
        }

        fn failing(label: &str) -> Box<Self> {
            Box::new(Self {
                label: label.to_string(),
                fail: true,
            })
        }
    }

    impl RenderPass<RecordingBackend> for LoggingPass {
        fn init(&mut self, encoder: &mut Vec<String>) -> Result<(), PassError> {
            encoder.push(format!("init {}", self.label));
            Ok(())
        }

        fn execute(
            &self,
            _ctx: &PassContext<'_>,
            encoder: &mut Vec<String>,
        ) -> Result<(), PassError> {
            if self.fail {
                return Err(PassError::new("device exploded"));
            }
            encoder.push(format!("execute {}", self.label));
            Ok(())
        }
    }

    fn texture() -> ResourceKind {
        ResourceKind::Texture(TextureDesc::new_2d(
            64,
            64,
            TextureFormat::Rgba8Unorm,
            TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
        ))
    }

    /// Produce -> Consume over one transient color target.
    fn two_pass_graph() -> (RenderGraph<RecordingBackend>, CompiledGraph) {
        let mut graph = RenderGraph::new();
        let color = graph.add_transient("Color", texture());
        let produce = graph.add_pass("Produce", LoggingPass::new("Produce"));
        let consume = graph.add_pass("Consume", LoggingPass::new("Consume"));
        graph
            .register_output(produce, color, ResourceState::RenderTarget)
            .unwrap();
        graph
            .register_input(consume, color, ResourceState::ShaderRead)
            .unwrap();
        let compiled = graph.compile().unwrap();
        (graph, compiled)
    }

    #[test]
    fn test_init_runs_once_across_frames() {
        let (mut graph, compiled) = two_pass_graph();
        let mut backend = RecordingBackend::default();
        let mut encoder = Vec::new();
        let mut executor = Executor::new();
        let bindings = FrameBindings::new();

        for _ in 0..3 {
            executor
                .run_frame(&mut graph, &compiled, &mut backend, &mut encoder, &bindings)
                .unwrap();
        }

        let inits = encoder.iter().filter(|e| e.starts_with("init")).count();
        assert_eq!(inits, 2, "one init per pass, not per frame");
        let executes = encoder.iter().filter(|e| e.starts_with("execute")).count();
        assert_eq!(executes, 6, "one execute per pass per frame");
    }

    #[test]
    fn test_transitions_precede_the_consuming_pass() {
        let (mut graph, compiled) = two_pass_graph();
        let mut backend = RecordingBackend::default();
        let mut encoder = Vec::new();
        let mut executor = Executor::new();

        executor
            .run_frame(
                &mut graph,
                &compiled,
                &mut backend,
                &mut encoder,
                &FrameBindings::new(),
            )
            .unwrap();

        assert_eq!(
            encoder,
            vec![
                "init Produce".to_string(),
                "init Consume".to_string(),
                "execute Produce".to_string(),
                "transition #0 RenderTarget->ShaderRead".to_string(),
                "execute Consume".to_string(),
            ]
        );
    }

    #[test]
    fn test_missing_persistent_binding_fails_before_any_pass() {
        let mut graph: RenderGraph<RecordingBackend> = RenderGraph::new();
        let backbuffer =
            graph.add_persistent("Backbuffer", texture(), ResourceState::RenderTarget);
        let draw = graph.add_pass("Draw", LoggingPass::new("Draw"));
        graph
            .register_output(draw, backbuffer, ResourceState::RenderTarget)
            .unwrap();
        let compiled = graph.compile().unwrap();

        let mut backend = RecordingBackend::default();
        let mut encoder = Vec::new();
        let mut executor = Executor::new();

        let err = executor
            .run_frame(
                &mut graph,
                &compiled,
                &mut backend,
                &mut encoder,
                &FrameBindings::new(),
            )
            .unwrap_err();
        assert_eq!(
            err,
            FrameError::MissingBinding {
                resource: "Backbuffer".to_string(),
            }
        );
        assert!(!encoder.iter().any(|e| e.starts_with("execute")));
    }

    #[test]
    fn test_pass_failure_is_fatal_and_named() {
        let mut graph: RenderGraph<RecordingBackend> = RenderGraph::new();
        let color = graph.add_transient("Color", texture());
        let produce = graph.add_pass("Produce", LoggingPass::new("Produce"));
        let broken = graph.add_pass("Broken", LoggingPass::failing("Broken"));
        graph
            .register_output(produce, color, ResourceState::RenderTarget)
            .unwrap();
        graph
            .register_input(broken, color, ResourceState::ShaderRead)
            .unwrap();
        let compiled = graph.compile().unwrap();

        let mut backend = RecordingBackend::default();
        let mut encoder = Vec::new();
        let mut executor = Executor::new();

        let err = executor
            .run_frame(
                &mut graph,
                &compiled,
                &mut backend,
                &mut encoder,
                &FrameBindings::new(),
            )
            .unwrap_err();
        assert_eq!(
            err,
            FrameError::PassExecution {
                pass: "Broken".to_string(),
                source: PassError::new("device exploded"),
            }
        );
    }

    #[test]
    fn test_stale_schedule_is_rejected() {
        let (mut graph, compiled) = two_pass_graph();
        graph.add_pass("Late", LoggingPass::new("Late"));

        let mut backend = RecordingBackend::default();
        let mut encoder = Vec::new();
        let mut executor = Executor::new();

        let err = executor
            .run_frame(
                &mut graph,
                &compiled,
                &mut backend,
                &mut encoder,
                &FrameBindings::new(),
            )
            .unwrap_err();
        assert_eq!(err, FrameError::StaleSchedule);
    }

    #[test]
    fn test_reset_releases_slot_backings() {
        let (mut graph, compiled) = two_pass_graph();
        let mut backend = RecordingBackend::default();
        let mut encoder = Vec::new();
        let mut executor = Executor::new();

        executor
            .run_frame(
                &mut graph,
                &compiled,
                &mut backend,
                &mut encoder,
                &FrameBindings::new(),
            )
            .unwrap();
        assert_eq!(backend.allocated.len(), 1);
        assert!(backend.released.is_empty());

        executor.reset(&mut backend);
        assert_eq!(backend.released, backend.allocated);
    }

    #[test]
    fn test_allocation_failure_surfaces_and_leaks_nothing() {
        let (mut graph, compiled) = two_pass_graph();
        let mut backend = RecordingBackend {
            fail_allocation: true,
            ..Default::default()
        };
        let mut encoder = Vec::new();
        let mut executor = Executor::new();

        let err = executor
            .run_frame(
                &mut graph,
                &compiled,
                &mut backend,
                &mut encoder,
                &FrameBindings::new(),
            )
            .unwrap_err();
        assert_eq!(err, FrameError::Allocation(BackendError::OutOfMemory));
        assert!(backend.allocated.is_empty());
        assert!(encoder.is_empty(), "no hook ran");
    }

    #[test]
    fn test_persistent_resources_resolve_to_caller_handles() {
        let mut graph: RenderGraph<RecordingBackend> = RenderGraph::new();
        let backbuffer =
            graph.add_persistent("Backbuffer", texture(), ResourceState::ShaderRead);
        let draw = graph.add_pass("Draw", LoggingPass::new("Draw"));
        graph
            .register_output(draw, backbuffer, ResourceState::RenderTarget)
            .unwrap();
        let compiled = graph.compile().unwrap();

        let mut backend = RecordingBackend::default();
        let mut encoder = Vec::new();
        let mut executor = Executor::new();
        let mut bindings = FrameBindings::new();
        bindings.bind(backbuffer, BackingHandle::new(777));

        executor
            .run_frame(&mut graph, &compiled, &mut backend, &mut encoder, &bindings)
            .unwrap();
        // The transition from the declared initial state targets the
        // caller's handle, not a graph allocation.
        assert!(encoder.contains(&"transition #777 ShaderRead->RenderTarget".to_string()));
        assert!(backend.allocated.is_empty());
    }
}

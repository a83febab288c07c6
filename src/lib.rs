//! A dependency-driven execution scheduler for GPU render passes.
//!
//! Passes declare which named resources they consume and produce; the graph
//! infers the dependency edges, validates them, fixes a deterministic
//! execution order, places the minimal resource state transitions between
//! passes and aliases transient resources onto shared backing storage.
//!
//! What a pass actually renders is out of scope: pass bodies are opaque
//! hooks, commands are recorded through an opaque encoder, and barriers and
//! allocation are delegated to a [`RenderBackend`] implementation.
//!
//! # Build, compile, replay
//!
//! ```ignore
//! let mut graph = RenderGraph::<MyBackend>::new();
//!
//! let depth = graph.add_transient("Depth", depth_desc);
//! let color = graph.add_transient("SceneColor", color_desc);
//! let backbuffer = graph.add_persistent("Backbuffer", color_desc, ResourceState::RenderTarget);
//!
//! let prepass = graph.add_pass("DepthPrepass", Box::new(DepthPrepass::new()));
//! graph.register_output(prepass, depth, ResourceState::DepthWrite)?;
//!
//! let opaque = graph.add_pass("Opaque", Box::new(OpaquePass::new()));
//! graph.register_input(opaque, depth, ResourceState::DepthRead)?;
//! graph.register_output(opaque, color, ResourceState::RenderTarget)?;
//!
//! // Compile once per topology change, replay every frame.
//! let compiled = graph.compile()?;
//! let mut executor = Executor::new();
//! executor.run_frame(&mut graph, &compiled, &mut backend, &mut encoder, &bindings)?;
//! ```

pub mod alloc;
pub mod backend;
pub mod error;
pub mod executor;
pub mod graph;
pub mod pass;
pub mod resource;
pub mod schedule;
pub mod tracker;

pub use alloc::{LifetimeInterval, SlotIndex};
pub use backend::{BackendError, BackingHandle, RenderBackend};
pub use error::{
    CompileError, CompileResult, CompileWarning, Direction, FrameError, FrameResult, PassError,
};
pub use executor::{Executor, FrameBindings};
pub use graph::RenderGraph;
pub use pass::{PassContext, PassId, PassNode, RenderPass};
pub use resource::{
    BufferDesc, BufferUsage, ResourceAccess, ResourceId, ResourceInfo, ResourceKind,
    ResourceLifetime, ResourceRegistry, ResourceState, TextureDesc, TextureFormat, TextureUsage,
};
pub use schedule::{CompiledGraph, ScheduleStep};
pub use tracker::Transition;

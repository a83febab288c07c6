//! Boundary traits to the command-recording and allocation layer.
//!
//! The graph core never records draw or dispatch commands and never inspects
//! command state. Everything below this boundary — barriers, fences, actual
//! GPU allocation — is the backend's responsibility.

use thiserror::Error;

use crate::resource::{ResourceKind, ResourceState};

/// Opaque handle to backing storage created by the backend.
///
/// The core only stores and forwards these; their meaning belongs to the
/// backend that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BackingHandle(u64);

impl BackingHandle {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Errors the backend can report at the graph boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("out of GPU memory")]
    OutOfMemory,
    #[error("failed to allocate backing storage: {0}")]
    AllocationFailed(String),
}

/// Interface the graph core requires from the command-recording layer.
///
/// `Encoder` is the opaque command-recording handle threaded unchanged
/// through every pass hook.
pub trait RenderBackend {
    type Encoder;

    /// Create backing storage for a transient slot.
    fn allocate(&mut self, kind: &ResourceKind) -> Result<BackingHandle, BackendError>;

    /// Permanently retire backing storage (on topology rebuild or executor
    /// reset).
    fn release(&mut self, backing: BackingHandle);

    /// Record a resource state transition before the next pass runs.
    fn transition(
        &mut self,
        encoder: &mut Self::Encoder,
        backing: BackingHandle,
        from: ResourceState,
        to: ResourceState,
    );
}

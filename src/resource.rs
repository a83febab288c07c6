//! Resource identity, descriptors and usage states.

use bitflags::bitflags;

/// Unique identifier for a render graph resource.
///
/// Ids are issued by the graph's resource registry and are only valid
/// within the graph that created them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub(crate) u32);

impl ResourceId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Texture pixel formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    Rgba8Unorm,
    Bgra8Unorm,
    Rgba16Float,
    Rgba32Float,
    R32Float,
    Depth32Float,
    Depth24PlusStencil8,
}

bitflags! {
    /// How a texture may be bound by the underlying graphics API.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureUsage: u32 {
        const RENDER_ATTACHMENT = 1 << 0;
        const TEXTURE_BINDING = 1 << 1;
        const STORAGE_BINDING = 1 << 2;
        const COPY_SRC = 1 << 3;
        const COPY_DST = 1 << 4;
    }
}

bitflags! {
    /// How a buffer may be bound by the underlying graphics API.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        const UNIFORM = 1 << 0;
        const STORAGE = 1 << 1;
        const VERTEX = 1 << 2;
        const INDEX = 1 << 3;
        const COPY_SRC = 1 << 4;
        const COPY_DST = 1 << 5;
    }
}

/// Descriptor for a 2D texture resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub usage: TextureUsage,
}

impl TextureDesc {
    pub fn new_2d(width: u32, height: u32, format: TextureFormat, usage: TextureUsage) -> Self {
        Self {
            width,
            height,
            format,
            usage,
        }
    }
}

/// Descriptor for a buffer resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferDesc {
    pub size: u64,
    pub usage: BufferUsage,
}

impl BufferDesc {
    pub fn new(size: u64, usage: BufferUsage) -> Self {
        Self { size, usage }
    }
}

/// The kind and shape of a resource.
///
/// Two transient resources may share backing storage only if their kinds
/// compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Texture(TextureDesc),
    Buffer(BufferDesc),
}

/// The access state a resource is in at a given point of the schedule.
///
/// Passes declare the state they need a resource in; the state tracker
/// compares consecutive declarations and inserts a transition wherever
/// they differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceState {
    /// Contents undefined. The initial state of every transient resource;
    /// never a legal declared usage.
    Undefined,
    /// Sampled in a shader.
    ShaderRead,
    /// Written as a color render target.
    RenderTarget,
    /// Written as a depth/stencil attachment.
    DepthWrite,
    /// Read-only depth (sampling or depth test without write).
    DepthRead,
    /// Read/write storage access.
    UnorderedAccess,
    /// Source of a copy operation.
    CopySrc,
    /// Destination of a copy operation.
    CopyDst,
}

impl ResourceState {
    /// Check if this state reads the resource.
    pub fn is_read(self) -> bool {
        matches!(
            self,
            Self::ShaderRead | Self::DepthRead | Self::UnorderedAccess | Self::CopySrc
        )
    }

    /// Check if this state writes the resource.
    pub fn is_write(self) -> bool {
        matches!(
            self,
            Self::RenderTarget | Self::DepthWrite | Self::UnorderedAccess | Self::CopyDst
        )
    }
}

/// Whether the graph or the caller owns a resource's backing storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceLifetime {
    /// Owned by the graph for the duration of one compiled schedule.
    /// Eligible for storage aliasing with other non-overlapping transients.
    Transient,
    /// Supplied by the caller (e.g. the swapchain image); never allocated
    /// or freed by the graph. `initial_state` is the state the resource is
    /// in when the frame begins.
    Persistent { initial_state: ResourceState },
}

impl ResourceLifetime {
    pub fn is_transient(self) -> bool {
        matches!(self, Self::Transient)
    }
}

/// A single resource declaration on a pass: which resource, in what state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceAccess {
    pub resource: ResourceId,
    pub state: ResourceState,
}

/// Everything the registry knows about one resource.
#[derive(Debug, Clone)]
pub struct ResourceInfo {
    pub id: ResourceId,
    pub name: String,
    pub kind: ResourceKind,
    pub lifetime: ResourceLifetime,
}

/// Registry of all resources referenced by a graph.
///
/// Assigns ids and tracks kind and lifetime class. Read-only once the
/// graph is compiled.
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    resources: Vec<ResourceInfo>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a graph-owned transient resource.
    pub fn add_transient(&mut self, name: impl Into<String>, kind: ResourceKind) -> ResourceId {
        self.push(name.into(), kind, ResourceLifetime::Transient)
    }

    /// Register a caller-supplied persistent resource with its state at
    /// frame start.
    pub fn add_persistent(
        &mut self,
        name: impl Into<String>,
        kind: ResourceKind,
        initial_state: ResourceState,
    ) -> ResourceId {
        self.push(
            name.into(),
            kind,
            ResourceLifetime::Persistent { initial_state },
        )
    }

    fn push(&mut self, name: String, kind: ResourceKind, lifetime: ResourceLifetime) -> ResourceId {
        let id = ResourceId(self.resources.len() as u32);
        log::trace!("registered resource '{}' as {:?}", name, lifetime);
        self.resources.push(ResourceInfo {
            id,
            name,
            kind,
            lifetime,
        });
        id
    }

    pub fn get(&self, id: ResourceId) -> Option<&ResourceInfo> {
        self.resources.get(id.index())
    }

    /// Resource name for diagnostics.
    pub fn name(&self, id: ResourceId) -> &str {
        self.get(id).map_or("<unknown>", |r| r.name.as_str())
    }

    pub fn contains(&self, id: ResourceId) -> bool {
        id.index() < self.resources.len()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResourceInfo> {
        self.resources.iter()
    }
}

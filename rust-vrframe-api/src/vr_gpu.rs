//! The GPU command boundary.
//!
//! Object handles are plain integers owned by the context that created them
//! (or by its share group). A handle of 0 means "none", as in GL.

use crate::VRTextureType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde-serialization", derive(Deserialize, Serialize))]
pub struct VRGpuCapabilities {
    // Array-layer rendering with a per-invocation view index.
    pub multiview: bool,
    // Multiview into multisampled render-to-texture targets.
    pub multiview_multisampled: bool,
    // Implicitly resolved multisampled rendering into a texture.
    pub multisampled_render_to_texture: bool,
    pub border_clamp: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde-serialization", derive(Deserialize, Serialize))]
pub enum VRBufferTarget {
    Vertex,
    Index,
    Uniform,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde-serialization", derive(Deserialize, Serialize))]
pub enum VRAttributeType {
    Byte,
    UnsignedByte,
    Float,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde-serialization", derive(Deserialize, Serialize))]
pub struct VRVertexAttribute {
    pub location: u32,
    pub buffer: u32,
    pub components: i32,
    pub attribute_type: VRAttributeType,
    pub normalized: bool,
    pub stride: i32,
    pub offset: u32,
    // 0 for per-vertex data, 1 for per-instance data.
    pub divisor: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde-serialization", derive(Deserialize, Serialize))]
pub struct VRVertexLayout {
    pub attributes: Vec<VRVertexAttribute>,
    pub index_buffer: u32,
}

// Sources and interface names of a program to link.
#[derive(Debug, Clone, Copy)]
pub struct VRProgramDesc<'a> {
    pub vertex_source: &'a str,
    pub fragment_source: &'a str,
    // (location, name) of every vertex attribute.
    pub attributes: &'a [(u32, &'a str)],
    // (binding point, name) of every uniform block.
    pub uniform_blocks: &'a [(u32, &'a str)],
    pub view_id_uniform: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde-serialization", derive(Deserialize, Serialize))]
pub struct VRProgram {
    pub program: u32,
    // -1 when the program has no view id uniform (multiview variant).
    pub view_id_location: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde-serialization", derive(Deserialize, Serialize))]
pub struct VRRenderTargetDesc {
    pub color_texture: u32,
    pub texture_type: VRTextureType,
    pub width: u32,
    pub height: u32,
    // 1 disables multisampling.
    pub samples: u32,
    // Attach both layers of an array texture for single pass stereo.
    pub multiview: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde-serialization", derive(Deserialize, Serialize))]
pub struct VRRenderTarget {
    pub framebuffer: u32,
    // A 2-layer array texture when multiview, otherwise a renderbuffer.
    pub depth_buffer: u32,
    pub depth_is_texture: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde-serialization", derive(Deserialize, Serialize))]
pub struct VRDrawState {
    pub scissor_test: bool,
    pub depth_write: bool,
    // Depth test with LEQUAL when set.
    pub depth_test: bool,
    pub cull_back_faces: bool,
}

impl VRDrawState {
    /// State used by every eye pass of the world renderer.
    pub fn eye_pass() -> VRDrawState {
        VRDrawState {
            scissor_test: true,
            depth_write: true,
            depth_test: true,
            cull_back_faces: true,
        }
    }
}

/// GPU commands the renderer issues on one rendering context.
///
/// Creation calls return an error message when an object cannot be made,
/// everything issued per frame is fire-and-forget and reports through
/// `check_error`.
pub trait VRGpu {
    fn capabilities(&self) -> VRGpuCapabilities;

    /// Opaque platform display and context handles, used to enter VR mode.
    fn display_handle(&self) -> u64;
    fn context_handle(&self) -> u64;

    fn configure_color_texture(&self, texture: u32, texture_type: VRTextureType, border_clamp: bool);

    fn create_render_target(&self, desc: &VRRenderTargetDesc) -> Result<VRRenderTarget, String>;
    fn check_framebuffer_complete(&self, framebuffer: u32) -> Result<(), String>;
    fn delete_render_target(&self, target: &VRRenderTarget);

    fn create_program(&self, desc: &VRProgramDesc) -> Result<VRProgram, String>;
    fn delete_program(&self, program: &VRProgram);

    fn create_buffer(&self, target: VRBufferTarget, size: usize, data: Option<&[u8]>) -> Result<u32, String>;
    /// Replaces the whole contents of a buffer through a write-only,
    /// invalidating mapping. Previous contents are never read back.
    fn write_buffer(&self, target: VRBufferTarget, buffer: u32, data: &[u8]);
    fn delete_buffer(&self, buffer: u32);

    fn create_vertex_array(&self, layout: &VRVertexLayout) -> Result<u32, String>;
    fn bind_vertex_array(&self, vertex_array: u32);
    fn delete_vertex_array(&self, vertex_array: u32);

    fn bind_draw_framebuffer(&self, framebuffer: u32);
    fn use_program(&self, program: u32);
    fn bind_uniform_buffer(&self, binding: u32, buffer: u32);
    fn set_view_id(&self, location: i32, view: i32);
    fn apply_draw_state(&self, state: &VRDrawState);
    fn viewport(&self, x: i32, y: i32, width: i32, height: i32);
    fn scissor(&self, x: i32, y: i32, width: i32, height: i32);
    fn clear(&self, color: [f32; 4], depth: bool);
    fn draw_elements_instanced(&self, index_count: i32, instance_count: i32);

    /// Discards the depth attachment of the bound draw framebuffer.
    fn invalidate_depth(&self);
    fn flush(&self);

    /// Inserts a fence after all previously issued commands and flushes
    /// without waiting. Returns an opaque non-zero handle.
    fn insert_fence(&self) -> u64;
    fn delete_fence(&self, fence: u64);

    fn check_error(&self) -> Option<String>;
}

/// Creates rendering contexts sharing object names with the main context.
/// Called on the thread that will use the context.
pub trait VRGpuContextFactory: Send {
    fn create_shared_context(&mut self) -> Result<Box<dyn VRGpu>, String>;
}

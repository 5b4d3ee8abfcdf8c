use rust_vrframe_api::{VRBufferTarget, VRDrawState, VRGpu, VRGpuCapabilities, VRGpuContextFactory, VRProgram,
                       VRProgramDesc, VRRenderTarget, VRRenderTargetDesc, VRTextureType, VRVertexLayout};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

/// One recorded `VRGpu` call.
#[derive(Debug, Clone, PartialEq)]
pub enum MockGpuCall {
    ConfigureColorTexture { texture: u32, texture_type: VRTextureType, border_clamp: bool },
    CreateRenderTarget(VRRenderTargetDesc),
    DeleteRenderTarget(u32),
    CreateProgram { program: u32, view_id_location: i32 },
    DeleteProgram(u32),
    CreateBuffer { target: VRBufferTarget, buffer: u32, size: usize },
    WriteBuffer { target: VRBufferTarget, buffer: u32, size: usize },
    DeleteBuffer(u32),
    CreateVertexArray(u32),
    BindVertexArray(u32),
    DeleteVertexArray(u32),
    BindDrawFramebuffer(u32),
    UseProgram(u32),
    BindUniformBuffer { binding: u32, buffer: u32 },
    SetViewId { location: i32, view: i32 },
    ApplyDrawState(VRDrawState),
    Viewport { x: i32, y: i32, width: i32, height: i32 },
    Scissor { x: i32, y: i32, width: i32, height: i32 },
    Clear { color: [f32; 4], depth: bool },
    DrawElementsInstanced { index_count: i32, instance_count: i32 },
    InvalidateDepth,
    Flush,
    InsertFence(u64),
    DeleteFence(u64),
}

/// Object tables and call log shared by every context of one share group.
pub struct MockGpuState {
    pub capabilities: VRGpuCapabilities,
    pub calls: Vec<MockGpuCall>,
    // Makes every completeness check fail.
    pub fail_completeness: bool,
    // Makes `MockGpuContextFactory` refuse to create contexts.
    pub fail_shared_context: bool,
    // Makes draw calls panic, like a driver crash would.
    pub panic_on_draw: bool,
    // Returned one by one from `check_error`.
    pub pending_errors: Vec<String>,
    pub created_contexts: Vec<u64>,
    pub destroyed_contexts: Vec<u64>,

    render_targets: HashMap<u32, VRRenderTarget>,
    programs: HashSet<u32>,
    buffers: HashMap<u32, Vec<u8>>,
    vertex_arrays: HashSet<u32>,
    fences: HashSet<u64>,
    next_name: u32,
    next_context: u64,
    last_fence: u64,
}

impl MockGpuState {
    pub fn new(capabilities: VRGpuCapabilities) -> MockGpuState {
        MockGpuState {
            capabilities: capabilities,
            calls: Vec::new(),
            fail_completeness: false,
            fail_shared_context: false,
            panic_on_draw: false,
            pending_errors: Vec::new(),
            created_contexts: Vec::new(),
            destroyed_contexts: Vec::new(),
            render_targets: HashMap::new(),
            programs: HashSet::new(),
            buffers: HashMap::new(),
            vertex_arrays: HashSet::new(),
            fences: HashSet::new(),
            next_name: 0,
            next_context: 0,
            last_fence: 0,
        }
    }

    pub fn new_shared(capabilities: VRGpuCapabilities) -> Arc<Mutex<MockGpuState>> {
        Arc::new(Mutex::new(MockGpuState::new(capabilities)))
    }

    pub fn live_render_targets(&self) -> usize {
        self.render_targets.len()
    }

    pub fn live_programs(&self) -> usize {
        self.programs.len()
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn live_vertex_arrays(&self) -> usize {
        self.vertex_arrays.len()
    }

    pub fn live_fences(&self) -> usize {
        self.fences.len()
    }

    pub fn last_fence(&self) -> u64 {
        self.last_fence
    }

    pub fn buffer_size(&self, buffer: u32) -> Option<usize> {
        self.buffers.get(&buffer).map(|contents| contents.len())
    }

    pub fn buffer_contents(&self, buffer: u32) -> Option<&[u8]> {
        self.buffers.get(&buffer).map(|contents| &contents[..])
    }

    fn gen_name(&mut self) -> u32 {
        self.next_name += 1;
        self.next_name
    }

    fn gen_context(&mut self) -> u64 {
        self.next_context += 1;
        self.created_contexts.push(self.next_context);
        self.next_context
    }
}

/// A `VRGpu` that keeps object tables instead of talking to a driver.
///
/// Contexts built by `MockGpuContextFactory` share the state of the context
/// they were created for, like a GL share group.
pub struct MockGpu {
    context: u64,
    state: Arc<Mutex<MockGpuState>>,
}

impl MockGpu {
    pub fn new(capabilities: VRGpuCapabilities) -> MockGpu {
        MockGpu::with_state(MockGpuState::new_shared(capabilities))
    }

    pub fn with_state(state: Arc<Mutex<MockGpuState>>) -> MockGpu {
        let context = state.lock().unwrap().gen_context();
        MockGpu {
            context: context,
            state: state,
        }
    }

    pub fn context(&self) -> u64 {
        self.context
    }

    pub fn state_handle(&self) -> Arc<Mutex<MockGpuState>> {
        self.state.clone()
    }

    fn lock(&self) -> MutexGuard<MockGpuState> {
        self.state.lock().unwrap()
    }

    fn record(&self, call: MockGpuCall) {
        self.lock().calls.push(call);
    }
}

impl Drop for MockGpu {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            state.destroyed_contexts.push(self.context);
        }
    }
}

impl VRGpu for MockGpu {
    fn capabilities(&self) -> VRGpuCapabilities {
        self.lock().capabilities
    }

    fn display_handle(&self) -> u64 {
        1
    }

    fn context_handle(&self) -> u64 {
        self.context
    }

    fn configure_color_texture(&self, texture: u32, texture_type: VRTextureType, border_clamp: bool) {
        self.record(MockGpuCall::ConfigureColorTexture {
            texture: texture,
            texture_type: texture_type,
            border_clamp: border_clamp,
        });
    }

    fn create_render_target(&self, desc: &VRRenderTargetDesc) -> Result<VRRenderTarget, String> {
        if desc.multiview && desc.texture_type != VRTextureType::Texture2DArray {
            return Err("multiview render target needs an array texture".into());
        }
        let mut state = self.lock();
        state.calls.push(MockGpuCall::CreateRenderTarget(*desc));
        let target = VRRenderTarget {
            framebuffer: state.gen_name(),
            depth_buffer: state.gen_name(),
            depth_is_texture: desc.multiview,
        };
        state.render_targets.insert(target.framebuffer, target);
        Ok(target)
    }

    fn check_framebuffer_complete(&self, framebuffer: u32) -> Result<(), String> {
        let state = self.lock();
        if state.fail_completeness || !state.render_targets.contains_key(&framebuffer) {
            return Err(format!("framebuffer {} is GL_FRAMEBUFFER_INCOMPLETE_ATTACHMENT", framebuffer));
        }
        Ok(())
    }

    fn delete_render_target(&self, target: &VRRenderTarget) {
        let mut state = self.lock();
        state.calls.push(MockGpuCall::DeleteRenderTarget(target.framebuffer));
        if state.render_targets.remove(&target.framebuffer).is_none() {
            warn!("Deleting unknown render target {}", target.framebuffer);
        }
    }

    fn create_program(&self, desc: &VRProgramDesc) -> Result<VRProgram, String> {
        if desc.vertex_source.is_empty() || desc.fragment_source.is_empty() {
            return Err("empty shader source".into());
        }
        let mut state = self.lock();
        // The view id uniform compiles out when the multiview path is taken.
        let multiview = state.capabilities.multiview && desc.vertex_source.contains("#define DISABLE_MULTIVIEW 0");
        let program = VRProgram {
            program: state.gen_name(),
            view_id_location: if multiview { -1 } else { 0 },
        };
        state.programs.insert(program.program);
        state.calls.push(MockGpuCall::CreateProgram {
            program: program.program,
            view_id_location: program.view_id_location,
        });
        Ok(program)
    }

    fn delete_program(&self, program: &VRProgram) {
        let mut state = self.lock();
        state.calls.push(MockGpuCall::DeleteProgram(program.program));
        state.programs.remove(&program.program);
    }

    fn create_buffer(&self, target: VRBufferTarget, size: usize, data: Option<&[u8]>) -> Result<u32, String> {
        let mut contents = vec![0; size];
        if let Some(data) = data {
            if data.len() != size {
                return Err(format!("{} bytes given for a buffer of {}", data.len(), size));
            }
            contents.copy_from_slice(data);
        }
        let mut state = self.lock();
        let buffer = state.gen_name();
        state.buffers.insert(buffer, contents);
        state.calls.push(MockGpuCall::CreateBuffer {
            target: target,
            buffer: buffer,
            size: size,
        });
        Ok(buffer)
    }

    fn write_buffer(&self, target: VRBufferTarget, buffer: u32, data: &[u8]) {
        let mut state = self.lock();
        state.calls.push(MockGpuCall::WriteBuffer {
            target: target,
            buffer: buffer,
            size: data.len(),
        });
        let result = match state.buffers.get_mut(&buffer) {
            Some(contents) if data.len() <= contents.len() => {
                contents[..data.len()].copy_from_slice(data);
                Ok(())
            },
            Some(_) => Err(format!("GL_INVALID_VALUE: {} bytes mapped past buffer {}", data.len(), buffer)),
            None => Err(format!("GL_INVALID_OPERATION: buffer {} does not exist", buffer)),
        };
        if let Err(msg) = result {
            state.pending_errors.push(msg);
        }
    }

    fn delete_buffer(&self, buffer: u32) {
        let mut state = self.lock();
        state.calls.push(MockGpuCall::DeleteBuffer(buffer));
        state.buffers.remove(&buffer);
    }

    fn create_vertex_array(&self, layout: &VRVertexLayout) -> Result<u32, String> {
        let mut state = self.lock();
        for attribute in &layout.attributes {
            if !state.buffers.contains_key(&attribute.buffer) {
                return Err(format!("attribute {} reads from missing buffer {}", attribute.location, attribute.buffer));
            }
        }
        let vertex_array = state.gen_name();
        state.vertex_arrays.insert(vertex_array);
        state.calls.push(MockGpuCall::CreateVertexArray(vertex_array));
        Ok(vertex_array)
    }

    fn bind_vertex_array(&self, vertex_array: u32) {
        self.record(MockGpuCall::BindVertexArray(vertex_array));
    }

    fn delete_vertex_array(&self, vertex_array: u32) {
        let mut state = self.lock();
        state.calls.push(MockGpuCall::DeleteVertexArray(vertex_array));
        state.vertex_arrays.remove(&vertex_array);
    }

    fn bind_draw_framebuffer(&self, framebuffer: u32) {
        self.record(MockGpuCall::BindDrawFramebuffer(framebuffer));
    }

    fn use_program(&self, program: u32) {
        self.record(MockGpuCall::UseProgram(program));
    }

    fn bind_uniform_buffer(&self, binding: u32, buffer: u32) {
        self.record(MockGpuCall::BindUniformBuffer {
            binding: binding,
            buffer: buffer,
        });
    }

    fn set_view_id(&self, location: i32, view: i32) {
        self.record(MockGpuCall::SetViewId {
            location: location,
            view: view,
        });
    }

    fn apply_draw_state(&self, state: &VRDrawState) {
        self.record(MockGpuCall::ApplyDrawState(*state));
    }

    fn viewport(&self, x: i32, y: i32, width: i32, height: i32) {
        self.record(MockGpuCall::Viewport { x: x, y: y, width: width, height: height });
    }

    fn scissor(&self, x: i32, y: i32, width: i32, height: i32) {
        self.record(MockGpuCall::Scissor { x: x, y: y, width: width, height: height });
    }

    fn clear(&self, color: [f32; 4], depth: bool) {
        self.record(MockGpuCall::Clear { color: color, depth: depth });
    }

    fn draw_elements_instanced(&self, index_count: i32, instance_count: i32) {
        // Not under the lock, so the shared state stays usable.
        let panic_on_draw = self.lock().panic_on_draw;
        if panic_on_draw {
            panic!("draw call on a lost context");
        }
        self.record(MockGpuCall::DrawElementsInstanced {
            index_count: index_count,
            instance_count: instance_count,
        });
    }

    fn invalidate_depth(&self) {
        self.record(MockGpuCall::InvalidateDepth);
    }

    fn flush(&self) {
        self.record(MockGpuCall::Flush);
    }

    fn insert_fence(&self) -> u64 {
        let mut state = self.lock();
        let fence = state.gen_name() as u64;
        state.last_fence = fence;
        state.fences.insert(fence);
        state.calls.push(MockGpuCall::InsertFence(fence));
        fence
    }

    fn delete_fence(&self, fence: u64) {
        let mut state = self.lock();
        state.calls.push(MockGpuCall::DeleteFence(fence));
        state.fences.remove(&fence);
    }

    fn check_error(&self) -> Option<String> {
        let mut state = self.lock();
        if state.pending_errors.is_empty() {
            None
        } else {
            Some(state.pending_errors.remove(0))
        }
    }
}

/// Hands out contexts that share `state` with the main context.
pub struct MockGpuContextFactory {
    state: Arc<Mutex<MockGpuState>>,
}

impl MockGpuContextFactory {
    pub fn new(state: Arc<Mutex<MockGpuState>>) -> MockGpuContextFactory {
        MockGpuContextFactory {
            state: state,
        }
    }
}

impl VRGpuContextFactory for MockGpuContextFactory {
    fn create_shared_context(&mut self) -> Result<Box<dyn VRGpu>, String> {
        if self.state.lock().unwrap().fail_shared_context {
            return Err("eglCreateContext failed: EGL_BAD_MATCH".into());
        }
        Ok(Box::new(MockGpu::with_state(self.state.clone())))
    }
}

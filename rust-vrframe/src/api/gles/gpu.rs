use gleam::gl::{self, Gl};
use rust_vrframe_api::{VRAttributeType, VRBufferTarget, VRDrawState, VRGpu, VRGpuCapabilities, VRGpuContextFactory,
                       VRProgram, VRProgramDesc, VRRenderTarget, VRRenderTargetDesc, VRTextureType, VRVertexLayout};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::os::raw::c_void;
use std::ptr;
use std::rc::Rc;
use crate::gl_ext;

const NUM_VIEWS: i32 = 2;

/// The GLES extensions the renderer cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GlesExtensions {
    pub multi_view: bool,
    pub multi_view_multisampled: bool,
    pub multisampled_render_to_texture: bool,
    pub texture_border_clamp: bool,
}

impl GlesExtensions {
    /// Reads the space separated `GL_EXTENSIONS` string.
    pub fn parse(extensions: &str) -> GlesExtensions {
        let has = |name: &str| extensions.split_whitespace().any(|ext| ext == name);
        GlesExtensions {
            multi_view: has("GL_OVR_multiview2"),
            multi_view_multisampled: has("GL_OVR_multiview_multisampled_render_to_texture"),
            multisampled_render_to_texture: has("GL_EXT_multisampled_render_to_texture"),
            texture_border_clamp: has("GL_EXT_texture_border_clamp") || has("GL_OES_texture_border_clamp"),
        }
    }
}

fn buffer_target(target: VRBufferTarget) -> gl::GLenum {
    match target {
        VRBufferTarget::Vertex => gl::ARRAY_BUFFER,
        VRBufferTarget::Index => gl::ELEMENT_ARRAY_BUFFER,
        VRBufferTarget::Uniform => gl::UNIFORM_BUFFER,
    }
}

fn texture_target(texture_type: VRTextureType) -> gl::GLenum {
    match texture_type {
        VRTextureType::Texture2D => gl::TEXTURE_2D,
        VRTextureType::Texture2DArray => gl::TEXTURE_2D_ARRAY,
    }
}

fn attribute_type(attribute_type: VRAttributeType) -> gl::GLenum {
    match attribute_type {
        VRAttributeType::Byte => gl::BYTE,
        VRAttributeType::UnsignedByte => gl::UNSIGNED_BYTE,
        VRAttributeType::Float => gl::FLOAT,
    }
}

/// `VRGpu` on a current OpenGL ES 3 context.
///
/// Core calls go through gleam. Extension entry points and the few GLES 3
/// calls gleam does not wrap are loaded into `gl_ext::Gles2`.
pub struct GlesGpu {
    gl: Rc<dyn Gl>,
    ext: gl_ext::Gles2,
    extensions: GlesExtensions,
    display: u64,
    context: u64,
    fences: RefCell<HashMap<u64, gl_ext::types::GLsync>>,
    fence_count: Cell<usize>,
}

impl GlesGpu {
    /// `display` and `context` are the platform handles of the context
    /// `gl` runs on, as handed to the compositor when entering VR mode.
    pub fn new<F>(gl: Rc<dyn Gl>, display: u64, context: u64, loadfn: F) -> GlesGpu
        where F: FnMut(&'static str) -> *const c_void
    {
        let ext = gl_ext::Gles2::load_with(loadfn);
        let mut extensions = GlesExtensions::parse(&gl.get_string(gl::EXTENSIONS));

        // Advertised but not exported is the same as missing.
        if extensions.multi_view && !ext.FramebufferTextureMultiviewOVR.is_loaded() {
            warn!("GL_OVR_multiview2 advertised without glFramebufferTextureMultiviewOVR");
            extensions.multi_view = false;
        }
        if extensions.multi_view_multisampled && !ext.FramebufferTextureMultisampleMultiviewOVR.is_loaded() {
            extensions.multi_view_multisampled = false;
        }
        if extensions.multisampled_render_to_texture &&
           !(ext.FramebufferTexture2DMultisampleEXT.is_loaded() && ext.RenderbufferStorageMultisampleEXT.is_loaded()) {
            extensions.multisampled_render_to_texture = false;
        }
        debug!("GLES extensions: {:?}", extensions);

        GlesGpu {
            gl: gl,
            ext: ext,
            extensions: extensions,
            display: display,
            context: context,
            fences: RefCell::new(HashMap::new()),
            fence_count: Cell::new(0),
        }
    }

    pub fn gl(&self) -> &Rc<dyn Gl> {
        &self.gl
    }

    pub fn extensions(&self) -> GlesExtensions {
        self.extensions
    }

    fn compile_shader(&self, shader_type: gl::GLenum, source: &str) -> Result<gl::GLuint, String> {
        let shader = self.gl.create_shader(shader_type);
        self.gl.shader_source(shader, &[source.as_bytes()]);
        self.gl.compile_shader(shader);

        let mut status = 0;
        unsafe { self.ext.GetShaderiv(shader, gl_ext::COMPILE_STATUS, &mut status) };
        if status == 0 {
            let log = self.gl.get_shader_info_log(shader);
            self.gl.delete_shader(shader);
            let kind = if shader_type == gl::VERTEX_SHADER { "vertex" } else { "fragment" };
            return Err(format!("{} shader: {}", kind, log));
        }
        Ok(shader)
    }

    fn attach_depth_and_color(&self, desc: &VRRenderTargetDesc, target: &mut VRRenderTarget) {
        let width = desc.width as gl::GLsizei;
        let height = desc.height as gl::GLsizei;
        let samples = desc.samples as gl::GLsizei;

        if desc.multiview {
            // Depth is a 2 layer array texture matching the color layers.
            target.depth_buffer = self.gl.gen_textures(1)[0];
            target.depth_is_texture = true;
            self.gl.bind_texture(gl::TEXTURE_2D_ARRAY, target.depth_buffer);
            unsafe {
                self.ext.TexStorage3D(gl_ext::TEXTURE_2D_ARRAY, 1, gl_ext::DEPTH_COMPONENT24, width, height, NUM_VIEWS);
            }
            self.gl.bind_texture(gl::TEXTURE_2D_ARRAY, 0);

            unsafe {
                if samples > 1 && self.extensions.multi_view_multisampled {
                    self.ext.FramebufferTextureMultisampleMultiviewOVR(gl_ext::DRAW_FRAMEBUFFER, gl_ext::DEPTH_ATTACHMENT,
                                                                       target.depth_buffer, 0, samples, 0, NUM_VIEWS);
                    self.ext.FramebufferTextureMultisampleMultiviewOVR(gl_ext::DRAW_FRAMEBUFFER, gl_ext::COLOR_ATTACHMENT0,
                                                                       desc.color_texture, 0, samples, 0, NUM_VIEWS);
                } else {
                    self.ext.FramebufferTextureMultiviewOVR(gl_ext::DRAW_FRAMEBUFFER, gl_ext::DEPTH_ATTACHMENT,
                                                            target.depth_buffer, 0, 0, NUM_VIEWS);
                    self.ext.FramebufferTextureMultiviewOVR(gl_ext::DRAW_FRAMEBUFFER, gl_ext::COLOR_ATTACHMENT0,
                                                            desc.color_texture, 0, 0, NUM_VIEWS);
                }
            }
        } else {
            target.depth_buffer = self.gl.gen_renderbuffers(1)[0];
            target.depth_is_texture = false;
            self.gl.bind_renderbuffer(gl::RENDERBUFFER, target.depth_buffer);

            if samples > 1 && self.extensions.multisampled_render_to_texture {
                // Resolved implicitly when the framebuffer is flushed.
                unsafe {
                    self.ext.RenderbufferStorageMultisampleEXT(gl_ext::RENDERBUFFER, samples, gl_ext::DEPTH_COMPONENT24,
                                                               width, height);
                }
                self.gl.bind_renderbuffer(gl::RENDERBUFFER, 0);
                unsafe {
                    self.ext.FramebufferTexture2DMultisampleEXT(gl_ext::DRAW_FRAMEBUFFER, gl_ext::COLOR_ATTACHMENT0,
                                                                gl_ext::TEXTURE_2D, desc.color_texture, 0, samples);
                }
            } else {
                self.gl.renderbuffer_storage(gl::RENDERBUFFER, gl::DEPTH_COMPONENT24, width, height);
                self.gl.bind_renderbuffer(gl::RENDERBUFFER, 0);
                self.gl.framebuffer_texture_2d(gl::DRAW_FRAMEBUFFER, gl::COLOR_ATTACHMENT0, gl::TEXTURE_2D,
                                               desc.color_texture, 0);
            }
            self.gl.framebuffer_renderbuffer(gl::DRAW_FRAMEBUFFER, gl::DEPTH_ATTACHMENT, gl::RENDERBUFFER,
                                             target.depth_buffer);
        }
    }
}

impl VRGpu for GlesGpu {
    fn capabilities(&self) -> VRGpuCapabilities {
        VRGpuCapabilities {
            multiview: self.extensions.multi_view,
            multiview_multisampled: self.extensions.multi_view_multisampled,
            multisampled_render_to_texture: self.extensions.multisampled_render_to_texture,
            border_clamp: self.extensions.texture_border_clamp,
        }
    }

    fn display_handle(&self) -> u64 {
        self.display
    }

    fn context_handle(&self) -> u64 {
        self.context
    }

    fn configure_color_texture(&self, texture: u32, texture_type: VRTextureType, border_clamp: bool) {
        let target = texture_target(texture_type);
        self.gl.bind_texture(target, texture);
        if border_clamp {
            let border_color: [gl_ext::types::GLfloat; 4] = [0.0, 0.0, 0.0, 0.0];
            self.gl.tex_parameter_i(target, gl::TEXTURE_WRAP_S, gl_ext::CLAMP_TO_BORDER_EXT as gl::GLint);
            self.gl.tex_parameter_i(target, gl::TEXTURE_WRAP_T, gl_ext::CLAMP_TO_BORDER_EXT as gl::GLint);
            unsafe { self.ext.TexParameterfv(target, gl_ext::TEXTURE_BORDER_COLOR_EXT, border_color.as_ptr()) };
        } else {
            self.gl.tex_parameter_i(target, gl::TEXTURE_WRAP_S, gl::CLAMP_TO_EDGE as gl::GLint);
            self.gl.tex_parameter_i(target, gl::TEXTURE_WRAP_T, gl::CLAMP_TO_EDGE as gl::GLint);
        }
        self.gl.tex_parameter_i(target, gl::TEXTURE_MIN_FILTER, gl::LINEAR as gl::GLint);
        self.gl.tex_parameter_i(target, gl::TEXTURE_MAG_FILTER, gl::LINEAR as gl::GLint);
        self.gl.bind_texture(target, 0);
    }

    fn create_render_target(&self, desc: &VRRenderTargetDesc) -> Result<VRRenderTarget, String> {
        if desc.multiview && !self.extensions.multi_view {
            return Err("multiview render target without GL_OVR_multiview2".into());
        }
        let mut target = VRRenderTarget {
            framebuffer: self.gl.gen_framebuffers(1)[0],
            ..VRRenderTarget::default()
        };
        self.gl.bind_framebuffer(gl::DRAW_FRAMEBUFFER, target.framebuffer);
        self.attach_depth_and_color(desc, &mut target);
        self.gl.bind_framebuffer(gl::DRAW_FRAMEBUFFER, 0);

        match self.gl.get_error() {
            gl::NO_ERROR => Ok(target),
            error => {
                self.delete_render_target(&target);
                Err(format!("GL error {:#x} while creating a render target", error))
            }
        }
    }

    fn check_framebuffer_complete(&self, framebuffer: u32) -> Result<(), String> {
        self.gl.bind_framebuffer(gl::DRAW_FRAMEBUFFER, framebuffer);
        let status = self.gl.check_frame_buffer_status(gl::DRAW_FRAMEBUFFER);
        self.gl.bind_framebuffer(gl::DRAW_FRAMEBUFFER, 0);
        match status {
            gl::FRAMEBUFFER_COMPLETE => Ok(()),
            gl::FRAMEBUFFER_UNDEFINED => Err("GL_FRAMEBUFFER_UNDEFINED".into()),
            gl::FRAMEBUFFER_INCOMPLETE_ATTACHMENT => Err("GL_FRAMEBUFFER_INCOMPLETE_ATTACHMENT".into()),
            gl::FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT => Err("GL_FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT".into()),
            gl::FRAMEBUFFER_UNSUPPORTED => Err("GL_FRAMEBUFFER_UNSUPPORTED".into()),
            gl::FRAMEBUFFER_INCOMPLETE_MULTISAMPLE => Err("GL_FRAMEBUFFER_INCOMPLETE_MULTISAMPLE".into()),
            status => Err(format!("unknown framebuffer status {:#x}", status)),
        }
    }

    fn delete_render_target(&self, target: &VRRenderTarget) {
        if target.framebuffer != 0 {
            self.gl.delete_framebuffers(&[target.framebuffer]);
        }
        if target.depth_buffer != 0 {
            if target.depth_is_texture {
                self.gl.delete_textures(&[target.depth_buffer]);
            } else {
                self.gl.delete_renderbuffers(&[target.depth_buffer]);
            }
        }
    }

    fn create_program(&self, desc: &VRProgramDesc) -> Result<VRProgram, String> {
        let vertex_shader = self.compile_shader(gl::VERTEX_SHADER, desc.vertex_source)?;
        let fragment_shader = match self.compile_shader(gl::FRAGMENT_SHADER, desc.fragment_source) {
            Ok(shader) => shader,
            Err(msg) => {
                self.gl.delete_shader(vertex_shader);
                return Err(msg);
            }
        };

        let program = self.gl.create_program();
        self.gl.attach_shader(program, vertex_shader);
        self.gl.attach_shader(program, fragment_shader);
        // Attribute locations have to be fixed before linking.
        for &(location, name) in desc.attributes {
            self.gl.bind_attrib_location(program, location, name);
        }
        self.gl.link_program(program);
        // The program keeps the shaders alive as long as it needs them.
        self.gl.delete_shader(vertex_shader);
        self.gl.delete_shader(fragment_shader);

        let mut status = 0;
        unsafe { self.ext.GetProgramiv(program, gl_ext::LINK_STATUS, &mut status) };
        if status == 0 {
            let log = self.gl.get_program_info_log(program);
            self.gl.delete_program(program);
            return Err(format!("link: {}", log));
        }

        self.gl.use_program(program);
        for &(binding, name) in desc.uniform_blocks {
            let index = self.gl.get_uniform_block_index(program, name);
            if index == gl::INVALID_INDEX {
                warn!("Uniform block {} not found", name);
                continue;
            }
            self.gl.uniform_block_binding(program, index, binding);
        }
        let view_id_location = self.gl.get_uniform_location(program, desc.view_id_uniform);
        self.gl.use_program(0);

        Ok(VRProgram {
            program: program,
            view_id_location: view_id_location,
        })
    }

    fn delete_program(&self, program: &VRProgram) {
        if program.program != 0 {
            self.gl.delete_program(program.program);
        }
    }

    fn create_buffer(&self, target: VRBufferTarget, size: usize, data: Option<&[u8]>) -> Result<u32, String> {
        let target = buffer_target(target);
        let buffer = self.gl.gen_buffers(1)[0];
        if buffer == 0 {
            return Err("glGenBuffers returned no name".into());
        }
        let (data, usage) = match data {
            Some(data) => (data.as_ptr() as *const gl::GLvoid, gl::STATIC_DRAW),
            None => (ptr::null(), gl::DYNAMIC_DRAW),
        };
        self.gl.bind_buffer(target, buffer);
        self.gl.buffer_data_untyped(target, size as gl::GLsizeiptr, data, usage);
        self.gl.bind_buffer(target, 0);
        Ok(buffer)
    }

    fn write_buffer(&self, target: VRBufferTarget, buffer: u32, data: &[u8]) {
        let target = buffer_target(target);
        self.gl.bind_buffer(target, buffer);
        unsafe {
            let mapped = self.ext.MapBufferRange(target, 0, data.len() as gl_ext::types::GLsizeiptr,
                                                 gl_ext::MAP_WRITE_BIT | gl_ext::MAP_INVALIDATE_BUFFER_BIT);
            if mapped.is_null() {
                error!("Could not map buffer {} for writing", buffer);
            } else {
                ptr::copy_nonoverlapping(data.as_ptr(), mapped as *mut u8, data.len());
                self.ext.UnmapBuffer(target);
            }
        }
        self.gl.bind_buffer(target, 0);
    }

    fn delete_buffer(&self, buffer: u32) {
        self.gl.delete_buffers(&[buffer]);
    }

    fn create_vertex_array(&self, layout: &VRVertexLayout) -> Result<u32, String> {
        let vertex_array = self.gl.gen_vertex_arrays(1)[0];
        if vertex_array == 0 {
            return Err("glGenVertexArrays returned no name".into());
        }
        self.gl.bind_vertex_array(vertex_array);
        for attribute in &layout.attributes {
            self.gl.bind_buffer(gl::ARRAY_BUFFER, attribute.buffer);
            self.gl.enable_vertex_attrib_array(attribute.location);
            self.gl.vertex_attrib_pointer(attribute.location,
                                          attribute.components,
                                          attribute_type(attribute.attribute_type),
                                          attribute.normalized,
                                          attribute.stride,
                                          attribute.offset);
            if attribute.divisor != 0 {
                self.gl.vertex_attrib_divisor(attribute.location, attribute.divisor);
            }
        }
        self.gl.bind_buffer(gl::ELEMENT_ARRAY_BUFFER, layout.index_buffer);
        self.gl.bind_vertex_array(0);
        self.gl.bind_buffer(gl::ARRAY_BUFFER, 0);
        self.gl.bind_buffer(gl::ELEMENT_ARRAY_BUFFER, 0);
        Ok(vertex_array)
    }

    fn bind_vertex_array(&self, vertex_array: u32) {
        self.gl.bind_vertex_array(vertex_array);
    }

    fn delete_vertex_array(&self, vertex_array: u32) {
        self.gl.delete_vertex_arrays(&[vertex_array]);
    }

    fn bind_draw_framebuffer(&self, framebuffer: u32) {
        self.gl.bind_framebuffer(gl::DRAW_FRAMEBUFFER, framebuffer);
    }

    fn use_program(&self, program: u32) {
        self.gl.use_program(program);
    }

    fn bind_uniform_buffer(&self, binding: u32, buffer: u32) {
        self.gl.bind_buffer_base(gl::UNIFORM_BUFFER, binding, buffer);
    }

    fn set_view_id(&self, location: i32, view: i32) {
        self.gl.uniform_1i(location, view);
    }

    fn apply_draw_state(&self, state: &VRDrawState) {
        let toggle = |cap, enabled| if enabled { self.gl.enable(cap) } else { self.gl.disable(cap) };
        toggle(gl::SCISSOR_TEST, state.scissor_test);
        self.gl.depth_mask(state.depth_write);
        toggle(gl::DEPTH_TEST, state.depth_test);
        if state.depth_test {
            self.gl.depth_func(gl::LEQUAL);
        }
        toggle(gl::CULL_FACE, state.cull_back_faces);
        if state.cull_back_faces {
            self.gl.cull_face(gl::BACK);
        }
    }

    fn viewport(&self, x: i32, y: i32, width: i32, height: i32) {
        self.gl.viewport(x, y, width, height);
    }

    fn scissor(&self, x: i32, y: i32, width: i32, height: i32) {
        self.gl.scissor(x, y, width, height);
    }

    fn clear(&self, color: [f32; 4], depth: bool) {
        self.gl.clear_color(color[0], color[1], color[2], color[3]);
        let mut mask = gl::COLOR_BUFFER_BIT;
        if depth {
            mask |= gl::DEPTH_BUFFER_BIT;
        }
        self.gl.clear(mask);
    }

    fn draw_elements_instanced(&self, index_count: i32, instance_count: i32) {
        self.gl.draw_elements_instanced(gl::TRIANGLES, index_count, gl::UNSIGNED_SHORT, 0, instance_count);
    }

    fn invalidate_depth(&self) {
        let attachments = [gl_ext::DEPTH_ATTACHMENT];
        unsafe { self.ext.InvalidateFramebuffer(gl_ext::DRAW_FRAMEBUFFER, 1, attachments.as_ptr()) };
    }

    fn flush(&self) {
        self.gl.flush();
    }

    fn insert_fence(&self) -> u64 {
        let sync = unsafe { self.ext.FenceSync(gl_ext::SYNC_GPU_COMMANDS_COMPLETE, 0) };
        if sync.is_null() {
            error!("glFenceSync failed: {:#x}", self.gl.get_error());
            return 0;
        }
        // Make sure the fence gets signaled without anyone waiting on it.
        self.gl.flush();

        let handle = sync as usize as u64;
        self.fences.borrow_mut().insert(handle, sync);
        self.fence_count.set(self.fence_count.get() + 1);
        handle
    }

    fn delete_fence(&self, fence: u64) {
        match self.fences.borrow_mut().remove(&fence) {
            Some(sync) => unsafe { self.ext.DeleteSync(sync) },
            None => warn!("Deleting unknown fence {:#x}", fence),
        }
    }

    fn check_error(&self) -> Option<String> {
        match self.gl.get_error() {
            gl::NO_ERROR => None,
            error => Some(format!("GL error {:#x}", error)),
        }
    }
}

impl Drop for GlesGpu {
    fn drop(&mut self) {
        let fences = self.fences.get_mut();
        if !fences.is_empty() {
            warn!("{} fence(s) still alive out of {} inserted", fences.len(), self.fence_count.get());
        }
        for (_, sync) in fences.drain() {
            unsafe { self.ext.DeleteSync(sync) };
        }
    }
}

/// Builds `GlesGpu`s for the render thread. `create` runs on that thread
/// and must make a context sharing objects with the main one current.
pub struct GlesGpuContextFactory {
    create: Box<dyn FnMut() -> Result<GlesGpu, String> + Send>,
}

impl GlesGpuContextFactory {
    pub fn new<F>(create: F) -> GlesGpuContextFactory
        where F: FnMut() -> Result<GlesGpu, String> + Send + 'static
    {
        GlesGpuContextFactory {
            create: Box::new(create),
        }
    }
}

impl VRGpuContextFactory for GlesGpuContextFactory {
    fn create_shared_context(&mut self) -> Result<Box<dyn VRGpu>, String> {
        let gpu = (self.create)()?;
        Ok(Box::new(gpu))
    }
}

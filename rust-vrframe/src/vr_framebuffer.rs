use rust_vrframe_api::{VRCompositor, VRError, VRFramebufferAttributes, VRGpu, VRRenderTarget,
                       VRRenderTargetDesc, VRSwapChainId, VRSwapChainImage, VRTextureSwapChainDesc,
                       VRTextureType};

/// Write position inside a fixed-length swapchain.
///
/// The index only ever moves by `advance`, one step per rendered frame,
/// wrapping at the chain length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VRSwapChainRing {
    length: u32,
    index: u32,
}

impl VRSwapChainRing {
    pub fn new(length: u32) -> Result<VRSwapChainRing, VRError> {
        if length < 2 {
            return Err(VRError::Compositor(format!("swapchain length {} is below double buffering", length)));
        }
        Ok(VRSwapChainRing {
            length: length,
            index: 0,
        })
    }

    pub fn length(&self) -> u32 {
        self.length
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn advance(&mut self) {
        self.index = (self.index + 1) % self.length;
    }
}

/// A compositor color swapchain with one render target per image.
pub struct VREyeFramebuffer {
    attributes: VRFramebufferAttributes,
    swapchain: VRSwapChainId,
    ring: Option<VRSwapChainRing>,
    targets: Vec<VRRenderTarget>,
}

impl VREyeFramebuffer {
    pub fn create(gpu: &dyn VRGpu,
                  compositor: &dyn VRCompositor,
                  attributes: VRFramebufferAttributes,
                  border_clamp: bool) -> Result<VREyeFramebuffer, VRError> {
        let texture_type = if attributes.multiview {
            VRTextureType::Texture2DArray
        } else {
            VRTextureType::Texture2D
        };
        let desc = VRTextureSwapChainDesc::color(texture_type, attributes.width, attributes.height);
        let swapchain = compositor.create_texture_swapchain(&desc).map_err(VRError::Compositor)?;

        let mut framebuffer = VREyeFramebuffer {
            attributes: attributes,
            swapchain: swapchain,
            ring: None,
            targets: Vec::new(),
        };

        // Release whatever was created so far when a later step fails.
        if let Err(e) = framebuffer.create_targets(gpu, compositor, texture_type, border_clamp) {
            framebuffer.destroy(gpu, compositor);
            return Err(e);
        }

        debug!("Created eye framebuffer {:?} with {} images ({}x{}, multiview: {}, samples: {})",
               swapchain, framebuffer.targets.len(), attributes.width, attributes.height,
               attributes.multiview, attributes.samples);
        Ok(framebuffer)
    }

    fn create_targets(&mut self,
                      gpu: &dyn VRGpu,
                      compositor: &dyn VRCompositor,
                      texture_type: VRTextureType,
                      border_clamp: bool) -> Result<(), VRError> {
        let length = compositor.texture_swapchain_length(self.swapchain);
        self.ring = Some(VRSwapChainRing::new(length)?);

        for index in 0..length {
            let texture = compositor.texture_swapchain_handle(self.swapchain, index);
            gpu.configure_color_texture(texture, texture_type, border_clamp);

            let target = gpu.create_render_target(&VRRenderTargetDesc {
                color_texture: texture,
                texture_type: texture_type,
                width: self.attributes.width,
                height: self.attributes.height,
                samples: self.attributes.samples,
                multiview: self.attributes.multiview,
            }).map_err(VRError::Gpu)?;
            self.targets.push(target);

            gpu.check_framebuffer_complete(target.framebuffer)
               .map_err(VRError::IncompleteFramebuffer)?;
        }
        Ok(())
    }

    pub fn attributes(&self) -> &VRFramebufferAttributes {
        &self.attributes
    }

    pub fn swapchain(&self) -> VRSwapChainId {
        self.swapchain
    }

    pub fn length(&self) -> u32 {
        self.ring.map_or(0, |ring| ring.length())
    }

    pub fn current_index(&self) -> u32 {
        self.ring.map_or(0, |ring| ring.index())
    }

    /// The image the next draw lands in.
    pub fn current_image(&self) -> VRSwapChainImage {
        VRSwapChainImage::new(self.swapchain, self.current_index())
    }

    pub fn current_framebuffer(&self) -> u32 {
        self.targets.get(self.current_index() as usize).map_or(0, |t| t.framebuffer)
    }

    pub fn set_current(&self, gpu: &dyn VRGpu) {
        gpu.bind_draw_framebuffer(self.current_framebuffer());
    }

    pub fn resolve(&self, gpu: &dyn VRGpu) {
        // Depth never leaves the tile memory.
        gpu.invalidate_depth();
        gpu.flush();
    }

    pub fn advance(&mut self) {
        if let Some(ref mut ring) = self.ring {
            ring.advance();
        }
    }

    /// Releases render targets and the swapchain. Safe to call twice.
    pub fn destroy(&mut self, gpu: &dyn VRGpu, compositor: &dyn VRCompositor) {
        for target in self.targets.drain(..) {
            gpu.delete_render_target(&target);
        }
        if self.swapchain != VRSwapChainId::NONE {
            compositor.destroy_texture_swapchain(self.swapchain);
            self.swapchain = VRSwapChainId::NONE;
        }
        self.ring = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_index_is_advance_count_modulo_length() {
        for length in 2..7 {
            let mut ring = VRSwapChainRing::new(length).unwrap();
            for n in 0..(10 * length) {
                assert_eq!(ring.index(), n % length);
                let previous = ring.index();
                ring.advance();
                assert_eq!(ring.index(), (previous + 1) % length);
            }
        }
    }

    #[test]
    fn ring_requires_double_buffering() {
        assert!(VRSwapChainRing::new(0).is_err());
        assert!(VRSwapChainRing::new(1).is_err());
        assert_eq!(VRSwapChainRing::new(3).unwrap().length(), 3);
    }
}

#[cfg(all(test, feature = "mock"))]
mod mock_tests {
    use super::*;
    use crate::api::mock::{MockCompositor, MockGpu, MockGpuCall};
    use rust_vrframe_api::VRGpuCapabilities;

    fn attributes(multiview: bool) -> VRFramebufferAttributes {
        VRFramebufferAttributes {
            multiview: multiview,
            depth: true,
            samples: 4,
            width: 64,
            height: 32,
        }
    }

    #[test]
    fn creates_one_target_per_swapchain_image() {
        let compositor = MockCompositor::new();
        let gpu = MockGpu::new(VRGpuCapabilities::default());
        let mut framebuffer = VREyeFramebuffer::create(&gpu, &compositor, attributes(false), false).unwrap();

        assert_eq!(framebuffer.length(), 3);
        let state = gpu.state_handle();
        assert_eq!(state.lock().unwrap().live_render_targets(), 3);
        let chains = compositor.state_handle().lock().unwrap().swapchains.clone();
        assert_eq!(chains.len(), 1);
        assert_eq!(chains[0].1.texture_type, VRTextureType::Texture2D);

        let first = framebuffer.current_framebuffer();
        framebuffer.advance();
        assert_eq!(framebuffer.current_index(), 1);
        assert!(framebuffer.current_framebuffer() != first);

        framebuffer.destroy(&gpu, &compositor);
        framebuffer.destroy(&gpu, &compositor);
        assert_eq!(state.lock().unwrap().live_render_targets(), 0);
        assert_eq!(compositor.state_handle().lock().unwrap().destroyed_swapchains.len(), 1);
    }

    #[test]
    fn multiview_uses_array_textures() {
        let compositor = MockCompositor::new();
        let gpu = MockGpu::new(VRGpuCapabilities::default());
        let framebuffer = VREyeFramebuffer::create(&gpu, &compositor, attributes(true), true).unwrap();
        let chains = compositor.state_handle().lock().unwrap().swapchains.clone();
        assert_eq!(chains[0].1.texture_type, VRTextureType::Texture2DArray);

        let state = gpu.state_handle();
        let calls = state.lock().unwrap().calls.clone();
        assert!(calls.iter().any(|call| match *call {
            MockGpuCall::ConfigureColorTexture { border_clamp, .. } => border_clamp,
            _ => false,
        }));
        assert_eq!(framebuffer.current_image().swapchain, framebuffer.swapchain());
    }

    #[test]
    fn incomplete_framebuffer_is_fatal_and_cleans_up() {
        let compositor = MockCompositor::new();
        let gpu = MockGpu::new(VRGpuCapabilities::default());
        gpu.state_handle().lock().unwrap().fail_completeness = true;

        match VREyeFramebuffer::create(&gpu, &compositor, attributes(false), false) {
            Err(VRError::IncompleteFramebuffer(_)) => {},
            other => panic!("unexpected result: {:?}", other.err()),
        }
        assert_eq!(gpu.state_handle().lock().unwrap().live_render_targets(), 0);
        assert_eq!(compositor.state_handle().lock().unwrap().destroyed_swapchains.len(), 1);
    }
}

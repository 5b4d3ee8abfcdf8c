use rust_vrframe_api::utils;
use rust_vrframe_api::{VRBufferTarget, VRCompositor, VRDrawState, VRError, VRFramebufferAttributes, VRGpu,
                       VRLayerFlags, VRLayerHeader, VRLayerTexture, VRPipelineSettings, VRProjectionLayer,
                       VRTracking, EYE_COUNT};
use crate::vr_fence::VRFenceRing;
use crate::vr_framebuffer::VREyeFramebuffer;
use crate::vr_scene::{float_bytes, VRScene, VRSceneVertexState, SCENE_MATRICES_BINDING};
use crate::vr_simulation::VRSimulation;

const BORDER_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

/// Draws the cube world into the eye swapchains.
///
/// One framebuffer covers both eyes when multiview is on, otherwise there is
/// one per eye and the scene is drawn twice.
pub struct VRRenderer {
    framebuffers: Vec<VREyeFramebuffer>,
    fences: VRFenceRing,
    attributes: VRFramebufferAttributes,
    border_clamp: bool,
    clear_color: [f32; 4],
}

impl VRRenderer {
    pub fn create(gpu: &dyn VRGpu,
                  compositor: &dyn VRCompositor,
                  settings: &VRPipelineSettings,
                  use_multiview: bool) -> Result<VRRenderer, VRError> {
        let properties = compositor.system_properties();
        let capabilities = gpu.capabilities();

        let attributes = VRFramebufferAttributes {
            multiview: use_multiview && capabilities.multiview,
            depth: true,
            samples: settings.num_multisamples.max(1),
            width: properties.suggested_eye_texture_width,
            height: properties.suggested_eye_texture_height,
        };
        if !capabilities.border_clamp {
            warn!("Border clamp not supported, clearing eye texture borders every frame");
        }

        let mut renderer = VRRenderer {
            framebuffers: Vec::new(),
            fences: VRFenceRing::new(),
            attributes: attributes,
            border_clamp: capabilities.border_clamp,
            clear_color: settings.clear_color,
        };

        for _ in 0..attributes.num_buffers() {
            match VREyeFramebuffer::create(gpu, compositor, attributes, capabilities.border_clamp) {
                Ok(framebuffer) => renderer.framebuffers.push(framebuffer),
                Err(e) => {
                    renderer.destroy(gpu, compositor);
                    return Err(e);
                }
            }
        }

        info!("Renderer ready: {} eye buffer(s) of {}x{}, multiview {}",
              renderer.framebuffers.len(), attributes.width, attributes.height,
              if attributes.multiview { "on" } else { "off" });
        Ok(renderer)
    }

    pub fn attributes(&self) -> &VRFramebufferAttributes {
        &self.attributes
    }

    pub fn framebuffers(&self) -> &[VREyeFramebuffer] {
        &self.framebuffers
    }

    /// Renders one frame and returns the layer showing it together with the
    /// fence that signals when the GPU is done with it.
    pub fn render_frame(&mut self,
                        gpu: &dyn VRGpu,
                        scene: &VRScene,
                        vertex_state: &VRSceneVertexState,
                        simulation: &VRSimulation,
                        tracking: &VRTracking) -> (VRProjectionLayer, u64) {
        self.update_instances(gpu, scene, simulation);
        self.update_scene_matrices(gpu, scene, tracking);

        // Captured before the swapchains advance below.
        let layer = self.projection_layer(tracking);

        let viewport = self.attributes.viewport();
        for (eye, framebuffer) in self.framebuffers.iter_mut().enumerate() {
            framebuffer.set_current(gpu);

            gpu.use_program(scene.program().program);
            gpu.bind_uniform_buffer(SCENE_MATRICES_BINDING, scene.scene_matrices());
            // The multiview variant has no view id uniform.
            if scene.program().view_id_location >= 0 {
                gpu.set_view_id(scene.program().view_id_location, eye as i32);
            }
            gpu.apply_draw_state(&VRDrawState::eye_pass());
            gpu.viewport(viewport.x, viewport.y, viewport.width, viewport.height);
            gpu.scissor(viewport.x, viewport.y, viewport.width, viewport.height);
            gpu.clear(self.clear_color, true);
            gpu.bind_vertex_array(vertex_state.vertex_array());
            gpu.draw_elements_instanced(scene.index_count(), scene.layout().len() as i32);
            gpu.bind_vertex_array(0);
            gpu.use_program(0);

            if !self.border_clamp {
                for strip in viewport.border_strips().iter() {
                    gpu.scissor(strip.x, strip.y, strip.width, strip.height);
                    gpu.clear(BORDER_COLOR, false);
                }
            }

            if let Some(error) = gpu.check_error() {
                error!("GPU error while rendering eye {}: {}", eye, error);
            }

            framebuffer.resolve(gpu);
            framebuffer.advance();
        }

        gpu.bind_draw_framebuffer(0);
        let fence = self.fences.insert(gpu);
        (layer, fence)
    }

    fn update_instances(&self, gpu: &dyn VRGpu, scene: &VRScene, simulation: &VRSimulation) {
        let layout = scene.layout();
        let current = &simulation.current_rotation;
        let rotations: Vec<[f32; 16]> = layout.rotations.iter().map(|r| {
            utils::rotation_matrix(r[0] * current[0], r[1] * current[1], r[2] * current[2])
        }).collect();

        let mut transforms = Vec::with_capacity(layout.len() * 16);
        for (position, rotation_index) in layout.positions.iter().zip(layout.rotation_indices.iter()) {
            let rotation = &rotations[*rotation_index];
            transforms.extend_from_slice(&rotation[..12]);
            transforms.extend_from_slice(&[position[0], position[1], position[2], 1.0]);
        }
        gpu.write_buffer(VRBufferTarget::Vertex, scene.instance_buffer(), float_bytes(&transforms));
    }

    fn update_scene_matrices(&self, gpu: &dyn VRGpu, scene: &VRScene, tracking: &VRTracking) {
        let mut matrices = Vec::with_capacity(4 * 16);
        for eye in tracking.eyes.iter() {
            matrices.extend_from_slice(&utils::transpose_matrix(&eye.view_matrix));
        }
        for eye in tracking.eyes.iter() {
            matrices.extend_from_slice(&utils::transpose_matrix(&eye.projection_matrix));
        }
        gpu.write_buffer(VRBufferTarget::Uniform, scene.scene_matrices(), float_bytes(&matrices));
    }

    fn projection_layer(&self, tracking: &VRTracking) -> VRProjectionLayer {
        let mut layer = VRProjectionLayer {
            header: VRLayerHeader {
                flags: VRLayerFlags::CHROMATIC_ABERRATION_CORRECTION,
                ..VRLayerHeader::default()
            },
            head_pose: tracking.head_pose,
            ..VRProjectionLayer::default()
        };
        for eye in 0..EYE_COUNT {
            let framebuffer = &self.framebuffers[if self.framebuffers.len() == 1 { 0 } else { eye }];
            layer.textures[eye] = VRLayerTexture {
                image: framebuffer.current_image(),
                tex_coords_from_tan_angles:
                    utils::tan_angle_matrix_from_projection(&tracking.eyes[eye].projection_matrix),
                ..VRLayerTexture::default()
            };
        }
        layer
    }

    pub fn destroy(&mut self, gpu: &dyn VRGpu, compositor: &dyn VRCompositor) {
        for framebuffer in self.framebuffers.iter_mut() {
            framebuffer.destroy(gpu, compositor);
        }
        self.framebuffers.clear();
        self.fences.destroy(gpu);
    }
}

#[cfg(all(test, feature = "mock"))]
mod tests {
    use super::*;
    use crate::api::mock::{MockCompositor, MockGpu, MockGpuCall};
    use rust_vrframe_api::{VREyeMatrices, VRGpuCapabilities, VRSwapChainImage};

    fn settings() -> VRPipelineSettings {
        VRPipelineSettings {
            num_instances: 8,
            num_rotations: 4,
            ..VRPipelineSettings::default()
        }
    }

    fn tracking() -> VRTracking {
        let mut tracking = VRTracking::default();
        for (eye, matrices) in tracking.eyes.iter_mut().enumerate() {
            let mut view = [1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0];
            view[3] = if eye == 0 { 0.032 } else { -0.032 };
            *matrices = VREyeMatrices {
                projection_matrix: utils::projection_matrix_fov(90.0, 90.0, 0.0, 0.0, 0.1, 0.0),
                view_matrix: view,
            };
        }
        tracking
    }

    fn floats(bytes: &[u8]) -> Vec<f32> {
        bytes.chunks(4).map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]])).collect()
    }

    fn setup(capabilities: VRGpuCapabilities) -> (MockCompositor, MockGpu, VRRenderer, VRScene, VRSceneVertexState) {
        let compositor = MockCompositor::new();
        let gpu = MockGpu::new(capabilities);
        let multiview = capabilities.multiview;
        let renderer = VRRenderer::create(&gpu, &compositor, &settings(), multiview).unwrap();
        let scene = VRScene::create(&gpu, &settings(), multiview).unwrap();
        let mut vertex_state = VRSceneVertexState::new();
        vertex_state.ensure(&gpu, &scene).unwrap();
        (compositor, gpu, renderer, scene, vertex_state)
    }

    #[test]
    fn layer_references_the_images_just_rendered() {
        let (compositor, gpu, mut renderer, mut scene, mut vertex_state) = setup(VRGpuCapabilities::default());
        assert_eq!(renderer.framebuffers().len(), 2);

        let (first, fence) = renderer.render_frame(&gpu, &scene, &vertex_state,
                                                   &VRSimulation::advance(1.0), &tracking());
        assert!(fence != 0);
        assert!(first.header.flags.contains(VRLayerFlags::CHROMATIC_ABERRATION_CORRECTION));
        assert_eq!(first.textures[0].image, VRSwapChainImage::new(renderer.framebuffers()[0].swapchain(), 0));
        assert_eq!(first.textures[1].image, VRSwapChainImage::new(renderer.framebuffers()[1].swapchain(), 0));

        let (second, _) = renderer.render_frame(&gpu, &scene, &vertex_state,
                                                &VRSimulation::advance(2.0), &tracking());
        assert_eq!(second.textures[0].image.index, 1);
        assert_eq!(renderer.framebuffers()[0].current_index(), 2);

        vertex_state.destroy(&gpu);
        scene.destroy(&gpu);
        renderer.destroy(&gpu, &compositor);
        let state = gpu.state_handle();
        let state = state.lock().unwrap();
        assert_eq!(state.live_render_targets(), 0);
        assert_eq!(state.live_fences(), 0);
    }

    #[test]
    fn uploads_transposed_matrices_and_instance_rows() {
        let (_compositor, gpu, mut renderer, scene, vertex_state) = setup(VRGpuCapabilities::default());
        let tracking = tracking();
        renderer.render_frame(&gpu, &scene, &vertex_state, &VRSimulation::advance(0.0), &tracking);

        let state = gpu.state_handle();
        let state = state.lock().unwrap();
        let matrices = floats(state.buffer_contents(scene.scene_matrices()).unwrap());
        assert_eq!(matrices.len(), 64);
        // The eye offset sits in row 0, column 3 and moves to element 12 once transposed.
        assert_eq!(matrices[12], 0.032);
        assert_eq!(matrices[16 + 12], -0.032);
        assert_eq!(&matrices[32..48], &utils::transpose_matrix(&tracking.eyes[0].projection_matrix)[..]);

        // No rotation at t = 0: identity rows followed by the position.
        let instances = floats(state.buffer_contents(scene.instance_buffer()).unwrap());
        assert_eq!(instances.len(), 8 * 16);
        let position = scene.layout().positions[0];
        assert_eq!(&instances[..12], &[1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
        assert_eq!(&instances[12..16], &[position[0], position[1], position[2], 1.0]);
    }

    #[test]
    fn draws_once_per_eye_and_clears_borders_without_clamp() {
        let (_compositor, gpu, mut renderer, scene, vertex_state) = setup(VRGpuCapabilities::default());
        gpu.state_handle().lock().unwrap().calls.clear();
        renderer.render_frame(&gpu, &scene, &vertex_state, &VRSimulation::advance(0.5), &tracking());

        let state = gpu.state_handle();
        let calls = state.lock().unwrap().calls.clone();
        let draws: Vec<_> = calls.iter().filter(|c| match **c {
            MockGpuCall::DrawElementsInstanced { index_count: 36, instance_count: 8 } => true,
            _ => false,
        }).collect();
        assert_eq!(draws.len(), 2);
        let view_ids: Vec<i32> = calls.iter().filter_map(|c| match *c {
            MockGpuCall::SetViewId { view, .. } => Some(view),
            _ => None,
        }).collect();
        assert_eq!(view_ids, vec![0, 1]);
        let border_clears = calls.iter().filter(|c| match **c {
            MockGpuCall::Clear { color, depth: false } => color == BORDER_COLOR,
            _ => false,
        }).count();
        assert_eq!(border_clears, 8);
        assert_eq!(calls.last(), Some(&MockGpuCall::InsertFence(state.lock().unwrap().last_fence())));
    }

    #[test]
    fn multiview_draws_a_single_pass() {
        let capabilities = VRGpuCapabilities {
            multiview: true,
            border_clamp: true,
            ..VRGpuCapabilities::default()
        };
        let (_compositor, gpu, mut renderer, scene, vertex_state) = setup(capabilities);
        assert_eq!(renderer.framebuffers().len(), 1);
        gpu.state_handle().lock().unwrap().calls.clear();

        let (layer, _) = renderer.render_frame(&gpu, &scene, &vertex_state,
                                               &VRSimulation::advance(0.5), &tracking());
        assert_eq!(layer.textures[0].image, layer.textures[1].image);

        let state = gpu.state_handle();
        let calls = state.lock().unwrap().calls.clone();
        let draws = calls.iter().filter(|c| match **c {
            MockGpuCall::DrawElementsInstanced { .. } => true,
            _ => false,
        }).count();
        assert_eq!(draws, 1);
        assert!(!calls.iter().any(|c| match *c {
            MockGpuCall::SetViewId { .. } => true,
            MockGpuCall::Clear { depth: false, .. } => true,
            _ => false,
        }));
    }
}

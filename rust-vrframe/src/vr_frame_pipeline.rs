use std::sync::Arc;
use rust_vrframe_api::{VRCompositor, VRError, VRFrameFlags, VRGpu, VRLayer, VRLayerFlags, VRLoadingIconLayer,
                       VRPipelineSettings, VRProjectionLayer, VRSessionHandle, VRSubmitDescription, VRTracking};
use crate::vr_renderer::VRRenderer;
use crate::vr_scene::{VRScene, VRSceneVertexState};
use crate::vr_simulation::VRSimulation;

/// What a frame cycle puts on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VRRenderKind {
    // The cube world.
    Frame,
    // Black background with the system spinner, shown until the scene exists.
    LoadingIcon,
    // Last frame of the session.
    BlackFinal,
}

impl VRRenderKind {
    pub fn frame_flags(&self) -> VRFrameFlags {
        match *self {
            VRRenderKind::Frame => VRFrameFlags::empty(),
            VRRenderKind::LoadingIcon => VRFrameFlags::FLUSH,
            VRRenderKind::BlackFinal => VRFrameFlags::FLUSH | VRFrameFlags::FINAL,
        }
    }
}

pub fn loading_layers() -> Vec<VRLayer> {
    vec![VRLayer::Projection(VRProjectionLayer::black()).with_flags(VRLayerFlags::INHIBIT_SRGB_FRAMEBUFFER),
         VRLayer::LoadingIcon(VRLoadingIconLayer::default()).with_flags(VRLayerFlags::INHIBIT_SRGB_FRAMEBUFFER)]
}

pub fn black_final_layers() -> Vec<VRLayer> {
    vec![VRLayer::Projection(VRProjectionLayer::black()).with_flags(VRLayerFlags::INHIBIT_SRGB_FRAMEBUFFER)]
}

/// Everything needed to render and submit one frame, latched by value so the
/// producer never looks at the driving thread's state.
#[derive(Clone)]
pub struct VRFrameWork {
    pub kind: VRRenderKind,
    pub session: VRSessionHandle,
    pub frame_index: u64,
    pub display_time: f64,
    pub swap_interval: u32,
    pub scene: Option<Arc<VRScene>>,
    pub simulation: VRSimulation,
    pub tracking: VRTracking,
}

impl VRFrameWork {
    pub fn new(kind: VRRenderKind, session: VRSessionHandle, frame_index: u64, display_time: f64,
               swap_interval: u32) -> VRFrameWork {
        VRFrameWork {
            kind: kind,
            session: session,
            frame_index: frame_index,
            display_time: display_time,
            swap_interval: swap_interval,
            scene: None,
            simulation: VRSimulation::default(),
            tracking: VRTracking::default(),
        }
    }
}

/// Frame index and display time of the frame being produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VRFrameCounter {
    frame_index: u64,
    display_time: f64,
}

impl VRFrameCounter {
    pub fn new(first_frame_index: u64) -> VRFrameCounter {
        VRFrameCounter {
            frame_index: first_frame_index,
            display_time: 0.0,
        }
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn display_time(&self) -> f64 {
        self.display_time
    }

    /// Moves to the next frame. The index is bumped before the compositor is
    /// asked for its display time, which it keys on the index.
    pub fn predict(&mut self, compositor: &dyn VRCompositor, session: VRSessionHandle) -> VRTracking {
        self.frame_index += 1;
        self.display_time = compositor.predicted_display_time(session, self.frame_index);
        compositor.predicted_tracking(session, self.display_time)
    }
}

/// Rejects submissions that break the frame protocol: anything after a final
/// frame, or a frame index lower than one already submitted.
#[derive(Debug, Default)]
pub struct VRSubmitGuard {
    last_frame_index: Option<u64>,
    finalized: bool,
}

impl VRSubmitGuard {
    pub fn new() -> VRSubmitGuard {
        VRSubmitGuard::default()
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn check(&mut self, desc: &VRSubmitDescription) -> Result<(), VRError> {
        if self.finalized {
            return Err(VRError::ProtocolViolation(
                format!("frame {} submitted after the final frame", desc.frame_index)));
        }
        if let Some(last) = self.last_frame_index {
            if desc.frame_index < last {
                return Err(VRError::ProtocolViolation(
                    format!("frame index went back from {} to {}", last, desc.frame_index)));
            }
        }
        self.last_frame_index = Some(desc.frame_index);
        self.finalized = desc.is_final();
        Ok(())
    }

    pub fn submit(&mut self,
                  compositor: &dyn VRCompositor,
                  session: VRSessionHandle,
                  desc: &VRSubmitDescription) -> Result<(), VRError> {
        desc.validate()?;
        self.check(desc)?;
        compositor.submit_frame(session, desc).map_err(VRError::Compositor)
    }
}

/// Turns frame work into compositor submissions on one rendering context.
///
/// Runs inline on the driving thread, or owned by the render thread.
pub struct VRFrameProducer {
    renderer: VRRenderer,
    vertex_state: VRSceneVertexState,
    guard: VRSubmitGuard,
}

impl VRFrameProducer {
    pub fn create(gpu: &dyn VRGpu,
                  compositor: &dyn VRCompositor,
                  settings: &VRPipelineSettings,
                  use_multiview: bool) -> Result<VRFrameProducer, VRError> {
        Ok(VRFrameProducer {
            renderer: VRRenderer::create(gpu, compositor, settings, use_multiview)?,
            vertex_state: VRSceneVertexState::new(),
            guard: VRSubmitGuard::new(),
        })
    }

    pub fn renderer(&self) -> &VRRenderer {
        &self.renderer
    }

    pub fn produce(&mut self, gpu: &dyn VRGpu, work: &VRFrameWork) -> Result<VRSubmitDescription, VRError> {
        let mut desc = VRSubmitDescription::new(work.frame_index, work.display_time, work.swap_interval)
            .with_flags(work.kind.frame_flags());

        match work.kind {
            VRRenderKind::Frame => {
                let scene = match work.scene {
                    Some(ref scene) => scene,
                    None => return Err(VRError::ProtocolViolation(
                        format!("frame {} has no scene to render", work.frame_index))),
                };
                self.vertex_state.ensure(gpu, scene)?;
                let (layer, fence) = self.renderer.render_frame(gpu, scene, &self.vertex_state,
                                                                &work.simulation, &work.tracking);
                desc.completion_fence = fence;
                desc.layers.push(VRLayer::Projection(layer));
            },
            VRRenderKind::LoadingIcon => desc.layers = loading_layers(),
            VRRenderKind::BlackFinal => desc.layers = black_final_layers(),
        }
        Ok(desc)
    }

    pub fn execute(&mut self,
                   gpu: &dyn VRGpu,
                   compositor: &dyn VRCompositor,
                   work: &VRFrameWork) -> Result<(), VRError> {
        let desc = self.produce(gpu, work)?;
        self.guard.submit(compositor, work.session, &desc)
    }

    /// Vertex arrays go before the render targets they were used with.
    pub fn destroy(&mut self, gpu: &dyn VRGpu, compositor: &dyn VRCompositor) {
        self.vertex_state.destroy(gpu);
        self.renderer.destroy(gpu, compositor);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_vrframe_api::{VRLayerType, VRSwapChainId};

    fn desc(frame_index: u64, flags: VRFrameFlags) -> VRSubmitDescription {
        VRSubmitDescription::new(frame_index, 0.0, 1)
            .with_flags(flags)
            .with_layer(black_final_layers()[0])
    }

    #[test]
    fn guard_rejects_frames_after_final() {
        let mut guard = VRSubmitGuard::new();
        assert!(guard.check(&desc(2, VRFrameFlags::empty())).is_ok());
        assert!(guard.check(&desc(2, VRFrameFlags::FLUSH | VRFrameFlags::FINAL)).is_ok());
        assert!(guard.is_finalized());
        match guard.check(&desc(3, VRFrameFlags::empty())) {
            Err(VRError::ProtocolViolation(_)) => {},
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn guard_rejects_frame_index_going_back() {
        let mut guard = VRSubmitGuard::new();
        assert!(guard.check(&desc(1, VRFrameFlags::FLUSH)).is_ok());
        assert!(guard.check(&desc(1, VRFrameFlags::empty())).is_ok());
        assert!(guard.check(&desc(5, VRFrameFlags::empty())).is_ok());
        assert!(guard.check(&desc(4, VRFrameFlags::empty())).is_err());
        assert!(!guard.is_finalized());
    }

    #[test]
    fn loading_frame_layers() {
        let layers = loading_layers();
        assert_eq!(layers.len(), 2);
        assert_eq!(layers[0].layer_type(), VRLayerType::Projection);
        assert_eq!(layers[1].layer_type(), VRLayerType::LoadingIcon);
        assert!(layers.iter().all(|l| l.flags().contains(VRLayerFlags::INHIBIT_SRGB_FRAMEBUFFER)));
        match layers[0] {
            VRLayer::Projection(ref p) => assert_eq!(p.textures[1].image.swapchain, VRSwapChainId::DEFAULT),
            _ => unreachable!(),
        }
        assert_eq!(VRRenderKind::LoadingIcon.frame_flags(), VRFrameFlags::FLUSH);
        assert_eq!(VRRenderKind::BlackFinal.frame_flags(), VRFrameFlags::FLUSH | VRFrameFlags::FINAL);
        assert!(VRRenderKind::Frame.frame_flags().is_empty());
    }
}

#[cfg(all(test, feature = "mock"))]
mod mock_tests {
    use super::*;
    use crate::api::mock::{MockCompositor, MockGpu, MockGpuCall};
    use rust_vrframe_api::{VRGpuCapabilities, VRModeParms};

    #[test]
    fn counter_bumps_the_index_before_predicting() {
        let compositor = MockCompositor::new();
        let session = compositor.enter_vr_mode(&VRModeParms::default()).unwrap();
        let mut counter = VRFrameCounter::new(1);
        for expected in 2..12 {
            let tracking = counter.predict(&compositor, session);
            assert_eq!(counter.frame_index(), expected);
            assert!((tracking.head_pose.display_time() - counter.display_time()).abs() < 1e-9);
        }
        let predicted = compositor.state_handle().lock().unwrap().predicted_frames.clone();
        assert_eq!(predicted, (2..12).collect::<Vec<u64>>());
    }

    #[test]
    fn producer_drops_frames_after_final() {
        let compositor = MockCompositor::new();
        let gpu = MockGpu::new(VRGpuCapabilities::default());
        let session = compositor.enter_vr_mode(&VRModeParms::default()).unwrap();
        let settings = VRPipelineSettings { num_instances: 16, ..VRPipelineSettings::default() };
        let mut producer = VRFrameProducer::create(&gpu, &compositor, &settings, false).unwrap();

        let scene = Arc::new(VRScene::create(&gpu, &settings, false).unwrap());
        let mut work = VRFrameWork::new(VRRenderKind::LoadingIcon, session, 1, 0.0, 1);
        producer.execute(&gpu, &compositor, &work).unwrap();

        work.kind = VRRenderKind::Frame;
        work.frame_index = 2;
        work.scene = Some(scene.clone());
        producer.execute(&gpu, &compositor, &work).unwrap();

        work.kind = VRRenderKind::BlackFinal;
        producer.execute(&gpu, &compositor, &work).unwrap();

        work.kind = VRRenderKind::Frame;
        work.frame_index = 3;
        assert!(producer.execute(&gpu, &compositor, &work).is_err());

        let submissions = compositor.state_handle().lock().unwrap().submissions.clone();
        assert_eq!(submissions.len(), 3);
        assert!(submissions[1].desc.completion_fence != 0);
        assert!(submissions[2].desc.is_final());

        producer.destroy(&gpu, &compositor);
        assert_eq!(gpu.state_handle().lock().unwrap().live_vertex_arrays(), 0);
    }

    #[test]
    fn gpu_errors_do_not_drop_the_frame() {
        let compositor = MockCompositor::new();
        let gpu = MockGpu::new(VRGpuCapabilities::default());
        let session = compositor.enter_vr_mode(&VRModeParms::default()).unwrap();
        let settings = VRPipelineSettings { num_instances: 16, ..VRPipelineSettings::default() };
        let mut producer = VRFrameProducer::create(&gpu, &compositor, &settings, false).unwrap();
        let scene = Arc::new(VRScene::create(&gpu, &settings, false).unwrap());

        {
            let state = gpu.state_handle();
            let mut state = state.lock().unwrap();
            state.calls.clear();
            state.pending_errors = vec!["GL_INVALID_OPERATION".into(); 3];
        }
        let mut work = VRFrameWork::new(VRRenderKind::Frame, session, 2, 0.0, 1);
        work.scene = Some(scene);
        producer.execute(&gpu, &compositor, &work).unwrap();

        {
            let state = gpu.state_handle();
            let state = state.lock().unwrap();
            // Read once per eye.
            assert_eq!(state.pending_errors.len(), 1);
            let draws = state.calls.iter().filter(|c| match **c {
                MockGpuCall::DrawElementsInstanced { .. } => true,
                _ => false,
            }).count();
            assert_eq!(draws, 2);
            assert_eq!(state.calls.last(), Some(&MockGpuCall::InsertFence(state.last_fence())));
        }
        assert!(producer.renderer().framebuffers().iter().all(|f| f.current_index() == 1));

        let submissions = compositor.state_handle().lock().unwrap().submissions.clone();
        assert_eq!(submissions.len(), 1);
        assert_eq!(submissions[0].desc.completion_fence, gpu.state_handle().lock().unwrap().last_fence());
        match submissions[0].desc.layers[..] {
            [VRLayer::Projection(_)] => {},
            ref layers => panic!("unexpected layers: {:?}", layers),
        }

        producer.destroy(&gpu, &compositor);
    }
}

use std::sync::Arc;
use rust_vrframe_api::utils;
use rust_vrframe_api::{VRCompositorPtr, VRError, VREvent, VRGpu, VRGpuContextFactory, VRPipelineSettings, VRPlatform,
                       VRSessionHandle, VRSystemUI};
use crate::vr_frame_pipeline::{VRFrameCounter, VRFrameProducer, VRFrameWork, VRRenderKind};
use crate::vr_lifecycle::{VRModeController, VRModeTransition, VRPerfRegistration};
use crate::vr_render_thread::VRRenderThread;
use crate::vr_scene::VRScene;
use crate::vr_simulation::VRSimulation;

// Where frames get rendered and submitted.
enum VRFrameBackend {
    Inline(VRFrameProducer),
    Threaded(VRRenderThread),
}

impl VRFrameBackend {
    fn render_thread(&self) -> Option<&VRRenderThread> {
        match *self {
            VRFrameBackend::Threaded(ref render_thread) => Some(render_thread),
            VRFrameBackend::Inline(_) => None,
        }
    }
}

/// Owns everything a running VR application needs and drives its frame loop.
///
/// Each cycle polls lifecycle events, keeps VR mode in step with them, reads
/// the back button and produces one frame: predict, simulate, then render
/// and submit, inline or on the render thread depending on the threading
/// mode chosen at creation.
pub struct VRSession {
    compositor: VRCompositorPtr,
    platform: Box<dyn VRPlatform>,
    gpu: Box<dyn VRGpu>,
    settings: VRPipelineSettings,
    use_multiview: bool,
    backend: Option<VRFrameBackend>,
    mode: VRModeController,
    perf: VRPerfRegistration,
    counter: VRFrameCounter,
    scene: Option<Arc<VRScene>>,
    start_time: f64,
    back_button_down_last_frame: bool,
    // The black final frame went out; nothing may follow it.
    finalized: bool,
    destroy_requested: bool,
    shut_down: bool,
}

impl VRSession {
    /// Initializes the compositor and builds the frame backend.
    ///
    /// `factory` is only used in dual-threaded mode, where the render thread
    /// creates its own context sharing objects with `gpu`.
    pub fn new(compositor: VRCompositorPtr,
               platform: Box<dyn VRPlatform>,
               gpu: Box<dyn VRGpu>,
               factory: Option<Box<dyn VRGpuContextFactory>>,
               settings: VRPipelineSettings) -> Result<VRSession, VRError> {
        if let Err(msg) = compositor.initialize() {
            error!("Error initializing VR compositor: {:?}", msg);
            return Err(VRError::Compositor(msg));
        }

        let properties = compositor.system_properties();
        let use_multiview = settings.use_multiview && gpu.capabilities().multiview && properties.multiview_available;
        info!("Multiview {}, {:?}", if use_multiview { "enabled" } else { "disabled" }, settings.threading);

        let backend = match VRSession::create_backend(&compositor, &*gpu, factory, &settings, use_multiview) {
            Ok(backend) => backend,
            Err(e) => {
                error!("Error creating the frame backend: {}", e);
                compositor.shutdown();
                return Err(e);
            }
        };

        let main_tid = utils::current_thread_id();
        let renderer_tid = backend.render_thread().map_or(main_tid, |render_thread| render_thread.get_tid());

        Ok(VRSession {
            compositor: compositor,
            platform: platform,
            gpu: gpu,
            perf: VRPerfRegistration {
                cpu_level: settings.cpu_level,
                gpu_level: settings.gpu_level,
                main_tid: main_tid,
                renderer_tid: renderer_tid,
            },
            counter: VRFrameCounter::new(settings.first_frame_index),
            settings: settings,
            use_multiview: use_multiview,
            backend: Some(backend),
            mode: VRModeController::new(),
            scene: None,
            start_time: utils::time_in_seconds(),
            back_button_down_last_frame: false,
            finalized: false,
            destroy_requested: false,
            shut_down: false,
        })
    }

    fn create_backend(compositor: &VRCompositorPtr,
                      gpu: &dyn VRGpu,
                      factory: Option<Box<dyn VRGpuContextFactory>>,
                      settings: &VRPipelineSettings,
                      use_multiview: bool) -> Result<VRFrameBackend, VRError> {
        if settings.is_dual_threaded() {
            let factory = factory.ok_or_else(|| {
                VRError::RenderThread("dual-threaded mode needs a shared context factory".into())
            })?;
            let render_thread = VRRenderThread::create(factory, compositor.clone(), settings.clone(), use_multiview)?;
            Ok(VRFrameBackend::Threaded(render_thread))
        } else {
            let producer = VRFrameProducer::create(gpu, &**compositor, settings, use_multiview)?;
            Ok(VRFrameBackend::Inline(producer))
        }
    }

    pub fn use_multiview(&self) -> bool {
        self.use_multiview
    }

    pub fn is_active(&self) -> bool {
        self.mode.is_active()
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn is_destroy_requested(&self) -> bool {
        self.destroy_requested
    }

    pub fn frame_index(&self) -> u64 {
        self.counter.frame_index()
    }

    pub fn perf_registration(&self) -> VRPerfRegistration {
        self.perf
    }

    /// Runs frame cycles until the platform asks to be destroyed, then
    /// shuts down.
    pub fn run(&mut self) -> Result<(), VRError> {
        let result = loop {
            match self.run_cycle() {
                Ok(true) => {},
                Ok(false) => break Ok(()),
                Err(e) => {
                    error!("Frame loop stopped: {}", e);
                    break Err(e);
                }
            }
        };
        let shutdown = self.shutdown();
        result.and(shutdown)
    }

    /// One pass of the frame loop. Returns false once the platform is being
    /// destroyed; setup failures (scene creation) are returned as errors.
    pub fn run_cycle(&mut self) -> Result<bool, VRError> {
        if self.shut_down {
            return Ok(false);
        }

        self.handle_events();
        if self.destroy_requested {
            return Ok(false);
        }

        let session = match self.mode.session() {
            Some(session) => session,
            None => return Ok(true),
        };
        self.handle_input(session);
        if self.finalized {
            return Ok(true);
        }

        if self.scene.is_none() {
            // The loading frame goes out before the scene exists, even on the
            // very first frame after entering VR mode.
            let loading = VRFrameWork::new(VRRenderKind::LoadingIcon, session, self.counter.frame_index(),
                                           self.counter.display_time(), self.bootstrap_swap_interval());
            self.dispatch(loading);

            let scene = VRScene::create(&*self.gpu, &self.settings, self.use_multiview)?;
            debug!("Scene {} created with {} instances", scene.id(), scene.layout().len());
            self.scene = Some(Arc::new(scene));
        }

        let tracking = self.counter.predict(&*self.compositor, session);
        let display_time = self.counter.display_time();

        let mut work = VRFrameWork::new(VRRenderKind::Frame, session, self.counter.frame_index(), display_time,
                                        self.settings.swap_interval);
        work.scene = self.scene.clone();
        work.simulation = VRSimulation::advance(display_time - self.start_time);
        work.tracking = tracking;
        self.dispatch(work);

        Ok(true)
    }

    /// Releases the backend, the scene and the compositor, in that order.
    /// A session still in VR mode gets its black final frame first.
    pub fn shutdown(&mut self) -> Result<(), VRError> {
        if self.shut_down {
            return Ok(());
        }
        self.shut_down = true;

        if let Some(session) = self.mode.session() {
            self.push_black_final(session);
        }
        let render_thread = self.backend.as_ref().and_then(|backend| backend.render_thread());
        self.mode.leave(&*self.compositor, render_thread);

        let result = match self.backend.take() {
            Some(VRFrameBackend::Threaded(mut render_thread)) => {
                render_thread.wait();
                render_thread.destroy()
            },
            Some(VRFrameBackend::Inline(mut producer)) => {
                producer.destroy(&*self.gpu, &*self.compositor);
                Ok(())
            },
            None => Ok(()),
        };

        // Every frame work holding the scene is gone with the backend.
        if let Some(scene) = self.scene.take() {
            match Arc::try_unwrap(scene) {
                Ok(mut scene) => scene.destroy(&*self.gpu),
                Err(_) => error!("Scene still referenced at shutdown, its GPU objects leak"),
            }
        }

        self.compositor.shutdown();
        debug!("VR session shut down");
        result
    }
}

impl VRSession {
    fn handle_events(&mut self) {
        loop {
            // Block while there is nothing to render, unless exiting.
            let wait = (!self.mode.is_active() || self.finalized) && !self.destroy_requested;
            let events = self.platform.poll_events(wait);
            if events.is_empty() {
                break;
            }

            for event in &events {
                debug!("Lifecycle event {:?}", event);
                if *event == VREvent::DestroyRequested {
                    self.destroy_requested = true;
                    // The final frame has to reach the compositor before VR mode is left.
                    if let Some(session) = self.mode.session() {
                        self.push_black_final(session);
                    }
                }
                self.mode.handle_event(event);
            }

            let render_thread = self.backend.as_ref().and_then(|backend| backend.render_thread());
            if let VRModeTransition::Entered(_) = self.mode.update(&*self.compositor, &*self.gpu, &self.perf,
                                                                   render_thread) {
                self.back_button_down_last_frame = false;
            }
        }
    }

    fn handle_input(&mut self, session: VRSessionHandle) {
        let back_button_down = self.compositor.input_devices(session).iter().any(|device| device.back_pressed());

        // Act on release, after a press seen on the previous cycle.
        if self.back_button_down_last_frame && !back_button_down {
            debug!("Back button released, finishing the session");
            self.push_black_final(session);
            if let Err(msg) = self.compositor.show_system_ui(session, VRSystemUI::ConfirmQuit) {
                warn!("Could not show the quit confirmation: {}", msg);
            }
        }
        self.back_button_down_last_frame = back_button_down;
    }

    // Swap interval of the loading and final frames: the configured one
    // through the render thread, 1 inline.
    fn bootstrap_swap_interval(&self) -> u32 {
        match self.backend {
            Some(VRFrameBackend::Threaded(_)) => self.settings.swap_interval,
            _ => 1,
        }
    }

    fn push_black_final(&mut self, session: VRSessionHandle) {
        if self.finalized {
            return;
        }
        let work = VRFrameWork::new(VRRenderKind::BlackFinal, session, self.counter.frame_index(),
                                    self.counter.display_time(), self.bootstrap_swap_interval());
        self.dispatch(work);
        self.finalized = true;
    }

    fn dispatch(&mut self, work: VRFrameWork) {
        match self.backend {
            Some(VRFrameBackend::Inline(ref mut producer)) => {
                if let Err(e) = producer.execute(&*self.gpu, &*self.compositor, &work) {
                    error!("Dropped frame {}: {}", work.frame_index, e);
                }
            },
            Some(VRFrameBackend::Threaded(ref render_thread)) => render_thread.submit(work),
            None => error!("Frame {} dispatched after shutdown", work.frame_index),
        }
    }
}

impl Drop for VRSession {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            error!("Error shutting down VR session: {}", e);
        }
    }
}

#[cfg(all(test, feature = "mock"))]
mod tests {
    use super::*;
    use crate::api::mock::{MockCompositor, MockGpu, MockPlatform};
    use rust_vrframe_api::{VRFrameFlags, VRGpuCapabilities, VRThreadingMode};

    fn settings() -> VRPipelineSettings {
        VRPipelineSettings {
            num_instances: 16,
            threading: VRThreadingMode::SingleThreaded,
            ..VRPipelineSettings::default()
        }
    }

    #[test]
    fn idle_session_blocks_on_events() {
        let compositor = Arc::new(MockCompositor::new());
        let platform = MockPlatform::new(vec![vec![VREvent::Resumed], vec![]]);
        let gpu = Box::new(MockGpu::new(VRGpuCapabilities::default()));
        let mut session = VRSession::new(compositor.clone(), Box::new(platform), gpu, None, settings()).unwrap();

        // Resumed without a surface: nothing to render.
        assert!(session.run_cycle().unwrap());
        assert!(!session.is_active());
        assert!(compositor.state_handle().lock().unwrap().submissions.is_empty());

        // Script exhausted: the platform is destroyed.
        assert!(!session.run_cycle().unwrap());
        session.shutdown().unwrap();
        assert!(compositor.state_handle().lock().unwrap().shut_down);
    }

    #[test]
    fn multiview_needs_gpu_and_compositor_support() {
        let capabilities = VRGpuCapabilities {
            multiview: true,
            ..VRGpuCapabilities::default()
        };
        let compositor = Arc::new(MockCompositor::new());
        let gpu = Box::new(MockGpu::new(capabilities));
        let session = VRSession::new(compositor.clone(), Box::new(MockPlatform::new(vec![])), gpu, None,
                                     settings()).unwrap();
        assert!(session.use_multiview());

        let compositor = Arc::new(MockCompositor::new());
        compositor.state_handle().lock().unwrap().properties.multiview_available = false;
        let gpu = Box::new(MockGpu::new(capabilities));
        let session = VRSession::new(compositor, Box::new(MockPlatform::new(vec![])), gpu, None,
                                     settings()).unwrap();
        assert!(!session.use_multiview());
    }

    #[test]
    fn dual_threaded_mode_needs_a_context_factory() {
        let compositor = Arc::new(MockCompositor::new());
        let gpu = Box::new(MockGpu::new(VRGpuCapabilities::default()));
        let settings = settings().with_threading(VRThreadingMode::DualThreaded);
        match VRSession::new(compositor.clone(), Box::new(MockPlatform::new(vec![])), gpu, None, settings) {
            Err(VRError::RenderThread(_)) => {},
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("session started without a render context"),
        }
        assert!(compositor.state_handle().lock().unwrap().shut_down);
    }

    #[test]
    fn pause_leaves_vr_mode_without_finishing() {
        let compositor = Arc::new(MockCompositor::new());
        let platform = MockPlatform::new(vec![
            vec![VREvent::Resumed, VREvent::SurfaceCreated(rust_vrframe_api::VRSurface(3))],
            vec![],
            vec![VREvent::Paused],
            vec![],
        ]);
        let gpu = Box::new(MockGpu::new(VRGpuCapabilities::default()));
        let mut session = VRSession::new(compositor.clone(), Box::new(platform), gpu, None, settings()).unwrap();

        assert!(session.run_cycle().unwrap());
        assert!(session.is_active());
        assert!(session.run_cycle().unwrap());
        assert!(!session.is_active());
        assert!(!session.is_finalized());

        let state = compositor.state_handle();
        let state = state.lock().unwrap();
        assert_eq!(state.left_sessions.len(), 1);
        assert_eq!(state.submissions.len(), 2);
        assert!(state.submissions[0].desc.flags.contains(VRFrameFlags::FLUSH));
        assert_eq!(state.final_submissions(), 0);
    }
}

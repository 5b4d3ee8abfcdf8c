use rust_vrframe_api::{VRCompositor, VREvent, VRGpu, VRModeFlags, VRModeParms, VRPerfThreadType, VRSessionHandle,
                       VRSurface};
use crate::vr_render_thread::VRRenderThread;

/// Performance hints registered with the compositor on every mode entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VRPerfRegistration {
    pub cpu_level: i32,
    pub gpu_level: i32,
    pub main_tid: u32,
    pub renderer_tid: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VRModeTransition {
    Unchanged,
    Entered(VRSessionHandle),
    // The compositor refused the surface; it is dropped until the next one.
    EntryFailed,
    Left(VRSessionHandle),
}

/// Tracks the platform lifecycle and keeps VR mode entered exactly while the
/// app is resumed and has a window surface.
#[derive(Debug, Default)]
pub struct VRModeController {
    resumed: bool,
    surface: Option<VRSurface>,
    session: Option<VRSessionHandle>,
}

impl VRModeController {
    pub fn new() -> VRModeController {
        VRModeController::default()
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<VRSessionHandle> {
        self.session
    }

    pub fn is_resumed(&self) -> bool {
        self.resumed
    }

    pub fn surface(&self) -> Option<VRSurface> {
        self.surface
    }

    pub fn handle_event(&mut self, event: &VREvent) {
        match *event {
            VREvent::Resumed => self.resumed = true,
            VREvent::Paused => self.resumed = false,
            VREvent::SurfaceCreated(surface) => self.surface = Some(surface),
            VREvent::SurfaceDestroyed | VREvent::DestroyRequested => self.surface = None,
        }
    }

    /// Enters or leaves VR mode to match the current lifecycle state.
    ///
    /// The render thread, if any, is drained before leaving so no submission
    /// races the mode teardown.
    pub fn update(&mut self,
                  compositor: &dyn VRCompositor,
                  gpu: &dyn VRGpu,
                  perf: &VRPerfRegistration,
                  render_thread: Option<&VRRenderThread>) -> VRModeTransition {
        if self.resumed && self.surface.is_some() {
            if self.session.is_some() {
                return VRModeTransition::Unchanged;
            }
            let parms = VRModeParms {
                // The platform owns the window, never reset it to fullscreen.
                flags: VRModeFlags::NATIVE_WINDOW,
                display: gpu.display_handle(),
                window_surface: self.surface.map_or(0, |s| s.0),
                share_context: gpu.context_handle(),
            };

            debug!("Entering VR mode: {:?}", parms);
            match compositor.enter_vr_mode(&parms) {
                Ok(session) => {
                    debug!("Entered VR mode, session {:?}", session);
                    self.session = Some(session);
                    register_perf(compositor, session, perf);
                    VRModeTransition::Entered(session)
                },
                Err(msg) => {
                    error!("Invalid window surface, VR mode refused: {}", msg);
                    self.surface = None;
                    VRModeTransition::EntryFailed
                },
            }
        } else {
            self.leave(compositor, render_thread)
        }
    }

    /// Leaves VR mode if it is active, whatever the lifecycle state.
    pub fn leave(&mut self, compositor: &dyn VRCompositor, render_thread: Option<&VRRenderThread>) -> VRModeTransition {
        match self.session.take() {
            Some(session) => {
                if let Some(render_thread) = render_thread {
                    render_thread.wait();
                }
                debug!("Leaving VR mode, session {:?}", session);
                compositor.leave_vr_mode(session);
                VRModeTransition::Left(session)
            },
            None => VRModeTransition::Unchanged,
        }
    }
}

// Hints only; the compositor may refuse any of them.
fn register_perf(compositor: &dyn VRCompositor, session: VRSessionHandle, perf: &VRPerfRegistration) {
    if let Err(msg) = compositor.set_clock_levels(session, perf.cpu_level, perf.gpu_level) {
        warn!("Could not set clock levels {}/{}: {}", perf.cpu_level, perf.gpu_level, msg);
    }
    let threads = [(VRPerfThreadType::Main, perf.main_tid), (VRPerfThreadType::Renderer, perf.renderer_tid)];
    for &(thread_type, tid) in threads.iter() {
        if let Err(msg) = compositor.set_perf_thread(session, thread_type, tid) {
            warn!("Could not register {:?} thread {}: {}", thread_type, tid, msg);
        }
    }
}

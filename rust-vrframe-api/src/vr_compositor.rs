use std::sync::Arc;
use crate::{VRError, VRFrameParms, VRInputState, VRSubmitDescription, VRSwapChainId, VRTracking};

pub type VRCompositorPtr = Arc<dyn VRCompositor>;

/// Handle of an active VR mode session, returned by `enter_vr_mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-serialization", derive(Deserialize, Serialize))]
pub struct VRSessionHandle(pub u64);

bitflags! {
    #[derive(Default)]
    #[cfg_attr(feature = "serde-serialization", derive(Deserialize, Serialize))]
    pub struct VRModeFlags: u32 {
        const RESET_WINDOW_FULLSCREEN = 0x0000_FF00;
        // `window_surface` is a native window, not a platform surface object.
        const NATIVE_WINDOW           = 0x0001_0000;
        const FRONT_BUFFER_SRGB       = 0x0002_0000;
    }
}

// Parameters handed to the compositor when entering VR mode.
// All handles are opaque platform values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde-serialization", derive(Deserialize, Serialize))]
pub struct VRModeParms {
    pub flags: VRModeFlags,
    pub display: u64,
    pub window_surface: u64,
    pub share_context: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde-serialization", derive(Deserialize, Serialize))]
pub enum VRPerfThreadType {
    Main = 0,
    Renderer = 1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde-serialization", derive(Deserialize, Serialize))]
pub enum VRSystemUI {
    ConfirmQuit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde-serialization", derive(Deserialize, Serialize))]
pub enum VRTextureType {
    Texture2D,
    Texture2DArray,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde-serialization", derive(Deserialize, Serialize))]
pub struct VRTextureSwapChainDesc {
    pub texture_type: VRTextureType,
    pub width: u32,
    pub height: u32,
    pub levels: u32,
    pub buffer_count: u32,
}

impl VRTextureSwapChainDesc {
    /// RGBA8 color chain with one mip level and triple buffering.
    pub fn color(texture_type: VRTextureType, width: u32, height: u32) -> VRTextureSwapChainDesc {
        VRTextureSwapChainDesc {
            texture_type: texture_type,
            width: width,
            height: height,
            levels: 1,
            buffer_count: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-serialization", derive(Deserialize, Serialize))]
pub struct VRSystemProperties {
    pub suggested_eye_texture_width: u32,
    pub suggested_eye_texture_height: u32,
    pub suggested_eye_fov_degrees_x: f32,
    pub suggested_eye_fov_degrees_y: f32,
    pub multiview_available: bool,
    pub display_refresh_rate: f32,
}

impl Default for VRSystemProperties {
    fn default() -> VRSystemProperties {
        VRSystemProperties {
            suggested_eye_texture_width: 1024,
            suggested_eye_texture_height: 1024,
            suggested_eye_fov_degrees_x: 90.0,
            suggested_eye_fov_degrees_y: 90.0,
            multiview_available: false,
            display_refresh_rate: 60.0,
        }
    }
}

/// The compositor that owns the display, timing prediction and tracking.
///
/// Methods take `&self` so the same compositor can be reached from the
/// driving thread and the render thread. Implementations synchronize
/// internally.
pub trait VRCompositor: Send + Sync {
    fn initialize(&self) -> Result<(), String>;

    fn shutdown(&self);

    fn system_properties(&self) -> VRSystemProperties;

    /// Enters VR mode. Fails when the window surface is not valid.
    fn enter_vr_mode(&self, parms: &VRModeParms) -> Result<VRSessionHandle, String>;

    fn leave_vr_mode(&self, session: VRSessionHandle);

    /// Absolute display time predicted for `frame_index`, in seconds.
    fn predicted_display_time(&self, session: VRSessionHandle, frame_index: u64) -> f64;

    fn predicted_tracking(&self, session: VRSessionHandle, display_time: f64) -> VRTracking;

    fn submit_frame(&self, session: VRSessionHandle, desc: &VRSubmitDescription) -> Result<(), String>;

    fn set_clock_levels(&self, session: VRSessionHandle, cpu_level: i32, gpu_level: i32) -> Result<(), String>;

    fn set_perf_thread(&self, session: VRSessionHandle, thread_type: VRPerfThreadType, tid: u32) -> Result<(), String>;

    fn create_texture_swapchain(&self, desc: &VRTextureSwapChainDesc) -> Result<VRSwapChainId, String>;

    fn texture_swapchain_length(&self, swapchain: VRSwapChainId) -> u32;

    /// GPU texture name of image `index` in the chain.
    fn texture_swapchain_handle(&self, swapchain: VRSwapChainId, index: u32) -> u32;

    fn destroy_texture_swapchain(&self, swapchain: VRSwapChainId);

    fn input_devices(&self, session: VRSessionHandle) -> Vec<VRInputState>;

    fn show_system_ui(&self, session: VRSessionHandle, ui: VRSystemUI) -> Result<(), String>;

    /// Submits a legacy frame. The embedded performance parameters are
    /// forwarded before the frame itself.
    fn submit_frame_parms(&self, session: VRSessionHandle, parms: &VRFrameParms) -> Result<(), String> {
        let perf = &parms.performance_parms;
        if let Err(e) = self.set_clock_levels(session, perf.cpu_level, perf.gpu_level) {
            warn!("Legacy frame clock levels rejected: {}", e);
        }
        let threads = [(VRPerfThreadType::Main, perf.main_thread_tid),
                       (VRPerfThreadType::Renderer, perf.render_thread_tid)];
        for &(thread_type, tid) in threads.iter().filter(|&&(_, tid)| tid != 0) {
            if let Err(e) = self.set_perf_thread(session, thread_type, tid) {
                warn!("Legacy frame {:?} thread {} rejected: {}", thread_type, tid, e);
            }
        }

        let display_time = self.predicted_display_time(session, parms.frame_index);
        let desc = parms.to_submission(display_time).map_err(|e: VRError| e.to_string())?;
        self.submit_frame(session, &desc)
    }
}

use std::error::Error;
use std::fmt;

/// Errors surfaced by the frame pipeline.
///
/// Boundary traits (`VRCompositor`, `VRGpu`) report failures as plain
/// messages; the pipeline wraps them here with the category that decides how
/// they propagate.
#[derive(Debug, Clone, PartialEq)]
pub enum VRError {
    // Fatal: compositor refused a setup call (initialization, swapchain creation).
    Compositor(String),
    // Fatal: a GPU object could not be created.
    Gpu(String),
    // Fatal: a render target failed its completeness check.
    IncompleteFramebuffer(String),
    // Fatal: a setting the pipeline cannot work with.
    InvalidSettings(String),
    // Fatal: instance placement ran out of attempts.
    PlacementExhausted { placed: usize, attempts: u32 },
    // Rejected submission: after a final frame, or a frame index going backwards.
    ProtocolViolation(String),
    // The render thread could not be started or died.
    RenderThread(String),
}

impl fmt::Display for VRError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            VRError::Compositor(ref msg) => write!(f, "compositor error: {}", msg),
            VRError::Gpu(ref msg) => write!(f, "GPU error: {}", msg),
            VRError::IncompleteFramebuffer(ref msg) => write!(f, "incomplete framebuffer: {}", msg),
            VRError::InvalidSettings(ref msg) => write!(f, "invalid settings: {}", msg),
            VRError::PlacementExhausted { placed, attempts } => write!(
                f,
                "could not place instance {} after {} attempts",
                placed, attempts
            ),
            VRError::ProtocolViolation(ref msg) => write!(f, "protocol violation: {}", msg),
            VRError::RenderThread(ref msg) => write!(f, "render thread error: {}", msg),
        }
    }
}

impl Error for VRError {}

impl VRError {
    /// Setup failures that must terminate the pipeline.
    pub fn is_fatal(&self) -> bool {
        match *self {
            VRError::ProtocolViolation(_) => false,
            _ => true,
        }
    }
}

extern crate rust_vrframe_api;
#[macro_use]
extern crate log;
#[cfg(feature = "mock")]
extern crate euclid;
#[cfg(feature = "gles")]
extern crate gleam;

#[cfg(feature = "gles")]
mod gl_ext {
    #![allow(non_camel_case_types, non_snake_case, non_upper_case_globals, dead_code, clippy::all)]
    include!(concat!(env!("OUT_DIR"), "/gles_ext_bindings.rs"));
}

pub mod api;
mod vr_fence;
mod vr_frame_pipeline;
mod vr_framebuffer;
mod vr_lifecycle;
mod vr_render_thread;
mod vr_renderer;
mod vr_scene;
mod vr_session;
mod vr_simulation;

pub use rust_vrframe_api::*;
pub use vr_fence::{VRFence, VRFenceRing, MAX_FENCES};
pub use vr_frame_pipeline::{VRFrameCounter, VRFrameProducer, VRFrameWork, VRRenderKind, VRSubmitGuard};
pub use vr_framebuffer::{VREyeFramebuffer, VRSwapChainRing};
pub use vr_lifecycle::{VRModeController, VRModeTransition, VRPerfRegistration};
pub use vr_render_thread::VRRenderThread;
pub use vr_renderer::VRRenderer;
pub use vr_scene::{VRRandom, VRScene, VRSceneLayout, VRSceneVertexState};
pub use vr_session::VRSession;
pub use vr_simulation::VRSimulation;

#[macro_use]
macro_rules! identity_matrix {
    () => ([1.0, 0.0, 0.0, 0.0,  0.0, 1.0, 0.0, 0.0,  0.0, 0.0, 1.0, 0.0,  0.0, 0.0, 0.0, 1.0]);
}

#[macro_use]
extern crate bitflags;
#[macro_use]
extern crate log;

#[cfg(feature = "utils")]
extern crate time;

#[cfg(feature = "serde-serialization")]
#[macro_use]
extern crate serde_derive;

#[cfg(feature = "utils")]
pub mod utils;

pub mod mock;
pub mod vr_compositor;
pub mod vr_error;
pub mod vr_event;
pub mod vr_frame_parms;
pub mod vr_framebuffer;
pub mod vr_gpu;
pub mod vr_input;
pub mod vr_layer;
pub mod vr_pose;
pub mod vr_settings;
pub mod vr_submission;
pub mod vr_tracking;
pub mod vr_wire;

pub use mock::MockVRControlMsg;
pub use vr_compositor::{VRCompositor, VRCompositorPtr, VRModeFlags, VRModeParms, VRPerfThreadType,
                        VRSessionHandle, VRSystemProperties, VRSystemUI, VRTextureSwapChainDesc,
                        VRTextureType};
pub use vr_error::VRError;
pub use vr_event::{VREvent, VRPlatform, VRSurface};
pub use vr_frame_parms::{VRExtraLatencyMode, VRFrameInit, VRFrameLayer, VRFrameLayerTexture,
                         VRFrameParms, VRPerformanceParms, MAX_FRAME_LAYERS};
pub use vr_framebuffer::{VRFramebufferAttributes, VRViewport};
pub use vr_gpu::{VRAttributeType, VRBufferTarget, VRDrawState, VRGpu, VRGpuCapabilities,
                 VRGpuContextFactory, VRProgram, VRProgramDesc, VRRenderTarget, VRRenderTargetDesc,
                 VRVertexAttribute, VRVertexLayout};
pub use vr_input::{VRButtons, VRControllerType, VRInputState};
pub use vr_layer::{VRCubeLayer, VRCylinderLayer, VRCylinderTexture, VREquirectLayer,
                   VREquirectTexture, VRLayer, VRLayerBlend, VRLayerFlags, VRLayerHeader,
                   VRLayerTexture, VRLayerType, VRLoadingIconLayer, VRProjectionLayer,
                   VRSwapChainId, VRSwapChainImage};
pub use vr_pose::VRPose;
pub use vr_settings::{VRPipelineSettings, VRThreadingMode};
pub use vr_submission::{VRFrameFlags, VRSubmitDescription, MAX_LAYER_COUNT};
pub use vr_tracking::{VREye, VREyeMatrices, VRTracking, VRTrackingStatus, EYE_COUNT};
pub use vr_wire::{VRWireFrame, VRWireLayer, VRWireLayerHeader, VRWireSubmitDescription};

#[cfg(feature = "mock")]
pub mod mock;
#[cfg(feature = "mock")]
pub use self::mock::{MockCompositor, MockCompositorState, MockGpu, MockGpuCall, MockGpuContextFactory,
                     MockGpuState, MockPlatform, MockSubmission};

#[cfg(feature = "gles")]
mod gles;
#[cfg(feature = "gles")]
pub use self::gles::{GlesExtensions, GlesGpu, GlesGpuContextFactory};

mod compositor;
mod gpu;
mod platform;

pub use self::compositor::{MockCompositor, MockCompositorState, MockSubmission};
pub use self::gpu::{MockGpu, MockGpuCall, MockGpuContextFactory, MockGpuState};
pub use self::platform::MockPlatform;

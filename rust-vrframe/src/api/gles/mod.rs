mod gpu;

pub use self::gpu::{GlesExtensions, GlesGpu, GlesGpuContextFactory};

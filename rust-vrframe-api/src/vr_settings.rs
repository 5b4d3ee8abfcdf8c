/// How the pipeline distributes its work over threads.
/// Chosen once when a session is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde-serialization", derive(Deserialize, Serialize))]
pub enum VRThreadingMode {
    // Predict, simulate, render and submit on the calling thread.
    SingleThreaded,
    // Render and submit on a dedicated render thread, one frame behind.
    DualThreaded,
}

impl Default for VRThreadingMode {
    #[cfg(feature = "render-thread")]
    fn default() -> VRThreadingMode {
        VRThreadingMode::DualThreaded
    }

    #[cfg(not(feature = "render-thread"))]
    fn default() -> VRThreadingMode {
        VRThreadingMode::SingleThreaded
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-serialization", derive(Deserialize, Serialize))]
pub struct VRPipelineSettings {
    pub threading: VRThreadingMode,

    // Only honored when both the GPU and the compositor support it.
    pub use_multiview: bool,

    pub num_multisamples: u32,

    // Fixed CPU/GPU clock levels requested after entering VR mode.
    pub cpu_level: i32,
    pub gpu_level: i32,

    pub swap_interval: u32,

    pub num_instances: usize,
    pub num_rotations: usize,
    pub random_seed: u32,

    // Rejection sampling attempts allowed per placed instance.
    pub placement_attempt_limit: u32,

    pub clear_color: [f32; 4],

    pub first_frame_index: u64,
}

impl Default for VRPipelineSettings {
    fn default() -> VRPipelineSettings {
        VRPipelineSettings {
            threading: VRThreadingMode::default(),
            use_multiview: true,
            num_multisamples: 4,
            cpu_level: 2,
            gpu_level: 3,
            swap_interval: 1,
            num_instances: 1500,
            num_rotations: 16,
            random_seed: 2,
            placement_attempt_limit: 100_000,
            clear_color: [0.125, 0.0, 0.125, 1.0],
            first_frame_index: 1,
        }
    }
}

impl VRPipelineSettings {
    pub fn with_threading(mut self, threading: VRThreadingMode) -> VRPipelineSettings {
        self.threading = threading;
        self
    }

    pub fn is_dual_threaded(&self) -> bool {
        self.threading == VRThreadingMode::DualThreaded
    }
}

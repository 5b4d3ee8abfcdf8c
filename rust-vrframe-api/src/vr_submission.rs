use crate::{VRError, VRLayer};

/// Maximum number of layers a single submission may carry.
pub const MAX_LAYER_COUNT: usize = 16;

bitflags! {
    #[derive(Default)]
    #[cfg_attr(feature = "serde-serialization", derive(Deserialize, Serialize))]
    pub struct VRFrameFlags: u32 {
        // Flush the compositor pipeline so the frame shows up immediately.
        const FLUSH                = 1 << 1;
        // Last frame of the session; nothing may be submitted afterwards.
        const FINAL                = 1 << 2;
        // Hide the system volume overlay.
        const INHIBIT_VOLUME_LAYER = 1 << 6;
    }
}

/// Parameters of one frame handed to the compositor.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-serialization", derive(Deserialize, Serialize))]
pub struct VRSubmitDescription {
    pub flags: VRFrameFlags,

    // Minimum number of vsyncs between two displayed frames.
    pub swap_interval: u32,

    // Must be the index that was used to query `display_time`.
    pub frame_index: u64,

    // Predicted absolute display time, in seconds.
    pub display_time: f64,

    // GPU fence covering the rendering of all layers, 0 if none.
    pub completion_fence: u64,

    // Compositing order: later layers are drawn on top.
    pub layers: Vec<VRLayer>,
}

impl Default for VRSubmitDescription {
    fn default() -> VRSubmitDescription {
        VRSubmitDescription {
            flags: VRFrameFlags::empty(),
            swap_interval: 1,
            frame_index: 0,
            display_time: 0.0,
            completion_fence: 0,
            layers: Vec::new(),
        }
    }
}

impl VRSubmitDescription {
    pub fn new(frame_index: u64, display_time: f64, swap_interval: u32) -> VRSubmitDescription {
        VRSubmitDescription {
            frame_index: frame_index,
            display_time: display_time,
            swap_interval: swap_interval,
            ..VRSubmitDescription::default()
        }
    }

    pub fn with_flags(mut self, flags: VRFrameFlags) -> VRSubmitDescription {
        self.flags |= flags;
        self
    }

    pub fn with_layer(mut self, layer: VRLayer) -> VRSubmitDescription {
        self.layers.push(layer);
        self
    }

    pub fn is_final(&self) -> bool {
        self.flags.contains(VRFrameFlags::FINAL)
    }

    /// Checks the limits a compositor enforces on any submission.
    pub fn validate(&self) -> Result<(), VRError> {
        if self.layers.is_empty() {
            return Err(VRError::ProtocolViolation("frame submitted without layers".into()));
        }
        if self.layers.len() > MAX_LAYER_COUNT {
            return Err(VRError::ProtocolViolation(format!(
                "{} layers submitted, at most {} allowed",
                self.layers.len(),
                MAX_LAYER_COUNT
            )));
        }
        if self.swap_interval == 0 {
            return Err(VRError::ProtocolViolation("swap interval must be at least 1".into()));
        }
        Ok(())
    }
}

use crate::VRPose;

/// Number of eyes a tracking snapshot and a projection layer carry.
pub const EYE_COUNT: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde-serialization", derive(Deserialize, Serialize))]
pub enum VREye {
    Left = 0,
    Right = 1,
}

impl VREye {
    pub fn all() -> [VREye; EYE_COUNT] {
        [VREye::Left, VREye::Right]
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

bitflags! {
    #[derive(Default)]
    #[cfg_attr(feature = "serde-serialization", derive(Deserialize, Serialize))]
    pub struct VRTrackingStatus: u32 {
        const ORIENTATION_TRACKED = 1 << 0;
        const POSITION_TRACKED    = 1 << 1;
        const HMD_CONNECTED       = 1 << 7;
    }
}

// Row-major matrices, M[row * 4 + col].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-serialization", derive(Deserialize, Serialize))]
pub struct VREyeMatrices {
    pub projection_matrix: [f32; 16],
    pub view_matrix: [f32; 16],
}

impl Default for VREyeMatrices {
    fn default() -> VREyeMatrices {
        VREyeMatrices {
            projection_matrix: identity_matrix!(),
            view_matrix: identity_matrix!(),
        }
    }
}

// Everything needed to render one frame for a predicted display time.
// Produced by the compositor, read-only for the rest of the frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde-serialization", derive(Deserialize, Serialize))]
pub struct VRTracking {
    pub status: VRTrackingStatus,

    // Predicted head pose (center eye).
    pub head_pose: VRPose,

    pub eyes: [VREyeMatrices; EYE_COUNT],
}

impl VRTracking {
    pub fn eye(&self, eye: VREye) -> &VREyeMatrices {
        &self.eyes[eye.index()]
    }

    pub fn is_hmd_connected(&self) -> bool {
        self.status.contains(VRTrackingStatus::HMD_CONNECTED)
    }
}

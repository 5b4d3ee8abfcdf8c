// The VRPose struct represents the head (or a tracked device) state
// predicted for a given absolute display time.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-serialization", derive(Deserialize, Serialize))]
pub struct VRPose {
    // Orientation as a unit quaternion (x, y, z, w).
    pub orientation: [f32; 4],

    // Position as a 3D vector, in meters.
    pub position: [f32; 3],

    // Angular velocity in radians per second.
    pub angular_velocity: [f32; 3],

    // Linear velocity in meters per second.
    pub linear_velocity: [f32; 3],

    // Angular acceleration in radians per second squared.
    pub angular_acceleration: [f32; 3],

    // Linear acceleration in meters per second squared.
    pub linear_acceleration: [f32; 3],

    // Absolute time at which the pose was sampled, in seconds.
    pub time_in_seconds: f64,

    // How far ahead of `time_in_seconds` the pose was predicted.
    pub prediction_in_seconds: f64,
}

impl Default for VRPose {
    fn default() -> VRPose {
        VRPose {
            orientation: [0.0, 0.0, 0.0, 1.0],
            position: [0.0, 0.0, 0.0],
            angular_velocity: [0.0; 3],
            linear_velocity: [0.0; 3],
            angular_acceleration: [0.0; 3],
            linear_acceleration: [0.0; 3],
            time_in_seconds: 0.0,
            prediction_in_seconds: 0.0,
        }
    }
}

impl VRPose {
    /// Builds a pose sampled at `sample_time` and predicted forward to `display_time`.
    /// Keeps `time_in_seconds + prediction_in_seconds == display_time`.
    pub fn predicted(orientation: [f32; 4], position: [f32; 3], sample_time: f64, display_time: f64) -> VRPose {
        VRPose {
            orientation: orientation,
            position: position,
            time_in_seconds: sample_time,
            prediction_in_seconds: display_time - sample_time,
            ..VRPose::default()
        }
    }

    /// The absolute time this pose is meant to be displayed at.
    pub fn display_time(&self) -> f64 {
        self.time_in_seconds + self.prediction_in_seconds
    }
}

#[cfg(test)]
mod tests {
    use super::VRPose;

    #[test]
    fn predicted_pose_keeps_display_time() {
        let pose = VRPose::predicted([0.0, 0.0, 0.0, 1.0], [0.0, 1.6, 0.0], 10.0, 10.048);
        assert!((pose.display_time() - 10.048).abs() < 1e-9);
        assert!((pose.prediction_in_seconds - 0.048).abs() < 1e-9);
    }

    #[test]
    fn default_pose_is_identity() {
        let pose = VRPose::default();
        assert_eq!(pose.orientation, [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(pose.display_time(), 0.0);
    }
}

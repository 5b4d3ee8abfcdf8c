/// Animation state of the cube world.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VRSimulation {
    // Radians around x, y and z.
    pub current_rotation: [f32; 3],
}

impl VRSimulation {
    /// State at `elapsed` seconds of predicted time since startup.
    pub fn advance(elapsed: f64) -> VRSimulation {
        let angle = elapsed as f32;
        VRSimulation {
            current_rotation: [angle, angle, angle],
        }
    }
}

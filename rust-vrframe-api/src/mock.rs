use crate::{VRInputState, VRSystemProperties, VRTracking};

// Remote control of the mock compositor, see `MockCompositor::new_with_remote`.
pub enum MockVRControlMsg {
    SetTracking(VRTracking),
    SetSystemProperties(VRSystemProperties),
    SetInputDevices(Vec<VRInputState>),
    // Make the next `enter_vr_mode` calls fail.
    RejectVRMode(bool),
    // Delay added to every frame submission, in milliseconds.
    SetSubmitDelay(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde-serialization", derive(Deserialize, Serialize))]
pub enum VRControllerType {
    Headset,
    TrackedRemote,
    Gamepad,
}

bitflags! {
    #[derive(Default)]
    #[cfg_attr(feature = "serde-serialization", derive(Deserialize, Serialize))]
    pub struct VRButtons: u32 {
        const A       = 0x0000_0001;
        const B       = 0x0000_0002;
        const ENTER   = 0x0010_0000;
        const BACK    = 0x0020_0000;
        const TRIGGER = 0x2000_0000;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde-serialization", derive(Deserialize, Serialize))]
pub struct VRInputState {
    pub device_id: u32,
    pub controller_type: VRControllerType,
    pub buttons: VRButtons,
}

impl VRInputState {
    pub fn new(device_id: u32, controller_type: VRControllerType, buttons: VRButtons) -> VRInputState {
        VRInputState {
            device_id: device_id,
            controller_type: controller_type,
            buttons: buttons,
        }
    }

    /// The "back" semantic: the back button on any device, or B on a gamepad.
    pub fn back_pressed(&self) -> bool {
        self.buttons.contains(VRButtons::BACK) ||
        (self.controller_type == VRControllerType::Gamepad && self.buttons.contains(VRButtons::B))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn b_counts_as_back_only_on_gamepads() {
        assert!(VRInputState::new(1, VRControllerType::Gamepad, VRButtons::B).back_pressed());
        assert!(!VRInputState::new(2, VRControllerType::TrackedRemote, VRButtons::B).back_pressed());
        assert!(VRInputState::new(3, VRControllerType::Headset, VRButtons::BACK).back_pressed());
        assert!(!VRInputState::new(4, VRControllerType::Gamepad, VRButtons::A).back_pressed());
    }
}

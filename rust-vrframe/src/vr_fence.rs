use rust_vrframe_api::VRGpu;

/// Number of frames whose GPU work may be outstanding at once.
pub const MAX_FENCES: usize = 4;

/// One reusable fence slot.
#[derive(Debug, Default)]
pub struct VRFence {
    handle: u64,
}

impl VRFence {
    pub fn handle(&self) -> u64 {
        self.handle
    }

    /// Replaces the previous sync object with one covering every command
    /// issued so far. The GPU is kicked but never waited on.
    pub fn insert(&mut self, gpu: &dyn VRGpu) -> u64 {
        self.destroy(gpu);
        self.handle = gpu.insert_fence();
        self.handle
    }

    pub fn destroy(&mut self, gpu: &dyn VRGpu) {
        if self.handle != 0 {
            gpu.delete_fence(self.handle);
            self.handle = 0;
        }
    }
}

#[derive(Debug, Default)]
pub struct VRFenceRing {
    fences: [VRFence; MAX_FENCES],
    index: usize,
}

impl VRFenceRing {
    pub fn new() -> VRFenceRing {
        VRFenceRing::default()
    }

    /// Slot the next `insert` reuses.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn insert(&mut self, gpu: &dyn VRGpu) -> u64 {
        let handle = self.fences[self.index].insert(gpu);
        self.index = (self.index + 1) % MAX_FENCES;
        handle
    }

    pub fn destroy(&mut self, gpu: &dyn VRGpu) {
        for fence in self.fences.iter_mut() {
            fence.destroy(gpu);
        }
    }
}

#[cfg(all(test, feature = "mock"))]
mod tests {
    use super::*;
    use crate::api::mock::{MockGpu, MockGpuCall};
    use rust_vrframe_api::VRGpuCapabilities;

    #[test]
    fn ring_reuses_slots_after_four_frames() {
        let gpu = MockGpu::new(VRGpuCapabilities::default());
        let mut ring = VRFenceRing::new();

        let handles: Vec<u64> = (0..MAX_FENCES + 1).map(|_| ring.insert(&gpu)).collect();
        assert_eq!(ring.index(), 1);
        assert!(handles.iter().all(|h| *h != 0));

        // The fifth insert lands in slot 0 and releases the first fence.
        let state = gpu.state_handle();
        let deleted: Vec<u64> = state.lock().unwrap().calls.iter().filter_map(|call| match *call {
            MockGpuCall::DeleteFence(fence) => Some(fence),
            _ => None,
        }).collect();
        assert_eq!(deleted, vec![handles[0]]);
        assert_eq!(state.lock().unwrap().live_fences(), MAX_FENCES);

        ring.destroy(&gpu);
        ring.destroy(&gpu);
        assert_eq!(state.lock().unwrap().live_fences(), 0);
    }

    #[test]
    fn destroying_an_empty_fence_is_a_no_op() {
        let gpu = MockGpu::new(VRGpuCapabilities::default());
        let mut fence = VRFence::default();
        fence.destroy(&gpu);
        assert_eq!(fence.handle(), 0);
        assert!(gpu.state_handle().lock().unwrap().calls.is_empty());
    }
}

use rust_vrframe_api::{VREvent, VRPlatform, VRSurface};
use std::collections::VecDeque;

/// Replays scripted lifecycle events.
///
/// Every poll hands out the next batch. An empty batch ends a session's
/// event loop for that cycle, so `[]` entries mark cycle boundaries. Once
/// the script runs out the platform asks to be destroyed, then stays quiet.
pub struct MockPlatform {
    batches: VecDeque<Vec<VREvent>>,
    destroy_sent: bool,
    polls: usize,
    blocking_polls: usize,
}

impl MockPlatform {
    pub fn new(batches: Vec<Vec<VREvent>>) -> MockPlatform {
        MockPlatform {
            batches: batches.into_iter().collect(),
            destroy_sent: false,
            polls: 0,
            blocking_polls: 0,
        }
    }

    /// Resumes with a window surface, then runs `cycles` frame cycles.
    pub fn running(cycles: usize) -> MockPlatform {
        let mut batches = vec![vec![VREvent::Resumed, VREvent::SurfaceCreated(VRSurface(0x5EED))]];
        batches.extend((0..cycles).map(|_| Vec::new()));
        MockPlatform::new(batches)
    }

    pub fn push(&mut self, batch: Vec<VREvent>) {
        self.batches.push_back(batch);
    }

    pub fn polls(&self) -> usize {
        self.polls
    }

    // Polls that would have blocked on a real platform.
    pub fn blocking_polls(&self) -> usize {
        self.blocking_polls
    }
}

impl VRPlatform for MockPlatform {
    fn poll_events(&mut self, wait: bool) -> Vec<VREvent> {
        self.polls += 1;
        if wait {
            self.blocking_polls += 1;
        }
        match self.batches.pop_front() {
            Some(batch) => batch,
            None if !self.destroy_sent => {
                self.destroy_sent = true;
                vec![VREvent::DestroyRequested]
            },
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn destroy_follows_the_script() {
        let mut platform = MockPlatform::running(1);
        assert_eq!(platform.poll_events(true).len(), 2);
        assert!(platform.poll_events(false).is_empty());
        assert_eq!(platform.poll_events(false), vec![VREvent::DestroyRequested]);
        assert!(platform.poll_events(false).is_empty());
        assert_eq!(platform.polls(), 4);
        assert_eq!(platform.blocking_polls(), 1);
    }
}

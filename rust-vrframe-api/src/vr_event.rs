// A platform rendering surface (native window), as an opaque handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-serialization", derive(Deserialize, Serialize))]
pub struct VRSurface(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde-serialization", derive(Deserialize, Serialize))]
pub enum VREvent {
    // The application moved to the foreground.
    Resumed,
    // The application moved to the background.
    Paused,
    SurfaceCreated(VRSurface),
    SurfaceDestroyed,
    // The platform wants the application to exit.
    DestroyRequested,
}

/// Source of application lifecycle events.
pub trait VRPlatform {
    /// Returns the pending events. When `wait` is set, blocks until at least
    /// one event is available.
    fn poll_events(&mut self, wait: bool) -> Vec<VREvent>;
}

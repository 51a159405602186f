/// Discrete triggers that funnel into the controller, one at a time.
///
/// Buttons and the auto-shuffle deadline are independent producers; the
/// event loop is the single consumer, which is what serializes controller
/// operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    /// Pick a new random image (shuffle button or the auto-shuffle deadline).
    Shuffle,
    /// Rotate the active image clockwise by 90 degrees.
    Rotate,
    /// Toggle between fit and fill.
    ToggleMode,
    /// Reboot the host.
    Reboot,
}

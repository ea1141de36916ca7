/// A notification delivered by the global input hook
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputSignal {
    /// A mouse button went down at global screen coordinates
    MousePress { x: f64, y: f64 },
    /// A key went down. Which key is deliberately not carried.
    KeyPress,
}

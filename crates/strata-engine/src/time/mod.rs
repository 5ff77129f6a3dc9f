//! Frame timing.
//!
//! One [`FrameClock`] per window; `tick()` once per presented frame.

mod clock;

pub use clock::{FrameClock, FrameTime};

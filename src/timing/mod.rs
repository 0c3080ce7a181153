mod clock;
mod window;

pub use clock::PlaybackClock;
pub use window::{VisibleWindow, WindowOptions, compute_visible};

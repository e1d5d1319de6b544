//! Discrete-event simulation over an elaborated design: a time-ordered
//! event queue, delta cycles within an instant, rank-ordered process
//! reactivation, and VCD waveform capture.

mod engine;
mod event;
mod wave;

pub use engine::{SimError, Simulator};
pub use wave::{VcdWaves, WaveOptions, Waves};

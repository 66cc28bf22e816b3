//! Decision Window
//!
//! Turns a high-rate stream of per-reading classifications into at most one
//! "best of window" emission per fixed wall-clock interval.

mod window;

pub use window::{DecisionWindow, Scored, WindowConfig, WindowFlush, WindowStats};

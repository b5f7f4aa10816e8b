//! Infinite Story: interaction-driven narrative generation.
//!
//! Grows open-ended stories one segment at a time from reader input
//! (scrolls, clicks, key presses) without neural network inference, using
//! a tension-driven phase machine over fragment template pools, and lets
//! separate stories merge into one another.

pub mod core;
pub mod schema;

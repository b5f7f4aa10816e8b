//! Plain data exchanged between the story core and its host.

pub mod interaction;
pub mod merge;
pub mod segment;
pub mod story;

pub mod catalog;
pub mod classifier;
pub mod composer;
pub mod config;
pub mod context;
pub mod engine;
pub mod evolver;
pub mod merge;
pub mod store;
pub mod template;
pub mod variety;

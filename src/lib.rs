pub mod aggregator;
pub mod api;
pub mod buffer;
pub mod classifier;
pub mod competition;
pub mod config;
pub mod consts;
pub mod dataset;
pub mod error;
pub mod hangul;
pub mod landmarks;
pub mod network;
pub mod registry;
pub mod rules;
pub mod sentence;
pub mod session;
pub mod training;
pub mod vocab;
// cmd and reports are modules of the binary crate (main.rs).

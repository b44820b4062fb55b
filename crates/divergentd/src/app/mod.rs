//! Application module
//!
//! Wires the divergence cache, input, filter, encoder and sink together and
//! drives the background tasks until input ends or a shutdown signal arrives.

pub mod builder;
pub mod core;
pub mod services;
pub mod tasks;

pub use builder::ApplicationBuilder;
pub use core::Application;
pub use services::ApplicationServices;

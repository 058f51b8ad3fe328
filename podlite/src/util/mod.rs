//! Supporting utilities: tracing setup and process probes.

pub mod logging;
pub mod process;

pub use logging::register_to_tracing;
pub use process::is_process_alive;

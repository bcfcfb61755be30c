pub mod config;
#[cfg(feature = "cli")]
pub mod display;
pub mod rib;
pub mod utils;

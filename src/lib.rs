// Dry audio library
// Sound sources, streaming and the fixed-point mixer

pub mod config;
pub mod logging;
pub mod sound;

pub use config::AudioOptions;
pub use logging::LogLevel;

//! graphwire - offline inspector for graphwire message bodies
//!
//! Decodes captured channel bytes with the codecs from `graphwire-protocol`
//! and renders them for the terminal.

pub mod config;
pub mod inspect;

pub use config::{CodecConfig, Config, ConfigError, LoggingConfig};
pub use inspect::{DecodeOptions, Decoded, InspectError, Inspection, Target};

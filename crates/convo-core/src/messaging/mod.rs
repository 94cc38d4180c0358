//! Transport-facing abstractions: incoming update model and outgoing port.

pub mod port;
pub mod types;

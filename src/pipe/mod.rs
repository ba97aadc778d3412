//! In-flight pipes
//!
//! A pipe is a single-use, single-reader byte channel. Pipes are created
//! elsewhere and registered here; the relay claims the read end when a
//! client asks for the bytes, and removes the entry once the read is over.

pub mod registry;
pub mod stream;

pub use registry::*;
pub use stream::*;

//! Pipe Relay
//!
//! Cluster-wide read access to single-use in-memory byte pipes. A pipe lives
//! on exactly one node; a read arriving at any node is either streamed from
//! that node's registry or forwarded to the owner and relayed back.

pub mod access;
pub mod config;
pub mod directory;
pub mod error;
pub mod forward;
pub mod logging;
pub mod node;
pub mod pipe;
pub mod relay;
pub mod routes;
pub mod server;
pub mod transport;
pub mod version;

pub use access::{AccessControl, Credential, TokenAccessControl};
pub use config::RelayConfig;
pub use directory::{MemoryDirectory, PipeDirectory, PipeRecord, Team, TeamDirectory};
pub use error::{Error, ErrorCode, Result};
pub use forward::{ForwardRequest, ForwardedResponse, ForwardingClient, HttpForwarder};
pub use node::RelayNode;
pub use pipe::{Pipe, PipeReader, PipeRegistry, PipeWriter};
pub use relay::{ReadFailure, ReadRequest, RelayEngine};

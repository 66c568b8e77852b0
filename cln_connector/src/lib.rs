pub mod client;
pub mod connector;
mod rpc;

pub use client::*;
pub use connector::{ClnConnector, ClnConnectorSettings};

//! Ballot node: opens the store, builds the vote ledger, and serves it.
//!
//! The node is the central coordinator that:
//! - Validates and opens the LMDB environment, runs integrity and schema checks
//! - Builds the [`ballot_ledger::VoteLedger`] over the store
//! - Serves the HTTP API and the WebSocket tally feed
//! - Prunes idle broadcast channels in the background
//! - Shuts everything down on SIGINT/SIGTERM

pub mod config;
pub mod error;
pub mod node;
pub mod shutdown;

pub use config::NodeConfig;
pub use error::NodeError;
pub use node::BallotNode;
pub use shutdown::ShutdownController;

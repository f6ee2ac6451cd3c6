//! WebSocket server for live tally updates.
//!
//! Clients subscribe per category and receive the category's current tally
//! immediately, then every newer tally as votes are committed. When a
//! category is deleted its subscribers receive a `closed` frame.

pub mod server;
pub mod subscriptions;

pub use server::{router, WebSocketServer, WsError, WsState};
pub use subscriptions::{ClientMessage, ClientSubscriptions, ServerMessage};

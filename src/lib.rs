//! `BoardSync` — real-time drawing board synchronization.
//!
//! ARCHITECTURE
//! ============
//! Two halves share one frame protocol:
//!
//! - The **relay** ([`routes`], [`services`], [`state`]): a websocket
//!   gateway that manages rooms and fans frames out to peers. It holds
//!   membership only — no scene content ever lives on the server.
//! - The **client engine** ([`client`]): the mirrored scene graph each
//!   editor runs, with optimistic local apply, echo suppression, presence
//!   cursors, snapshot bootstrap, and the owner's debounced persistence.
//!
//! Durable board state goes through the [`store::BoardStore`] trait; the
//! relay and the owner's saver are its only callers.

pub mod client;
pub mod db;
pub mod frame;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;

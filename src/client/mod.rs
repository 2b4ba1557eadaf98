//! Client-side sync engine: the locally-mirrored scene graph and the logic
//! that keeps it consistent with remote peers.
//!
//! ARCHITECTURE
//! ============
//! Each connected editor runs one `ClientSession`. Local edits apply to the
//! scene mirror immediately (optimistic, no round trip) and broadcast as
//! operations; remote operations apply as they arrive, tagged with
//! `Origin::Remote` so they can never re-broadcast. The session designated
//! as board owner additionally runs the debounced snapshot writer.
//!
//! The client is single-logical-threaded: every mutation, local or remote,
//! goes through the owning session, so the scene needs no locking and
//! ordering within one client is event-arrival order.

pub mod cursor;
pub mod mirror;
pub mod saver;
pub mod scene;
pub mod session;
pub mod sync;

//! Service layer: business logic dispatched from websocket frames.

pub mod presence;
pub mod room;
pub mod session;
pub mod snapshot;

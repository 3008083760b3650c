//! HTTP surface over a running engine.
//!
//! The server is a thin observer and intake valve: reports come in through
//! `POST /api/v1/incidents`, everything else reads the snapshot board. No
//! handler ever reaches into an actor's private state.

mod server;

pub use server::{serve, router, ServerError};

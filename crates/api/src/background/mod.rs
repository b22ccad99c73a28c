//! Long-lived background tasks spawned by the server entrypoint.

pub mod retention;

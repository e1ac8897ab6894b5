//! `engine_core`
//!
//! Core utilities shared by every engine subsystem.
//!
//! Design goals:
//! - Keyed resources are constructed at most once and destroyed exactly once.
//! - All registry state is synchronized; handles can cross threads freely.
//! - Registries are explicit values so tests can inject their own.
//! - No `unsafe`.

pub mod config;
pub mod error;
pub mod guid;
pub mod handle;
pub mod refcounted;
pub mod registry;
pub mod scheduler;
pub mod thread_queue;

#[cfg(test)]
pub(crate) fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();
}

pub mod prelude {
    //! Commonly used exports.

    pub use crate::config::*;
    pub use crate::error::*;
    pub use crate::guid::*;
    pub use crate::handle::*;
    pub use crate::refcounted::*;
    pub use crate::registry::*;
}

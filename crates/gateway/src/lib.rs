//! The `voxgate` gateway as a library: exposed so integration tests (and the
//! `voxgate` binary itself) can drive connection handling, the call
//! supervisor, and the task pipeline directly.

pub mod cli;
pub mod connection;
pub mod providers;
pub mod runtime;
pub mod state;
pub mod supervisor;
pub mod ws;

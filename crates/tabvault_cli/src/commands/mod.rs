//! CLI command implementations.

pub mod dump_sessions;
pub mod inspect;
pub mod restore;
pub mod serve;

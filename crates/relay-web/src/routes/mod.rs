//! Route handlers.

pub mod health;
pub mod latest;
pub mod webhook;

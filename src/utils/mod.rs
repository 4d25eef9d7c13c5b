//! The `utils` module provides shared pieces used across `roomcast`: the
//! error taxonomy and logging setup.

pub mod error;
pub mod logging;

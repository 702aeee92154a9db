//! HTTP middleware.
//!
//! - [`errors::PanicReporter`] -- Turns handler panics into 500 responses.

pub mod errors;

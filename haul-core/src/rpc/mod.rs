//! Request dispatch
//!
//! The [`Dispatcher`] owns the registry of callable operations and turns
//! each inbound request into exactly one response, authorizing the call
//! and isolating handler failures from the rest of the daemon.

mod dispatcher;

pub use dispatcher::{Dispatcher, OperationInfo};

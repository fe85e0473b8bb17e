//! Event fan-out
//!
//! One published event is delivered to every subscribed session whose
//! filter set matches the event name, and to every plugin event handler
//! registered for that name.

mod manager;

pub use manager::EventManager;

//! Observability module - security alerting.

mod alert;

pub use alert::AlertLayer;

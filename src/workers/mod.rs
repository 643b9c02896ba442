//! Background workers

pub mod confirmation_monitor;

pub use confirmation_monitor::{ConfirmationMonitorConfig, ConfirmationMonitorWorker};

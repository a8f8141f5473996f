pub mod diff;
pub mod error;
pub mod reconciler;

pub mod env;
pub mod tracing_init;

pub use env::{AppConfig, ListingMode, SyncConfig, MAX_PAGE_SIZE};
pub use tracing_init::init_tracing;

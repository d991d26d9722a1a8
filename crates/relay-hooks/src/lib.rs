pub mod bus;
pub mod error;
pub mod types;

pub use bus::EventBus;
pub use error::{BusError, Result};
pub use types::{EventHandler, FnHandler, DEFAULT_QUEUE_CAPACITY};

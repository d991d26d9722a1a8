pub mod duration;
pub mod gate;

pub use duration::parse_duration;
pub use gate::PauseGate;

pub mod logger;
pub mod paths;

pub use logger::setup_logging;

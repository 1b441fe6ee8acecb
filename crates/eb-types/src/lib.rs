pub mod config;
pub mod cost;
pub mod signal;
pub mod record;
pub mod errors;

pub use config::*;
pub use cost::*;
pub use signal::*;
pub use record::*;
pub use errors::*;

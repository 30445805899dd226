pub mod acquisition;
pub mod config;
pub mod error;
pub mod fields;

pub use acquisition::*;
pub use config::Config;
pub use error::*;
pub use fields::*;

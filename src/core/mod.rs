pub mod config;
pub mod media;


pub use config::*;
pub use media::*;

pub mod image;
pub mod scaling;
pub mod state;

pub use image::*;
pub use scaling::*;
pub use state::*;

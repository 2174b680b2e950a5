pub mod app;
pub mod fade;

pub use app::*;
pub use fade::*;

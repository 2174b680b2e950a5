pub mod info;
pub mod producer;
pub mod session;

pub use info::*;
pub use producer::*;
pub use session::*;

pub mod client;
pub mod protocol;
pub mod server;

#[cfg(test)]
mod tests;

pub use client::*;
pub use protocol::*;
pub use server::*;

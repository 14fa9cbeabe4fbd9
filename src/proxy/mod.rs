mod handler;
mod server;
mod strategy;

pub use handler::*;
pub use server::*;
pub use strategy::*;

pub mod client;
pub mod context;
pub mod prompts;
pub mod tools;

pub use client::*;
pub use context::*;
pub use prompts::*;

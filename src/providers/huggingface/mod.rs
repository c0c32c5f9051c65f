mod client;
mod shaping;
pub mod types;

pub use client::HuggingFaceProvider;
pub use shaping::InputShape;

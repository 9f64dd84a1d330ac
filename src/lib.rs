#![doc = include_str!("../README.md")]

pub mod counter;
mod error;
mod shared;

pub use error::SharedPtrError;
pub use shared::SharedPtr;

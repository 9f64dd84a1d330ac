use thiserror::Error;

/// Reasons a [`SharedPtr`](crate::SharedPtr) refuses access to its value.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SharedPtrError {
    #[error("SharedPtr does not own an object")]
    Empty,

    #[error("SharedPtr is shared by {owners} owners, exclusive access requires 1")]
    Shared { owners: usize },
}

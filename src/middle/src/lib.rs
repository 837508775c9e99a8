pub mod analysis;
pub mod builtins;
mod error;
pub mod interp;
pub(crate) mod mapper;
pub mod names;
mod passes;
pub mod pipeline;
mod verify;
pub mod visit;
pub mod word;

pub use {
    error::{Error, Result},
    passes::name_mangler::EXTERNAL_SUFFIX,
    pipeline::{normalize, Normalized},
};

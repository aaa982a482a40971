//! Core types for the containment kernel.

pub mod term;
pub mod vocab;

pub use term::{Literal, Quad, Term};

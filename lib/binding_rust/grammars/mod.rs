//! Grammars bundled with the crate.

pub mod arithmetic;

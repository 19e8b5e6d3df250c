//! SMOF/STAR toolchain: a minimal object file format (OBJ), a static
//! archive container (AR), and the two tools built on them — `link`
//! and `arch`.
//!
//! This crate is split into the on-disk codecs (`obj`, `ar`), the
//! algorithms a linker needs on top of them (`resolver`, `reloc`,
//! `layout`, `compress`), and the two driver façades (`driver::link`,
//! `driver::archive`) the `link`/`arch` binaries call into.

pub mod ar;
pub mod arena;
pub mod compress;
pub mod driver;
pub mod error;
pub mod io;
pub mod layout;
pub mod obj;
pub mod reloc;
pub mod resolver;
pub mod script;

pub use error::{Error, Result};

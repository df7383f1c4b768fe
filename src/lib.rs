

#![warn(
    rust_2018_idioms,
    future_incompatible,
    unused_extern_crates,
    unused,

    missing_copy_implementations,
    missing_debug_implementations,

    clippy::all,
    clippy::restriction,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
)]

#![deny(
    unused_variables,
    unused_assignments,
    dead_code,
    unused_must_use,
    missing_copy_implementations,
    trivial_numeric_casts,
    redundant_semicolon
)]

#![forbid(unsafe_code)]

// TODO #![warn(missing_docs)]

//! Vidpak: an append-only container and lossless codec for streams of
//! 12-bit-per-pixel grayscale high-speed-camera frames.
//!
//! A cheap spatial predictor ([`predictor`]) feeds a table-based entropy
//! coder ([`fse`]) per independently-compressed tile ([`tile`]). Frames are
//! tiled and concatenated by [`frame::PackContext`], then framed into a
//! single append-only file by [`container`]'s [`container::Reader`] and
//! [`container::Writer`].

pub mod error;
pub mod io;
pub mod math;
pub mod bits;

pub mod predictor;
pub mod residual;
pub mod fse;
pub mod tile;
pub mod frame;

pub mod container;

/// Re-exports of the types most callers need to read or write a vidpak file.
pub mod prelude {
    pub use crate::error::{Error, Result, UnitResult};
    pub use crate::frame::PackContext;
    pub use crate::container::{Header, Prefetch, Reader, RecordHeader, Writer};
}

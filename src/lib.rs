//!
//! # revad
//!
//! ## Core API
//!
//! Reverse-mode automatic differentiation for data-dependent `f64` programs.
//! Computations are recorded onto an explicit [`Tape`] as they run, then
//! differentiated with a single backward sweep per output.
//!
//! The main entry points are [`Tape::var`] to create inputs, the operators and
//! elementary functions on [`Var`] to build the computation, and [`gradient`]
//! to differentiate it. [`Tape::with_nested`] isolates sub-computations so
//! their memory can be reclaimed without touching anything recorded earlier.
//!
//! ```
//! use revad::Tape;
//!
//! let mut tape = Tape::new();
//! for step in 0..3 {
//!   {
//!     let x = tape.var(step as f64);
//!     let y = x.sin() * &x;
//!     let (_, partials) = y.gradient(&[x]);
//!     assert!(partials[0].is_finite());
//!   }
//!   tape.recover_memory();
//! }
//! ```
//!

pub use lib_revad_core::*;

#[cfg(feature = "functional")]
pub use lib_revad_functional as functional;

//!
//! # revad-core
//!
//! Tape-based reverse-mode automatic differentiation over `f64`.
//!
//! Every operation on a [`Var`] appends one node to its [`Tape`]; a backward
//! sweep over the tape then yields the partial derivatives of one output with
//! respect to any number of inputs.
//!
//! ```
//! use lib_revad_core::{gradient, Tape};
//!
//! let tape = Tape::new();
//! let x1 = tape.var(2.0);
//! let x2 = tape.var(3.0);
//! let y = &x1 * &x2 + x1.exp();
//! let (value, partials) = gradient(&y, &[x1, x2]);
//! assert!((value - 13.389).abs() < 1e-3);
//! assert_eq!(partials[1], 2.0);
//! ```
//!
//! ## Memory Invariants
//!
//! 1. A node only ever refers to nodes recorded before it, so creation order is
//!    a valid order for the backward sweep
//! 2. Nodes and their arena data are reclaimed in bulk, either back to a nested
//!    scope's checkpoint or entirely through [`Tape::recover_memory`] (or
//!    [`Tape::free_memory`], which also hands the chunks back)
//! 3. Pullbacks can only add to operand adjoints, never overwrite them
//!
//! These invariants are enforced by:
//! - Operand indices being checked against the tape length at record time
//! - `recover_memory` taking `&mut Tape`, so no handle can be alive across it
//! - Nested scopes being strictly LIFO, with a panic on misuse
//!

mod arena;
mod boundary;
mod config;
mod error;
mod math;
mod nested;
mod node;
mod ops;
mod partials;
mod reduce;
mod sweep;
mod tape;
mod var;

pub use arena::{Arena, Mark, Span};
pub use config::{ArenaConfig, DEFAULT_GROWTH_FACTOR, DEFAULT_INITIAL_CHUNK_BYTES, DEFAULT_MAX_CHUNK_BYTES};
pub use error::{Error, Result};
pub use nested::Nested;
pub use partials::Pullback;
pub use sweep::gradient;
pub use tape::{recover_thread_tape, with_thread_tape, Tape, TapeStats};
pub use var::{value_of, Var};

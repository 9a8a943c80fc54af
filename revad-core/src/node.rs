//! The closed catalog of node shapes and their pullbacks
//!
//! Every shape obeys the same contract: given the node's own adjoint
//! (`upstream`), add `upstream * ∂value/∂operand` to each operand's adjoint,
//! evaluated at the recorded forward values. Shapes only ever see an
//! [`Adjoints`] accumulator, so overwriting an operand's adjoint is impossible.

use std::f64::consts::{LN_10, LN_2};

use smallvec::{smallvec, SmallVec};

use crate::arena::Span;
use crate::sweep::Adjoints;
use crate::tape::Storage;

/// Position of a node on the tape; creation order doubles as topological order
pub(crate) type NodeIndex = usize;

/// We have code that relies on `NodeIndex` being equal in size to a usize...
const _: () = {
  use std::mem::size_of;
  assert!(size_of::<NodeIndex>() <= size_of::<usize>())
};

#[derive(Debug)]
pub(crate) struct Node {
  pub(crate) value: f64,
  pub(crate) adjoint: f64,
  pub(crate) kind: NodeKind,
}

impl Node {
  #[inline(always)]
  pub(crate) fn new(value: f64, kind: NodeKind) -> Self {
    Self {
      value,
      adjoint: 0.0,
      kind,
    }
  }

  /// Run this node's backward rule, pushing its adjoint onto its operands
  #[inline]
  pub(crate) fn pullback(&self, adjoints: &mut Adjoints<'_>, storage: &Storage) {
    let upstream = self.adjoint;
    match self.kind {
      NodeKind::Leaf => {}
      NodeKind::Unary { operand, partial } => adjoints.accumulate(operand, upstream * partial),
      NodeKind::Binary { a, b, da, db } => {
        adjoints.accumulate(a, upstream * da);
        adjoints.accumulate(b, upstream * db);
      }
      NodeKind::Elementary { op, operand } => {
        let d = op.derivative(adjoints.value(operand), self.value);
        adjoints.accumulate(operand, upstream * d);
      }
      NodeKind::ElementaryBinary { op, a, b } => {
        let (da, db) = op.partials(adjoints.value(a), adjoints.value(b), self.value);
        adjoints.accumulate(a, upstream * da);
        adjoints.accumulate(b, upstream * db);
      }
      NodeKind::Partials { operands, partials } => {
        let operands = storage.operands.get(operands);
        let partials = storage.scalars.get(partials);
        for (&operand, &partial) in operands.iter().zip(partials) {
          adjoints.accumulate(operand, upstream * partial);
        }
      }
      NodeKind::Poisoned { operands } => {
        for &operand in storage.operands.get(operands) {
          adjoints.accumulate(operand, f64::NAN);
        }
      }
      NodeKind::Sum { operands } => {
        for &operand in storage.operands.get(operands) {
          adjoints.accumulate(operand, upstream);
        }
      }
      NodeKind::Mean { operands } => {
        let operands = storage.operands.get(operands);
        let scaled = upstream / operands.len() as f64;
        for &operand in operands {
          adjoints.accumulate(operand, scaled);
        }
      }
      NodeKind::Dot { a, b } => {
        let a = storage.operands.get(a);
        let b = storage.operands.get(b);
        for (&i, &j) in a.iter().zip(b) {
          let (vi, vj) = (adjoints.value(i), adjoints.value(j));
          adjoints.accumulate(i, upstream * vj);
          adjoints.accumulate(j, upstream * vi);
        }
      }
      NodeKind::DotConst { a, b } => {
        let a = storage.operands.get(a);
        let b = storage.scalars.get(b);
        for (&i, &c) in a.iter().zip(b) {
          adjoints.accumulate(i, upstream * c);
        }
      }
      NodeKind::DotSelf { operands } => {
        for &operand in storage.operands.get(operands) {
          let v = adjoints.value(operand);
          adjoints.accumulate(operand, 2.0 * upstream * v);
        }
      }
      NodeKind::SquaredDistance { a, b } => {
        let a = storage.operands.get(a);
        let b = storage.operands.get(b);
        for (&i, &j) in a.iter().zip(b) {
          let d = 2.0 * upstream * (adjoints.value(i) - adjoints.value(j));
          adjoints.accumulate(i, d);
          adjoints.accumulate(j, -d);
        }
      }
      NodeKind::LogSumExp { operands } => {
        for &operand in storage.operands.get(operands) {
          let weight = (adjoints.value(operand) - self.value).exp();
          adjoints.accumulate(operand, upstream * weight);
        }
      }
      NodeKind::Variance { operands, mean } => {
        let operands = storage.operands.get(operands);
        let scaled = 2.0 * upstream / (operands.len() - 1) as f64;
        for &operand in operands {
          let centered = adjoints.value(operand) - mean;
          adjoints.accumulate(operand, scaled * centered);
        }
      }
      NodeKind::Custom { slot, operands } => {
        let operands = storage.operands.get(operands);
        let values: SmallVec<[f64; 8]> = operands.iter().map(|&i| adjoints.value(i)).collect();
        let mut grads: SmallVec<[f64; 8]> = smallvec![0.0; operands.len()];
        storage.owned[slot].pullback(self.value, upstream, &values, &mut grads);
        for (&operand, &grad) in operands.iter().zip(&grads) {
          adjoints.accumulate(operand, grad);
        }
      }
    }
  }
}

/// Node shapes...
///
/// Operand references are tape indices, always strictly smaller than the index
/// of the node holding them. Anything variable-length lives in the arenas.
#[derive(Debug, Clone, Copy)]
pub(crate) enum NodeKind {
  /// Independent variable or constant, nothing to propagate
  Leaf,
  /// One operand, partial computed during the forward pass
  Unary { operand: NodeIndex, partial: f64 },
  /// Two operands, partials computed during the forward pass
  Binary {
    a: NodeIndex,
    b: NodeIndex,
    da: f64,
    db: f64,
  },
  /// One operand, partial recomputed from recorded values at sweep time
  Elementary { op: Elementary, operand: NodeIndex },
  /// Two operands, partials recomputed from recorded values at sweep time
  ElementaryBinary {
    op: ElementaryBinary,
    a: NodeIndex,
    b: NodeIndex,
  },
  /// Caller-supplied partials, one per operand
  Partials {
    operands: Span<NodeIndex>,
    partials: Span<f64>,
  },
  /// A NaN operand was seen at construction; every operand gets a NaN adjoint
  Poisoned { operands: Span<NodeIndex> },
  Sum { operands: Span<NodeIndex> },
  Mean { operands: Span<NodeIndex> },
  Dot { a: Span<NodeIndex>, b: Span<NodeIndex> },
  DotConst { a: Span<NodeIndex>, b: Span<f64> },
  DotSelf { operands: Span<NodeIndex> },
  SquaredDistance { a: Span<NodeIndex>, b: Span<NodeIndex> },
  LogSumExp { operands: Span<NodeIndex> },
  Variance { operands: Span<NodeIndex>, mean: f64 },
  /// Backward rule supplied by a collaborator, owned by the tape's cleanup list
  Custom {
    slot: usize,
    operands: Span<NodeIndex>,
  },
}

impl NodeKind {
  /// Short name used for tape statistics
  pub(crate) fn name(&self) -> &'static str {
    match self {
      NodeKind::Leaf => "leaf",
      NodeKind::Unary { .. } => "unary",
      NodeKind::Binary { .. } => "binary",
      NodeKind::Elementary { op, .. } => op.name(),
      NodeKind::ElementaryBinary { op, .. } => op.name(),
      NodeKind::Partials { .. } => "partials",
      NodeKind::Poisoned { .. } => "poisoned",
      NodeKind::Sum { .. } => "sum",
      NodeKind::Mean { .. } => "mean",
      NodeKind::Dot { .. } => "dot_product",
      NodeKind::DotConst { .. } => "dot_product_const",
      NodeKind::DotSelf { .. } => "dot_self",
      NodeKind::SquaredDistance { .. } => "squared_distance",
      NodeKind::LogSumExp { .. } => "log_sum_exp",
      NodeKind::Variance { .. } => "variance",
      NodeKind::Custom { .. } => "custom",
    }
  }
}

/// Unary functions whose derivative is cheap to recover from the operand and
/// the result, so nothing but the operand index needs storing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Elementary {
  Sqrt,
  Cbrt,
  Square,
  Exp,
  Exp2,
  ExpM1,
  Ln,
  Ln1p,
  Log2,
  Log10,
  Sin,
  Cos,
  Tan,
  Asin,
  Acos,
  Atan,
  Sinh,
  Cosh,
  Tanh,
  Asinh,
  Acosh,
  Atanh,
  Recip,
  InvLogit,
  Log1pExp,
}

impl Elementary {
  #[inline]
  pub(crate) fn forward(self, a: f64) -> f64 {
    match self {
      Elementary::Sqrt => a.sqrt(),
      Elementary::Cbrt => a.cbrt(),
      Elementary::Square => a * a,
      Elementary::Exp => a.exp(),
      Elementary::Exp2 => a.exp2(),
      Elementary::ExpM1 => a.exp_m1(),
      Elementary::Ln => a.ln(),
      Elementary::Ln1p => a.ln_1p(),
      Elementary::Log2 => a.log2(),
      Elementary::Log10 => a.log10(),
      Elementary::Sin => a.sin(),
      Elementary::Cos => a.cos(),
      Elementary::Tan => a.tan(),
      Elementary::Asin => a.asin(),
      Elementary::Acos => a.acos(),
      Elementary::Atan => a.atan(),
      Elementary::Sinh => a.sinh(),
      Elementary::Cosh => a.cosh(),
      Elementary::Tanh => a.tanh(),
      Elementary::Asinh => a.asinh(),
      Elementary::Acosh => a.acosh(),
      Elementary::Atanh => a.atanh(),
      Elementary::Recip => 1.0 / a,
      Elementary::InvLogit => inv_logit(a),
      Elementary::Log1pExp => log1p_exp(a),
    }
  }

  /// d(value)/da, where `value` is the recorded forward result
  #[inline]
  pub(crate) fn derivative(self, a: f64, value: f64) -> f64 {
    match self {
      Elementary::Sqrt => 0.5 / value,
      Elementary::Cbrt => 1.0 / (3.0 * value * value),
      Elementary::Square => 2.0 * a,
      Elementary::Exp => value,
      Elementary::Exp2 => value * LN_2,
      Elementary::ExpM1 => value + 1.0,
      Elementary::Ln => 1.0 / a,
      Elementary::Ln1p => 1.0 / (1.0 + a),
      Elementary::Log2 => 1.0 / (a * LN_2),
      Elementary::Log10 => 1.0 / (a * LN_10),
      Elementary::Sin => a.cos(),
      Elementary::Cos => -a.sin(),
      Elementary::Tan => 1.0 + value * value,
      Elementary::Asin => 1.0 / (1.0 - a * a).sqrt(),
      Elementary::Acos => -1.0 / (1.0 - a * a).sqrt(),
      Elementary::Atan => 1.0 / (1.0 + a * a),
      Elementary::Sinh => a.cosh(),
      Elementary::Cosh => a.sinh(),
      Elementary::Tanh => 1.0 - value * value,
      Elementary::Asinh => 1.0 / (a * a + 1.0).sqrt(),
      Elementary::Acosh => 1.0 / (a * a - 1.0).sqrt(),
      Elementary::Atanh => 1.0 / (1.0 - a * a),
      Elementary::Recip => -value * value,
      Elementary::InvLogit => value * (1.0 - value),
      Elementary::Log1pExp => inv_logit(a),
    }
  }

  fn name(self) -> &'static str {
    match self {
      Elementary::Sqrt => "sqrt",
      Elementary::Cbrt => "cbrt",
      Elementary::Square => "square",
      Elementary::Exp => "exp",
      Elementary::Exp2 => "exp2",
      Elementary::ExpM1 => "exp_m1",
      Elementary::Ln => "ln",
      Elementary::Ln1p => "ln_1p",
      Elementary::Log2 => "log2",
      Elementary::Log10 => "log10",
      Elementary::Sin => "sin",
      Elementary::Cos => "cos",
      Elementary::Tan => "tan",
      Elementary::Asin => "asin",
      Elementary::Acos => "acos",
      Elementary::Atan => "atan",
      Elementary::Sinh => "sinh",
      Elementary::Cosh => "cosh",
      Elementary::Tanh => "tanh",
      Elementary::Asinh => "asinh",
      Elementary::Acosh => "acosh",
      Elementary::Atanh => "atanh",
      Elementary::Recip => "recip",
      Elementary::InvLogit => "inv_logit",
      Elementary::Log1pExp => "log1p_exp",
    }
  }
}

/// Binary counterpart of [`Elementary`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum ElementaryBinary {
  Mul,
  Div,
  Pow,
  Atan2,
  Hypot,
}

impl ElementaryBinary {
  #[inline]
  pub(crate) fn forward(self, a: f64, b: f64) -> f64 {
    match self {
      ElementaryBinary::Mul => a * b,
      ElementaryBinary::Div => a / b,
      ElementaryBinary::Pow => a.powf(b),
      ElementaryBinary::Atan2 => a.atan2(b),
      ElementaryBinary::Hypot => a.hypot(b),
    }
  }

  /// (d(value)/da, d(value)/db)
  #[inline]
  pub(crate) fn partials(self, a: f64, b: f64, value: f64) -> (f64, f64) {
    match self {
      ElementaryBinary::Mul => (b, a),
      ElementaryBinary::Div => (1.0 / b, -value / b),
      ElementaryBinary::Pow => {
        let da = b * a.powf(b - 1.0);
        // a^b ln(a) tends to zero as a -> 0 from above, skip the 0 * -inf
        let db = if a == 0.0 { 0.0 } else { value * a.ln() };
        (da, db)
      }
      ElementaryBinary::Atan2 => {
        let r2 = a * a + b * b;
        (b / r2, -a / r2)
      }
      ElementaryBinary::Hypot => (a / value, b / value),
    }
  }

  fn name(self) -> &'static str {
    match self {
      ElementaryBinary::Mul => "mul",
      ElementaryBinary::Div => "div",
      ElementaryBinary::Pow => "pow",
      ElementaryBinary::Atan2 => "atan2",
      ElementaryBinary::Hypot => "hypot",
    }
  }
}

/// Logistic sigmoid without overflow for large |a|
#[inline]
pub(crate) fn inv_logit(a: f64) -> f64 {
  if a < 0.0 {
    let e = a.exp();
    e / (1.0 + e)
  } else {
    1.0 / (1.0 + (-a).exp())
  }
}

/// ln(1 + e^a) without overflow for large a
#[inline]
pub(crate) fn log1p_exp(a: f64) -> f64 {
  if a > 0.0 {
    a + (-a).exp().ln_1p()
  } else {
    a.exp().ln_1p()
  }
}

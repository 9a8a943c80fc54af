//! Arithmetic operators
//!
//! The reference impls do the work, everything taking handles by value just
//! forwards to them. Mixing a handle with an `f64` records a single-operand
//! node; the constant never touches the tape.

use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};

use crate::node::ElementaryBinary;
use crate::var::Var;

impl<'t> Add for &Var<'t> {
  type Output = Var<'t>;

  #[inline]
  fn add(self, other: Self) -> Self::Output {
    self.binary(other, self.value() + other.value(), 1.0, 1.0)
  }
}

impl<'t> Add<f64> for &Var<'t> {
  type Output = Var<'t>;

  #[inline]
  fn add(self, other: f64) -> Self::Output {
    self.unary(self.value() + other, 1.0)
  }
}

impl<'t> Add<&Var<'t>> for f64 {
  type Output = Var<'t>;

  #[inline]
  fn add(self, other: &Var<'t>) -> Self::Output {
    other.unary(self + other.value(), 1.0)
  }
}

impl<'t> Sub for &Var<'t> {
  type Output = Var<'t>;

  #[inline]
  fn sub(self, other: Self) -> Self::Output {
    self.binary(other, self.value() - other.value(), 1.0, -1.0)
  }
}

impl<'t> Sub<f64> for &Var<'t> {
  type Output = Var<'t>;

  #[inline]
  fn sub(self, other: f64) -> Self::Output {
    self.unary(self.value() - other, 1.0)
  }
}

impl<'t> Sub<&Var<'t>> for f64 {
  type Output = Var<'t>;

  #[inline]
  fn sub(self, other: &Var<'t>) -> Self::Output {
    other.unary(self - other.value(), -1.0)
  }
}

impl<'t> Mul for &Var<'t> {
  type Output = Var<'t>;

  #[inline]
  fn mul(self, other: Self) -> Self::Output {
    self.elementary_binary(other, ElementaryBinary::Mul)
  }
}

impl<'t> Mul<f64> for &Var<'t> {
  type Output = Var<'t>;

  #[inline]
  fn mul(self, other: f64) -> Self::Output {
    self.unary(self.value() * other, other)
  }
}

impl<'t> Mul<&Var<'t>> for f64 {
  type Output = Var<'t>;

  #[inline]
  fn mul(self, other: &Var<'t>) -> Self::Output {
    other.unary(self * other.value(), self)
  }
}

impl<'t> Div for &Var<'t> {
  type Output = Var<'t>;

  #[inline]
  fn div(self, other: Self) -> Self::Output {
    self.elementary_binary(other, ElementaryBinary::Div)
  }
}

impl<'t> Div<f64> for &Var<'t> {
  type Output = Var<'t>;

  #[inline]
  fn div(self, other: f64) -> Self::Output {
    self.unary(self.value() / other, 1.0 / other)
  }
}

impl<'t> Div<&Var<'t>> for f64 {
  type Output = Var<'t>;

  #[inline]
  fn div(self, other: &Var<'t>) -> Self::Output {
    let v = other.value();
    let value = self / v;
    // d(c/v)/dv = -c/v^2
    other.unary(value, -value / v)
  }
}

impl<'t> Neg for &Var<'t> {
  type Output = Var<'t>;

  #[inline]
  fn neg(self) -> Self::Output {
    self.unary(-self.value(), -1.0)
  }
}

impl<'t> Neg for Var<'t> {
  type Output = Var<'t>;

  #[inline(always)]
  fn neg(self) -> Self::Output {
    Neg::neg(&self)
  }
}

/// By-value flavours of an operator, all forwarding to the reference impls
macro_rules! forward_binop {
  ($trait:ident, $method:ident) => {
    impl<'t> $trait<Var<'t>> for &Var<'t> {
      type Output = Var<'t>;

      #[inline(always)]
      fn $method(self, other: Var<'t>) -> Self::Output {
        $trait::$method(self, &other)
      }
    }

    impl<'t> $trait for Var<'t> {
      type Output = Var<'t>;

      #[inline(always)]
      fn $method(self, other: Self) -> Self::Output {
        $trait::$method(&self, &other)
      }
    }

    impl<'t> $trait<&Var<'t>> for Var<'t> {
      type Output = Var<'t>;

      #[inline(always)]
      fn $method(self, other: &Var<'t>) -> Self::Output {
        $trait::$method(&self, other)
      }
    }

    impl<'t> $trait<f64> for Var<'t> {
      type Output = Var<'t>;

      #[inline(always)]
      fn $method(self, other: f64) -> Self::Output {
        $trait::$method(&self, other)
      }
    }

    impl<'t> $trait<Var<'t>> for f64 {
      type Output = Var<'t>;

      #[inline(always)]
      fn $method(self, other: Var<'t>) -> Self::Output {
        $trait::$method(self, &other)
      }
    }
  };
}

forward_binop!(Add, add);
forward_binop!(Sub, sub);
forward_binop!(Mul, mul);
forward_binop!(Div, div);

/// Compound assignment rebinds the handle to the newly recorded node; the old
/// node stays on the tape
macro_rules! assign_op {
  ($trait:ident, $method:ident, $op:ident, $op_method:ident) => {
    impl<'t> $trait<&Var<'t>> for Var<'t> {
      #[inline]
      fn $method(&mut self, other: &Var<'t>) {
        *self = $op::$op_method(&*self, other);
      }
    }

    impl<'t> $trait<Var<'t>> for Var<'t> {
      #[inline]
      fn $method(&mut self, other: Var<'t>) {
        *self = $op::$op_method(&*self, &other);
      }
    }

    impl<'t> $trait<f64> for Var<'t> {
      #[inline]
      fn $method(&mut self, other: f64) {
        *self = $op::$op_method(&*self, other);
      }
    }
  };
}

assign_op!(AddAssign, add_assign, Add, add);
assign_op!(SubAssign, sub_assign, Sub, sub);
assign_op!(MulAssign, mul_assign, Mul, mul);
assign_op!(DivAssign, div_assign, Div, div);

//! Every recorded primitive against centered finite differences of its own
//! forward values

use approx::assert_relative_eq;
use lib_revad_core::{Tape, Var};

const STEP: f64 = 1e-6;

fn record<'t>(tape: &'t Tape, x: &[f64]) -> Vec<Var<'t>> {
  x.iter().map(|&v| tape.var(v)).collect()
}

fn forward<F>(f: &F, x: &[f64]) -> f64
where
  F: for<'t> Fn(&'t Tape, &[Var<'t>]) -> Var<'t>,
{
  let tape = Tape::new();
  let xs = record(&tape, x);
  f(&tape, &xs).value()
}

/// Compare the swept gradient of `f` at `x` with centered differences
fn check<F>(f: F, x: &[f64])
where
  F: for<'t> Fn(&'t Tape, &[Var<'t>]) -> Var<'t>,
{
  let tape = Tape::new();
  let xs = record(&tape, x);
  let (value, analytic) = f(&tape, &xs).gradient(&xs);
  assert_relative_eq!(value, forward(&f, x), max_relative = 1e-12);

  let mut shifted = x.to_vec();
  for (i, &partial) in analytic.iter().enumerate() {
    shifted[i] = x[i] + STEP;
    let up = forward(&f, &shifted);
    shifted[i] = x[i] - STEP;
    let down = forward(&f, &shifted);
    shifted[i] = x[i];
    let numeric = (up - down) / (2.0 * STEP);
    assert_relative_eq!(partial, numeric, epsilon = 1e-7, max_relative = 1e-5);
  }
}

mod elementary {
  use super::*;

  #[test]
  fn roots_and_powers() {
    check(|_, x| x[0].sqrt(), &[2.3]);
    check(|_, x| x[0].sqrt(), &[1e-3]);
    check(|_, x| x[0].cbrt(), &[-1.7]);
    check(|_, x| x[0].square(), &[-0.8]);
    check(|_, x| x[0].recip(), &[-2.2]);
    check(|_, x| x[0].powf(1.7), &[2.5]);
    check(|_, x| x[0].powi(3), &[-1.3]);
    check(|_, x| x[0].powi(-2), &[0.9]);
    check(|_, x| x[0].pow(&x[1]), &[1.7, 2.3]);
    check(|_, x| x[0].hypot(&x[1]), &[0.3, -0.4]);
    check(|_, x| x[0].fma(&x[1], &x[2]), &[0.3, -1.4, 2.0]);
  }

  #[test]
  fn exponentials_and_logs() {
    check(|_, x| x[0].exp(), &[0.6]);
    check(|_, x| x[0].exp2(), &[-1.4]);
    check(|_, x| x[0].exp_m1(), &[1e-3]);
    check(|_, x| x[0].ln(), &[0.7]);
    check(|_, x| x[0].ln(), &[1e-3]);
    check(|_, x| x[0].ln_1p(), &[1e-3]);
    check(|_, x| x[0].log(5.0), &[3.0]);
    check(|_, x| x[0].log2(), &[0.4]);
    check(|_, x| x[0].log10(), &[12.5]);
    check(|_, x| x[0].inv_logit(), &[0.3]);
    check(|_, x| x[0].inv_logit(), &[-30.0]);
    check(|_, x| x[0].inv_logit(), &[30.0]);
    check(|_, x| x[0].log1p_exp(), &[-40.0]);
    check(|_, x| x[0].log1p_exp(), &[0.2]);
    check(|_, x| x[0].log1p_exp(), &[40.0]);
  }

  #[test]
  fn trigonometric() {
    check(|_, x| x[0].sin(), &[0.9]);
    check(|_, x| x[0].cos(), &[0.9]);
    check(|_, x| x[0].tan(), &[1.2]);
    check(|_, x| x[0].asin(), &[0.3]);
    check(|_, x| x[0].asin(), &[0.99]);
    check(|_, x| x[0].acos(), &[-0.6]);
    check(|_, x| x[0].atan(), &[4.0]);
    check(|_, x| x[0].atan2(&x[1]), &[0.4, -1.1]);
  }

  #[test]
  fn hyperbolic() {
    check(|_, x| x[0].sinh(), &[-1.1]);
    check(|_, x| x[0].cosh(), &[0.7]);
    check(|_, x| x[0].tanh(), &[0.7]);
    check(|_, x| x[0].asinh(), &[-2.5]);
    check(|_, x| x[0].acosh(), &[1.01]);
    check(|_, x| x[0].acosh(), &[3.0]);
    check(|_, x| x[0].atanh(), &[0.99]);
  }
}

mod arithmetic {
  use super::*;

  #[test]
  fn operators() {
    check(|_, x| &x[0] + &x[1], &[0.5, 1.5]);
    check(|_, x| &x[0] - &x[1], &[0.5, 1.5]);
    check(|_, x| &x[0] * &x[1], &[0.5, 1.5]);
    check(|_, x| &x[0] / &x[1], &[0.5, 1.5]);
    check(|_, x| 3.0 / &x[0], &[0.5]);
    check(|_, x| 3.0 - &x[0] * 2.0, &[0.5]);
    check(|_, x| -(&x[0] / 4.0) + 1.0, &[0.5]);
  }

  #[test]
  fn composite() {
    check(
      |_, x| {
        let (a, b, c) = (x[0], x[1], x[2]);
        let mut acc = a * b;
        acc += c.sin();
        acc *= (a / c).exp();
        acc -= b.powi(2);
        acc / (a.square() + 1.0)
      },
      &[0.3, -1.2, 2.1],
    );
  }

  #[test]
  fn fan_out() {
    check(
      |_, x| {
        let shared = x[0].ln();
        &shared * &shared + shared.exp() - shared
      },
      &[1.7],
    );
  }
}

mod boundary {
  use super::*;

  #[test]
  fn away_from_kinks() {
    check(|_, x| x[0].fmax(&x[1]), &[0.3, 0.9]);
    check(|_, x| x[0].fmax(&x[1]), &[1.3, 0.9]);
    check(|_, x| x[0].fmin(&x[1]), &[0.3, 0.9]);
    check(|_, x| x[0].fmax_f64(0.1), &[0.3]);
    check(|_, x| x[0].fmin_f64(0.1), &[0.3]);
    check(|_, x| x[0].fdim(&x[1]), &[1.3, 0.9]);
    check(|_, x| x[0].fdim_f64(2.0), &[1.3]);
    check(|_, x| x[0].abs(), &[-0.4]);
    check(|_, x| x[0].abs(), &[0.4]);
    check(|_, x| x[0].clamp(-1.0, 1.0), &[0.4]);
    check(|_, x| x[0].clamp(-1.0, 1.0), &[1.4]);
    check(|_, x| x[0].floor() + x[0].ceil(), &[0.4]);
    check(|_, x| x[0].round() * x[0].trunc() + x[0].step(), &[2.3]);
  }
}

mod reductions {
  use super::*;

  const XS: [f64; 4] = [0.3, -1.1, 2.4, 0.7];

  #[test]
  fn sums_and_products() {
    check(|tape, x| tape.sum(x), &XS);
    check(|tape, x| tape.dot_self(x), &XS);
    check(|tape, x| tape.dot_product(&x[..2], &x[2..]).unwrap(), &XS);
    check(
      |tape, x| tape.dot_product_const(x, &[1.5, -2.0, 0.25, 4.0]).unwrap(),
      &XS,
    );
    check(|tape, x| tape.squared_distance(&x[..2], &x[2..]).unwrap(), &XS);
  }

  #[test]
  fn statistics() {
    check(|tape, x| tape.log_sum_exp(x), &XS);
    check(|tape, x| tape.log_sum_exp(x), &[800.0, 801.5, 799.0]);
    check(|tape, x| tape.mean(x).unwrap(), &XS);
    check(|tape, x| tape.variance(x).unwrap(), &XS);
  }

  #[test]
  fn reductions_with_shared_operands() {
    check(
      |tape, x| {
        let doubled: Vec<_> = x.iter().map(|v| v * 2.0).collect();
        let spread = tape.variance(&doubled).unwrap();
        let dot = tape.dot_product(x, &doubled).unwrap();
        spread * dot.sqrt()
      },
      &XS,
    );
  }
}

mod escape_hatches {
  use super::*;

  #[test]
  fn custom_pullback() {
    check(
      |tape, x| {
        let value = x[0].value().sin() * x[1].value();
        tape.custom(value, &x[..2], |_: f64, upstream: f64, v: &[f64], grads: &mut [f64]| {
          grads[0] = upstream * v[0].cos() * v[1];
          grads[1] = upstream * v[0].sin();
        })
      },
      &[0.8, -1.9],
    );
  }

  #[test]
  fn precomputed_gradients() {
    check(
      |tape, x| {
        let (a, b) = (x[0].value(), x[1].value());
        let inner = tape
          .precomputed_gradients(a * a * b, &x[..2], &[2.0 * a * b, a * a])
          .unwrap();
        inner.exp()
      },
      &[0.8, -1.9],
    );
  }
}

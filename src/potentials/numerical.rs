/* ************************************************************************ **
** This file is part of ljcap, and is licensed under EITHER the MIT license **
** or the Apache 2.0 license, at your option.                               **
**                                                                          **
**     http://www.apache.org/licenses/LICENSE-2.0                           **
**     http://opensource.org/licenses/MIT                                   **
**                                                                          **
** Be aware that not all of ljcap is provided under this permissive license,**
** and that the project as a whole is licensed under the GPL 3.0.           **
** ************************************************************************ */

//! Finite difference derivatives, for checking forces against energies.

/// Approximation method for a numerical 1D derivative.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum DerivativeKind {
    /// n-point central stencil. Only implemented for `n = 3, 5`.
    Stencil(u32),
}

impl Default for DerivativeKind {
    fn default() -> DerivativeKind { DerivativeKind::Stencil(5) }
}

/// Compute a numerical derivative using finite differences.
pub(crate) fn slope(
    step: f64,
    kind: Option<DerivativeKind>,
    point: f64,
    mut value_fn: impl FnMut(f64) -> f64,
) -> f64 {
    // http://www.holoborodko.com/pavel/numerical-methods/numerical-derivative/central-differences/
    let mut stencil = |terms: &[(f64, f64)]| -> f64 {
        terms.iter().map(|&(offset, coeff)| coeff * value_fn(point + offset * step)).sum()
    };

    match kind.unwrap_or_default() {
        DerivativeKind::Stencil(3) => {
            stencil(&[(-1.0, -1.0), (1.0, 1.0)]) / (2.0 * step)
        },
        DerivativeKind::Stencil(5) => {
            stencil(&[(-2.0, 1.0), (-1.0, -8.0), (1.0, 8.0), (2.0, -1.0)]) / (12.0 * step)
        },
        DerivativeKind::Stencil(n) => panic!("unsupported stencil size: {}", n),
    }
}

#[test]
fn slope_of_cubic() {
    // the 5-point stencil is exact for polynomials up to degree 4
    let f = |x: f64| x * x * x - 2.0 * x;
    assert_close!(rel=1e-10, slope(1e-2, None, 1.5, f), 3.0 * 1.5 * 1.5 - 2.0);
    assert_close!(rel=1e-3, slope(1e-2, Some(DerivativeKind::Stencil(3)), 1.5, f), 4.75);
}

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

#[macro_use]
extern crate failure;
use std::fmt;

pub const DEFAULT_NONZERO_TOL: f64 = 1e-9;

/// `assert_eq!` for floating point data.
///
/// ```
/// # #[macro_use] extern crate ljcap_assert_close;
/// # fn main() {
/// assert_close!(1.0, 1.0 + 1e-12);
/// assert_close!(abs=1e-6, 0.0, 1e-7);
/// assert_close!(rel=1e-3, abs=1e-6, [1.0, 2.0, 3.0], [1.0, 2.0001, 3.0], "in {}", "vector");
/// # }
/// ```
///
/// Tolerance keywords must come first. Defaults are `rel=DEFAULT_NONZERO_TOL, abs=0`.
#[macro_export]
macro_rules! assert_close {
    ($($t:tt)*) => { $crate::__assert_close_parse!{[$($t)*] []} };
}

#[macro_export]
macro_rules! debug_assert_close {
    ($($t:tt)*) => {{
        #[cfg(debug_assertions)] {
            $crate::assert_close!{$($t)*}
        }
    }};
}

#[doc(hidden)]
#[macro_export]
macro_rules! __assert_close_parse {
    (@check [$($field:ident: $val:expr,)*] $a:expr, $b:expr, $($fmt:tt)+) => {{
        #[allow(clippy::needless_update)]
        let tol = $crate::Tolerances { $($field: $val,)* ..$crate::Tolerances::default() };
        let a = $a;
        let b = $b;
        if let Err(e) = $crate::CheckClose::check_close(&a, &b, tol) {
            panic!(
                "{} (tolerances: rel={}, abs={})\n left: {:?}\nright: {:?}\n{}",
                format!($($fmt)+), tol.rel, tol.abs, a, b, e,
            );
        }
    }};
    ([rel=$tol:expr, $($rest:tt)*] [$($opts:tt)*]) => {
        $crate::__assert_close_parse!{[$($rest)*] [$($opts)* rel: $tol,]}
    };
    ([abs=$tol:expr, $($rest:tt)*] [$($opts:tt)*]) => {
        $crate::__assert_close_parse!{[$($rest)*] [$($opts)* abs: $tol,]}
    };
    ([$a:expr, $b:expr $(,)?] $opts:tt) => {
        $crate::__assert_close_parse!{@check $opts $a, $b, "not nearly equal!"}
    };
    ([$a:expr, $b:expr, $($fmt:tt)+] $opts:tt) => {
        $crate::__assert_close_parse!{@check $opts $a, $b, $($fmt)+}
    };
}

/// Python's `math.isclose`, except that NaN is never close to anything.
#[inline]
pub fn is_close(a: f64, b: f64, Tolerances { abs, rel }: Tolerances) -> bool {
    assert!(rel >= 0.0);
    assert!(abs >= 0.0);

    // identical infinities
    if a == b { return true; }
    if a.is_infinite() || b.is_infinite() { return false; }

    (a - b).abs() <= abs.max(rel * a.abs()).max(rel * b.abs())
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Tolerances {
    pub abs: f64,
    pub rel: f64,
}

impl Default for Tolerances {
    fn default() -> Self {
        Tolerances { abs: 0.0, rel: DEFAULT_NONZERO_TOL }
    }
}

#[derive(Debug, Fail)]
pub struct CheckCloseError {
    /// Position of the first offending element, for containers.
    pub index: Option<usize>,
    pub values: (f64, f64),
    pub tol: Tolerances,
}

impl fmt::Display for CheckCloseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let (left, right) = self.values;
        if let Some(index) = self.index {
            writeln!(f, "failed at index {}:", index)?;
        } else {
            writeln!(f, "failed at:")?;
        }
        write!(f, "  left: {:?}\n right: {:?}\n   tol: {:?}", left, right, self.tol)
    }
}

pub trait CheckClose<Rhs: ?Sized = Self> {
    /// Test that all values of self and other are close.
    fn check_close(&self, other: &Rhs, tol: Tolerances) -> Result<(), CheckCloseError>;
}

impl CheckClose for f64 {
    #[inline]
    fn check_close(&self, other: &f64, tol: Tolerances) -> Result<(), CheckCloseError> {
        match is_close(*self, *other, tol) {
            true => Ok(()),
            false => Err(CheckCloseError { index: None, values: (*self, *other), tol }),
        }
    }
}

// device-side data is single precision; compare it in double precision
impl CheckClose for f32 {
    #[inline]
    fn check_close(&self, other: &f32, tol: Tolerances) -> Result<(), CheckCloseError> {
        f64::from(*self).check_close(&f64::from(*other), tol)
    }
}

impl<'a, T: ?Sized + CheckClose> CheckClose for &'a T {
    fn check_close(&self, other: &Self, tol: Tolerances) -> Result<(), CheckCloseError> {
        CheckClose::check_close(*self, *other, tol)
    }
}

impl<T: CheckClose> CheckClose for [T] {
    fn check_close(&self, other: &[T], tol: Tolerances) -> Result<(), CheckCloseError> {
        assert_eq!(self.len(), other.len(), "length mismatch in check_close");
        for (index, (a, b)) in self.iter().zip(other).enumerate() {
            a.check_close(b, tol).map_err(|e| CheckCloseError {
                index: Some(e.index.unwrap_or(index)),
                ..e
            })?;
        }
        Ok(())
    }
}

impl<T: CheckClose> CheckClose for Vec<T> {
    fn check_close(&self, other: &Vec<T>, tol: Tolerances) -> Result<(), CheckCloseError> {
        self[..].check_close(&other[..], tol)
    }
}

impl<T: CheckClose, const N: usize> CheckClose for [T; N] {
    fn check_close(&self, other: &[T; N], tol: Tolerances) -> Result<(), CheckCloseError> {
        self[..].check_close(&other[..], tol)
    }
}

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

#[cfg(test)]
pub(crate) fn uniform(a: f64, b: f64) -> f64 { ::rand::random::<f64>() * (b - a) + a }

#[inline(always)]
pub(crate) fn sqr(x: f64) -> f64 { x * x }

#[inline(always)]
pub(crate) fn norm(v: [f64; 3]) -> f64 { (sqr(v[0]) + sqr(v[1]) + sqr(v[2])).sqrt() }

#[inline(always)]
pub(crate) fn sub(a: [f64; 3], b: [f64; 3]) -> [f64; 3] { [a[0] - b[0], a[1] - b[1], a[2] - b[2]] }

#[inline(always)]
pub(crate) fn scale(s: f64, v: [f64; 3]) -> [f64; 3] { [s * v[0], s * v[1], s * v[2]] }

/// Adds `+f` to the first accumulator and `-f` to the second.
#[inline(always)]
pub(crate) fn add_antisymmetric(f: [f64; 3], acc_1: &mut [f64; 3], acc_2: &mut [f64; 3]) {
    for k in 0..3 {
        acc_1[k] += f[k];
        acc_2[k] -= f[k];
    }
}

/// Mutable access to two distinct elements of a slice.
pub(crate) fn pair_mut<T>(slice: &mut [T], i: usize, j: usize) -> (&mut T, &mut T) {
    assert_ne!(i, j, "a particle cannot interact with itself");
    if i < j {
        let (head, tail) = slice.split_at_mut(j);
        (&mut head[i], &mut tail[0])
    } else {
        let (head, tail) = slice.split_at_mut(i);
        (&mut tail[0], &mut head[j])
    }
}

#[test]
fn pair_mut_order() {
    let mut v = vec![0, 1, 2, 3];
    {
        let (a, b) = pair_mut(&mut v, 3, 1);
        assert_eq!((*a, *b), (3, 1));
        *a = 30;
    }
    let (a, b) = pair_mut(&mut v, 0, 3);
    assert_eq!((*a, *b), (0, 30));
}

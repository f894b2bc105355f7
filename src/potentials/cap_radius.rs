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

//! Derivation of the cap radius from a target force magnitude.
//!
//! For each type pair we look for the radius `r` at which the uncapped LJ force
//! magnitude equals the force cap.  The search walks down from `sigma` in steps of
//! `sigma / 10`; every time it passes the target it turns around and halves the step,
//! which degenerates into a bisection once the root has been bracketed.
//!
//! The uncapped force increases monotonically as `r` shrinks from the potential
//! minimum towards zero, so for any positive cap there is exactly one root on
//! that branch.

use crate::lj;
use crate::table::{ForceCap, LjParams};

/// Stopping criteria for [`solve_cap_radius`].
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CapSolverSettings {
    /// Absolute tolerance on `|force(r) - force_cap|`.
    pub tolerance: f64,
    /// Give up after this many force evaluations and keep the best radius seen.
    pub max_iterations: u32,
}

impl Default for CapSolverSettings {
    fn default() -> Self {
        CapSolverSettings {
            tolerance: 1e-6,
            max_iterations: 100_000,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CapSolution {
    /// The cap radius. `0` when capping is disabled for this pair.
    pub radius: f64,
    /// Uncapped force magnitude at `radius`.
    pub force: f64,
    pub iterations: u32,
    /// `false` if the tolerance was never met; `radius` is then the best estimate.
    pub converged: bool,
}

impl CapSolution {
    fn disabled() -> Self {
        CapSolution { radius: 0.0, force: 0.0, iterations: 0, converged: true }
    }
}

/// Find the radius at which the uncapped force of `params` equals `force_cap`.
///
/// Returns a zero radius if capping is disabled or the pair has no LJ interaction.
pub fn solve_cap_radius(
    params: &LjParams,
    force_cap: ForceCap,
    settings: &CapSolverSettings,
) -> CapSolution {
    if !force_cap.is_enabled() || !params.has_interaction() {
        return CapSolution::disabled();
    }

    let target = force_cap.value();
    let LjParams { sigma, epsilon, .. } = *params;

    // Radii at or below zero count as an overshoot so the search turns back.
    let force_at = |r: f64| match r > 0.0 {
        true => lj::force_magnitude(sigma, epsilon, r),
        false => std::f64::INFINITY,
    };

    let mut radius = sigma;
    let mut step = -0.1 * sigma;
    let mut iterations = 0;
    let mut best = (radius, force_at(radius));

    while iterations < settings.max_iterations {
        let force = force_at(radius);
        iterations += 1;
        trace!("cap-iter: r: {:<23e} force: {:<23e} step: {:<23e}", radius, force, step);

        if (force - target).abs() < (best.1 - target).abs() {
            best = (radius, force);
        }

        if (step < 0.0 && target < force) || (step > 0.0 && target > force) {
            step = -0.5 * step;
        }

        if (force - target).abs() < settings.tolerance {
            return CapSolution { radius, force, iterations, converged: true };
        }

        // the step underflowed without meeting the tolerance
        if step == 0.0 {
            break;
        }
        radius += step;
    }

    let (radius, force) = best;
    warn!(
        "Cap radius search did not reach tolerance {:e} after {} iterations \
         (sigma={}, epsilon={}, force_cap={}); using r={} with force={}",
        settings.tolerance, iterations, sigma, epsilon, target, radius, force,
    );
    CapSolution { radius, force, iterations, converged: false }
}

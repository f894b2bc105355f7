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

//! The capped Lennard-Jones pair force.
//!
//! With `r_off = dist - offset`, a pair within range is evaluated in one of three regimes:
//!
//! * **normal** (`r_off > cap_radius`): the plain LJ force at `r_off`.
//! * **capped** (`0 < r_off <= cap_radius`): the force magnitude is pinned to its value
//!   at `cap_radius`, still directed along the separation vector.
//! * **coincident** (`r_off <= 0`): there is no meaningful direction; the capped force is
//!   applied along the x axis and a warning is logged.
//!
//! All powers of `sigma / r` are built by repeated multiplication.

use crate::pairs::Particle;
use crate::table::LjParams;
use crate::util::{sqr, scale, add_antisymmetric};

/// Reference threshold for the large force warning; see [`KernelSettings::displacement_warning`].
pub const DEFAULT_DISPLACEMENT_WARNING: f64 = 3e-6;

/// Values consumed by the kernel that belong to the surrounding simulation.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct KernelSettings {
    /// Integration timestep. Only used for the large force warning.
    pub time_step: f64,
    /// A warning is logged when `0.5 * force * dist * time_step^2` exceeds this.
    pub displacement_warning: f64,
}

impl Default for KernelSettings {
    fn default() -> Self {
        KernelSettings {
            time_step: 0.01,
            displacement_warning: DEFAULT_DISPLACEMENT_WARNING,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Regime { OutOfRange, Normal, Capped, Coincident }

impl Regime {
    /// Decide which branch of the potential applies at distance `dist`.
    #[inline(always)]
    pub fn classify(params: &LjParams, dist: f64) -> Regime {
        // (written so that a NaN distance counts as out of range)
        if !(dist < params.max_range()) {
            return Regime::OutOfRange;
        }
        let r_off = dist - params.offset;
        if r_off <= 0.0 || dist <= 0.0 {
            Regime::Coincident
        } else if r_off > params.cap_radius {
            Regime::Normal
        } else {
            Regime::Capped
        }
    }
}

/// Non-fatal diagnostics about the physical sanity of a pair.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum PairWarning {
    /// The force would move the particles implausibly far in a single step.
    LargeForce { force: f64, dist: f64 },
    /// The particles sit exactly on top of each other.
    Coincident,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PairOutcome {
    pub regime: Regime,
    pub warning: Option<PairWarning>,
}

/// The contribution of one pair: `force` acts on the first particle, `-force` on the second.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PairForce {
    pub force: [f64; 3],
    pub outcome: PairOutcome,
}

/// `48 eps (s/r)^6 ((s/r)^6 - 1/2) (s/r)^2`, i.e. the LJ force magnitude divided by `r`.
#[inline(always)]
pub(crate) fn force_factor(sigma: f64, epsilon: f64, r: f64) -> f64 {
    let frac2 = sqr(sigma / r);
    let frac6 = frac2 * frac2 * frac2;
    48.0 * epsilon * frac6 * (frac6 - 0.5) * frac2
}

/// Magnitude of the uncapped LJ force at `r`. Positive values are repulsive.
#[inline]
pub fn force_magnitude(sigma: f64, epsilon: f64, r: f64) -> f64 {
    force_factor(sigma, epsilon, r) * r
}

/// Uncapped LJ energy `4 eps ((s/r)^12 - (s/r)^6)`.
#[inline]
pub fn uncapped_energy(sigma: f64, epsilon: f64, r: f64) -> f64 {
    let frac2 = sqr(sigma / r);
    let frac6 = frac2 * frac2 * frac2;
    4.0 * epsilon * (frac6 * frac6 - frac6)
}

/// Compute the capped force between two particles without applying it.
///
/// `d` must be `position(p1) - position(p2)` and `dist` its norm; neither is checked.
/// `ids` only appear in log messages.
#[inline]
pub fn pair_force(
    ids: (i32, i32),
    params: &LjParams,
    d: [f64; 3],
    dist: f64,
    settings: &KernelSettings,
) -> PairForce {
    let regime = Regime::classify(params, dist);
    let LjParams { sigma, epsilon, offset, cap_radius, .. } = *params;

    let (force, warning) = match regime {
        Regime::OutOfRange => ([0.0; 3], None),

        Regime::Normal => {
            let r_off = dist - offset;
            let fac = force_factor(sigma, epsilon, r_off) * (r_off / dist);

            let mut warning = None;
            let displacement = fac * dist * 0.5 * sqr(settings.time_step);
            if displacement > settings.displacement_warning {
                warn!(
                    "{}: LJ-Warning: Pair ({}-{}) force={} dist={}",
                    std::process::id(), ids.0, ids.1, fac * dist, dist,
                );
                warning = Some(PairWarning::LargeForce { force: fac * dist, dist });
            }
            (scale(fac, d), warning)
        },

        // d is left unscaled; the ratio cap_radius / dist gives it length cap_radius.
        Regime::Capped => {
            let fac = force_factor(sigma, epsilon, cap_radius) * (cap_radius / dist);
            (scale(fac, d), None)
        },

        Regime::Coincident => {
            warn!(
                "{}: Lennard-Jones warning: Particles id1={} id2={} exactly on top of each other",
                std::process::id(), ids.0, ids.1,
            );
            // Without a cap radius the force is singular here, so nothing is applied.
            let force = match cap_radius > 0.0 {
                true => [force_factor(sigma, epsilon, cap_radius) * cap_radius, 0.0, 0.0],
                false => [0.0; 3],
            };
            (force, Some(PairWarning::Coincident))
        },
    };

    if regime != Regime::OutOfRange {
        trace!(
            "LJ: Pair ({}-{}) dist={:.3}: force+-: ({:.3e},{:.3e},{:.3e})",
            ids.0, ids.1, dist, force[0], force[1], force[2],
        );
    }
    PairForce { force, outcome: PairOutcome { regime, warning } }
}

/// Add the capped LJ force of a pair onto both particles (Newton's third law).
///
/// `d` must be `p1.position - p2.position` and `dist` its norm.
#[inline]
pub fn add_pair_force(
    p1: &mut Particle,
    p2: &mut Particle,
    params: &LjParams,
    d: [f64; 3],
    dist: f64,
    settings: &KernelSettings,
) -> PairOutcome {
    let PairForce { force, outcome } = pair_force((p1.id, p2.id), params, d, dist, settings);
    if outcome.regime != Regime::OutOfRange {
        add_antisymmetric(force, &mut p1.force, &mut p2.force);
    }
    outcome
}

/// Capped LJ pair energy, consistent with the force of [`pair_force`].
///
/// Below the cap radius the force magnitude is constant, so the energy continues
/// linearly from its value at the cap radius.
pub fn pair_energy(params: &LjParams, dist: f64) -> f64 {
    let LjParams { sigma, epsilon, offset, cap_radius, .. } = *params;
    let capped = |r_off: f64| {
        uncapped_energy(sigma, epsilon, cap_radius)
            + force_magnitude(sigma, epsilon, cap_radius) * (cap_radius - r_off)
    };

    match Regime::classify(params, dist) {
        Regime::OutOfRange => 0.0,
        Regime::Normal => uncapped_energy(sigma, epsilon, dist - offset),
        Regime::Capped => capped(dist - offset),
        Regime::Coincident => match cap_radius > 0.0 {
            true => capped(0.0),
            false => 0.0,
        },
    }
}

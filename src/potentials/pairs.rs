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

use crate::lj::{self, KernelSettings, PairForce, PairWarning, Regime};
use crate::table::{ParameterTable, TypeId};
use crate::util::{norm, sub, add_antisymmetric, pair_mut};

use itertools::Itertools;
use rayon_cond::CondIterator;

#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    /// Identifier used in diagnostics.
    pub id: i32,
    pub type_id: TypeId,
    pub position: [f64; 3],
    /// Force accumulator. Pair evaluations only ever add to it.
    pub force: [f64; 3],
}

impl Particle {
    pub fn new(id: i32, type_id: TypeId, position: [f64; 3]) -> Self {
        Particle { id, type_id, position, force: [0.0; 3] }
    }

    pub fn reset_force(&mut self) { self.force = [0.0; 3]; }
}

pub fn reset_forces(particles: &mut [Particle]) {
    particles.iter_mut().for_each(Particle::reset_force);
}

/// A candidate pair, as produced by some neighbor search.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PairInput {
    pub i: usize,
    pub j: usize,
    /// `position(i) - position(j)`
    pub d: [f64; 3],
    /// `|d|`
    pub dist: f64,
}

impl PairInput {
    pub fn from_positions(particles: &[Particle], i: usize, j: usize) -> Self {
        let d = sub(particles[i].position, particles[j].position);
        PairInput { i, j, d, dist: norm(d) }
    }
}

/// Every unordered pair `i < j` whose distance lies within the table's range for their types.
///
/// This is a brute-force O(N^2) search, meant for small systems.
pub fn all_pairs_within(particles: &[Particle], table: &ParameterTable) -> Vec<PairInput> {
    (0..particles.len()).tuple_combinations()
        .map(|(i, j)| PairInput::from_positions(particles, i, j))
        .filter(|pair| {
            let params = table.get(particles[pair.i].type_id, particles[pair.j].type_id);
            pair.dist < params.max_range()
        })
        .collect()
}

/// How many pairs fell into each regime during [`compute_pair_forces`].
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct PairStats {
    pub normal: usize,
    pub capped: usize,
    pub coincident: usize,
    pub out_of_range: usize,
    pub large_force_warnings: usize,
}

impl PairStats {
    fn record(&mut self, out: &PairForce) {
        match out.outcome.regime {
            Regime::Normal => self.normal += 1,
            Regime::Capped => self.capped += 1,
            Regime::Coincident => self.coincident += 1,
            Regime::OutOfRange => self.out_of_range += 1,
        }
        if let Some(PairWarning::LargeForce { .. }) = out.outcome.warning {
            self.large_force_warnings += 1;
        }
    }

    pub fn total(&self) -> usize {
        self.normal + self.capped + self.coincident + self.out_of_range
    }
}

/// Accumulate the capped LJ force of every listed pair onto the particles.
///
/// Pair forces may be evaluated in parallel, but they are always summed into the
/// accumulators in the order of `pairs`, so the result does not depend on `use_rayon`.
pub fn compute_pair_forces(
    particles: &mut [Particle],
    pairs: &[PairInput],
    table: &ParameterTable,
    settings: &KernelSettings,
    use_rayon: bool,
) -> PairStats {
    let forces: Vec<PairForce> = {
        let particles = &*particles;
        CondIterator::new(pairs, use_rayon)
            .map(|pair| {
                let (p1, p2) = (&particles[pair.i], &particles[pair.j]);
                let params = table.get(p1.type_id, p2.type_id);
                lj::pair_force((p1.id, p2.id), params, pair.d, pair.dist, settings)
            })
            .collect()
    };

    let mut stats = PairStats::default();
    for (pair, out) in pairs.iter().zip(&forces) {
        stats.record(out);
        if out.outcome.regime != Regime::OutOfRange {
            let (p1, p2) = pair_mut(particles, pair.i, pair.j);
            add_antisymmetric(out.force, &mut p1.force, &mut p2.force);
        }
    }
    debug!(
        "LJ: {} pairs ({} normal, {} capped, {} coincident, {} out of range)",
        stats.total(), stats.normal, stats.capped, stats.coincident, stats.out_of_range,
    );
    stats
}

/// Total capped LJ energy of the listed pairs.
pub fn total_energy(particles: &[Particle], pairs: &[PairInput], table: &ParameterTable) -> f64 {
    pairs.iter().map(|pair| {
        let params = table.get(particles[pair.i].type_id, particles[pair.j].type_id);
        lj::pair_energy(params, pair.dist)
    }).sum()
}

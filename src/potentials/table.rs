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

use crate::FailResult;
use crate::cap_radius::{self, CapSolution, CapSolverSettings};

use std::fmt;

/// Index of a particle type.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypeId(pub usize);

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { fmt::Display::fmt(&self.0, f) }
}

/// Lennard-Jones parameters for one ordered pair of particle types.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct LjParams {
    /// Length scale.
    pub sigma: f64,
    /// Energy scale.
    pub epsilon: f64,
    /// Interaction range, measured from `offset`.
    pub cutoff: f64,
    /// Radial shift of the potential.
    pub offset: f64,
    /// Derived from the force cap. `0` disables capping.
    pub cap_radius: f64,
}

impl LjParams {
    /// Parameters with capping disabled.
    pub fn new(sigma: f64, epsilon: f64, cutoff: f64, offset: f64) -> Self {
        LjParams { sigma, epsilon, cutoff, offset, cap_radius: 0.0 }
    }

    /// Distance beyond which the pair never interacts.
    pub fn max_range(&self) -> f64 { self.cutoff + self.offset }

    /// Entries that were never set (or were set to zero strength) have no LJ interaction.
    pub fn has_interaction(&self) -> bool {
        self.sigma > 0.0 && self.epsilon != 0.0 && self.cutoff > 0.0
    }
}

/// The largest force magnitude tolerated before a pair switches to capped evaluation.
///
/// Zero disables capping.
#[derive(Debug, Copy, Clone, PartialEq, PartialOrd, Default)]
pub struct ForceCap(f64);

impl ForceCap {
    pub const DISABLED: ForceCap = ForceCap(0.0);

    pub fn new(value: f64) -> FailResult<Self> {
        ensure!(value >= 0.0, "force cap must be a non-negative number (got {})", value);
        Ok(ForceCap(value))
    }

    pub fn value(self) -> f64 { self.0 }

    pub fn is_enabled(self) -> bool { self.0 > 0.0 }
}

/// Interaction parameters for every ordered pair of particle types.
///
/// The table is symmetric: `get(i, j)` and `get(j, i)` always hold the same parameters.
///
/// Mutation requires `&mut self`, so a cap radius update can never race with
/// pair evaluations that borrow the table.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterTable {
    num_types: usize,
    entries: Vec<LjParams>,
    force_cap: ForceCap,
    cap_settings: CapSolverSettings,
}

/// Cap radius solver diagnostics from [`ParameterTable::set_force_cap`].
#[derive(Debug, Clone, PartialEq)]
pub struct CapReport {
    pub force_cap: ForceCap,
    /// One entry per ordered type pair, in row-major order.
    pub entries: Vec<(TypeId, TypeId, CapSolution)>,
}

impl CapReport {
    pub fn all_converged(&self) -> bool {
        self.entries.iter().all(|&(_, _, ref sol)| sol.converged)
    }
}

impl ParameterTable {
    /// A table in which no pair of types interacts.
    pub fn new(num_types: usize) -> Self {
        ParameterTable {
            num_types,
            entries: vec![LjParams::default(); num_types * num_types],
            force_cap: ForceCap::DISABLED,
            cap_settings: CapSolverSettings::default(),
        }
    }

    pub fn num_types(&self) -> usize { self.num_types }

    pub fn type_ids(&self) -> impl ExactSizeIterator<Item=TypeId> { (0..self.num_types).map(TypeId) }

    pub fn force_cap(&self) -> ForceCap { self.force_cap }

    pub fn cap_settings(&self) -> &CapSolverSettings { &self.cap_settings }

    fn index(&self, i: TypeId, j: TypeId) -> usize {
        assert!(
            i.0 < self.num_types && j.0 < self.num_types,
            "type pair ({}, {}) out of range for table with {} types", i, j, self.num_types,
        );
        i.0 * self.num_types + j.0
    }

    /// Look up the parameters of a type pair.
    #[inline]
    pub fn get(&self, i: TypeId, j: TypeId) -> &LjParams {
        &self.entries[self.index(i, j)]
    }

    pub(crate) fn get_mut(&mut self, i: TypeId, j: TypeId) -> &mut LjParams {
        let index = self.index(i, j);
        &mut self.entries[index]
    }

    /// Set the parameters of both `(i, j)` and `(j, i)`.
    ///
    /// The `cap_radius` of the input is ignored; it is derived from the table's
    /// current force cap.
    pub fn set_pair(&mut self, i: TypeId, j: TypeId, params: LjParams) -> CapSolution {
        let solution = cap_radius::solve_cap_radius(&params, self.force_cap, &self.cap_settings);
        let params = LjParams { cap_radius: solution.radius, ..params };
        *self.get_mut(i, j) = params;
        *self.get_mut(j, i) = params;
        solution
    }

    /// The largest interaction range of any pair.
    pub fn max_range(&self) -> f64 {
        self.entries.iter()
            .filter(|p| p.has_interaction())
            .map(|p| p.max_range())
            .fold(0.0, f64::max)
    }

    /// Iterate over all ordered type pairs, including self pairs.
    pub fn iter(&self) -> impl Iterator<Item=(TypeId, TypeId, &LjParams)> + '_ {
        let n = self.num_types;
        self.entries.iter().enumerate().map(move |(k, p)| (TypeId(k / n), TypeId(k % n), p))
    }

    /// Set a new global force cap and re-derive every cap radius.
    ///
    /// All radii are solved before any is written, so the table never holds a
    /// mixture of radii for the old and new cap.
    pub fn set_force_cap(&mut self, force_cap: ForceCap, settings: &CapSolverSettings) -> CapReport {
        let entries = self.iter()
            .map(|(i, j, params)| (i, j, cap_radius::solve_cap_radius(params, force_cap, settings)))
            .collect::<Vec<_>>();

        for &(i, j, ref solution) in &entries {
            if force_cap.is_enabled() {
                debug!(
                    "Ptypes {}-{} have cap_radius {} and cap_force {} (iterations: {})",
                    i, j, solution.radius, solution.force, solution.iterations,
                );
            }
            self.get_mut(i, j).cap_radius = solution.radius;
        }
        self.force_cap = force_cap;
        self.cap_settings = *settings;

        info!(
            "Force cap set to {} ({} of {} type pairs converged)",
            force_cap.value(),
            entries.iter().filter(|&&(_, _, ref s)| s.converged).count(),
            entries.len(),
        );
        CapReport { force_cap, entries }
    }
}

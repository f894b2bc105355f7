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

//! Short-range Lennard-Jones pair forces with force capping.
//!
//! The moving parts, leaves first:
//!
//! * [`ParameterTable`] holds one [`LjParams`] per ordered pair of particle types.
//! * [`cap_radius`] derives each entry's cap radius from a global [`ForceCap`].
//! * [`lj`] evaluates the capped force (and energy) of a single pair.
//! * [`pairs`] runs the pair kernel over a list of interacting pairs.

#[cfg_attr(test, macro_use)] extern crate ljcap_assert_close;
#[macro_use] extern crate failure;
#[macro_use] extern crate log;

pub mod cap_radius;
pub mod lj;
pub mod pairs;
pub mod table;
pub(crate) mod util;
#[cfg(test)] pub(crate) mod numerical;

pub use crate::cap_radius::{CapSolution, CapSolverSettings, solve_cap_radius};
pub use crate::lj::{KernelSettings, PairForce, PairOutcome, PairWarning, Regime};
pub use crate::pairs::{Particle, PairInput, PairStats};
pub use crate::table::{CapReport, ForceCap, LjParams, ParameterTable, TypeId};

pub type FailResult<T> = Result<T, failure::Error>;

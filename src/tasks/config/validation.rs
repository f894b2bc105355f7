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

//! All of the post-processing that occurs after deserialization is written here.

use crate::config::*;
use failure::Error;
use std::collections::HashSet;

impl Settings {
    pub fn validate(mut self) -> Result<ValidatedSettings, Error> {
        fix_version(&mut self.version)?;

        ensure!(self.force_cap >= 0.0, "`force-cap` must be non-negative (got {})", self.force_cap);
        ensure!(self.time_step > 0.0, "`time-step` must be positive (got {})", self.time_step);
        ensure!(
            self.displacement_warning >= 0.0,
            "`displacement-warning` must be non-negative (got {})", self.displacement_warning,
        );
        check_cap_solver(&self.cap_solver)?;
        check_types(&self.types)?;
        check_pairs(&self)?;
        check_particles(&self)?;

        Ok(ValidatedSettings(self))
    }
}

fn fix_version(it: &mut Option<u32>) -> Result<(), Error> {
    match *it {
        Some(x) if x == 0 || x > MAX_VERSION => {
            bail!("`version: {}` is invalid. (1 <= version <= {})", x, MAX_VERSION);
        },
        None => {
            warn!("\
                Settings file has no `version` field! Assuming `version: 1`. \
                (the latest is version {})\
            ", MAX_VERSION);
            *it = Some(1);
        },
        _ => {},
    };

    Ok(())
}

fn check_cap_solver(cap_solver: &CapSolver) -> Result<(), Error> {
    ensure!(
        cap_solver.tolerance > 0.0,
        "`cap-solver.tolerance` must be positive (got {})", cap_solver.tolerance,
    );
    ensure!(cap_solver.max_iterations > 0, "`cap-solver.max-iterations` must be at least 1");
    Ok(())
}

fn check_types(types: &[String]) -> Result<(), Error> {
    let mut seen = HashSet::new();
    for name in types {
        ensure!(seen.insert(name), "type `{}` is defined more than once", name);
    }
    Ok(())
}

fn check_pairs(settings: &Settings) -> Result<(), Error> {
    let mut seen = HashSet::new();
    for pair in &settings.lennard_jones {
        let [a, b] = &pair.types;
        let ids = [a, b].iter().map(|name| {
            settings.type_index(name)
                .ok_or_else(|| format_err!("lennard-jones entry names unknown type `{}`", name))
        }).collect::<Result<Vec<_>, _>>()?;

        let key = (ids[0].min(ids[1]), ids[0].max(ids[1]));
        ensure!(seen.insert(key), "lennard-jones parameters for {}-{} are given more than once", a, b);

        for &(what, value) in &[("sigma", pair.sigma), ("epsilon", pair.epsilon), ("cutoff", pair.cutoff)] {
            ensure!(value >= 0.0, "lennard-jones {}-{}: `{}` must be non-negative (got {})", a, b, what, value);
        }
        ensure!(pair.offset.is_finite(), "lennard-jones {}-{}: `offset` must be finite", a, b);
    }
    Ok(())
}

fn check_particles(settings: &Settings) -> Result<(), Error> {
    let mut seen = HashSet::new();
    for particle in &settings.particles {
        ensure!(
            settings.type_index(&particle.type_name).is_some(),
            "particle {} has unknown type `{}`", particle.id, particle.type_name,
        );
        ensure!(seen.insert(particle.id), "particle id {} is used more than once", particle.id);
    }
    Ok(())
}

/* ********************************************************************** **
**  This file is part of ljcap.                                           **
**                                                                        **
**  ljcap is free software: you can redistribute it and/or modify it      **
**  under the terms of the GNU General Public License as published by the **
**  Free Software Foundation, either version 3 of the License, or (at     **
**  your option) any later version.                                       **
**                                                                        **
**      http://www.gnu.org/licenses/                                      **
**                                                                        **
** Do note that, while the whole of ljcap is licensed under the GPL, many **
** parts of it are licensed under more permissive terms.                  **
** ********************************************************************** */

use crate::FailResult;
use crate::kernel::LjForceKernel;

use ::ljcap_device::{DeviceParticleBuffer, ParticleData, ParticleForce, SimulatedDevice};
use ::ljcap_device::{FIXED_X, FIXED_Y, FIXED_Z};
use ::ljcap_potentials::{CapReport, CapSolverSettings, ForceCap, KernelSettings, LjParams};
use ::ljcap_potentials::{ParameterTable, Particle, TypeId};
use ::ljcap_potentials::pairs;
use ::ljcap_tasks_config::{Settings, Threading, ValidatedSettings};

/// Where forces are evaluated.
#[derive(Serialize)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Backend {
    /// The pair loop, run directly on host particles.
    Host,
    /// Upload, kernel and download through a simulated device.
    Device,
}

#[derive(Serialize)]
#[derive(Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct CapRadiusRow {
    pub types: [String; 2],
    pub cap_radius: f64,
    pub force_at_cap: f64,
    pub iterations: u32,
    pub converged: bool,
}

#[derive(Serialize)]
#[derive(Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct ForceRow {
    pub id: i32,
    pub force: [f64; 3],
}

#[derive(Serialize)]
#[derive(Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct ForcesOutput {
    pub backend: Backend,
    /// Total capped LJ energy, always evaluated on the host.
    pub energy: f64,
    pub forces: Vec<ForceRow>,
}

pub fn cap_solver_settings(settings: &Settings) -> CapSolverSettings {
    CapSolverSettings {
        tolerance: settings.cap_solver.tolerance,
        max_iterations: settings.cap_solver.max_iterations,
    }
}

pub fn kernel_settings(settings: &Settings) -> KernelSettings {
    KernelSettings {
        time_step: settings.time_step,
        displacement_warning: settings.displacement_warning,
    }
}

fn type_id(settings: &Settings, name: &str) -> FailResult<TypeId> {
    settings.type_index(name).map(TypeId).ok_or_else(|| format_err!("unknown type `{}`", name))
}

/// Build the parameter table and solve its cap radii for `force_cap`.
pub fn build_table(settings: &Settings, force_cap: ForceCap) -> FailResult<(ParameterTable, CapReport)> {
    let mut table = ParameterTable::new(settings.types.len());
    for pair in &settings.lennard_jones {
        let i = type_id(settings, &pair.types[0])?;
        let j = type_id(settings, &pair.types[1])?;
        table.set_pair(i, j, LjParams::new(pair.sigma, pair.epsilon, pair.cutoff, pair.offset));
    }
    let report = table.set_force_cap(force_cap, &cap_solver_settings(settings));
    Ok((table, report))
}

pub fn host_particles(settings: &Settings) -> FailResult<Vec<Particle>> {
    settings.particles.iter()
        .map(|spec| Ok(Particle::new(spec.id, type_id(settings, &spec.type_name)?, spec.position)))
        .collect()
}

/// Single-precision device records, in the same order as `host_particles`.
pub fn device_records(settings: &Settings) -> Vec<ParticleData> {
    let to_f32 = |v: [f64; 3]| [v[0] as f32, v[1] as f32, v[2] as f32];

    settings.particles.iter().map(|spec| {
        let fixed = [FIXED_X, FIXED_Y, FIXED_Z].iter().zip(&spec.fixed)
            .filter(|&(_, &is_fixed)| is_fixed)
            .fold(0, |acc, (&bit, _)| acc | bit);

        #[cfg(not(feature = "electrostatics"))] {
            if spec.charge != 0.0 {
                debug!("particle {}: charge is ignored without the electrostatics feature", spec.id);
            }
        }
        #[cfg(not(feature = "electrohydrodynamics"))] {
            if spec.mu_e != [0.0; 3] {
                debug!("particle {}: mu-e is ignored without the electrohydrodynamics feature", spec.id);
            }
        }

        ParticleData {
            p: to_f32(spec.position),
            v: to_f32(spec.velocity),
            #[cfg(feature = "electrohydrodynamics")]
            mu_e: to_f32(spec.mu_e),
            #[cfg(feature = "electrostatics")]
            q: spec.charge as f32,
            fixed,
        }
    }).collect()
}

/// Solve the cap radius of every interacting type pair.
///
/// `force_cap` overrides the value in the settings.
pub fn run_cap_radii(settings: &ValidatedSettings, force_cap: Option<f64>) -> FailResult<Vec<CapRadiusRow>> {
    let ValidatedSettings(settings) = settings;
    let force_cap = ForceCap::new(force_cap.unwrap_or(settings.force_cap))?;
    let (table, report) = build_table(settings, force_cap)?;
    if !report.all_converged() {
        warn!("Some cap radii did not converge; see the `converged` column.");
    }

    Ok(report.entries.iter()
        .filter(|&&(i, j, _)| i <= j && table.get(i, j).has_interaction())
        .map(|&(i, j, ref solution)| CapRadiusRow {
            types: [settings.types[i.0].clone(), settings.types[j.0].clone()],
            cap_radius: solution.radius,
            force_at_cap: solution.force,
            iterations: solution.iterations,
            converged: solution.converged,
        })
        .collect())
}

/// Evaluate the forces on all particles, once.
pub fn run_forces(settings: &ValidatedSettings, backend: Backend) -> FailResult<ForcesOutput> {
    let ValidatedSettings(settings) = settings;
    let (table, _) = build_table(settings, ForceCap::new(settings.force_cap)?)?;
    let kernel_settings = kernel_settings(settings);
    let use_rayon = settings.threading == Threading::Rayon;

    let mut particles = host_particles(settings)?;
    let pairs = pairs::all_pairs_within(&particles, &table);
    let energy = pairs::total_energy(&particles, &pairs, &table);

    let forces = match backend {
        Backend::Host => {
            pairs::reset_forces(&mut particles);
            let stats = pairs::compute_pair_forces(&mut particles, &pairs, &table, &kernel_settings, use_rayon);
            info!("Evaluated {} pairs on the host ({} capped)", stats.total(), stats.capped);
            particles.iter().map(|p| p.force).collect::<Vec<_>>()
        },
        Backend::Device => {
            let forces = run_on_device(settings, table, kernel_settings, &particles, use_rayon)?;
            forces.iter().map(|f| [f.f[0] as f64, f.f[1] as f64, f.f[2] as f64]).collect()
        },
    };

    Ok(ForcesOutput {
        backend,
        energy,
        forces: particles.iter().zip(forces)
            .map(|(p, force)| ForceRow { id: p.id, force })
            .collect(),
    })
}

fn run_on_device(
    settings: &Settings,
    table: ParameterTable,
    kernel_settings: KernelSettings,
    particles: &[Particle],
    use_rayon: bool,
) -> FailResult<Vec<ParticleForce>> {
    let mut buffer = DeviceParticleBuffer::new(SimulatedDevice::new());
    buffer.set_communication_enabled(settings.device.communication_enabled);
    buffer.ensure_capacity(particles.len(), settings.device.seed)?;
    buffer.upload_particles(&device_records(settings))?;

    let mut forces = vec![ParticleForce::default(); particles.len()];
    if !settings.device.communication_enabled {
        warn!("Device communication is disabled; no forces will be computed.");
        buffer.release()?;
        return Ok(forces);
    }

    let mut kernel = LjForceKernel::new(table, kernel_settings, particles, use_rayon);
    buffer.launch(&mut kernel)?;
    buffer.download_forces(&mut forces)?;
    if let Some(stats) = kernel.last_stats() {
        info!("Evaluated {} pairs on the device ({} capped)", stats.total(), stats.capped);
    }

    let transfers = buffer.device().transfer_stats();
    debug!("Device transfers: {} bytes up, {} bytes down", transfers.htod_bytes, transfers.dtoh_bytes);
    buffer.release()?;
    Ok(forces)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::ljcap_tasks_config::YamlRead;

    fn settings(text: &str) -> ValidatedSettings {
        let _ = ::env_logger::try_init();
        YamlRead::from_reader(text.as_bytes()).unwrap()
    }

    const DIMER: &str = "
version: 1
force-cap: 50.0
types: [A, B]
lennard-jones:
  - { types: [A, A], sigma: 1.0, epsilon: 1.0, cutoff: 2.5 }
  - { types: [A, B], sigma: 1.2, epsilon: 0.5, cutoff: 2.5 }
particles:
  - { id: 10, type: A, position: [0.0, 0.0, 0.0], fixed: [false, true, true] }
  - { id: 20, type: A, position: [0.0, 0.0, 0.5] }
";

    #[test]
    fn cap_radius_rows() {
        let rows = run_cap_radii(&settings(DIMER), None).unwrap();
        let types = rows.iter().map(|r| r.types.clone()).collect::<Vec<_>>();
        // B-B does not interact
        assert_eq!(types, vec![
            ["A".to_string(), "A".to_string()],
            ["A".to_string(), "B".to_string()],
        ]);
        for row in &rows {
            assert!(row.converged);
            assert_close!(abs=1e-6, row.force_at_cap, 50.0);
        }

        let rows = run_cap_radii(&settings(DIMER), Some(0.0)).unwrap();
        assert!(rows.iter().all(|r| r.cap_radius == 0.0));
        assert!(run_cap_radii(&settings(DIMER), Some(-1.0)).is_err());
    }

    #[test]
    fn records_carry_fixed_flags() {
        let ValidatedSettings(settings) = settings(DIMER);
        let records = device_records(&settings);
        assert_eq!(records[0].fixed, FIXED_Y | FIXED_Z);
        assert_eq!(records[1].fixed, 0);
        assert_eq!(records[1].p, [0.0, 0.0, 0.5]);
    }

    #[test]
    fn capped_dimer_on_both_backends() {
        let settings = settings(DIMER);
        let host = run_forces(&settings, Backend::Host).unwrap();
        let device = run_forces(&settings, Backend::Device).unwrap();
        assert_eq!(host.energy, device.energy);

        // particle 20 sits above particle 10, inside the cap radius
        assert_close!(rel=1e-6, host.forces[1].force[2], 50.0);
        assert_close!(rel=1e-6, host.forces[0].force[2], -50.0);
        for (h, d) in host.forces.iter().zip(&device.forces) {
            assert_eq!(h.id, d.id);
            assert_close!(rel=1e-5, abs=1e-5, h.force, d.force);
        }
    }

    #[test]
    fn disabled_communication_returns_zero_forces() {
        let text = format!("{}device: {{ communication-enabled: false }}\n", DIMER);
        let out = run_forces(&settings(&text), Backend::Device).unwrap();
        assert!(out.forces.iter().all(|row| row.force == [0.0; 3]));
    }
}

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

use ::ljcap_device::{ErrorCode, Kernel, KernelArgs, SimulatedDevice};
use ::ljcap_potentials::{KernelSettings, PairStats, ParameterTable, Particle, TypeId};
use ::ljcap_potentials::pairs::{all_pairs_within, compute_pair_forces};

/// Capped LJ forces between all pairs of device-resident particles.
///
/// Reads `ParticleData` positions and overwrites every `ParticleForce`.
#[derive(Debug)]
pub struct LjForceKernel {
    table: ParameterTable,
    settings: KernelSettings,
    // per-particle data that the device records don't carry
    ids: Vec<i32>,
    type_ids: Vec<TypeId>,
    use_rayon: bool,
    last_stats: Option<PairStats>,
}

impl LjForceKernel {
    pub fn new(table: ParameterTable, settings: KernelSettings, particles: &[Particle], use_rayon: bool) -> Self {
        LjForceKernel {
            table,
            settings,
            ids: particles.iter().map(|p| p.id).collect(),
            type_ids: particles.iter().map(|p| p.type_id).collect(),
            use_rayon,
            last_stats: None,
        }
    }

    /// Pair statistics of the most recent run.
    pub fn last_stats(&self) -> Option<PairStats> { self.last_stats }
}

impl Kernel<SimulatedDevice> for LjForceKernel {
    fn name(&self) -> &str { "lj_force" }

    fn run(&mut self, device: &mut SimulatedDevice, args: &KernelArgs) {
        if args.vars.number_of_particles as usize != self.ids.len() {
            device.raise(ErrorCode::InvalidValue);
            return;
        }

        let mut particles = match device.view(args.particles) {
            None => return,
            Some(data) => {
                data.iter().zip(self.ids.iter().zip(&self.type_ids))
                    .map(|(data, (&id, &type_id))| {
                        let [x, y, z] = data.p;
                        Particle::new(id, type_id, [x as f64, y as f64, z as f64])
                    })
                    .collect::<Vec<_>>()
            },
        };

        let pairs = all_pairs_within(&particles, &self.table);
        let stats = compute_pair_forces(&mut particles, &pairs, &self.table, &self.settings, self.use_rayon);
        self.last_stats = Some(stats);

        if let Some(forces) = device.view_mut(args.forces) {
            for (out, particle) in forces.iter_mut().zip(&particles) {
                let [x, y, z] = particle.force;
                out.f = [x as f32, y as f32, z as f32];
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::ljcap_device::{DeviceParticleBuffer, ParticleData, ParticleForce};
    use ::ljcap_potentials::{ForceCap, LjParams, CapSolverSettings};

    fn table() -> ParameterTable {
        let mut table = ParameterTable::new(1);
        table.set_pair(TypeId(0), TypeId(0), LjParams::new(1.0, 1.0, 2.5, 0.0));
        table.set_force_cap(ForceCap::new(20.0).unwrap(), &CapSolverSettings::default());
        table
    }

    fn setup(positions: &[[f64; 3]]) -> (Vec<Particle>, Vec<ParticleData>) {
        let particles = positions.iter().enumerate()
            .map(|(i, &pos)| Particle::new(i as i32 + 1, TypeId(0), pos))
            .collect::<Vec<_>>();
        let records = positions.iter()
            .map(|&[x, y, z]| ParticleData { p: [x as f32, y as f32, z as f32], ..Default::default() })
            .collect();
        (particles, records)
    }

    #[test]
    fn matches_host_evaluation() {
        let positions = [[0.0, 0.0, 0.0], [1.1, 0.0, 0.0], [0.5, 0.75, 0.0], [0.25, 0.25, 0.5]];
        let (mut particles, records) = setup(&positions);

        let mut buffer = DeviceParticleBuffer::new(SimulatedDevice::new());
        buffer.ensure_capacity(records.len(), 1).unwrap();
        buffer.upload_particles(&records).unwrap();
        let mut kernel = LjForceKernel::new(table(), Default::default(), &particles, false);
        buffer.launch(&mut kernel).unwrap();
        let mut forces = vec![ParticleForce::default(); records.len()];
        buffer.download_forces(&mut forces).unwrap();

        let table = table();
        let pairs = all_pairs_within(&particles, &table);
        let stats = compute_pair_forces(&mut particles, &pairs, &table, &Default::default(), false);
        assert_eq!(kernel.last_stats(), Some(stats));

        for (device, host) in forces.iter().zip(&particles) {
            let device = [device.f[0] as f64, device.f[1] as f64, device.f[2] as f64];
            assert_close!(rel=1e-4, abs=1e-4, device, host.force);
        }
    }

    #[test]
    fn wrong_particle_count_fails_the_launch() {
        let (particles, records) = setup(&[[0.0; 3], [1.0, 0.0, 0.0]]);
        let mut buffer = DeviceParticleBuffer::new(SimulatedDevice::new());
        buffer.ensure_capacity(records.len(), 1).unwrap();

        let mut kernel = LjForceKernel::new(table(), Default::default(), &particles[..1], false);
        assert!(buffer.launch(&mut kernel).is_err());
        assert_eq!(kernel.last_stats(), None);
    }
}

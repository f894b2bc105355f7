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

use crate::{DeviceError, ErrorKind, FailResult, Location};
use crate::low_level::{DeviceApi, DevicePtr, DeviceSlice, ErrorCode};
use crate::records::{GlobalParticleVars, ParticleData, ParticleForce, ParticleSeed};

use ::std::fmt;
use ::std::mem::size_of;

/// A value that may only be handed to device code.
///
/// There is no way to read the contents on the host; only this crate can unwrap
/// it, and only to build [`KernelArgs`].
pub struct DeviceOnly<T>(T);

impl<T: Copy> DeviceOnly<T> {
    fn kernel_arg(&self) -> T { self.0 }
}

impl<T> fmt::Debug for DeviceOnly<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { write!(f, "DeviceOnly(..)") }
}

/// Device address of the per-particle seeds.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SeedPtr(DeviceSlice<ParticleSeed>);

impl SeedPtr {
    pub fn slice(self) -> DeviceSlice<ParticleSeed> { self.0 }
}

/// Everything a kernel gets to see of the buffer.
#[derive(Debug, Copy, Clone)]
pub struct KernelArgs {
    pub particles: DeviceSlice<ParticleData>,
    pub forces: DeviceSlice<ParticleForce>,
    pub seeds: SeedPtr,
    pub vars: GlobalParticleVars,
}

/// Device code operating on the particle arrays.
pub trait Kernel<D: ?Sized> {
    fn name(&self) -> &str;

    /// Run to completion.
    ///
    /// Like a real kernel, this cannot fail directly; failures must be left pending
    /// on the device, where `launch` will find them.
    fn run(&mut self, device: &mut D, args: &KernelArgs);
}

#[derive(Debug)]
struct Arrays {
    particles: DeviceSlice<ParticleData>,
    forces: DeviceSlice<ParticleForce>,
    seeds: DeviceOnly<SeedPtr>,
}

/// Device-resident particle arrays, and the transfers to and from them.
///
/// The host side sends [`ParticleData`] before a step and receives [`ParticleForce`]
/// after it. Seeds are created on the device and never leave it.
#[derive(Debug)]
pub struct DeviceParticleBuffer<D: DeviceApi> {
    device: D,
    vars: GlobalParticleVars,
    // every live allocation, including those of a partially failed resize
    held: Vec<DevicePtr>,
    arrays: Option<Arrays>,
}

impl<D: DeviceApi> DeviceParticleBuffer<D> {
    pub fn new(device: D) -> Self {
        DeviceParticleBuffer {
            device,
            vars: GlobalParticleVars { seed: 0, number_of_particles: 0, communication_enabled: 1 },
            held: vec![],
            arrays: None,
        }
    }

    pub fn device(&self) -> &D { &self.device }
    pub fn device_mut(&mut self) -> &mut D { &mut self.device }

    pub fn global_vars(&self) -> &GlobalParticleVars { &self.vars }

    pub fn number_of_particles(&self) -> usize { self.vars.number_of_particles as usize }

    pub fn is_allocated(&self) -> bool { self.arrays.is_some() }

    /// When disabled, uploads and downloads do nothing.
    pub fn set_communication_enabled(&mut self, enabled: bool) {
        self.vars.communication_enabled = enabled as u32;
    }

    /// Make room for `n` particles, with seeds derived from `seed`.
    ///
    /// Unless `n` and `seed` are unchanged, all existing arrays are freed before
    /// anything is allocated, forces start out zeroed, and seeds are generated on
    /// the device. `n == 0` leaves nothing allocated.
    pub fn ensure_capacity(&mut self, n: usize, seed: u32) -> FailResult<()> {
        if self.is_allocated() && n == self.number_of_particles() && seed == self.vars.seed {
            return Ok(());
        }
        ensure!(n <= u32::max_value() as usize, "too many particles for the device: {}", n);

        self.release()?;
        self.vars.seed = seed;
        if n == 0 {
            debug!("No particles; device arrays left unallocated");
            return Ok(());
        }

        let particles = self.alloc::<ParticleData>(n)?;
        let forces = self.alloc::<ParticleForce>(n)?;
        let seeds = self.alloc::<ParticleSeed>(n)?;

        safe_mem!(self.device, self.device.memset(forces.ptr(), 0, forces.size_in_bytes()))?;
        safe_mem!(self.device, self.device.init_seeds(seeds.ptr(), n, seed))?;

        self.arrays = Some(Arrays { particles, forces, seeds: DeviceOnly(SeedPtr(seeds)) });
        self.vars.number_of_particles = n as u32;
        debug!("Allocated device arrays for {} particles", n);
        Ok(())
    }

    /// Copy particle state to the device.
    pub fn upload_particles(&mut self, data: &[ParticleData]) -> FailResult<()> {
        let particles = match self.transfer_arrays() {
            Some(arrays) => arrays.particles,
            None => return Ok(()),
        };
        ensure!(
            data.len() == particles.len(),
            "uploading {} particles to a buffer sized for {}", data.len(), particles.len(),
        );
        safe_mem!(self.device, self.device.memcpy_htod(particles.ptr(), bytemuck::cast_slice(data)))?;
        Ok(())
    }

    /// Copy forces back from the device, after waiting for it to finish.
    pub fn download_forces(&mut self, out: &mut [ParticleForce]) -> FailResult<()> {
        let forces = match self.transfer_arrays() {
            Some(arrays) => arrays.forces,
            None => return Ok(()),
        };
        ensure!(
            out.len() == forces.len(),
            "downloading {} forces from a buffer sized for {}", out.len(), forces.len(),
        );
        safe_mem!(self.device, self.device.memcpy_dtoh(bytemuck::cast_slice_mut(out), forces.ptr()))?;
        safe_mem!(self.device, self.device.stream_synchronize())?;
        Ok(())
    }

    /// Zero the device-side forces.
    pub fn clear_forces(&mut self) -> FailResult<()> {
        if let Some(forces) = self.arrays.as_ref().map(|a| a.forces) {
            safe_mem!(self.device, self.device.memset(forces.ptr(), 0, forces.size_in_bytes()))?;
        }
        Ok(())
    }

    /// Run a kernel over the device arrays and check for errors left behind.
    #[track_caller]
    pub fn launch<K: Kernel<D> + ?Sized>(&mut self, kernel: &mut K) -> FailResult<()> {
        let location = Location::from(::std::panic::Location::caller());
        let args = match &self.arrays {
            Some(arrays) => KernelArgs {
                particles: arrays.particles,
                forces: arrays.forces,
                seeds: arrays.seeds.kernel_arg(),
                vars: self.vars,
            },
            None => {
                debug!("Skipping kernel {}: no particles", kernel.name());
                return Ok(());
            },
        };

        api_trace!("launch {}({:?})", kernel.name(), args);
        kernel.run(&mut self.device, &args);

        match self.device.get_last_error() {
            ErrorCode::Success => Ok(()),
            code => {
                let message = format!("{}: {}", kernel.name(), self.device.error_string(code));
                Err(DeviceError::new(ErrorKind::KernelLaunch, code, message, location).into())
            },
        }
    }

    /// Free all device arrays.
    ///
    /// Every array is freed even if some of the calls fail; the first error is returned.
    pub fn release(&mut self) -> FailResult<()> {
        self.arrays = None;
        self.vars.number_of_particles = 0;

        let mut first_error = None;
        for ptr in ::std::mem::replace(&mut self.held, vec![]) {
            if let Err(e) = safe_mem!(self.device, self.device.free(ptr)) {
                if first_error.is_none() {
                    first_error = Some(e);
                } else {
                    error!("{}", e);
                }
            }
        }
        match first_error {
            None => Ok(()),
            Some(e) => Err(e.into()),
        }
    }

    fn alloc<T>(&mut self, n: usize) -> FailResult<DeviceSlice<T>> {
        let mut ptr = DevicePtr::NULL;
        safe_mem!(self.device, self.device.malloc(&mut ptr, n * size_of::<T>()))?;
        self.held.push(ptr);
        Ok(DeviceSlice::from_raw_parts(ptr, n))
    }

    fn transfer_arrays(&self) -> Option<&Arrays> {
        match self.vars.is_communication_enabled() {
            true => self.arrays.as_ref(),
            false => None,
        }
    }
}

impl<D: DeviceApi> Drop for DeviceParticleBuffer<D> {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            error!("Failed to release device particle buffer: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::low_level::simulated::{Op, SimulatedDevice};

    type Buffer = DeviceParticleBuffer<SimulatedDevice>;

    fn particles(n: usize) -> Vec<ParticleData> {
        (0..n).map(|i| ParticleData { p: [i as f32, 0.0, 0.0], ..Default::default() }).collect()
    }

    fn device_error(e: &failure::Error) -> &DeviceError {
        e.downcast_ref::<DeviceError>().expect("not a DeviceError")
    }

    /// Writes `(seed, x, 0)` into each force, so tests can see what the device saw.
    struct Echo;

    impl Kernel<SimulatedDevice> for Echo {
        fn name(&self) -> &str { "echo" }

        fn run(&mut self, device: &mut SimulatedDevice, args: &KernelArgs) {
            let seeds = match device.seeds(args.seeds.slice()) {
                Some(seeds) => seeds.to_vec(),
                None => return,
            };
            let xs = match device.view(args.particles) {
                Some(particles) => particles.iter().map(|p| p.p[0]).collect::<Vec<_>>(),
                None => return,
            };
            if let Some(forces) = device.view_mut(args.forces) {
                for (f, (s, x)) in forces.iter_mut().zip(seeds.iter().zip(xs)) {
                    f.f = [s.seed as f32, x, 0.0];
                }
            }
        }
    }

    /// Reads past the end of the particle array.
    struct Overrun;

    impl Kernel<SimulatedDevice> for Overrun {
        fn name(&self) -> &str { "overrun" }

        fn run(&mut self, device: &mut SimulatedDevice, args: &KernelArgs) {
            let too_long = DeviceSlice::<ParticleData>::from_raw_parts(args.particles.ptr(), args.particles.len() + 1);
            let _ = device.view(too_long);
        }
    }

    #[test]
    fn fresh_forces_are_zero() {
        let mut buf = Buffer::new(SimulatedDevice::new());
        buf.ensure_capacity(4, 7).unwrap();
        buf.upload_particles(&particles(4)).unwrap();

        let mut forces = vec![ParticleForce { f: [9.0; 3] }; 4];
        buf.download_forces(&mut forces).unwrap();
        assert_eq!(forces, vec![ParticleForce::default(); 4]);
    }

    #[test]
    fn upload_leaves_device_forces_alone() {
        let mut buf = Buffer::new(SimulatedDevice::new());
        buf.ensure_capacity(3, 5).unwrap();
        buf.upload_particles(&particles(3)).unwrap();
        buf.launch(&mut Echo).unwrap();

        let mut first = vec![ParticleForce::default(); 3];
        buf.download_forces(&mut first).unwrap();
        assert_ne!(first, vec![ParticleForce::default(); 3]);

        // new positions, but no kernel in between
        let moved = particles(3).into_iter()
            .map(|p| ParticleData { p: [p.p[0] + 10.0, 1.0, 1.0], ..p })
            .collect::<Vec<_>>();
        buf.upload_particles(&moved).unwrap();

        let mut second = vec![ParticleForce { f: [-1.0; 3] }; 3];
        buf.download_forces(&mut second).unwrap();
        assert_eq!(second, first);
    }

    #[test]
    fn kernel_round_trip() {
        let _ = env_logger::try_init();
        let mut buf = Buffer::new(SimulatedDevice::new());
        buf.ensure_capacity(3, 100).unwrap();
        buf.upload_particles(&particles(3)).unwrap();
        buf.launch(&mut Echo).unwrap();

        let mut forces = vec![ParticleForce::default(); 3];
        buf.download_forces(&mut forces).unwrap();
        let expected = vec![
            ParticleForce { f: [100.0, 0.0, 0.0] },
            ParticleForce { f: [101.0, 1.0, 0.0] },
            ParticleForce { f: [102.0, 2.0, 0.0] },
        ];
        assert_eq!(forces, expected);

        // only particles go up, and only forces come back
        let stats = buf.device().transfer_stats();
        assert_eq!(stats.htod_bytes, 3 * size_of::<ParticleData>());
        assert_eq!(stats.dtoh_bytes, 3 * size_of::<ParticleForce>());
        assert_eq!(stats.synchronizations, 1);
    }

    #[test]
    fn resizing_frees_before_allocating() {
        let mut buf = Buffer::new(SimulatedDevice::new());
        buf.ensure_capacity(10, 0).unwrap();
        buf.ensure_capacity(20, 0).unwrap();

        let stats = buf.device().alloc_stats();
        assert_eq!(stats.live, 3);
        assert_eq!(stats.allocations, 6);
        assert_eq!(stats.frees, 3);
        assert_eq!(buf.number_of_particles(), 20);

        // unchanged size and seed is a no-op
        buf.ensure_capacity(20, 0).unwrap();
        assert_eq!(buf.device().alloc_stats().allocations, 6);
        // a new seed is not
        buf.ensure_capacity(20, 1).unwrap();
        assert_eq!(buf.device().alloc_stats().allocations, 9);
        assert_eq!(buf.global_vars().seed, 1);

        buf.release().unwrap();
        assert_eq!(buf.device().alloc_stats().live, 0);
        assert!(!buf.is_allocated());
    }

    #[test]
    fn zero_particles_allocates_nothing() {
        let mut buf = Buffer::new(SimulatedDevice::new());
        buf.ensure_capacity(5, 0).unwrap();
        buf.ensure_capacity(0, 0).unwrap();

        assert!(!buf.is_allocated());
        assert_eq!(buf.device().alloc_stats().live, 0);
        assert_eq!(buf.device().alloc_stats().allocations, 3);

        // transfers and launches quietly do nothing
        buf.upload_particles(&[]).unwrap();
        buf.download_forces(&mut []).unwrap();
        buf.launch(&mut Echo).unwrap();
        assert_eq!(buf.device().transfer_stats(), Default::default());
    }

    #[test]
    fn zero_size_allocation_diagnostic() {
        let mut device = SimulatedDevice::new();
        let mut ptr = DevicePtr::NULL;
        let err = safe_mem!(device, device.malloc(&mut ptr, 0)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Memory);
        assert!(err.maybe_zero_size());
        assert!(err.to_string().contains("You may have tried to allocate zero memory"));
        // the pending error was consumed along with the failure
        assert_eq!(device.get_last_error(), ErrorCode::Success);
    }

    #[test]
    fn failed_allocation_is_fatal_and_leaks_nothing() {
        let mut buf = Buffer::new(SimulatedDevice::new());
        buf.device_mut().inject_failure(Op::Malloc, ErrorCode::MemoryAllocation);
        let err = buf.ensure_capacity(8, 0).unwrap_err();
        assert_eq!(device_error(&err).kind(), ErrorKind::Memory);
        assert_eq!(device_error(&err).code(), ErrorCode::MemoryAllocation);
        assert!(!buf.is_allocated());

        // a later failure after partial success keeps the partial allocations tracked
        buf.ensure_capacity(8, 0).unwrap();
        buf.device_mut().inject_failure(Op::InitSeeds, ErrorCode::LaunchFailure);
        assert!(buf.ensure_capacity(9, 0).is_err());
        assert!(!buf.is_allocated());
        assert_eq!(buf.device().alloc_stats().live, 3);
        buf.release().unwrap();
        assert_eq!(buf.device().alloc_stats().live, 0);
    }

    #[test]
    fn residual_errors_are_caught() {
        let mut buf = Buffer::new(SimulatedDevice::new());
        buf.ensure_capacity(2, 0).unwrap();
        buf.device_mut().inject_residual_error(ErrorCode::LaunchFailure);

        let err = buf.upload_particles(&particles(2)).unwrap_err();
        let err = device_error(&err);
        assert_eq!(err.kind(), ErrorKind::Residual);
        assert_eq!(err.code(), ErrorCode::LaunchFailure);
        assert!(err.to_string().contains("possibly from a failed operation before"));
    }

    #[test]
    fn kernel_failures_are_caught() {
        let mut buf = Buffer::new(SimulatedDevice::new());
        buf.ensure_capacity(2, 0).unwrap();
        let err = buf.launch(&mut Overrun).unwrap_err();
        let err = device_error(&err);
        assert_eq!(err.kind(), ErrorKind::KernelLaunch);
        assert!(err.message().contains("overrun"));
        assert_eq!(err.location().file, file!());
    }

    #[test]
    fn disabled_communication_skips_transfers() {
        let mut buf = Buffer::new(SimulatedDevice::new());
        buf.ensure_capacity(2, 0).unwrap();
        buf.set_communication_enabled(false);

        // not even the length is checked
        buf.upload_particles(&particles(5)).unwrap();
        let mut forces = vec![ParticleForce { f: [1.0; 3] }; 2];
        buf.download_forces(&mut forces).unwrap();
        assert_eq!(forces[0].f, [1.0; 3]);
        assert_eq!(buf.device().transfer_stats(), Default::default());
    }

    #[test]
    fn length_mismatch_is_an_error() {
        let mut buf = Buffer::new(SimulatedDevice::new());
        buf.ensure_capacity(2, 0).unwrap();
        assert!(buf.upload_particles(&particles(3)).is_err());
        assert!(buf.download_forces(&mut vec![ParticleForce::default(); 1]).is_err());
    }
}

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

//! Records with the same layout on the host and on the device.

use bytemuck::{Pod, Zeroable};

/// Bits of [`ParticleData::fixed`].
pub const FIXED_X: u32 = 1 << 0;
pub const FIXED_Y: u32 = 1 << 1;
pub const FIXED_Z: u32 = 1 << 2;

/// Per-particle state sent to the device before each step.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Default, Pod, Zeroable)]
pub struct ParticleData {
    pub p: [f32; 3],
    pub v: [f32; 3],
    /// Coupling to an external field.
    #[cfg(feature = "electrohydrodynamics")]
    pub mu_e: [f32; 3],
    #[cfg(feature = "electrostatics")]
    pub q: f32,
    /// Bitmask of `FIXED_*` flags.
    pub fixed: u32,
}

impl ParticleData {
    pub fn is_fixed(&self, axis: usize) -> bool {
        assert!(axis < 3);
        self.fixed & (1 << axis) != 0
    }
}

/// Force on a particle, written by the device and copied back after each step.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Default, Pod, Zeroable)]
pub struct ParticleForce {
    pub f: [f32; 3],
}

/// Per-particle random number state. Lives only on the device.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Pod, Zeroable)]
pub struct ParticleSeed {
    pub seed: u32,
}

/// Process-wide description of the device particle set.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Pod, Zeroable)]
pub struct GlobalParticleVars {
    /// Base seed from which the per-particle seeds are derived.
    pub seed: u32,
    pub number_of_particles: u32,
    /// Nonzero if per-step transfers take place.
    pub communication_enabled: u32,
}

impl GlobalParticleVars {
    pub fn is_communication_enabled(&self) -> bool { self.communication_enabled != 0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::size_of;

    #[test]
    fn layouts_have_no_padding() {
        let mut expected = 7 * 4;
        if cfg!(feature = "electrohydrodynamics") { expected += 3 * 4; }
        if cfg!(feature = "electrostatics") { expected += 4; }
        assert_eq!(size_of::<ParticleData>(), expected);
        assert_eq!(size_of::<ParticleForce>(), 12);
        assert_eq!(size_of::<ParticleSeed>(), 4);
        assert_eq!(size_of::<GlobalParticleVars>(), 12);
    }

    #[test]
    fn fixed_axes() {
        let data = ParticleData { fixed: FIXED_X | FIXED_Z, ..Default::default() };
        assert!(data.is_fixed(0));
        assert!(!data.is_fixed(1));
        assert!(data.is_fixed(2));
    }
}

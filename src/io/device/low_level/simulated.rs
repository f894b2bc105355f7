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

//! A device backed by host memory.
//!
//! Besides standing in for real hardware, it records statistics about what was
//! asked of it and can be told to fail on demand.

use crate::low_level::{DeviceApi, DevicePtr, DeviceSlice, ErrorCode};
use crate::records::ParticleSeed;

use ::std::collections::{BTreeMap, HashMap};
use ::std::mem::size_of;
use ::bytemuck::Pod;

// Allocations are aligned to this, like on real devices.
const ALIGNMENT: u64 = 256;
const BASE_ADDRESS: u64 = 0x1_0000;

/// Operations of the [`DeviceApi`], for fault injection.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Op {
    Malloc,
    Free,
    MemcpyHtoD,
    MemcpyDtoH,
    Memset,
    InitSeeds,
    Synchronize,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct AllocStats {
    /// Successful calls to `malloc`.
    pub allocations: usize,
    /// Successful calls to `free`.
    pub frees: usize,
    pub live: usize,
    pub live_bytes: usize,
    pub peak_live_bytes: usize,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct TransferStats {
    pub htod_calls: usize,
    pub htod_bytes: usize,
    pub dtoh_calls: usize,
    pub dtoh_bytes: usize,
    pub synchronizations: usize,
}

#[derive(Debug)]
struct Allocation {
    // u64 words so that the memory is suitably aligned for any record type
    words: Vec<u64>,
    len: usize,
}

impl Allocation {
    fn new(len: usize) -> Self {
        let num_words = (len + size_of::<u64>() - 1) / size_of::<u64>();
        Allocation { words: vec![0; num_words], len }
    }

    fn bytes(&self) -> &[u8] { &bytemuck::cast_slice::<u64, u8>(&self.words)[..self.len] }
    fn bytes_mut(&mut self) -> &mut [u8] { &mut bytemuck::cast_slice_mut::<u64, u8>(&mut self.words)[..self.len] }
}

#[derive(Debug)]
pub struct SimulatedDevice {
    allocations: BTreeMap<DevicePtr, Allocation>,
    next_address: u64,
    last_error: ErrorCode,
    injected: HashMap<Op, ErrorCode>,
    alloc_stats: AllocStats,
    transfer_stats: TransferStats,
}

impl Default for SimulatedDevice {
    fn default() -> Self { SimulatedDevice::new() }
}

impl SimulatedDevice {
    pub fn new() -> Self {
        SimulatedDevice {
            allocations: BTreeMap::new(),
            next_address: BASE_ADDRESS,
            last_error: ErrorCode::Success,
            injected: HashMap::new(),
            alloc_stats: AllocStats::default(),
            transfer_stats: TransferStats::default(),
        }
    }

    pub fn alloc_stats(&self) -> AllocStats { self.alloc_stats }

    pub fn transfer_stats(&self) -> TransferStats { self.transfer_stats }

    /// Make the next call of `op` fail with `code`.
    ///
    /// Like a real runtime, the failure is also left pending for `get_last_error`.
    pub fn inject_failure(&mut self, op: Op, code: ErrorCode) {
        assert_ne!(code, ErrorCode::Success);
        self.injected.insert(op, code);
    }

    /// Leave an error pending, as if some earlier asynchronous work had failed.
    pub fn inject_residual_error(&mut self, code: ErrorCode) {
        self.last_error = code;
    }

    /// How kernels report a failure.
    pub fn raise(&mut self, code: ErrorCode) {
        assert_ne!(code, ErrorCode::Success);
        self.last_error = code;
    }

    /// Kernel-side read access to device memory.
    ///
    /// An invalid slice leaves a pending `LaunchFailure` and returns `None`.
    pub fn view<T: Pod>(&mut self, slice: DeviceSlice<T>) -> Option<&[T]> {
        if !self.check_range(slice.ptr(), slice.size_in_bytes()) {
            self.last_error = ErrorCode::LaunchFailure;
            return None;
        }
        let bytes = &self.allocations[&slice.ptr()].bytes()[..slice.size_in_bytes()];
        Some(bytemuck::cast_slice(bytes))
    }

    /// Kernel-side write access to device memory.
    pub fn view_mut<T: Pod>(&mut self, slice: DeviceSlice<T>) -> Option<&mut [T]> {
        if !self.check_range(slice.ptr(), slice.size_in_bytes()) {
            self.last_error = ErrorCode::LaunchFailure;
            return None;
        }
        let alloc = self.allocations.get_mut(&slice.ptr())?;
        Some(bytemuck::cast_slice_mut(&mut alloc.bytes_mut()[..slice.size_in_bytes()]))
    }

    /// Seeds are only visible from the device side.
    pub fn seeds(&mut self, slice: DeviceSlice<ParticleSeed>) -> Option<&[ParticleSeed]> {
        self.view(slice)
    }

    fn check_range(&self, ptr: DevicePtr, bytes: usize) -> bool {
        match self.allocations.get(&ptr) {
            Some(alloc) => bytes <= alloc.len,
            None => false,
        }
    }

    // Status of an injected failure, if one is pending for this op.
    fn take_injected(&mut self, op: Op) -> Option<ErrorCode> {
        let code = self.injected.remove(&op)?;
        self.last_error = code;
        Some(code)
    }

    fn fail(&mut self, code: ErrorCode) -> ErrorCode {
        self.last_error = code;
        code
    }
}

impl DeviceApi for SimulatedDevice {
    fn malloc(&mut self, ptr: &mut DevicePtr, bytes: usize) -> ErrorCode {
        api_trace!("malloc(bytes: {})", bytes);
        if let Some(code) = self.take_injected(Op::Malloc) {
            return code;
        }
        if bytes == 0 {
            return self.fail(ErrorCode::InvalidValue);
        }

        let address = self.next_address;
        let span = (bytes as u64 + ALIGNMENT - 1) / ALIGNMENT * ALIGNMENT;
        self.next_address += span;

        *ptr = DevicePtr(address);
        self.allocations.insert(*ptr, Allocation::new(bytes));

        let stats = &mut self.alloc_stats;
        stats.allocations += 1;
        stats.live += 1;
        stats.live_bytes += bytes;
        stats.peak_live_bytes = stats.peak_live_bytes.max(stats.live_bytes);
        ErrorCode::Success
    }

    fn free(&mut self, ptr: DevicePtr) -> ErrorCode {
        api_trace!("free({})", ptr);
        if let Some(code) = self.take_injected(Op::Free) {
            return code;
        }
        // freeing null is a no-op, as in C
        if ptr.is_null() {
            return ErrorCode::Success;
        }
        match self.allocations.remove(&ptr) {
            None => self.fail(ErrorCode::InvalidDevicePointer),
            Some(alloc) => {
                let stats = &mut self.alloc_stats;
                stats.frees += 1;
                stats.live -= 1;
                stats.live_bytes -= alloc.len;
                ErrorCode::Success
            },
        }
    }

    fn memcpy_htod(&mut self, dst: DevicePtr, src: &[u8]) -> ErrorCode {
        api_trace!("memcpy_htod({}, bytes: {})", dst, src.len());
        if let Some(code) = self.take_injected(Op::MemcpyHtoD) {
            return code;
        }
        if !self.check_range(dst, src.len()) {
            return self.fail(ErrorCode::InvalidValue);
        }
        if let Some(alloc) = self.allocations.get_mut(&dst) {
            alloc.bytes_mut()[..src.len()].copy_from_slice(src);
        }
        self.transfer_stats.htod_calls += 1;
        self.transfer_stats.htod_bytes += src.len();
        ErrorCode::Success
    }

    fn memcpy_dtoh(&mut self, dst: &mut [u8], src: DevicePtr) -> ErrorCode {
        api_trace!("memcpy_dtoh({}, bytes: {})", src, dst.len());
        if let Some(code) = self.take_injected(Op::MemcpyDtoH) {
            return code;
        }
        if !self.check_range(src, dst.len()) {
            return self.fail(ErrorCode::InvalidValue);
        }
        if let Some(alloc) = self.allocations.get(&src) {
            dst.copy_from_slice(&alloc.bytes()[..dst.len()]);
        }
        self.transfer_stats.dtoh_calls += 1;
        self.transfer_stats.dtoh_bytes += dst.len();
        ErrorCode::Success
    }

    fn memset(&mut self, ptr: DevicePtr, value: u8, bytes: usize) -> ErrorCode {
        api_trace!("memset({}, {}, bytes: {})", ptr, value, bytes);
        if let Some(code) = self.take_injected(Op::Memset) {
            return code;
        }
        if !self.check_range(ptr, bytes) {
            return self.fail(ErrorCode::InvalidValue);
        }
        if let Some(alloc) = self.allocations.get_mut(&ptr) {
            for b in &mut alloc.bytes_mut()[..bytes] {
                *b = value;
            }
        }
        ErrorCode::Success
    }

    fn init_seeds(&mut self, seeds: DevicePtr, count: usize, seed: u32) -> ErrorCode {
        api_trace!("init_seeds({}, count: {}, seed: {})", seeds, count, seed);
        if let Some(code) = self.take_injected(Op::InitSeeds) {
            return code;
        }
        match self.view_mut(DeviceSlice::<ParticleSeed>::from_raw_parts(seeds, count)) {
            None => ErrorCode::LaunchFailure,
            Some(out) => {
                for (index, out) in out.iter_mut().enumerate() {
                    out.seed = seed.wrapping_add(index as u32);
                }
                ErrorCode::Success
            },
        }
    }

    fn stream_synchronize(&mut self) -> ErrorCode {
        api_trace!("stream_synchronize()");
        if let Some(code) = self.take_injected(Op::Synchronize) {
            return code;
        }
        self.transfer_stats.synchronizations += 1;
        ErrorCode::Success
    }

    fn get_last_error(&mut self) -> ErrorCode {
        ::std::mem::replace(&mut self.last_error, ErrorCode::Success)
    }

    fn error_string(&self, code: ErrorCode) -> String {
        match code {
            ErrorCode::Success => "no error",
            ErrorCode::InvalidValue => "invalid argument",
            ErrorCode::MemoryAllocation => "out of memory",
            ErrorCode::LaunchFailure => "unspecified launch failure",
            ErrorCode::InvalidDevicePointer => "invalid device pointer",
        }.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::ParticleForce;

    fn alloc(device: &mut SimulatedDevice, bytes: usize) -> DevicePtr {
        let mut ptr = DevicePtr::NULL;
        assert_eq!(device.malloc(&mut ptr, bytes), ErrorCode::Success);
        assert!(!ptr.is_null());
        ptr
    }

    #[test]
    fn zero_byte_malloc_is_invalid() {
        let mut device = SimulatedDevice::new();
        let mut ptr = DevicePtr::NULL;
        assert_eq!(device.malloc(&mut ptr, 0), ErrorCode::InvalidValue);
        assert!(ptr.is_null());
        assert_eq!(device.get_last_error(), ErrorCode::InvalidValue);
        assert_eq!(device.get_last_error(), ErrorCode::Success);
        assert_eq!(device.alloc_stats().allocations, 0);
    }

    #[test]
    fn allocation_bookkeeping() {
        let mut device = SimulatedDevice::new();
        let a = alloc(&mut device, 12);
        let b = alloc(&mut device, 1000);
        assert_ne!(a, b);
        assert_eq!(a.0 % ALIGNMENT, 0);
        assert_eq!(b.0 % ALIGNMENT, 0);
        assert_eq!(device.alloc_stats().live_bytes, 1012);

        assert_eq!(device.free(a), ErrorCode::Success);
        assert_eq!(device.free(a), ErrorCode::InvalidDevicePointer);
        assert_eq!(device.get_last_error(), ErrorCode::InvalidDevicePointer);
        assert_eq!(device.alloc_stats(), AllocStats {
            allocations: 2,
            frees: 1,
            live: 1,
            live_bytes: 1000,
            peak_live_bytes: 1012,
        });
    }

    #[test]
    fn copies_are_bounds_checked() {
        let mut device = SimulatedDevice::new();
        let ptr = alloc(&mut device, 8);
        assert_eq!(device.memcpy_htod(ptr, &[1, 2, 3, 4, 5, 6, 7, 8]), ErrorCode::Success);
        assert_eq!(device.memcpy_htod(ptr, &[0; 9]), ErrorCode::InvalidValue);

        let mut out = [0u8; 4];
        assert_eq!(device.memcpy_dtoh(&mut out, ptr), ErrorCode::Success);
        assert_eq!(out, [1, 2, 3, 4]);
        assert_eq!(device.transfer_stats().htod_calls, 1);
        assert_eq!(device.transfer_stats().dtoh_bytes, 4);
    }

    #[test]
    fn injected_failures_fire_once() {
        let mut device = SimulatedDevice::new();
        device.inject_failure(Op::Malloc, ErrorCode::MemoryAllocation);
        let mut ptr = DevicePtr::NULL;
        assert_eq!(device.malloc(&mut ptr, 16), ErrorCode::MemoryAllocation);
        assert_eq!(device.get_last_error(), ErrorCode::MemoryAllocation);
        alloc(&mut device, 16);
    }

    #[test]
    fn kernel_views() {
        let mut device = SimulatedDevice::new();
        let ptr = alloc(&mut device, 2 * size_of::<ParticleForce>());
        let slice = DeviceSlice::<ParticleForce>::from_raw_parts(ptr, 2);

        device.view_mut(slice).unwrap()[1].f = [1.0, 2.0, 3.0];
        assert_eq!(device.view(slice).unwrap()[1].f, [1.0, 2.0, 3.0]);

        let too_long = DeviceSlice::<ParticleForce>::from_raw_parts(ptr, 3);
        assert!(device.view(too_long).is_none());
        assert_eq!(device.get_last_error(), ErrorCode::LaunchFailure);
    }

    #[test]
    fn seeds_count_up_from_base() {
        let mut device = SimulatedDevice::new();
        let ptr = alloc(&mut device, 4 * size_of::<ParticleSeed>());
        assert_eq!(device.init_seeds(ptr, 4, u32::max_value() - 1), ErrorCode::Success);
        let seeds = device.seeds(DeviceSlice::from_raw_parts(ptr, 4)).unwrap();
        let seeds = seeds.iter().map(|s| s.seed).collect::<Vec<_>>();
        assert_eq!(seeds, vec![u32::max_value() - 1, u32::max_value(), 0, 1]);
    }
}

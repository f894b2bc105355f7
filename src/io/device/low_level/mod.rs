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

use ::std::fmt;
use ::std::marker::PhantomData;

#[macro_use]
mod c_enum_macros;

pub mod simulated;

c_enums!{
    /// Status codes of device runtime calls.
    [pub] enum ErrorCode {
        Success = 0,
        InvalidValue = 1,
        MemoryAllocation = 2,
        LaunchFailure = 4,
        InvalidDevicePointer = 17,
    }
}

/// An address in device memory. Never dereferenced on the host.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DevicePtr(pub u64);

impl DevicePtr {
    pub const NULL: DevicePtr = DevicePtr(0);

    pub fn is_null(self) -> bool { self == DevicePtr::NULL }
}

impl fmt::Display for DevicePtr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { write!(f, "{:#x}", self.0) }
}

/// A typed array in device memory.
#[derive(Debug, PartialEq, Eq)]
pub struct DeviceSlice<T> {
    ptr: DevicePtr,
    len: usize,
    _marker: PhantomData<fn() -> T>,
}

// (manual impls to avoid the `T: Clone` bound of the derive)
impl<T> Clone for DeviceSlice<T> {
    fn clone(&self) -> Self { *self }
}
impl<T> Copy for DeviceSlice<T> {}

impl<T> DeviceSlice<T> {
    pub fn from_raw_parts(ptr: DevicePtr, len: usize) -> Self {
        DeviceSlice { ptr, len, _marker: PhantomData }
    }

    pub fn ptr(&self) -> DevicePtr { self.ptr }
    pub fn len(&self) -> usize { self.len }
    pub fn is_empty(&self) -> bool { self.len == 0 }
    pub fn size_in_bytes(&self) -> usize { self.len * ::std::mem::size_of::<T>() }
}

/// Common interface for the low-level device runtime.
///
/// This deliberately mimics a C runtime API: every call reports an [`ErrorCode`]
/// rather than a `Result`, and failures of asynchronous work (such as kernels) are
/// only observable through [`DeviceApi::get_last_error`]. It is the job of
/// `check_status` (through the `safe_mem!` macro) to turn these into errors.
pub trait DeviceApi {
    /// Allocate `bytes` bytes of device memory, writing the address to `ptr`.
    fn malloc(&mut self, ptr: &mut DevicePtr, bytes: usize) -> ErrorCode;

    fn free(&mut self, ptr: DevicePtr) -> ErrorCode;

    /// Copy host bytes to the start of a device allocation.
    fn memcpy_htod(&mut self, dst: DevicePtr, src: &[u8]) -> ErrorCode;

    /// Copy from the start of a device allocation into host bytes.
    fn memcpy_dtoh(&mut self, dst: &mut [u8], src: DevicePtr) -> ErrorCode;

    fn memset(&mut self, ptr: DevicePtr, value: u8, bytes: usize) -> ErrorCode;

    /// Device-side initialization of per-particle seeds to `seed + index`.
    fn init_seeds(&mut self, seeds: DevicePtr, count: usize, seed: u32) -> ErrorCode;

    /// Wait for all outstanding work on the device.
    fn stream_synchronize(&mut self) -> ErrorCode;

    /// Return the pending error (if any) and reset it to `Success`.
    fn get_last_error(&mut self) -> ErrorCode;

    fn error_string(&self, code: ErrorCode) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_from_int() {
        assert_eq!(ErrorCode::from_int(0).unwrap(), ErrorCode::Success);
        assert_eq!(ErrorCode::from_int(17).unwrap(), ErrorCode::InvalidDevicePointer);
        assert_eq!(ErrorCode::MemoryAllocation.to_int(), 2);
        assert!(ErrorCode::from_int(3).is_err());
    }
}

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
#![deny(unused_must_use)]

//! Staging of particle data between the host and an accelerator.
//!
//! [`DeviceParticleBuffer`] owns the device-resident particle, force and seed arrays.
//! Every memory operation it performs is checked through [`safe_mem!`], which turns any
//! device error into a [`DeviceError`] instead of letting it pass silently.

#[macro_use] extern crate log;
#[macro_use] extern crate failure;

use ::failure::Backtrace;
use ::std::fmt;

pub type FailResult<T> = Result<T, ::failure::Error>;

pub const API_TRACE_TARGET: &'static str = concat!(module_path!(), "::device_api");
pub const API_TRACE_LEVEL: log::Level = log::Level::Trace;

macro_rules! api_trace {
    ($($t:tt)*) => { log!(target: crate::API_TRACE_TARGET, crate::API_TRACE_LEVEL, $($t)*) };
}

/// Location of a device call in the source, for error messages.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Location {
    pub file: &'static str,
    pub line: u32,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

impl From<&'static ::std::panic::Location<'static>> for Location {
    fn from(loc: &'static ::std::panic::Location<'static>) -> Self {
        Location { file: loc.file(), line: loc.line() }
    }
}

#[macro_export]
macro_rules! here {
    () => { $crate::Location { file: file!(), line: line!() } };
}

/// Perform a device memory operation and check its status.
///
/// `safe_mem!(device, device.op(...))` fails if the operation itself failed, or if it
/// succeeded while an error from some earlier operation was still pending.
#[macro_export]
macro_rules! safe_mem {
    ($device:expr, $call:expr) => {{
        let status = $call;
        $crate::check_status(&mut $device, status, $crate::here!())
    }};
}

mod low_level;
mod buffer;
mod records;

pub use crate::low_level::{DeviceApi, DevicePtr, DeviceSlice, ErrorCode};
pub use crate::low_level::simulated::{AllocStats, Op, SimulatedDevice, TransferStats};
pub use crate::buffer::{DeviceOnly, DeviceParticleBuffer, Kernel, KernelArgs, SeedPtr};
pub use crate::records::{GlobalParticleVars, ParticleData, ParticleForce, ParticleSeed};
pub use crate::records::{FIXED_X, FIXED_Y, FIXED_Z};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A memory operation returned an error status.
    Memory,
    /// A memory operation succeeded, but an error was pending from an earlier operation.
    Residual,
    /// An error was pending after a kernel ran.
    KernelLaunch,
}

/// An error reported by the device.
#[derive(Debug, Fail)]
pub struct DeviceError {
    backtrace: Backtrace,
    kind: ErrorKind,
    code: ErrorCode,
    message: String,
    location: Location,
}

impl DeviceError {
    pub(crate) fn new(kind: ErrorKind, code: ErrorCode, message: String, location: Location) -> Self {
        DeviceError { backtrace: Backtrace::new(), kind, code, message, location }
    }

    pub fn kind(&self) -> ErrorKind { self.kind }
    pub fn code(&self) -> ErrorCode { self.code }
    pub fn message(&self) -> &str { &self.message }
    pub fn location(&self) -> Location { self.location }

    /// Zero-byte allocations are the usual source of an `InvalidValue` status.
    pub fn maybe_zero_size(&self) -> bool {
        self.kind == ErrorKind::Memory && self.code == ErrorCode::InvalidValue
    }
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.kind {
            ErrorKind::Memory => {
                write!(f, "Device memory error at {}: {}", self.location, self.message)?;
                if self.maybe_zero_size() {
                    write!(f, "\nYou may have tried to allocate zero memory at {}", self.location)?;
                }
                Ok(())
            },
            ErrorKind::Residual => write!(
                f, "Error found during memory operation at {} (possibly from a failed operation before): {}",
                self.location, self.message,
            ),
            ErrorKind::KernelLaunch => write!(
                f, "Error after kernel launch at {}: {}",
                self.location, self.message,
            ),
        }
    }
}

/// The check behind [`safe_mem!`].
pub fn check_status<D: DeviceApi + ?Sized>(
    device: &mut D,
    status: ErrorCode,
    location: Location,
) -> Result<(), DeviceError> {
    if status != ErrorCode::Success {
        let message = device.error_string(status);
        // consume the sticky error so that it is not reported twice
        let pending = device.get_last_error();
        if pending != ErrorCode::Success && pending != status {
            error!(
                "Device error pending from an earlier operation, found at {}: {}",
                location, device.error_string(pending),
            );
        }
        return Err(DeviceError::new(ErrorKind::Memory, status, message, location));
    }

    match device.get_last_error() {
        ErrorCode::Success => Ok(()),
        residual => {
            let message = device.error_string(residual);
            Err(DeviceError::new(ErrorKind::Residual, residual, message, location))
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_size_hint() {
        let err = DeviceError::new(ErrorKind::Memory, ErrorCode::InvalidValue, "invalid argument".into(), here!());
        assert!(err.maybe_zero_size());
        let msg = err.to_string();
        assert!(msg.contains("You may have tried to allocate zero memory at"), "{}", msg);
        assert!(msg.contains(file!()));

        let err = DeviceError::new(ErrorKind::Memory, ErrorCode::MemoryAllocation, "out of memory".into(), here!());
        assert!(!err.maybe_zero_size());
        assert!(!err.to_string().contains("zero memory"));
    }

    #[test]
    fn check_status_reports_pending_errors() {
        let mut device = SimulatedDevice::new();
        assert!(check_status(&mut device, ErrorCode::Success, here!()).is_ok());

        device.inject_residual_error(ErrorCode::LaunchFailure);
        let err = check_status(&mut device, ErrorCode::Success, here!()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Residual);
        assert_eq!(err.code(), ErrorCode::LaunchFailure);

        // consumed by the first check
        assert!(check_status(&mut device, ErrorCode::Success, here!()).is_ok());
    }

    #[test]
    fn failed_status_wins_over_an_older_pending_error() {
        let _ = env_logger::try_init();
        let mut device = SimulatedDevice::new();
        device.inject_residual_error(ErrorCode::LaunchFailure);

        let err = check_status(&mut device, ErrorCode::MemoryAllocation, here!()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Memory);
        assert_eq!(err.code(), ErrorCode::MemoryAllocation);

        // the older error was logged and cleared, not left to resurface later
        assert_eq!(device.get_last_error(), ErrorCode::Success);
        assert!(check_status(&mut device, ErrorCode::Success, here!()).is_ok());
    }
}

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

#[cfg(test)] #[macro_use] extern crate ljcap_assert_close;
#[macro_use] extern crate serde_derive;
#[macro_use] extern crate failure;
#[macro_use] extern crate log;

pub type FailResult<T> = Result<T, failure::Error>;

#[macro_use]
mod ui;
mod cmd;
mod kernel;

pub mod entry_points;

pub use crate::cmd::{Backend, CapRadiusRow, ForceRow, ForcesOutput};
pub use crate::cmd::{build_table, device_records, host_particles, run_cap_radii, run_forces};
pub use crate::kernel::LjForceKernel;

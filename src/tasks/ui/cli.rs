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

/// Alternative to `clap_app!`. Produces a `clap::Arg`.
///
/// ```text
/// arg!(*config [-c][--config]=CONFIG "settings yaml")   // required, takes a value
/// arg!( force_cap [--force-cap]=FORCE "override")       // optional, takes a value
/// arg!( device [--device] "use the device")              // flag
/// ```
macro_rules! arg {
    //--- options, munched one at a time ---
    (@opts [$b:expr] [-- $first:ident $(- $more:ident)*] $($rest:tt)*)
    => { arg!(@opts [$b.long(concat!(stringify!($first) $(, "-", stringify!($more))*))] $($rest)*) };

    (@opts [$b:expr] [- $short:ident] $($rest:tt)*)
    => { arg!(@opts [$b.short(stringify!($short))] $($rest)*) };

    (@opts [$b:expr] = $VALUE:ident $($rest:tt)*)
    => { arg!(@opts [$b.takes_value(true).value_name(stringify!($VALUE)).number_of_values(1)] $($rest)*) };

    //--- help ---
    (@opts [$b:expr]) => { $b };
    (@opts [$b:expr] $help:expr) => { $b.help($help) };

    //--- start ---
    (* $name:ident $($rest:tt)*)
    => { arg!(@opts [::clap::Arg::with_name(stringify!($name)).required(true)] $($rest)*) };

    ($name:ident $($rest:tt)*)
    => { arg!(@opts [::clap::Arg::with_name(stringify!($name))] $($rest)*) };
}

/// Helpers for reading parsed arguments.
pub(crate) trait ArgMatchesExt {
    /// For arguments marked as required, whose absence clap has already ruled out.
    fn expect_value_of(&self, name: &str) -> FailResult<&str>;

    /// Parse an optional argument.
    fn parsed_value_of<T>(&self, name: &str) -> FailResult<Option<T>>
    where T: ::std::str::FromStr, T::Err: ::std::fmt::Display;
}

impl<'a> ArgMatchesExt for ::clap::ArgMatches<'a> {
    fn expect_value_of(&self, name: &str) -> FailResult<&str> {
        self.value_of(name).ok_or_else(|| format_err!("missing required argument '{}'", name))
    }

    fn parsed_value_of<T>(&self, name: &str) -> FailResult<Option<T>>
    where T: ::std::str::FromStr, T::Err: ::std::fmt::Display,
    {
        match self.value_of(name) {
            None => Ok(None),
            Some(s) => match s.parse() {
                Ok(x) => Ok(Some(x)),
                Err(e) => bail!("invalid value '{}' for --{}: {}", s, name.replace('_', "-"), e),
            },
        }
    }
}

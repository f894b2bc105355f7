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

use ::std::fmt;
use ::std::path::{Path, PathBuf};
use ::log::{Level, LevelFilter};

/// Builder-style setup for logging
#[derive(Debug, Clone, Default)]
pub struct GlobalLogger {
    path: Option<PathBuf>,
    verbosity: Verbosity,
}

impl GlobalLogger {
    /// Also write the log to a file.
    pub fn path<P: AsRef<Path>>(&mut self, path: P) -> &mut Self
    { self.path = Some(path.as_ref().to_owned()); self }

    /// Any integer will be accepted; the level will be truncated
    /// to the most extreme value supported.
    pub fn verbosity(&mut self, level: i32) -> &mut Self
    {
        self.verbosity = match level {
            l if l <= 0 => Verbosity::Default,
            1 => Verbosity::Loud,
            _ => Verbosity::Trace,
        };
        self
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Verbosity { Default, Loud, Trace }

impl Default for Verbosity {
    fn default() -> Self { Verbosity::Default }
}

impl Verbosity {
    fn our_crates(self) -> LevelFilter {
        match self {
            Verbosity::Default => LevelFilter::Info,
            Verbosity::Loud => LevelFilter::Debug,
            Verbosity::Trace => LevelFilter::Trace,
        }
    }

    // per-pair and per-call traces are only shown when asked for explicitly
    fn chatty_targets(self) -> LevelFilter {
        match self {
            Verbosity::Trace => LevelFilter::Trace,
            _ => LevelFilter::Debug,
        }
    }
}

impl GlobalLogger {
    /// Install the logger. Messages go to stderr, keeping stdout for output documents.
    ///
    /// NOTE: Calling this more than once is an error.
    pub fn apply(&mut self) -> FailResult<()>
    {
        use ::std::time::Instant;

        let start = Instant::now();
        let verbosity = self.verbosity;
        let mut fern = ::fern::Dispatch::new();
        fern = fern.format(move |out, message, record| {
                let t = start.elapsed();
                out.finish(format_args!("[{:>4}.{:03}s][{}][{}] {}",
                    t.as_secs(),
                    t.subsec_millis(),
                    record.target(),
                    ColorizedLevel(record.level()),
                    message))
            })
            .level(LevelFilter::Warn)
            .level_for("ljcap_tasks", verbosity.our_crates())
            .level_for("ljcap_tasks_config", verbosity.our_crates())
            .level_for("ljcap_potentials", verbosity.our_crates())
            .level_for("ljcap_device", verbosity.our_crates())
            .level_for("ljcap_potentials::lj", verbosity.chatty_targets().min(verbosity.our_crates()))
            .level_for("ljcap_potentials::cap_radius", verbosity.chatty_targets().min(verbosity.our_crates()))
            .level_for(::ljcap_device::API_TRACE_TARGET, verbosity.chatty_targets().min(verbosity.our_crates()))
            .chain(::std::io::stderr());

        if let Some(path) = self.path.as_ref() {
            fern = fern.chain(::fern::log_file(path)?);
        }

        fern.apply()?;
        Ok(())
    }
}

#[derive(Debug, Copy, Clone)]
pub struct ColorizedLevel(pub Level);

impl fmt::Display for ColorizedLevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let style = match self.0 {
            Level::Error => ::ansi_term::Colour::Red.bold(),
            Level::Warn  => ::ansi_term::Colour::Red.normal(),
            Level::Info  => ::ansi_term::Colour::Cyan.bold(),
            Level::Debug => ::ansi_term::Colour::Yellow.dimmed(),
            Level::Trace => ::ansi_term::Colour::Cyan.normal(),
        };
        write!(f, "{}", style.paint(self.0.to_string()))
    }
}

#[test]
fn verbosity_levels() {
    let mut logger = GlobalLogger::default();
    assert_eq!(logger.verbosity, Verbosity::Default);
    assert_eq!(logger.verbosity(-3).verbosity, Verbosity::Default);
    assert_eq!(logger.verbosity(1).verbosity, Verbosity::Loud);
    assert_eq!(logger.verbosity(9).verbosity, Verbosity::Trace);

    assert_eq!(Verbosity::Loud.chatty_targets(), LevelFilter::Debug);
    assert_eq!(Verbosity::Default.chatty_targets().min(Verbosity::Default.our_crates()), LevelFilter::Info);

    let text = ColorizedLevel(Level::Warn).to_string();
    assert!(text.contains("WARN"));
}

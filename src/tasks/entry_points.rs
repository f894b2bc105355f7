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
use crate::cmd::{self, Backend};
use crate::ui::cli::ArgMatchesExt;
use crate::ui::logging::GlobalLogger;

use ::ljcap_tasks_config::{ValidatedSettings, YamlRead};
use ::std::ffi::OsStr;
use ::std::fs::File;

fn wrap_result_main<F>(main: F)
where F: FnOnce() -> FailResult<()>,
{
    main().unwrap_or_else(|e| {
        for cause in e.iter_chain() {
            error!("{}", cause);
        }

        if ::std::env::var_os("RUST_BACKTRACE") == Some(OsStr::new("1").to_owned()) {
            error!("{}", e.backtrace());
        } else {
            error!("\
                (If you found the above error message to be particularly lacking in \
                detail, try again with RUST_BACKTRACE=1)\
            ");
        }
        ::std::process::exit(1);
    });
}

fn common_args<'a, 'b>(app: ::clap::App<'a, 'b>) -> ::clap::App<'a, 'b> {
    app.args(&[
        arg!(*config [-c][--config]=CONFIG "settings yaml"),
        arg!( verbose [-v][--verbose] "increase log verbosity (may be given twice)").multiple(true),
        arg!( log [--log]=FILE "also write the log to this file"),
    ])
}

fn init_logger(matches: &::clap::ArgMatches<'_>) -> FailResult<()> {
    let mut logger = GlobalLogger::default();
    logger.verbosity(matches.occurrences_of("verbose") as i32);
    if let Some(path) = matches.value_of("log") {
        logger.path(path);
    }
    logger.apply()
}

fn read_settings(matches: &::clap::ArgMatches<'_>) -> FailResult<ValidatedSettings> {
    let path = matches.expect_value_of("config")?;
    let file = File::open(path).map_err(|e| format_err!("could not open '{}': {}", path, e))?;
    let settings = YamlRead::from_reader(file).map_err(|e| format_err!("in '{}': {}", path, e))?;
    Ok(settings)
}

/// Print the cap radius of every interacting type pair.
pub fn cap_radii() {
    wrap_result_main(|| {
        let app = common_args(::clap::App::new("ljcap-cap-radii"))
            .about("Solve for the distance at which each LJ pair force reaches the force cap.")
            .args(&[
                arg!( force_cap [--force-cap]=FORCE "use this force cap instead of the one in the config"),
            ]);
        let matches = app.get_matches();
        init_logger(&matches)?;

        let settings = read_settings(&matches)?;
        let force_cap = matches.parsed_value_of::<f64>("force_cap")?;
        let rows = cmd::run_cap_radii(&settings, force_cap)?;
        print!("{}", ::ljcap_tasks_config::to_yaml_string(&rows)?);
        Ok(())
    });
}

/// Print the capped LJ force on every particle.
pub fn forces() {
    wrap_result_main(|| {
        let app = common_args(::clap::App::new("ljcap-forces"))
            .about("Evaluate capped LJ forces for the particles in a config.")
            .args(&[
                arg!( device [--device] "run the force kernel through the simulated device buffer"),
            ]);
        let matches = app.get_matches();
        init_logger(&matches)?;

        let settings = read_settings(&matches)?;
        let backend = match matches.is_present("device") {
            true => Backend::Device,
            false => Backend::Host,
        };
        let output = cmd::run_forces(&settings, backend)?;
        print!("{}", ::ljcap_tasks_config::to_yaml_string(&output)?);
        Ok(())
    });
}

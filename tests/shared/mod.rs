// Helpers shared by the integration tests.
#![allow(dead_code)]

use ::ljcap_tasks_config::{ValidatedSettings, YamlRead};
use ::std::fs::File;

pub fn init_logger() {
    let _ = ::env_logger::try_init();
}

pub fn read_settings(name: &str) -> ValidatedSettings {
    let path = format!("tests/resources/{}", name);
    let file = File::open(&path).unwrap_or_else(|e| panic!("{}: {}", path, e));
    YamlRead::from_reader(file).unwrap_or_else(|e| panic!("{}: {}", path, e))
}

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

// NOTE: Please make sure to use the YamlRead trait when deserializing these types!

use serde::de;

pub const MAX_VERSION: u32 = 1;

/// Root settings object.
///
/// This is what you should deserialize.
#[derive(Serialize)]
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedSettings(pub Settings);
derive_yaml_read!{ValidatedSettings}

/// Raw deserialized form of settings.
///
/// You shouldn't deserialize this type directly; deserialize `ValidatedSettings` instead,
/// so that additional validation and filling of defaults can be performed.
#[derive(Serialize, Deserialize)]
#[derive(Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct Settings {
    /// Identifies the version of the settings that this file uses.
    ///
    /// If not specified, assumes a value of 1.
    #[serde(default)]
    pub version: Option<u32>,

    #[serde(default)]
    pub threading: Threading,

    /// Integration timestep. Only used for the large force warning.
    #[serde(default = "defaults::time_step")]
    pub time_step: f64,

    /// Largest force magnitude before a pair is evaluated as capped. `0` disables capping.
    #[serde(default)]
    pub force_cap: f64,

    /// Threshold for the large force warning, on `0.5 * force * dist * time_step^2`.
    #[serde(default = "defaults::displacement_warning")]
    pub displacement_warning: f64,

    #[serde(default)]
    pub cap_solver: CapSolver,

    /// Names of the particle types. Their order defines the type ids.
    pub types: Vec<String>,

    /// Interacting type pairs. Pairs not listed here do not interact.
    #[serde(default)]
    pub lennard_jones: Vec<LjPair>,

    #[serde(default)]
    pub device: Device,

    #[serde(default)]
    pub particles: Vec<ParticleSpec>,
}
derive_yaml_read!{Settings}

#[derive(Serialize, Deserialize)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Threading {
    Rayon,
    Serial,
}

#[derive(Serialize, Deserialize)]
#[derive(Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct CapSolver {
    /// Absolute tolerance on the force at the cap radius.
    #[serde(default = "defaults::cap_solver::tolerance")]
    pub tolerance: f64,

    #[serde(default = "defaults::cap_solver::max_iterations")]
    pub max_iterations: u32,
}

#[derive(Serialize, Deserialize)]
#[derive(Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct LjPair {
    pub types: [String; 2],
    pub sigma: f64,
    pub epsilon: f64,
    pub cutoff: f64,
    #[serde(default)]
    pub offset: f64,
}

#[derive(Serialize, Deserialize)]
#[derive(Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct Device {
    /// Disables all per-step transfers when false.
    #[serde(default = "defaults::device::communication_enabled")]
    pub communication_enabled: bool,

    /// Base of the per-particle seeds.
    #[serde(default)]
    pub seed: u32,
}

#[derive(Serialize, Deserialize)]
#[derive(Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct ParticleSpec {
    pub id: i32,
    #[serde(rename = "type")]
    pub type_name: String,
    pub position: [f64; 3],
    #[serde(default)]
    pub velocity: [f64; 3],
    /// Per-axis flags.
    #[serde(default)]
    pub fixed: [bool; 3],
    #[serde(default)]
    pub charge: f64,
    #[serde(default)]
    pub mu_e: [f64; 3],
}

impl Default for Threading {
    fn default() -> Self { Threading::Rayon }
}

impl Default for CapSolver {
    fn default() -> Self { from_empty_mapping().unwrap() }
}

impl Default for Device {
    fn default() -> Self { from_empty_mapping().unwrap() }
}

impl Settings {
    /// Position of a type name in `types`.
    pub fn type_index(&self, name: &str) -> Option<usize> {
        self.types.iter().position(|t| t == name)
    }
}

impl<'de> de::Deserialize<'de> for ValidatedSettings {
    fn deserialize<D: de::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let cereal: Settings = de::Deserialize::deserialize(deserializer)?;

        cereal.validate().map_err(de::Error::custom)
    }
}

fn from_empty_mapping<T: for<'de> ::serde::Deserialize<'de>>() -> ::serde_yaml::Result<T> {
    use ::serde_yaml::{from_value, Value, Mapping};
    from_value(Value::Mapping(Mapping::new()))
}

mod defaults {
    pub(crate) fn time_step() -> f64 { 0.01 }
    pub(crate) fn displacement_warning() -> f64 { 3e-6 }

    pub(crate) mod cap_solver {
        pub(crate) fn tolerance() -> f64 { 1e-6 }
        pub(crate) fn max_iterations() -> u32 { 100_000 }
    }

    pub(crate) mod device {
        pub(crate) fn communication_enabled() -> bool { true }
    }
}

#[test]
fn test_defaults() {
    // NOTE: This simply checks that `from_empty_mapping` can succeed
    //       for each type that uses it.
    let _ = CapSolver::default();
    let _ = Device::default();
    assert_eq!(Threading::default(), Threading::Rayon);
}

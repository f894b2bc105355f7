#[macro_use] extern crate ljcap_assert_close;

use ::ljcap_potentials::{ForceCap, LjParams};
use ::ljcap_potentials::lj::force_magnitude;
use ::ljcap_tasks::{build_table, run_cap_radii};

mod shared;

#[test]
fn every_interacting_pair_reaches_the_cap() {
    shared::init_logger();
    let settings = shared::read_settings("cluster.yaml");
    let rows = run_cap_radii(&settings, None).unwrap();
    assert_eq!(rows.len(), 3);
    for row in &rows {
        assert!(row.converged, "{:?}", row.types);
        assert!(row.cap_radius > 0.0);
        assert_close!(abs=1e-6, row.force_at_cap, 100.0);
    }
}

#[test]
fn higher_cap_means_smaller_radius() {
    shared::init_logger();
    let settings = shared::read_settings("cluster.yaml");
    let low = run_cap_radii(&settings, Some(50.0)).unwrap();
    let high = run_cap_radii(&settings, Some(500.0)).unwrap();
    for (low, high) in low.iter().zip(&high) {
        assert_eq!(low.types, high.types);
        assert!(high.cap_radius < low.cap_radius);
    }
}

#[test]
fn table_radii_match_the_report() {
    shared::init_logger();
    let ::ljcap_tasks_config::ValidatedSettings(settings) = shared::read_settings("cluster.yaml");
    let (table, report) = build_table(&settings, ForceCap::new(100.0).unwrap()).unwrap();
    assert!(report.all_converged());
    for (i, j, params) in table.iter() {
        if !params.has_interaction() {
            continue;
        }
        let LjParams { sigma, epsilon, cap_radius, .. } = *params;
        assert!(cap_radius > 0.0, "{}-{}", i, j);
        assert_close!(abs=1e-6, force_magnitude(sigma, epsilon, cap_radius), 100.0);
    }
}

#[test]
fn negative_cap_is_rejected() {
    shared::init_logger();
    let settings = shared::read_settings("cluster.yaml");
    assert!(run_cap_radii(&settings, Some(-3.0)).is_err());
}

use std::convert::Infallible;

use approx::assert_relative_eq;
use hybrid_core::{Observer, StateRef};
use hybrid_engine::extremum_seeking::{
    self, Config, Plant, Reading, SimulationPlant, Status, seek,
};
use hybrid_models::chemostat::{ChemostatDde, DdeParameters, DdeVar};
use hybrid_observers::ProgressLog;
use hybrid_solvers::integrator::ImplicitEuler;
use integration_tests::{open_store, strictly_increasing};

/// A digester that settles onto its equilibrium within every segment.
struct SettledDigester(ChemostatDde);

impl Plant for SettledDigester {
    type Error = Infallible;

    fn advance(&mut self, d: f64, _t_start: f64, _horizon: f64) -> Result<Reading, Infallible> {
        Ok(Reading {
            q: self.0.equilibrium_flow(d),
            distance: 0.0,
        })
    }
}

#[test]
fn seeking_on_a_settled_digester_finds_the_best_dilution() {
    let digester = ChemostatDde::new(DdeParameters::default(), 0.0);
    let config = Config::default();
    let optimum = digester.optimum(config.d_min, config.d_max).unwrap();
    assert_relative_eq!(optimum.d, 0.2975, epsilon = 1e-3);

    let mut log = ProgressLog::new(500.0).with_label("digester");
    let mut plant = SettledDigester(digester);
    let outcome = seek(&mut plant, &config, |event: &extremum_seeking::Event| {
        log.observe(event)
    })
    .unwrap();

    assert_eq!(outcome.status, Status::Found);
    assert!(outcome.found);
    assert!((outcome.d_max - optimum.d).abs() <= config.eps, "d_max {}", outcome.d_max);
    assert_relative_eq!(outcome.q_max, optimum.q, max_relative = 1e-3);

    // The search keeps the digester running at the optimum until t_final.
    assert_eq!(outcome.segments, 500);
    assert!(outcome.evaluations < outcome.segments);
    assert_eq!(log.reports(), 11);
}

#[test]
fn simulated_digester_records_one_continuous_run() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::default().with_horizon(10.0, 300.0).with_t_print(1.0);

    let digester = ChemostatDde::new(DdeParameters::default(), config.midpoint());
    let initial = digester.initial_state();
    let mut plant = SimulationPlant::new(
        digester.clone(),
        ImplicitEuler::default(),
        open_store(dir.path(), "digester"),
        initial,
        (),
        config.t_print,
    );

    let outcome = seek(&mut plant, &config, ()).unwrap();
    assert_eq!(outcome.segments, 30);
    assert_ne!(outcome.status, Status::StoppedByObserver);

    let store = plant.into_sink();
    assert_eq!(store.runs().len(), 1);
    let dataset = store.load_run(None).unwrap();
    assert_eq!(dataset.columns(), ["t", "s1", "x1", "s2", "x2", "D", "Q"]);
    assert_eq!(dataset.len(), 301);

    let t = dataset.column("t").unwrap();
    assert!(strictly_increasing(&t));
    assert_relative_eq!(t[300], 300.0);

    let d = dataset.column("D").unwrap();
    assert_relative_eq!(d[0], config.midpoint());
    assert!(d.iter().all(|&d| (config.d_min..=config.d_max).contains(&d)));

    // Q is the methane flow of the recorded state.
    for row in dataset.rows().step_by(25) {
        let y = StateRef::<DdeVar>::new(&row[1..5]);
        assert_relative_eq!(row[6], digester.methane_flow(y), max_relative = 1e-12);
        assert!(y[DdeVar::X1] > 0.0 && y[DdeVar::X2] > 0.0);
    }
}

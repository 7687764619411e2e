mod common;

use backtide::prelude::*;
use backtide::strategy::StrategyError;
use common::*;

fn space(fast: Vec<f64>) -> ParameterSpace {
    ParameterSpace::new()
        .with("fast_window", ParameterDomain::Discrete { values: fast })
        .with(
            "slow_window",
            ParameterDomain::Integer {
                min: 30,
                max: 40,
                step: 10,
            },
        )
}

//panics for fast=10, errors for fast=15, otherwise a real sma crossover
fn flaky_factory(params: &ParamSet) -> Result<Box<dyn Strategy>, StrategyError> {
    match params.get("fast_window").copied() {
        Some(fast) if fast == 10.0 => panic!("indicator blew up"),
        Some(fast) if fast == 15.0 => Err(StrategyError::Computation("bad window".to_string())),
        _ => Ok(Box::new(SmaCrossoverStrategy::from_parameters(
            "ES", params, None,
        )?)),
    }
}

fn optimizer(threads: usize, seed: Option<u64>) -> ParameterOptimizer {
    ParameterOptimizer::new(
        OptimizerConfig {
            max_threads: threads,
            seed,
        },
        ScoringWeights::default(),
    )
}

#[test]
fn failing_units_do_not_affect_siblings() {
    init_logging();
    let start = date(2020, 1, 1);
    let feed = InMemoryDataFeed::new(wave_bars("ES", start, 250));
    let config = frictionless_config("ES", start, date(2020, 12, 31));

    let result = optimizer(4, None)
        .grid_search(&flaky_factory, &feed, &config, &space(vec![5.0, 10.0, 15.0, 20.0]))
        .unwrap();

    assert_eq!(result.evaluations.len(), 8);
    assert_eq!(result.successful, 4);
    assert_eq!(result.failed, 4);

    let best = result.best().unwrap();
    assert!(best.is_success());
    assert!([5.0, 20.0].contains(&best.parameters["fast_window"]));

    for failure in result.evaluations.iter().filter(|e| !e.is_success()) {
        assert_eq!(failure.score, f64::NEG_INFINITY);
        let fast = failure.parameters["fast_window"];
        let message = failure.error.as_deref().unwrap();
        if fast == 10.0 {
            assert!(message.contains("indicator blew up"));
        } else {
            assert!(message.contains("bad window"));
        }
    }
    //failures are ranked after every success
    assert!(result.evaluations[..4].iter().all(|e| e.is_success()));
}

#[test]
fn grid_results_match_isolated_runs() {
    init_logging();
    let start = date(2020, 1, 1);
    let feed = InMemoryDataFeed::new(wave_bars("ES", start, 250));
    let config = frictionless_config("ES", start, date(2020, 12, 31));
    let factory = factory_for(StrategyType::SmaCrossover, "ES", None);
    let space = space(vec![5.0, 20.0]);

    let result = optimizer(3, None)
        .grid_search(factory.as_ref(), &feed, &config, &space)
        .unwrap();

    for evaluation in &result.evaluations {
        let mut strategy = factory.create(&evaluation.parameters).unwrap();
        let alone = BacktestEngine::new(config.clone())
            .unwrap()
            .run(strategy.as_mut(), &feed)
            .unwrap();
        assert_eq!(evaluation.summary.as_ref(), Some(&alone.summary));
    }
}

#[test]
fn batch_where_everything_fails_has_no_best() {
    init_logging();
    let start = date(2020, 1, 1);
    let feed = InMemoryDataFeed::new(wave_bars("ES", start, 60));
    let config = frictionless_config("ES", start, date(2020, 12, 31));

    let result = optimizer(2, None)
        .grid_search(&flaky_factory, &feed, &config, &space(vec![10.0, 15.0]))
        .unwrap();

    assert!(result.best().is_none());
    assert!(result.is_total_failure());
    assert_eq!(result.failed, 4);
}

#[test]
fn seeded_random_search_is_reproducible() {
    init_logging();
    let start = date(2020, 1, 1);
    let feed = InMemoryDataFeed::new(wave_bars("ES", start, 200));
    let config = frictionless_config("ES", start, date(2020, 12, 31));
    let factory = factory_for(StrategyType::RsiReversion, "ES", None);
    let space = StrategyType::RsiReversion.default_parameter_space();

    let a = optimizer(1, Some(11))
        .random_search(factory.as_ref(), &feed, &config, &space, 6)
        .unwrap();
    let b = optimizer(1, Some(11))
        .random_search(factory.as_ref(), &feed, &config, &space, 6)
        .unwrap();

    assert_eq!(a.evaluations.len(), 6);
    let params = |r: &OptimizationResult| {
        r.evaluations
            .iter()
            .map(|e| e.parameters.clone())
            .collect::<Vec<_>>()
    };
    assert_eq!(params(&a), params(&b));
}

#[test]
fn empty_space_is_an_error() {
    let start = date(2020, 1, 1);
    let feed = InMemoryDataFeed::default();
    let config = frictionless_config("ES", start, date(2020, 12, 31));

    let err = optimizer(2, None)
        .grid_search(&flaky_factory, &feed, &config, &ParameterSpace::new())
        .unwrap_err();
    assert!(matches!(err, backtide::optimizer::OptimizerError::EmptySpace));
}

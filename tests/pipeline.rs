mod common;

use backtide::prelude::*;
use common::*;

#[test]
fn single_buy_at_constant_price_keeps_equity() {
    init_logging();
    let start = date(2020, 1, 1);
    let bars = (0..5).map(|i| flat_bar("ES", day(start, i), 100.0)).collect();
    let feed = InMemoryDataFeed::new(bars);
    let mut strategy = ScriptedStrategy::new(vec![(0, SignalType::Buy)]);
    let mut engine = BacktestEngine::new(frictionless_config("ES", start, date(2020, 12, 31))).unwrap();

    let result = engine.run(&mut strategy, &feed).unwrap();

    assert_eq!(result.fills.len(), 1);
    assert_eq!(result.fills[0].quantity(), 10);
    assert_eq!(result.fills[0].fill_price(), 100.0);
    assert_eq!(engine.portfolio().cash(), 99_000.0);
    assert_eq!(engine.portfolio().total_value(), 100_000.0);
    assert_eq!(result.summary.final_value, 100_000.0);
    assert_eq!(result.summary.total_return, 0.0);
    assert_eq!(result.stats.bars_processed, 5);
}

#[test]
fn bars_and_fills_follow_feed_order() {
    init_logging();
    let start = date(2021, 3, 1);
    let bars = wave_bars("NQ", start, 60);
    let expected: Vec<_> = bars.iter().map(|b| b.timestamp()).collect();
    let feed = InMemoryDataFeed::new(bars);
    let mut strategy = ScriptedStrategy::new(vec![
        (5, SignalType::Buy),
        (20, SignalType::Close),
        (30, SignalType::Buy),
        (45, SignalType::Close),
    ]);
    let mut engine = BacktestEngine::new(frictionless_config("NQ", start, date(2021, 12, 31))).unwrap();

    let result = engine.run(&mut strategy, &feed).unwrap();

    assert_eq!(strategy.seen, expected);
    let fill_times: Vec<_> = result.fills.iter().map(|f| f.timestamp()).collect();
    assert_eq!(
        fill_times,
        vec![expected[5], expected[20], expected[30], expected[45]]
    );
    assert_eq!(result.equity_curve.len(), 60);
    assert!(result
        .equity_curve
        .windows(2)
        .all(|w| w[0].timestamp < w[1].timestamp));
}

#[test]
fn cash_reconciles_with_fills_under_costs() {
    init_logging();
    let start = date(2020, 1, 1);
    let feed = InMemoryDataFeed::new(wave_bars("ES", start, 120));
    let config = BacktestConfig::new("ES", start, date(2020, 12, 31), 50_000.0);
    let mut strategy = ScriptedStrategy::new(vec![
        (3, SignalType::Buy),
        (40, SignalType::Close),
        (60, SignalType::Buy),
        (90, SignalType::Close),
    ]);
    let mut engine = BacktestEngine::new(config).unwrap();

    let result = engine.run(&mut strategy, &feed).unwrap();
    assert_eq!(result.fills.len(), 4);

    let cash_flow: f64 = result.fills.iter().map(|f| f.cash_delta()).sum();
    let commission: f64 = result.fills.iter().map(|f| f.commission()).sum();
    let cash = engine.portfolio().cash();

    assert!(cash >= 0.0);
    assert!((cash - (50_000.0 + cash_flow)).abs() < 1e-6);
    assert!((result.summary.final_value - cash).abs() < 1e-6);
    assert!((result.summary.total_commission - commission).abs() < 1e-6);
    assert!(commission > 0.0);
    assert!(!engine.portfolio().has_position("ES"));
}

#[test]
fn csv_feed_matches_in_memory_feed() {
    init_logging();
    let start = date(2020, 1, 1);
    let bars = wave_bars("ES", start, 150);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("es.csv");
    write_csv(&path, &bars).unwrap();

    let csv_feed = CsvDataFeed::from_path(&path).unwrap();
    assert_eq!(csv_feed.len(), bars.len());
    let memory_feed = InMemoryDataFeed::new(bars);
    let config = frictionless_config("ES", start, date(2020, 12, 31));

    let mut from_csv = SmaCrossoverStrategy::new("ES", 5, 20).unwrap();
    let a = BacktestEngine::new(config.clone())
        .unwrap()
        .run(&mut from_csv, &csv_feed)
        .unwrap();
    let mut from_memory = SmaCrossoverStrategy::new("ES", 5, 20).unwrap();
    let b = BacktestEngine::new(config)
        .unwrap()
        .run(&mut from_memory, &memory_feed)
        .unwrap();

    assert!(a.summary.total_trades > 0);
    assert_eq!(a.summary, b.summary);
}

#[test]
fn run_configuration_survives_json_round_trip() {
    let start = date(2020, 1, 1);
    let backtest = frictionless_config("ES", start, date(2021, 12, 31)).with_risk_parameter("max_drawdown", 0.3);
    let mut run = RunConfiguration::new(backtest, StrategyType::RsiReversion);
    run.parameters.insert("lookback".to_string(), 10.0);
    run.walk_forward.search = SearchMethod::Random { iterations: 8 };

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.json");
    run.to_json_file(&path).unwrap();
    let loaded = RunConfiguration::from_json_file(&path).unwrap();

    assert_eq!(loaded.strategy, StrategyType::RsiReversion);
    assert_eq!(loaded.parameters.get("lookback"), Some(&10.0));
    assert_eq!(loaded.backtest.risk_parameters.get("max_drawdown"), Some(&0.3));
    assert_eq!(loaded.walk_forward, run.walk_forward);
    assert_eq!(loaded.parameter_space().grid_size(), 48);
}

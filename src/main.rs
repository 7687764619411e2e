use anyhow::{Context, Result};
use backtide::prelude::*;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use env_logger::Env;
use log::info;
use prettytable::{Cell, Row, Table};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "backtide")]
#[command(about = "An event-driven strategy backtesting core", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    //run a single backtest
    Run {
        #[command(flatten)]
        common: CommonArgs,

        //output path for equity curve csv
        #[arg(long)]
        output_equity_csv: Option<PathBuf>,

        //output path for fills csv
        #[arg(long)]
        output_trades_csv: Option<PathBuf>,
    },
    //search the parameter space over the whole date range
    Optimize {
        #[command(flatten)]
        common: CommonArgs,

        //random search with this many samples instead of a full grid
        #[arg(long)]
        random: Option<usize>,

        //seed for random search
        #[arg(long)]
        seed: Option<u64>,

        //worker thread cap for grid search
        #[arg(long)]
        threads: Option<usize>,

        //number of ranked results to print
        #[arg(long, default_value = "10")]
        top: usize,
    },
    //rolling train/test re-optimization
    WalkForward {
        #[command(flatten)]
        common: CommonArgs,

        #[arg(long)]
        training_months: Option<u32>,

        #[arg(long)]
        testing_months: Option<u32>,

        #[arg(long)]
        step_months: Option<u32>,

        //use the run parameters every round instead of optimizing
        #[arg(long)]
        fixed: bool,
    },
}

#[derive(Args)]
struct CommonArgs {
    //path to csv data file
    #[arg(long)]
    data: PathBuf,

    //symbol to trade
    #[arg(long)]
    symbol: Option<String>,

    //strategy type (sma, rsi)
    #[arg(long)]
    strategy: Option<String>,

    //json run configuration
    #[arg(long)]
    config: Option<PathBuf>,

    //strategy parameter override, eg --param fast_window=10
    #[arg(long = "param", value_parser = parse_param)]
    params: Vec<(String, f64)>,

    //first date (defaults to the first bar)
    #[arg(long)]
    start: Option<NaiveDate>,

    //last date (defaults to the last bar)
    #[arg(long)]
    end: Option<NaiveDate>,

    //initial account balance
    #[arg(long)]
    initial_capital: Option<f64>,
}

fn parse_param(s: &str) -> Result<(String, f64), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got '{}'", s))?;
    let value = value
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("invalid value for '{}': {}", name, e))?;
    Ok((name.trim().to_string(), value))
}

//everything a subcommand needs, built once at startup
struct Session {
    run: RunConfiguration,
    feed: CsvDataFeed,
    cache: Arc<CacheManager>,
    factory: Box<dyn StrategyFactory>,
}

impl Session {
    fn open(args: CommonArgs) -> Result<Self> {
        info!("Loading data from {:?}", args.data);
        let feed = CsvDataFeed::from_path(&args.data)
            .with_context(|| format!("Failed to load data from {:?}", args.data))?;
        if feed.is_empty() {
            anyhow::bail!("No bars found in {:?}", args.data);
        }

        let mut run = match &args.config {
            Some(path) => RunConfiguration::from_json_file(path)
                .with_context(|| format!("Failed to read run configuration {:?}", path))?,
            None => default_run_configuration(&args, &feed)?,
        };

        if let Some(name) = &args.strategy {
            run.strategy = StrategyType::parse(name)
                .ok_or_else(|| anyhow::anyhow!("Unknown strategy: {}", name))?;
        }
        if let Some(symbol) = &args.symbol {
            run.backtest.symbol = symbol.clone();
        }
        if let Some(start) = args.start {
            run.backtest.start_date = start;
        }
        if let Some(end) = args.end {
            run.backtest.end_date = end;
        }
        if let Some(capital) = args.initial_capital {
            run.backtest.initial_capital = capital;
        }
        for (name, value) in args.params {
            run.parameters.insert(name, value);
        }
        run.validate().context("Invalid run configuration")?;

        let cache = Arc::new(
            CacheManager::from_configs(&run.cache_regions)
                .context("Failed to build cache regions")?,
        );
        let factory = factory_for(run.strategy, run.backtest.symbol.clone(), cache.indicators());

        println!(
            "Symbol: {}  Strategy: {:?}  Range: {} to {}",
            run.backtest.symbol, run.strategy, run.backtest.start_date, run.backtest.end_date
        );
        println!("Initial capital: ${:.2}\n", run.backtest.initial_capital);

        Ok(Session {
            run,
            feed,
            cache,
            factory,
        })
    }

    fn print_cache_stats(&self) {
        let mut table = Table::new();
        table.add_row(Row::new(vec![
            Cell::new("Region"),
            Cell::new("Hits"),
            Cell::new("Misses"),
            Cell::new("Computations"),
            Cell::new("Evictions"),
            Cell::new("Expirations"),
            Cell::new("Hit Rate"),
        ]));
        for (name, stats) in self.cache.stats() {
            table.add_row(Row::new(vec![
                Cell::new(&name),
                Cell::new(&stats.hits.to_string()),
                Cell::new(&stats.misses.to_string()),
                Cell::new(&stats.computations.to_string()),
                Cell::new(&stats.evictions.to_string()),
                Cell::new(&stats.expirations.to_string()),
                Cell::new(&format!("{:.1}%", stats.hit_rate() * 100.0)),
            ]));
        }
        table.printstd();
    }
}

fn default_run_configuration(args: &CommonArgs, feed: &CsvDataFeed) -> Result<RunConfiguration> {
    let symbol = args
        .symbol
        .clone()
        .ok_or_else(|| anyhow::anyhow!("--symbol is required without --config"))?;
    let strategy_name = args
        .strategy
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("--strategy is required without --config"))?;
    let strategy = StrategyType::parse(strategy_name)
        .ok_or_else(|| anyhow::anyhow!("Unknown strategy: {}", strategy_name))?;
    let (first, last) = feed
        .date_range()
        .ok_or_else(|| anyhow::anyhow!("Data file has no bars"))?;

    let backtest = BacktestConfig::new(symbol, first, last, 100_000.0);
    Ok(RunConfiguration::new(backtest, strategy))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    println!("Backtide Backtesting Engine");
    println!("===========================\n");

    match cli.command {
        Commands::Run {
            common,
            output_equity_csv,
            output_trades_csv,
        } => run_backtest(Session::open(common)?, output_equity_csv, output_trades_csv),
        Commands::Optimize {
            common,
            random,
            seed,
            threads,
            top,
        } => {
            let mut session = Session::open(common)?;
            if let Some(seed) = seed {
                session.run.optimizer.seed = Some(seed);
            }
            if let Some(threads) = threads {
                session.run.optimizer.max_threads = threads.max(1);
            }
            let method = match random {
                Some(iterations) => SearchMethod::Random { iterations },
                None => SearchMethod::Grid,
            };
            run_optimization(session, method, top)
        }
        Commands::WalkForward {
            common,
            training_months,
            testing_months,
            step_months,
            fixed,
        } => {
            let mut session = Session::open(common)?;
            let wf = &mut session.run.walk_forward;
            if let Some(months) = training_months {
                wf.training_months = months;
            }
            if let Some(months) = testing_months {
                wf.testing_months = months;
            }
            if let Some(months) = step_months {
                wf.rolling_step_months = months;
            }
            if fixed {
                wf.optimize = false;
                wf.fixed_parameters = session.run.parameters.clone();
            }
            run_walk_forward(session)
        }
    }
}

fn run_backtest(
    session: Session,
    output_equity_csv: Option<PathBuf>,
    output_trades_csv: Option<PathBuf>,
) -> Result<()> {
    let mut strategy = session
        .factory
        .create(&session.run.parameters)
        .context("Failed to build strategy")?;
    println!("Strategy parameters: {:?}\n", strategy.parameters());

    let mut engine = BacktestEngine::new(session.run.backtest.clone())?;
    let result = engine
        .run(strategy.as_mut(), &session.feed)
        .context("Backtest failed")?;

    println!("Backtest Results");
    println!("================\n");
    result.summary.pretty_print_table();

    let stats = result.stats;
    println!(
        "\nBars: {} processed, {} rejected, {} flagged | Signals: {} generated, {} rejected | Orders: {} submitted, {} unfilled | Fills: {}",
        stats.bars_processed,
        stats.bars_rejected,
        stats.bars_flagged,
        stats.signals_generated,
        stats.signals_rejected,
        stats.orders_submitted,
        stats.orders_unfilled,
        stats.fills
    );
    session.print_cache_stats();

    if let Some(equity_path) = output_equity_csv {
        save_equity_csv(&result.equity_curve, &equity_path)?;
        println!("\nEquity curve saved to {:?}", equity_path);
    }

    if let Some(trades_path) = output_trades_csv {
        save_trades_csv(&result.fills, &trades_path)?;
        println!("Fills saved to {:?}", trades_path);
    }

    Ok(())
}

fn run_optimization(session: Session, method: SearchMethod, top: usize) -> Result<()> {
    let space = session.run.parameter_space();
    let optimizer =
        ParameterOptimizer::new(session.run.optimizer.clone(), session.run.scoring.clone());

    let result = optimizer
        .optimize(
            method,
            session.factory.as_ref(),
            &session.feed,
            &session.run.backtest,
            &space,
        )
        .context("Optimization failed")?;

    println!("Optimization Results");
    println!("====================\n");
    result.pretty_print_table(top);
    println!(
        "\n{} evaluations: {} succeeded, {} failed",
        result.evaluations.len(),
        result.successful,
        result.failed
    );
    session.print_cache_stats();

    match result.best() {
        Some(best) => {
            println!("\nBest parameters: {:?} (score {:.4})", best.parameters, best.score);
            Ok(())
        }
        None => anyhow::bail!("Every parameter combination failed"),
    }
}

fn run_walk_forward(session: Session) -> Result<()> {
    let space = session.run.parameter_space();
    let optimizer =
        ParameterOptimizer::new(session.run.optimizer.clone(), session.run.scoring.clone());
    let analyzer = WalkForwardAnalyzer::new(session.run.walk_forward.clone(), optimizer);

    let result = analyzer
        .analyze(
            session.factory.as_ref(),
            &session.feed,
            &session.run.backtest,
            &space,
        )
        .context("Walk-forward analysis failed")?;

    println!("Walk-Forward Results");
    println!("====================\n");
    result.pretty_print_table();

    if result.is_total_failure() {
        anyhow::bail!("Every walk-forward round failed");
    }
    Ok(())
}

fn save_equity_csv(equity_curve: &[EquityPoint], path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {:?}", path))?;
    for point in equity_curve {
        writer.serialize(point)?;
    }
    writer.flush()?;
    Ok(())
}

fn save_trades_csv(fills: &[FillEvent], path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {:?}", path))?;
    writer.write_record([
        "execution_id",
        "order_id",
        "timestamp",
        "symbol",
        "direction",
        "quantity",
        "fill_price",
        "commission",
        "realized_pnl",
    ])?;

    for fill in fills {
        writer.write_record([
            fill.execution_id().to_string(),
            fill.order_id().to_string(),
            fill.timestamp().to_rfc3339(),
            fill.symbol().to_string(),
            format!("{:?}", fill.direction()),
            fill.quantity().to_string(),
            fill.fill_price().to_string(),
            fill.commission().to_string(),
            fill.realized_pnl().to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

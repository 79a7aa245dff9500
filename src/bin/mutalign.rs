//! mutalign CLI — run a toy search over a mutable alignment
//!
//! Commands:
//!   mutalign demo   — Metropolis search with journaled rollback
//!   mutalign trace  — same search, printing a tab-separated trace
//!   mutalign state  — print the demo alignment as a state node
//!   mutalign save   — run the search and save the final alignment
//!   mutalign show   — load a saved alignment and print it

use mutalign_core::alignment::text::{to_state_node, to_text};
use mutalign_core::datatype::Nucleotide;
use mutalign_core::trace::{CellTrace, SequenceTrace, TraceLogger};
use mutalign_core::{
    AdapterConfig, AlignmentError, AlignmentStore, SearchState, StarTreeEngine, VersionedMatrix,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::env;
use std::io;
use std::sync::Arc;

const DEMO_SEQUENCES: [(&str, &str); 6] = [
    ("human", "AGAAATATGTCTGATAAAAGAGTTACTTTGATAGAGTAAATAATAGGAGC"),
    ("chimp", "AGAAATATGTCTGATAAAAGAATTACTTTGATAGAGTAAATAATAGGAGT"),
    ("bonobo", "AGAAATATGTCTGATAAAAGAATTACTTTGATAGAGTAAATAATAGGAGT"),
    ("gorilla", "AGAAATATGTCTGATAAAAGAGTTACTTTGATAGAGTAAATAATAGAGGT"),
    ("orangutan", "AGAAATATGTCTGACAAAAGAGTTACTTTGATAGAGTAAAAAATAGAGGT"),
    ("siamang", "AGAAATACGTCTGACGAAAGAGTTACTTTGATAGAGTAAATAACAGGGGT"),
];

fn print_usage() {
    println!(
        r#"
mutalign — versioned alignment search

Usage: mutalign <command> [options]

Commands:
  demo   [iterations] [discrete|partials] [seed]   Run a Metropolis search
  trace  [iterations] [sequence|cells]             Print a tab-separated trace
  state                                            Print the demo alignment state node
  save   <path> [iterations]                       Run a search and save the result
  show   <path>                                    Print a saved alignment

Examples:
  mutalign demo 500 partials 7
  mutalign trace 100 cells
  mutalign save run.json 1000
"#
    );
}

/// Search settings, overridable by positional arguments
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SearchConfig {
    iterations: u64,
    seed: u64,
    branch_length: f64,
    /// Probability of a single-cell proposal
    cell_weight: f64,
    /// Probability of a whole-column proposal; rows take the rest
    column_weight: f64,
    trace_every: u64,
    adapter: AdapterConfig,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            iterations: 200,
            seed: 42,
            branch_length: 0.1,
            cell_weight: 0.7,
            column_weight: 0.2,
            trace_every: 10,
            adapter: AdapterConfig::default(),
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage();
        return;
    }

    let result = match args[1].as_str() {
        "demo" => cmd_demo(&args[2..]),
        "trace" => cmd_trace(&args[2..]),
        "state" => cmd_state(),
        "save" => cmd_save(&args[2..]),
        "show" => cmd_show(&args[2..]),
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}", other);
            print_usage();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("  Error: {}", e);
        std::process::exit(1);
    }
}

fn demo_matrix() -> Result<VersionedMatrix, AlignmentError> {
    Ok(VersionedMatrix::from_sequences(Arc::new(Nucleotide), &DEMO_SEQUENCES)?.with_id("alignment"))
}

fn build_state(config: &SearchConfig) -> Result<SearchState<StarTreeEngine>, AlignmentError> {
    let matrix = demo_matrix()?;
    let engine = StarTreeEngine::new(matrix.taxa(), 4, matrix.site_count(), config.branch_length);
    SearchState::new(matrix, engine, config.adapter.clone())
}

/// Apply one random edit through the journaled write calls
fn propose(rng: &mut StdRng, config: &SearchConfig, matrix: &mut VersionedMatrix) -> Result<(), AlignmentError> {
    let states = matrix.data_type().state_count() as u32;
    let sites = matrix.site_count();
    let units = matrix.unit_count();
    let pick: f64 = rng.gen();

    if pick < config.cell_weight {
        let site = rng.gen_range(0..sites);
        let unit = rng.gen_range(0..units);
        matrix.write_cell(site, unit, rng.gen_range(0..states))
    } else if pick < config.cell_weight + config.column_weight {
        // resample a handful of sites, keep the rest of the column
        let unit = rng.gen_range(0..units);
        let mut column = matrix.column(unit)?;
        for _ in 0..3 {
            column[rng.gen_range(0..sites)] = rng.gen_range(0..states);
        }
        matrix.write_column(unit, &column)
    } else {
        let site = rng.gen_range(0..sites);
        let code = rng.gen_range(0..states);
        matrix.write_row(site, &vec![code; units])
    }
}

/// Metropolis search; calls `on_sample` every `trace_every` iterations
fn run_search(
    state: &mut SearchState<StarTreeEngine>,
    config: &SearchConfig,
    mut on_sample: impl FnMut(u64, &VersionedMatrix) -> io::Result<()>,
) -> Result<f64, AlignmentError> {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut current = state.log_likelihood()?;
    on_sample(0, state.matrix())?;

    for i in 1..=config.iterations {
        state.store();
        propose(&mut rng, config, state.matrix_mut())?;
        let proposed = state.log_likelihood()?;
        if rng.gen::<f64>().ln() < proposed - current {
            state.accept()?;
            current = proposed;
        } else {
            state.reject()?;
        }
        if i % config.trace_every.max(1) == 0 {
            on_sample(i, state.matrix())?;
        }
    }
    Ok(current)
}

fn parse_or<T: std::str::FromStr>(arg: Option<&String>, default: T) -> T {
    arg.and_then(|s| s.parse().ok()).unwrap_or(default)
}

fn cmd_demo(args: &[String]) -> Result<(), AlignmentError> {
    let mut config = SearchConfig::default();
    config.iterations = parse_or(args.first(), config.iterations);
    if let Some(encoding) = args.get(1) {
        config.adapter = match encoding.as_str() {
            "discrete" => AdapterConfig::discrete(),
            _ => AdapterConfig::partials(),
        };
    }
    config.seed = parse_or(args.get(2), config.seed);

    println!("\n  Config: {}", serde_json::to_string(&config)?);
    let mut state = build_state(&config)?;
    println!("  {}", state.matrix().summary());
    let initial = state.log_likelihood()?;
    println!("  Initial log likelihood: {:.6}", initial);

    let last = run_search(&mut state, &config, |_, _| Ok(()))?;

    let stats = state.stats();
    let sync = state.adapter().stats();
    println!("  Final log likelihood:   {:.6}", last);
    println!(
        "  Proposals: {} | accepted: {} | rejected: {} | acceptance: {:.1}%",
        stats.proposals,
        stats.accepted,
        stats.rejected,
        stats.acceptance_rate() * 100.0
    );
    println!(
        "  Leaf pushes: {} over {} syncs | leaf recomputations: {} (full recompute would be {})",
        sync.leaves_pushed,
        sync.syncs,
        state.engine().leaf_recomputations(),
        (stats.proposals * 2 + 1) * state.matrix().unit_count() as u64
    );
    println!("\n{}", to_text(state.matrix()));
    Ok(())
}

fn cmd_trace(args: &[String]) -> Result<(), AlignmentError> {
    let mut config = SearchConfig::default();
    config.iterations = parse_or(args.first(), config.iterations);
    let logger: Box<dyn TraceLogger> = match args.get(1).map(|s| s.as_str()) {
        Some("cells") => Box::new(CellTrace),
        _ => Box::new(SequenceTrace),
    };

    let mut state = build_state(&config)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    logger.header(state.matrix(), &mut out)?;
    run_search(&mut state, &config, |i, m| logger.sample(i, m, &mut out))?;
    Ok(())
}

fn cmd_state() -> Result<(), AlignmentError> {
    print!("{}", to_state_node(&demo_matrix()?));
    Ok(())
}

fn cmd_save(args: &[String]) -> Result<(), AlignmentError> {
    let Some(path) = args.first() else {
        eprintln!("Usage: mutalign save <path> [iterations]");
        return Ok(());
    };
    let mut config = SearchConfig::default();
    config.iterations = parse_or(args.get(1), config.iterations);

    let mut state = build_state(&config)?;
    let last = run_search(&mut state, &config, |_, _| Ok(()))?;
    let snapshot = AlignmentStore::new(path).save(state.matrix())?;
    println!("  Saved '{}' (log likelihood {:.6}, fingerprint {})", snapshot.id, last, &snapshot.fingerprint[..16]);
    Ok(())
}

fn cmd_show(args: &[String]) -> Result<(), AlignmentError> {
    let Some(path) = args.first() else {
        eprintln!("Usage: mutalign show <path>");
        return Ok(());
    };
    let matrix = AlignmentStore::new(path).load()?;
    println!("  {}", matrix.summary());

    let engine = StarTreeEngine::new(matrix.taxa(), 4, matrix.site_count(), SearchConfig::default().branch_length);
    let mut state = SearchState::new(matrix, engine, AdapterConfig::default())?;
    let log_likelihood = state.log_likelihood()?;
    let (matrix, engine) = state.into_parts();
    println!(
        "  Log likelihood: {:.6} (unweighted {:.6})",
        log_likelihood,
        engine.total_log_likelihood()
    );
    let demo = demo_matrix()?;
    if demo.taxa() == matrix.taxa() && demo.site_count() == matrix.site_count() {
        let differing = matrix.grid().zip_map(demo.grid(), |a, b| (a != b) as usize).sum();
        println!("  Cells differing from the demo alignment: {}", differing);
    }
    println!("\n{}", to_text(&matrix));
    Ok(())
}

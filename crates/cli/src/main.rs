//! Cycle-accurate out-of-order core simulator CLI.
//!
//! Accepts host options before the target program, assembles the simulator
//! configuration (optional JSON config file layered under flag overrides),
//! runs the program to completion, prints the measurement report, and exits
//! with the target program's own exit code.

use clap::Parser;
use std::process;

use cprsim_core::config::{DisambigModel, SimConfig};
use cprsim_core::Simulator;

#[derive(Parser, Debug)]
#[command(
    name = "cprsim",
    version,
    about = "Cycle-accurate, speculative, out-of-order superscalar core simulator",
    long_about = "usage: cprsim [host options] <target program> [target options]\n\nThe core is checkpoint-based: up to 64 in-flight checkpoints bound the\nsquash mask to one machine word."
)]
struct Cli {
    /// Base configuration file (JSON), layered under flag overrides.
    #[arg(short = 'c', value_name = "file")]
    config: Option<String>,

    /// Interactive debug mode (accepted; sets verbose logging).
    #[arg(short = 'd')]
    debug: bool,

    /// End simulation after <n> committed instructions.
    #[arg(short = 'e', value_name = "n")]
    stop_after: Option<u64>,

    /// Track a histogram of retired PCs.
    #[arg(short = 'g')]
    histogram: bool,

    /// Enable stage logging after <n> commits.
    #[arg(short = 'l', value_name = "n")]
    log_after: Option<u64>,

    /// Provide <n> MB of target memory.
    #[arg(short = 'm', value_name = "n")]
    memory_mb: Option<u64>,

    /// Simulate <n> processors (only 1 is supported).
    #[arg(short = 'p', value_name = "n")]
    processors: Option<u64>,

    /// Fast-skip <n> instructions before timing simulation.
    #[arg(short = 's', value_name = "n")]
    fast_skip: Option<u64>,

    /// Oracle switches: <bp>,<dc>,<ic>,<tc>, each 0 or 1.
    #[arg(long = "perf", value_name = "bp,dc,ic,tc")]
    perf: Option<String>,

    /// Checkpoints for mispredict recovery (1..=64).
    #[arg(long = "cp", value_name = "n")]
    checkpoints: Option<u64>,

    /// Branch queue entries (all branches between fetch and retire).
    #[arg(long = "bq", value_name = "n")]
    bq: Option<u64>,

    /// BTB total entries.
    #[arg(long = "btbentries", value_name = "n")]
    btb_entries: Option<u64>,

    /// BTB set-associativity.
    #[arg(long = "btbassoc", value_name = "n")]
    btb_assoc: Option<u64>,

    /// RAS entries.
    #[arg(long = "ras", value_name = "n")]
    ras: Option<u64>,

    /// Maximum conditional branches predicted per cycle.
    #[arg(long = "mbp", value_name = "m")]
    mbp: Option<u64>,

    /// Conditional predictor: PC index bits.
    #[arg(long = "cbpPC", value_name = "n")]
    cbp_pc: Option<u64>,

    /// Conditional predictor: BHR bits.
    #[arg(long = "cbpBHR", value_name = "n")]
    cbp_bhr: Option<u64>,

    /// Indirect predictor: PC index bits.
    #[arg(long = "ibpPC", value_name = "n")]
    ibp_pc: Option<u64>,

    /// Indirect predictor: BHR bits.
    #[arg(long = "ibpBHR", value_name = "n")]
    ibp_bhr: Option<u64>,

    /// Enable the trace cache.
    #[arg(short = 't')]
    trace_cache: bool,

    /// Fetch queue entries.
    #[arg(long = "fq", value_name = "n")]
    fq: Option<u64>,

    /// Active window entries.
    #[arg(long = "al", value_name = "n")]
    active: Option<u64>,

    /// Physical register file size.
    #[arg(long = "prf", value_name = "n")]
    prf: Option<u64>,

    /// Issue queue entries.
    #[arg(long = "iq", value_name = "n")]
    iq: Option<u64>,

    /// Issue queue partitions for rotated priority.
    #[arg(long = "iqnp", value_name = "n")]
    iqnp: Option<u64>,

    /// Load and store queue entries (each).
    #[arg(long = "lsq", value_name = "n")]
    lsq: Option<u64>,

    /// Fetch width.
    #[arg(long = "fw", value_name = "n")]
    fw: Option<u64>,

    /// Dispatch width.
    #[arg(long = "dw", value_name = "n")]
    dw: Option<u64>,

    /// Issue width (execution lanes).
    #[arg(long = "iw", value_name = "n")]
    iw: Option<u64>,

    /// Retire width.
    #[arg(long = "rw", value_name = "n")]
    rw: Option<u64>,

    /// Pre-steer instructions to lanes at dispatch.
    #[arg(short = 'a')]
    presteer: bool,

    /// Age-based issue selection (default is position-based).
    #[arg(short = 'b')]
    age_based: bool,

    /// Disambiguation: <model>,<ctr_max>. Models: 0 always-conflict,
    /// 1 never, 2 MDP-sticky, 3 MDP-ctr, 4 oracle.
    #[arg(long = "disambig", value_name = "model,ctr_max")]
    disambig: Option<String>,

    /// L1 I-cache geometry: <size>:<assoc>:<blocksize>:<mhsrs>[:<hit>].
    #[arg(long = "IC", value_name = "geom")]
    ic: Option<String>,

    /// L1 D-cache geometry.
    #[arg(long = "DC", value_name = "geom")]
    dc: Option<String>,

    /// L2 cache geometry.
    #[arg(long = "L2", value_name = "geom")]
    l2: Option<String>,

    /// L3 cache geometry.
    #[arg(long = "L3", value_name = "geom")]
    l3: Option<String>,

    /// Enable (1) or disable (0) the L2 and L3 caches: a,b.
    #[arg(long = "L2L3exist", value_name = "a,b")]
    l2l3: Option<String>,

    /// Fixed miss penalty beyond the last cache level.
    #[arg(long = "MEMLAT", value_name = "n")]
    memlat: Option<u64>,

    /// Per-FU-type lane masks (hex): B:L:S:C:LFP:FP:MTF.
    #[arg(long = "lane", value_name = "masks")]
    lane: Option<String>,

    /// Per-FU-type latencies: B:L:S:C:LFP:FP:MTF.
    #[arg(long = "lat", value_name = "lats")]
    lat: Option<String>,

    /// Universal lanes shortcut: every FU type on every lane, single-cycle.
    #[arg(short = 'u')]
    universal: bool,

    /// Target program followed by its arguments.
    #[arg(value_name = "program", trailing_var_arg = true, required = true)]
    program: Vec<String>,
}

fn die(msg: &str) -> ! {
    eprintln!("cprsim: {msg}");
    process::exit(1);
}

fn parse_list(s: &str, sep: char, want: usize, what: &str) -> Vec<u64> {
    let parts: Vec<u64> = s
        .split(sep)
        .map(|p| p.trim().parse().unwrap_or_else(|_| die(&format!("bad {what}: {s}"))))
        .collect();
    if parts.len() != want {
        die(&format!("{what} wants {want} fields: {s}"));
    }
    parts
}

fn parse_hex_list(s: &str, want: usize, what: &str) -> Vec<u64> {
    let parts: Vec<u64> = s
        .split(':')
        .map(|p| {
            let p = p.trim().trim_start_matches("0x");
            u64::from_str_radix(p, 16).unwrap_or_else(|_| die(&format!("bad {what}: {s}")))
        })
        .collect();
    if parts.len() != want {
        die(&format!("{what} wants {want} fields: {s}"));
    }
    parts
}

fn apply_cache_geometry(cfg: &mut cprsim_core::config::CacheLevelConfig, spec: &str, what: &str) {
    let parts: Vec<u64> = spec
        .split(':')
        .map(|p| p.parse().unwrap_or_else(|_| die(&format!("bad {what}: {spec}"))))
        .collect();
    if parts.len() != 4 && parts.len() != 5 {
        die(&format!("{what} wants size:assoc:blocksize:mhsrs[:hit]: {spec}"));
    }
    cfg.size_bytes = parts[0];
    cfg.assoc = parts[1];
    cfg.block_bytes = parts[2];
    cfg.mhsrs = parts[3];
    if let Some(&hit) = parts.get(4) {
        cfg.hit_latency = hit;
    }
}

fn build_config(cli: &Cli) -> SimConfig {
    let mut cfg: SimConfig = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .unwrap_or_else(|e| die(&format!("cannot read {path}: {e}")));
            serde_json::from_str(&text).unwrap_or_else(|e| die(&format!("bad config {path}: {e}")))
        }
        None => SimConfig::default(),
    };

    macro_rules! set {
        ($field:expr, $opt:expr) => {
            if let Some(v) = $opt {
                $field = v;
            }
        };
    }
    set!(cfg.core.num_checkpoints, cli.checkpoints);
    set!(cfg.core.fetch_queue_size, cli.fq);
    set!(cfg.core.active_size, cli.active);
    set!(cfg.core.prf_size, cli.prf);
    set!(cfg.core.iq_size, cli.iq);
    set!(cfg.core.iq_num_parts, cli.iqnp);
    set!(cfg.core.fetch_width, cli.fw);
    set!(cfg.core.dispatch_width, cli.dw);
    set!(cfg.core.issue_width, cli.iw);
    set!(cfg.core.retire_width, cli.rw);
    if let Some(n) = cli.lsq {
        cfg.core.lq_size = n;
        cfg.core.sq_size = n;
    }
    cfg.core.presteer |= cli.presteer;
    cfg.core.age_based_select |= cli.age_based;

    set!(cfg.frontend.bq_size, cli.bq);
    set!(cfg.frontend.btb_entries, cli.btb_entries);
    set!(cfg.frontend.btb_assoc, cli.btb_assoc);
    set!(cfg.frontend.ras_size, cli.ras);
    set!(cfg.frontend.cond_branch_per_cycle, cli.mbp);
    set!(cfg.frontend.cbp_pc_length, cli.cbp_pc);
    set!(cfg.frontend.cbp_bhr_length, cli.cbp_bhr);
    set!(cfg.frontend.ibp_pc_length, cli.ibp_pc);
    set!(cfg.frontend.ibp_bhr_length, cli.ibp_bhr);
    cfg.frontend.trace_cache |= cli.trace_cache;

    if let Some(perf) = &cli.perf {
        let v = parse_list(perf, ',', 4, "--perf");
        cfg.oracle.perfect_branch_pred = v[0] != 0;
        cfg.oracle.perfect_dcache = v[1] != 0;
        cfg.oracle.perfect_icache = v[2] != 0;
        cfg.oracle.perfect_trace_cache = v[3] != 0;
    }

    if let Some(d) = &cli.disambig {
        let v = parse_list(d, ',', 2, "--disambig");
        cfg.disambig.model = match v[0] {
            0 => DisambigModel::AlwaysConflict,
            1 => DisambigModel::NeverConflict,
            2 => DisambigModel::MdpSticky,
            3 => {
                if v[1] == 0 {
                    die("--disambig: MDP-ctr needs ctr_max > 0");
                }
                DisambigModel::MdpCounter
            }
            4 => DisambigModel::Oracle,
            _ => die("--disambig: model must be 0..=4"),
        };
        cfg.disambig.mdp_max = v[1];
    }

    if let Some(g) = &cli.ic {
        apply_cache_geometry(&mut cfg.memory.l1i, g, "--IC");
    }
    if let Some(g) = &cli.dc {
        apply_cache_geometry(&mut cfg.memory.l1d, g, "--DC");
    }
    if let Some(g) = &cli.l2 {
        apply_cache_geometry(&mut cfg.memory.l2, g, "--L2");
    }
    if let Some(g) = &cli.l3 {
        apply_cache_geometry(&mut cfg.memory.l3, g, "--L3");
    }
    if let Some(e) = &cli.l2l3 {
        let v = parse_list(e, ',', 2, "--L2L3exist");
        cfg.memory.l2_present = v[0] != 0;
        cfg.memory.l3_present = v[1] != 0;
    }
    set!(cfg.memory.mem_latency, cli.memlat);
    set!(cfg.memory.memory_mb, cli.memory_mb);

    if cli.universal {
        cfg.lanes.fu_lane_matrix = [0xFFFF; 7];
        cfg.lanes.fu_latency = [1; 7];
    }
    if let Some(masks) = &cli.lane {
        let v = parse_hex_list(masks, 7, "--lane");
        for (dst, src) in cfg.lanes.fu_lane_matrix.iter_mut().zip(v) {
            *dst = src;
        }
    }
    if let Some(lats) = &cli.lat {
        let v = parse_list(lats, ':', 7, "--lat");
        for (dst, src) in cfg.lanes.fu_latency.iter_mut().zip(v) {
            *dst = src;
        }
    }

    set!(cfg.run.stop_after, cli.stop_after);
    set!(cfg.run.fast_skip, cli.fast_skip);
    set!(cfg.run.log_after, cli.log_after);
    cfg.run.pc_histogram |= cli.histogram;

    if let Some(p) = cli.processors {
        if p != 1 {
            die("only a single processor is supported");
        }
    }

    cfg
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.debug {
        "debug"
    } else if cli.log_after.is_some() {
        "trace"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let cfg = build_config(&cli);
    let program_path = &cli.program[0];
    let image = std::fs::read(program_path)
        .unwrap_or_else(|e| die(&format!("cannot read {program_path}: {e}")));

    let mut sim = match Simulator::new(&cfg, &image) {
        Ok(sim) => sim,
        Err(e) => die(&e),
    };

    let code = sim.run();
    eprintln!("{}", sim.report());

    // Mirror the target program's own exit code.
    process::exit((code & 0xFF) as i32);
}

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use anyhow::Result;
use clap::Parser;

use scx_cgboost::{
    parse_duration_ns, CgroupId, CpuId, Phase, Pid, Scenario, Scheduler, SchedulerConfig,
    Simulator, TaskBehavior, TaskDef, Trace, SCHEDULER_NAME,
};

const VERSION: &str = env!("CARGO_PKG_VERSION");

const NSEC_PER_USEC: u64 = 1_000;

/// Cgroup hosting the normal demo tasks.
const NORMAL_CGROUP: CgroupId = CgroupId(2);
/// Cgroup granted the priority boost.
const BOOSTED_CGROUP: CgroupId = CgroupId(3);

/// scx_cgboost: weighted virtual-time scheduler with cgroup boosting
///
/// scx_cgboost dispatches tasks from per-CPU queues in virtual-runtime (vtime) order. Every task
/// is charged for its execution time at a rate inversely proportional to its weight, and tasks in
/// boosted cgroups carry a weight multiplied by the boost ratio, so they accrue vtime more slowly
/// and keep winning the lowest-vtime dispatch race.
///
/// The binary drives the policy through a deterministic simulation: CPU hogs are spread across a
/// normal and a boosted cgroup, and the resulting CPU shares are reported at the end of the run.
/// With the default boost ratio of 4, a boosted hog competing with a normal hog on the same CPU
/// should end up with roughly 4x its runtime.
#[derive(Debug, Parser)]
struct Opts {
    /// Number of simulated CPUs.
    #[clap(short = 'c', long, default_value = "4")]
    cpus: u32,

    /// Scheduling slice duration in microseconds.
    #[clap(short = 's', long, default_value = "10000")]
    slice_us: u64,

    /// Weight multiplier applied to tasks in boosted cgroups.
    #[clap(short = 'b', long, default_value = "4")]
    boost_ratio: u64,

    /// Number of CPU-hog tasks in the normal cgroup.
    #[clap(short = 'n', long, default_value = "4")]
    normal_tasks: usize,

    /// Number of CPU-hog tasks in the boosted cgroup.
    #[clap(short = 'p', long, default_value = "2")]
    boosted_tasks: usize,

    /// Simulated duration. Accepts units ("1s", "500ms", "100us"); a bare
    /// number is interpreted as nanoseconds.
    #[clap(short = 'd', long, default_value = "1s")]
    duration: String,

    /// Dump the full event trace to stderr at the end of the run.
    #[clap(long, action = clap::ArgAction::SetTrue)]
    dump_trace: bool,

    /// Print metrics as JSON instead of human-readable text.
    #[clap(short = 'j', long, action = clap::ArgAction::SetTrue)]
    json: bool,

    /// Enable verbose output (per-event scheduling log on stderr).
    #[clap(short = 'v', long, action = clap::ArgAction::SetTrue)]
    verbose: bool,

    /// Print scheduler version and exit.
    #[clap(short = 'V', long, action = clap::ArgAction::SetTrue)]
    version: bool,
}

fn build_scenario(opts: &Opts) -> Result<Scenario> {
    let duration_ns = parse_duration_ns(&opts.duration)
        .with_context(|| format!("invalid duration {:?}", opts.duration))?;

    // CPU hogs: a single Run phase longer than the simulation, so the task
    // stays runnable for the whole window.
    let hog = || TaskBehavior::forever(vec![Phase::Run(duration_ns)]);

    let mut builder = Scenario::builder()
        .cpus(opts.cpus)
        .duration_ns(duration_ns)
        .boost_cgroup(BOOSTED_CGROUP);

    let mut pid = 1;
    for i in 0..opts.normal_tasks {
        builder = builder.task(TaskDef {
            name: format!("normal-{}", i),
            pid: Pid(pid),
            cgroup_id: NORMAL_CGROUP,
            cpu: CpuId((pid as u32 - 1) % opts.cpus),
            behavior: hog(),
            start_time_ns: 0,
        });
        pid += 1;
    }
    for i in 0..opts.boosted_tasks {
        builder = builder.task(TaskDef {
            name: format!("boosted-{}", i),
            pid: Pid(pid),
            cgroup_id: BOOSTED_CGROUP,
            cpu: CpuId((pid as u32 - 1) % opts.cpus),
            behavior: hog(),
            start_time_ns: 0,
        });
        pid += 1;
    }

    Ok(builder.build())
}

fn report(opts: &Opts, trace: &Trace) -> Result<()> {
    let metrics = trace.metrics();

    if opts.json {
        println!("{}", serde_json::to_string_pretty(metrics)?);
        return Ok(());
    }

    let total: u64 = trace
        .tasks()
        .iter()
        .map(|(pid, _)| trace.total_runtime(*pid))
        .sum();

    for (pid, name) in trace.tasks() {
        let runtime = trace.total_runtime(*pid);
        let share = if total > 0 {
            runtime as f64 * 100.0 / total as f64
        } else {
            0.0
        };
        println!(
            "{:<12} pid={:<6} runtime={:>12}ns share={:>5.1}% scheduled={}",
            name,
            pid.0,
            runtime,
            share,
            trace.schedule_count(*pid),
        );
    }
    metrics.format(&mut std::io::stdout())?;

    Ok(())
}

fn main() -> Result<()> {
    let opts = Opts::parse();

    if opts.version {
        println!("{} version {}", SCHEDULER_NAME, VERSION);
        return Ok(());
    }

    // The per-event scheduling log is info/debug level; keep it behind -v
    // so the default output is just the final report.
    let loglevel = if opts.verbose {
        simplelog::LevelFilter::Debug
    } else {
        simplelog::LevelFilter::Warn
    };

    let mut lcfg = simplelog::ConfigBuilder::new();
    lcfg.set_time_level(simplelog::LevelFilter::Error)
        .set_location_level(simplelog::LevelFilter::Off)
        .set_target_level(simplelog::LevelFilter::Off)
        .set_thread_level(simplelog::LevelFilter::Off);
    simplelog::TermLogger::init(
        loglevel,
        lcfg.build(),
        simplelog::TerminalMode::Stderr,
        simplelog::ColorChoice::Auto,
    )?;

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    ctrlc::set_handler(move || {
        shutdown_clone.store(true, Ordering::Relaxed);
    })
    .context("Error setting Ctrl-C handler")?;

    let config = SchedulerConfig {
        nr_cpus: opts.cpus,
        slice_ns: opts.slice_us * NSEC_PER_USEC,
        boost_ratio: opts.boost_ratio,
        ..SchedulerConfig::default()
    };
    let sched = Scheduler::init(config)?;

    let scenario = build_scenario(&opts)?;
    let trace = Simulator::new(sched).run_with_shutdown(scenario, shutdown);

    if opts.dump_trace {
        trace.dump();
    }
    report(&opts, &trace)?;

    trace.exit_info().report()
}

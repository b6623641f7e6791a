use scx_cgboost::{CgroupId, CpuId, Phase, Pid, TaskBehavior, TaskDef};

/// Initialize logging for a test run. The first call in the process wins;
/// later calls are silently ignored. Run with `-- --nocapture` to see the
/// per-event scheduling log.
pub fn setup_test() {
    let _ = simplelog::TermLogger::init(
        simplelog::LevelFilter::Warn,
        simplelog::Config::default(),
        simplelog::TerminalMode::Stderr,
        simplelog::ColorChoice::Auto,
    );
}

/// A CPU hog: one long Run phase, repeated until the scenario ends.
pub fn hog(name: &str, pid: i32, cgroup_id: CgroupId) -> TaskDef {
    TaskDef {
        name: name.to_string(),
        pid: Pid(pid),
        cgroup_id,
        cpu: CpuId(0),
        behavior: TaskBehavior::forever(vec![Phase::Run(100_000_000)]),
        start_time_ns: 0,
    }
}

/// A task that runs once for `run_ns` and exits.
pub fn one_shot(name: &str, pid: i32, cgroup_id: CgroupId, run_ns: u64) -> TaskDef {
    TaskDef {
        name: name.to_string(),
        pid: Pid(pid),
        cgroup_id,
        cpu: CpuId(0),
        behavior: TaskBehavior::once(vec![Phase::Run(run_ns)]),
        start_time_ns: 0,
    }
}

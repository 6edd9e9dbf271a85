//! Loop execution.
//!
//! Every run drives its loop from one [`PeriodicScheduler`] on the calling
//! thread. The timebase decides what time means: a [`ScriptedTimebase`]
//! jumps a manual clock straight to each target (as fast as the CPU allows,
//! fully deterministic), a [`SystemTimebase`] sleeps on the wall clock.

use std::sync::Arc;

use serde::Serialize;
use sf_controls::{
    PidController, PidInterface, ProfileRunner, ProfileState, ReferenceTrajectory, SensorNode,
    node,
};
use sf_core::{Clock, ManualClock};
use sf_sched::{
    CycleStats, PeriodicScheduler, ScriptedTimebase, SystemTimebase, Tick, Timebase, rt_setup,
};
use sf_statespace::PlantSimulator;
use tracing::{info, warn};

use crate::config::{LoopDef, LoopFile, PlantDef};
use crate::error::{CliError, CliResult};
use crate::plant::{PlantModel, SimulatedPlant};

/// One sample of a run, taken right after the command is written.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct TraceRow {
    pub t: f64,
    pub reference: f64,
    pub measurement: f64,
    pub command: f64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Pace the loop on the wall clock instead of simulated time.
    pub realtime: bool,
    /// Pin and prioritise the loop thread: `(cpu, priority)`.
    pub rt: Option<(usize, i32)>,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub rows: Vec<TraceRow>,
    pub stats: CycleStats,
}

impl RunReport {
    pub fn final_row(&self) -> Option<&TraceRow> {
        self.rows.last()
    }

    pub fn to_csv(&self) -> String {
        let mut csv = String::from("t_s,reference,measurement,command\n");
        for row in &self.rows {
            csv.push_str(&format!(
                "{},{},{},{}\n",
                row.t, row.reference, row.measurement, row.command
            ));
        }
        csv
    }
}

/// Validate `file` and run it for `duration_s`.
pub fn run_loop(file: &LoopFile, options: RunOptions) -> CliResult<RunReport> {
    file.validate()?;
    let timebase: Arc<dyn Timebase> = if options.realtime {
        Arc::new(SystemTimebase::new())
    } else {
        Arc::new(ScriptedTimebase::new(Arc::new(ManualClock::new(0.0))))
    };
    info!(
        period_s = file.period_s,
        duration_s = file.duration_s,
        realtime = options.realtime,
        "starting loop"
    );
    let report = match &file.control {
        LoopDef::Pid { .. } => run_pid(file, options, timebase)?,
        LoopDef::StateSpace { .. } => run_state_space(file, options, timebase)?,
    };
    info!(
        ticks = report.stats.ticks,
        overruns = report.stats.overruns,
        max_latency_s = report.stats.max_latency_s,
        avg_busy_s = report.stats.avg_busy_s(),
        "loop finished"
    );
    if report.stats.overruns > 0 {
        warn!(overruns = report.stats.overruns, "loop overran its period");
    }
    Ok(report)
}

fn build_plant(file: &LoopFile, timebase: &dyn Timebase) -> CliResult<Arc<SimulatedPlant>> {
    let model = match &file.plant {
        PlantDef::FirstOrder(plant) => PlantModel::FirstOrder {
            plant: plant.clone(),
            x: 0.0,
        },
        PlantDef::StateSpace { .. } => {
            let coeffs = file
                .plant_coeffs()?
                .ok_or_else(|| CliError::Config("plant has no coefficients".into()))?;
            PlantModel::StateSpace(PlantSimulator::new(coeffs))
        }
    };
    Ok(Arc::new(SimulatedPlant::new(model, timebase.clock())))
}

/// Run the scheduler for the file's tick count, stopping early on the first
/// error the callback reports.
fn drive<P>(
    file: &LoopFile,
    options: RunOptions,
    timebase: &dyn Timebase,
    name: &str,
    mut periodic: P,
) -> CliResult<CycleStats>
where
    P: FnMut(&Tick) -> CliResult<()>,
{
    let ticks = file.ticks() as u64;
    let alarm = timebase.new_alarm();
    let mut failure = None;
    let stats = PeriodicScheduler::new(file.period_s)?.with_name(name).start(
        &*alarm,
        || match options.rt {
            Some((cpu, priority)) => rt_setup(cpu, priority),
            None => Ok(()),
        },
        |tick| {
            if let Err(e) = periodic(tick) {
                failure = Some(e);
                alarm.cancel();
                return;
            }
            if tick.index + 1 >= ticks {
                alarm.cancel();
            }
        },
    )?;
    match failure {
        Some(e) => Err(e),
        None => Ok(stats),
    }
}

fn run_pid(
    file: &LoopFile,
    options: RunOptions,
    timebase: Arc<dyn Timebase>,
) -> CliResult<RunReport> {
    let setup = file.pid_setup()?;
    let plant = build_plant(file, &*timebase)?;
    let pid = PidController::new(
        setup.gains,
        node(SensorNode::new(plant.clone())),
        plant.clone(),
        file.period_s,
        timebase.clone(),
    )?;
    pid.set_output_range(setup.range.0, setup.range.1)?;
    if let Some((min, max)) = setup.continuous {
        pid.set_input_range(min, max)?;
        pid.set_continuous(true);
    }
    if let Some(tolerance) = setup.tolerance {
        pid.set_absolute_tolerance(tolerance, f64::INFINITY)?;
    }
    pid.set_setpoint(setup.setpoint);

    let runner = match &file.profile {
        Some(profile) => {
            let runner = ProfileRunner::new(
                profile.build()?,
                pid.setpoint_input(),
                file.period_s,
                timebase.clone(),
            )?;
            runner.set_goal(profile.goal, profile.start)?;
            Some(runner)
        }
        None => None,
    };

    let mut rows = Vec::with_capacity(file.ticks());
    let stats = drive(file, options, &*timebase, "pid", |tick| {
        if let Some(runner) = &runner {
            runner.sample();
        }
        let command = pid.step();
        rows.push(TraceRow {
            t: tick.now,
            reference: pid.setpoint(),
            measurement: plant.measure()?[0],
            command,
        });
        Ok(())
    })?;
    if setup.tolerance.is_some() {
        info!(on_target = pid.on_target(), error = pid.error(), "pid loop settled");
    }
    Ok(RunReport { rows, stats })
}

fn run_state_space(
    file: &LoopFile,
    options: RunOptions,
    timebase: Arc<dyn Timebase>,
) -> CliResult<RunReport> {
    let (mut lp, mut r) = file.state_space_loop()?;
    let plant = build_plant(file, &*timebase)?;
    let states = lp.dims().states;

    let profile = match &file.profile {
        Some(def) => {
            let mut trajectory = def.build()?;
            trajectory.set_goal(def.goal, def.start)?;
            Some(trajectory)
        }
        None => None,
    };
    let origin = timebase.clock().now();

    let mut rows = Vec::with_capacity(file.ticks());
    let stats = drive(file, options, &*timebase, "state-space", |tick| {
        if let Some(trajectory) = &profile {
            let sample = trajectory.update(tick.now - origin);
            r[0] = sample.position;
            if states >= 2 {
                r[1] = sample.velocity;
            }
        }
        let y = plant.measure()?;
        let u = lp.tick(tick.dt, &y, &r)?;
        plant.apply(&u)?;
        rows.push(TraceRow {
            t: tick.now,
            reference: r[0],
            measurement: y[0],
            command: u[0],
        });
        Ok(())
    })?;
    if lp.is_saturated() {
        info!(u = ?lp.u().as_slice(), "state-space loop finished saturated");
    }
    Ok(RunReport { rows, stats })
}

/// Sample a trapezoid profile every `dt` until it finishes.
pub fn sample_profile<T: ReferenceTrajectory>(
    trajectory: &T,
    dt: f64,
) -> CliResult<Vec<(f64, ProfileState)>> {
    if !(dt > 0.0 && dt.is_finite()) {
        return Err(CliError::Config("dt must be positive".into()));
    }
    let total = trajectory.total_time();
    let steps = (total / dt).ceil() as usize;
    Ok((0..=steps)
        .map(|i| {
            let t = (i as f64 * dt).min(total);
            (t, trajectory.update(t))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_loop_file;
    use sf_controls::TrapezoidProfile;

    const PID_FILE: &str = r#"
period_s: 0.01
duration_s: 5.0
loop:
  type: pid
  kp: 2.0
  ki: 4.0
  range: [-10.0, 10.0]
  tolerance: 0.01
plant:
  type: first_order
  tau: 0.5
  gain: 2.0
profile:
  goal: 1.0
  max_velocity: 1.0
  time_to_max_velocity: 0.25
"#;

    const SS_FILE: &str = r#"
period_s: 0.005
duration_s: 5.0
loop:
  type: state_space
  controller:
    k: [[5.0]]
    kff: [[1.0]]
    u_min: [-10.0]
    u_max: [10.0]
  observer:
    q: [[0.01]]
    r: [[0.001]]
    p_steady: [[0.1]]
  reference: [2.0]
plant:
  type: state_space
  a: [[-1.0]]
  b: [[1.0]]
  c: [[1.0]]
  d: [[0.0]]
"#;

    #[test]
    fn pid_run_follows_profile_to_goal() {
        let file = parse_loop_file(PID_FILE).unwrap();
        let report = run_loop(&file, RunOptions::default()).unwrap();

        assert_eq!(report.stats.ticks, 500);
        assert_eq!(report.rows.len(), 500);
        let last = report.final_row().unwrap();
        assert!((last.t - 5.0).abs() < 1e-9);
        assert_eq!(last.reference, 1.0);
        assert!((last.measurement - 1.0).abs() < 1e-2, "y = {}", last.measurement);
        assert!(report.rows.iter().all(|row| row.command.abs() <= 10.0));
    }

    #[test]
    fn simulated_time_is_deterministic() {
        let file = parse_loop_file(PID_FILE).unwrap();
        let a = run_loop(&file, RunOptions::default()).unwrap();
        let b = run_loop(&file, RunOptions::default()).unwrap();
        assert_eq!(a.rows, b.rows);
    }

    #[test]
    fn state_space_run_settles_on_reference() {
        let file = parse_loop_file(SS_FILE).unwrap();
        let report = run_loop(&file, RunOptions::default()).unwrap();

        assert_eq!(report.stats.ticks, 1000);
        let last = report.final_row().unwrap();
        assert!((last.measurement - 2.0).abs() < 1e-4, "y = {}", last.measurement);
        assert_eq!(report.stats.overruns, 0);
    }

    #[test]
    fn invalid_file_fails_before_running() {
        let file = parse_loop_file(&SS_FILE.replace("reference: [2.0]", "reference: [2.0, 0.0]"))
            .unwrap();
        assert!(matches!(
            run_loop(&file, RunOptions::default()),
            Err(CliError::Config(_))
        ));
    }

    #[test]
    fn csv_has_header_and_one_line_per_row() {
        let file = parse_loop_file(PID_FILE).unwrap();
        let report = run_loop(&file, RunOptions::default()).unwrap();
        let csv = report.to_csv();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("t_s,reference,measurement,command"));
        assert_eq!(lines.count(), report.rows.len());
    }

    #[test]
    fn profile_samples_end_at_goal() {
        let mut profile = TrapezoidProfile::new(2.0, 1.0).unwrap();
        profile.set_goal(10.0, 0.0).unwrap();
        let samples = sample_profile(&profile, 0.1).unwrap();

        assert_eq!(samples.first().unwrap().1.position, 0.0);
        let (t, last) = samples.last().unwrap();
        assert!((t - 6.0).abs() < 1e-9);
        assert!((last.position - 10.0).abs() < 1e-9);
        assert_eq!(last.velocity, 0.0);
        assert!(sample_profile(&profile, 0.0).is_err());
    }
}

//! Integration tests: PID controller behaviour, synchronously and on its
//! periodic thread.

use std::sync::Arc;

use parking_lot::Mutex;
use sf_core::{Actuator, Clock, ManualClock, RecordingActuator, Sensor};
use sf_controls::{
    PidController, PidGains, PidInterface, ProfileRunner, RefInput, Schedulable, SensorNode,
    TrapezoidProfile,
};
use sf_sched::{ScriptedTimebase, SystemTimebase};

fn scripted(clock: &Arc<ManualClock>) -> Arc<ScriptedTimebase> {
    Arc::new(ScriptedTimebase::new(clock.clone()))
}

#[test]
fn proportional_output_is_immediate() {
    let clock = Arc::new(ManualClock::new(0.0));
    let actuator = Arc::new(RecordingActuator::new());
    let pid = PidController::new(
        PidGains::new(1.0, 0.0, 0.0),
        Arc::new(RefInput::new(0.0)),
        actuator.clone(),
        0.01,
        scripted(&clock),
    )
    .unwrap();
    pid.set_setpoint(1.0);

    assert_eq!(pid.step(), 1.0);
    assert_eq!(actuator.last(), Some(1.0));
    assert_eq!(pid.error(), 1.0);
}

#[test]
fn reset_clears_integral() {
    let clock = Arc::new(ManualClock::new(0.0));
    let pid = PidController::new(
        PidGains::new(0.0, 1.0, 0.0),
        Arc::new(RefInput::new(0.0)),
        Arc::new(RecordingActuator::new()),
        0.01,
        scripted(&clock),
    )
    .unwrap();
    pid.set_output_range(-100.0, 100.0).unwrap();
    pid.set_setpoint(1.0);

    for _ in 0..10 {
        pid.step();
        clock.advance(0.1);
    }
    assert!(pid.integral() > 0.8);

    pid.reset();
    assert_eq!(pid.integral(), 0.0);
    // The first tick after reset integrates nothing.
    assert_eq!(pid.step(), 0.0);
}

#[test]
fn gains_round_trip_through_interface() {
    let clock = Arc::new(ManualClock::new(0.0));
    let pid = PidController::new(
        PidGains::default(),
        Arc::new(RefInput::new(0.0)),
        Arc::new(RecordingActuator::new()),
        0.01,
        scripted(&clock),
    )
    .unwrap();
    pid.set_pid(1.5, 0.25, 0.125);
    pid.set_f(2.0);
    assert_eq!((pid.p(), pid.i(), pid.d(), pid.f()), (1.5, 0.25, 0.125, 2.0));
    pid.set_setpoint(3.0);
    assert_eq!(pid.setpoint(), 3.0);
}

#[test]
fn continuous_error_takes_short_way() {
    let clock = Arc::new(ManualClock::new(0.0));
    let pid = PidController::new(
        PidGains::new(0.01, 0.0, 0.0),
        Arc::new(RefInput::new(-170.0)),
        Arc::new(RecordingActuator::new()),
        0.01,
        scripted(&clock),
    )
    .unwrap();
    pid.set_continuous(true);
    pid.set_input_range(-180.0, 180.0).unwrap();
    pid.set_setpoint(170.0);

    let u = pid.step();
    assert!((pid.error() + 20.0).abs() < 1e-9);
    assert!((u + 0.2).abs() < 1e-9);
}

#[test]
fn on_target_uses_tolerance() {
    let clock = Arc::new(ManualClock::new(0.0));
    let measurement = Arc::new(RefInput::new(0.95));
    let pid = PidController::new(
        PidGains::new(1.0, 0.0, 0.0),
        measurement.clone(),
        Arc::new(RecordingActuator::new()),
        0.01,
        scripted(&clock),
    )
    .unwrap();
    pid.set_setpoint(1.0);
    pid.set_absolute_tolerance(0.1, 0.1).unwrap();
    pid.step();
    assert!(pid.on_target());

    measurement.set(0.0);
    pid.step();
    assert!(!pid.on_target());
}

/// First-order plant `x' = (gain * u - x) / tau`, advanced on every write.
struct LagPlant {
    clock: Arc<ManualClock>,
    tau: f64,
    gain: f64,
    state: Mutex<(f64, f64)>,
}

impl Actuator for LagPlant {
    fn write(&self, effort: f64) {
        let now = self.clock.now();
        let mut state = self.state.lock();
        let dt = now - state.1;
        state.0 += dt * (self.gain * effort - state.0) / self.tau;
        state.1 = now;
    }
}

impl Sensor for LagPlant {
    fn read(&self) -> f64 {
        self.state.lock().0
    }
}

#[test]
fn closed_loop_settles_on_periodic_thread() {
    let clock = Arc::new(ManualClock::new(0.0));
    let plant = Arc::new(LagPlant {
        clock: clock.clone(),
        tau: 0.5,
        gain: 2.0,
        state: Mutex::new((0.0, 0.0)),
    });
    let pid = PidController::new(
        PidGains::new(2.0, 4.0, 0.0),
        Arc::new(SensorNode::new(plant.clone())),
        plant.clone(),
        0.01,
        Arc::new(ScriptedTimebase::new(clock.clone()).ticks_per_run(2000)),
    )
    .unwrap();
    pid.set_output_range(-5.0, 5.0).unwrap();
    pid.set_setpoint(1.0);

    pid.enable().unwrap();
    while clock.now() < 19.99 {
        std::thread::yield_now();
    }
    pid.disable().unwrap();

    assert!((plant.read() - 1.0).abs() < 1e-3, "plant at {}", plant.read());

    // Disable preserves accumulated state, even while time passes.
    let integral = pid.integral();
    assert!(integral > 0.0);
    clock.advance(1.0);
    assert_eq!(pid.integral(), integral);

    // Re-enabling resumes from the held integral instead of winding up again.
    let resumed = clock.now();
    pid.enable().unwrap();
    while clock.now() < resumed + 19.99 {
        std::thread::yield_now();
    }
    pid.disable().unwrap();
    assert!((pid.integral() - integral).abs() < 1e-3);
    assert!((plant.read() - 1.0).abs() < 1e-3, "plant at {}", plant.read());
}

#[test]
fn profile_runner_feeds_controller_setpoint() {
    let clock = Arc::new(ManualClock::new(0.0));
    let timebase = scripted(&clock);
    let pid = PidController::new(
        PidGains::new(1.0, 0.0, 0.0),
        Arc::new(RefInput::new(0.0)),
        Arc::new(RecordingActuator::new()),
        0.01,
        timebase.clone(),
    )
    .unwrap();
    pid.set_output_range(-100.0, 100.0).unwrap();
    let runner = ProfileRunner::new(
        TrapezoidProfile::new(2.0, 1.0).unwrap(),
        pid.setpoint_input(),
        0.01,
        timebase,
    )
    .unwrap();
    runner.set_goal(10.0, 0.0).unwrap();

    clock.advance(1.0);
    runner.sample();
    assert!((pid.setpoint() - 1.0).abs() < 1e-9);
    assert!((pid.step() - 1.0).abs() < 1e-9);
}

#[test]
fn wall_clock_enable_disable_cycle() {
    let actuator = Arc::new(RecordingActuator::new());
    let pid = PidController::new(
        PidGains::new(0.5, 0.0, 0.0),
        Arc::new(RefInput::new(0.0)),
        actuator.clone(),
        0.002,
        Arc::new(SystemTimebase::new()),
    )
    .unwrap();
    pid.set_setpoint(1.0);

    assert!(!pid.is_enabled());
    pid.disable().unwrap();
    for _ in 0..2 {
        pid.enable().unwrap();
        assert!(pid.is_enabled());
        std::thread::sleep(std::time::Duration::from_millis(20));
        pid.disable().unwrap();
        assert!(!pid.is_enabled());
    }
    assert!(!actuator.is_empty());
    assert!(actuator.writes().iter().all(|w| *w == 0.5));
}

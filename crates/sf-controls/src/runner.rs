//! Periodic sampling of a trajectory into a setpoint.

use std::sync::Arc;

use parking_lot::Mutex;
use sf_core::SharedClock;
use sf_sched::Timebase;
use tracing::debug;

use crate::controller::{Schedulable, TaskSlot};
use crate::error::{ControlError, ControlResult};
use crate::node::RefInput;
use crate::profile::{ProfileState, ReferenceTrajectory};

/// A trajectory together with the instant its goal was set. Both change
/// together under one lock, so a sample never pairs a new plan with an old
/// origin.
struct Plan<T> {
    trajectory: T,
    origin: f64,
}

struct Runner<T> {
    plan: Mutex<Plan<T>>,
    reference: Arc<RefInput>,
    clock: SharedClock,
    latest: Mutex<Option<ProfileState>>,
}

impl<T: ReferenceTrajectory> Runner<T> {
    fn elapsed(&self) -> f64 {
        let plan = self.plan.lock();
        self.clock.now() - plan.origin
    }

    fn sample(&self) -> ProfileState {
        // Publish under the plan lock so a racing set_goal cannot be
        // overwritten by a sample of the previous plan.
        let plan = self.plan.lock();
        let state = plan.trajectory.update(self.clock.now() - plan.origin);
        self.reference.set(state.position);
        *self.latest.lock() = Some(state);
        state
    }
}

/// Samples a [`ReferenceTrajectory`] every period and publishes the position
/// into a [`RefInput`], usually a controller's setpoint.
///
/// Time is measured from the most recent `set_goal`.
pub struct ProfileRunner<T> {
    runner: Arc<Runner<T>>,
    task: TaskSlot,
}

impl<T> ProfileRunner<T>
where
    T: ReferenceTrajectory + 'static,
{
    pub fn new(
        trajectory: T,
        reference: Arc<RefInput>,
        period_s: f64,
        timebase: Arc<dyn Timebase>,
    ) -> ControlResult<Self> {
        let task = TaskSlot::new("profile", period_s, timebase)?;
        let clock = task.timebase().clock();
        Ok(Self {
            runner: Arc::new(Runner {
                plan: Mutex::new(Plan {
                    trajectory,
                    origin: clock.now(),
                }),
                reference,
                clock,
                latest: Mutex::new(None),
            }),
            task,
        })
    }

    /// Plan a new move and restart the time origin.
    pub fn set_goal(&self, goal: f64, current: f64) -> ControlResult<()> {
        let mut plan = self.runner.plan.lock();
        plan.trajectory.set_goal(goal, current)?;
        plan.origin = self.runner.clock.now();
        let initial = plan.trajectory.update(0.0);
        self.runner.reference.set(initial.position);
        *self.runner.latest.lock() = Some(initial);
        debug!(goal, current, total_s = plan.trajectory.total_time(), "profile goal set");
        Ok(())
    }

    /// Sample once at the current time and publish.
    pub fn sample(&self) -> ProfileState {
        self.runner.sample()
    }

    /// Most recently published sample, if a goal has been set.
    pub fn state(&self) -> Option<ProfileState> {
        *self.runner.latest.lock()
    }

    /// Seconds since the last `set_goal`.
    pub fn elapsed(&self) -> f64 {
        self.runner.elapsed()
    }

    pub fn at_goal(&self) -> bool {
        let plan = self.runner.plan.lock();
        let t = self.runner.clock.now() - plan.origin;
        plan.trajectory.is_finished(t)
    }

    /// Run `f` with the trajectory locked, e.g. to change its limits.
    pub fn with_trajectory<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.runner.plan.lock().trajectory)
    }
}

impl<T> Schedulable for ProfileRunner<T>
where
    T: ReferenceTrajectory + 'static,
{
    fn enable(&self) -> ControlResult<()> {
        if self.runner.latest.lock().is_none() {
            return Err(ControlError::Usage {
                what: "profile runner enabled before a goal was set".to_string(),
            });
        }
        let runner = self.runner.clone();
        self.task.start(move |_| {
            runner.sample();
        })
    }

    fn disable(&self) -> ControlResult<()> {
        self.task.stop()
    }

    fn is_enabled(&self) -> bool {
        self.task.is_enabled()
    }
}

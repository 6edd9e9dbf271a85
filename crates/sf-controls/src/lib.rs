//! Control node graph, controllers and motion profiles.
//!
//! A control diagram is a graph of [`ControlNode`]s evaluated on demand:
//! reading the last node pulls values through every node upstream of it.
//! An [`Output`] binding evaluates a node on a fixed period and drives an
//! actuator with the clamped result.
//!
//! # Architecture
//!
//! - **Nodes**: references, sensors, gains, signed sums with continuous
//!   wrap-around, time-based integral and derivative, linear filters
//! - **Controllers**: [`PidController`] composes the nodes into the usual
//!   `setpoint - measurement` loop; every controller implements
//!   [`Schedulable`] (enable / disable / is_enabled)
//! - **Profiles**: [`TrapezoidProfile`] generates setpoints,
//!   [`ProfileRunner`] publishes them periodically
//!
//! Each controller owns one dedicated periodic thread from `sf-sched`.
//! Node state is guarded per node (atomics or one short-lived lock), and no
//! node holds its lock while evaluating its inputs.

pub mod calculus;
pub mod controller;
pub mod error;
pub mod filter;
pub mod gain;
pub mod node;
pub mod output;
pub mod pid;
pub mod profile;
pub mod runner;
pub mod sum;

pub use calculus::{DerivativeNode, IntegralNode};
pub use controller::{PidInterface, Schedulable};
pub use error::{ControlError, ControlResult};
pub use filter::LinearFilterNode;
pub use gain::GainNode;
pub use node::{ControlNode, FuncNode, NodeRef, RefInput, SensorNode, node};
pub use output::Output;
pub use pid::{PidController, PidGains, PidNode};
pub use profile::{ProfileState, ReferenceTrajectory, TrapezoidProfile};
pub use runner::ProfileRunner;
pub use sum::{Sign, SumNode};

//! Loop file schema.
//!
//! A loop file describes one closed loop: the controller, the simulated
//! plant it drives, and an optional trapezoid profile feeding the reference.
//! Matrices are row-major nested lists.

use std::path::Path;

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use sf_controls::{PidGains, TrapezoidProfile};
use sf_statespace::{ControllerCoeffs, Dims, ObserverCoeffs, PeriodVariantLoop, PlantCoeffs};

use crate::error::{CliError, CliResult};
use crate::plant::FirstOrderPlant;

/// Longest run a loop file may ask for. Every tick keeps a trace row.
pub const MAX_TICKS: usize = 10_000_000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoopFile {
    pub period_s: f64,
    pub duration_s: f64,
    #[serde(rename = "loop")]
    pub control: LoopDef,
    pub plant: PlantDef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<ProfileDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LoopDef {
    Pid {
        kp: f64,
        #[serde(default)]
        ki: f64,
        #[serde(default)]
        kd: f64,
        #[serde(default)]
        kf: f64,
        #[serde(default = "default_range")]
        range: [f64; 2],
        #[serde(default)]
        setpoint: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        continuous: Option<[f64; 2]>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tolerance: Option<f64>,
    },
    StateSpace {
        controller: ControllerDef,
        observer: ObserverDef,
        #[serde(default)]
        reference: Vec<f64>,
    },
}

fn default_range() -> [f64; 2] {
    [-1.0, 1.0]
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ControllerDef {
    pub k: Vec<Vec<f64>>,
    pub kff: Vec<Vec<f64>>,
    pub u_min: Vec<f64>,
    pub u_max: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ObserverDef {
    pub q: Vec<Vec<f64>>,
    pub r: Vec<Vec<f64>>,
    pub p_steady: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlantDef {
    FirstOrder(FirstOrderPlant),
    StateSpace {
        a: Vec<Vec<f64>>,
        b: Vec<Vec<f64>>,
        c: Vec<Vec<f64>>,
        d: Vec<Vec<f64>>,
    },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ProfileDef {
    pub goal: f64,
    pub max_velocity: f64,
    pub time_to_max_velocity: f64,
    #[serde(default)]
    pub start: f64,
}

impl ProfileDef {
    pub fn build(&self) -> CliResult<TrapezoidProfile> {
        Ok(TrapezoidProfile::new(self.max_velocity, self.time_to_max_velocity)?)
    }
}

/// Everything a PID run needs, validated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PidSetup {
    pub gains: PidGains,
    pub range: (f64, f64),
    pub setpoint: f64,
    pub continuous: Option<(f64, f64)>,
    pub tolerance: Option<f64>,
}

pub fn load_loop_file(path: &Path) -> CliResult<LoopFile> {
    let content = std::fs::read_to_string(path).map_err(|e| CliError::LoopFileRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    parse_loop_file(&content)
}

pub fn parse_loop_file(content: &str) -> CliResult<LoopFile> {
    Ok(serde_yaml::from_str(content)?)
}

/// Build a matrix from row-major nested lists.
pub fn matrix(what: &str, rows: &[Vec<f64>]) -> CliResult<DMatrix<f64>> {
    let ncols = rows.first().map_or(0, Vec::len);
    if rows.is_empty() || ncols == 0 {
        return Err(CliError::Config(format!("{what} is empty")));
    }
    if rows.iter().any(|row| row.len() != ncols) {
        return Err(CliError::Config(format!("{what} has rows of unequal length")));
    }
    Ok(DMatrix::from_row_iterator(
        rows.len(),
        ncols,
        rows.iter().flatten().copied(),
    ))
}

impl LoopFile {
    /// Check timing and build every coefficient bundle, discarding them.
    pub fn validate(&self) -> CliResult<()> {
        if !(self.period_s > 0.0 && self.period_s.is_finite()) {
            return Err(CliError::Config("period_s must be positive".into()));
        }
        if !(self.duration_s >= self.period_s && self.duration_s.is_finite()) {
            return Err(CliError::Config(
                "duration_s must be at least one period".into(),
            ));
        }
        if self.duration_s / self.period_s > MAX_TICKS as f64 {
            return Err(CliError::Config(format!(
                "duration_s / period_s exceeds {MAX_TICKS} ticks"
            )));
        }
        if let PlantDef::FirstOrder(plant) = &self.plant {
            plant.validate()?;
        }
        if let Some(profile) = &self.profile {
            profile.build()?;
        }
        match &self.control {
            LoopDef::Pid { .. } => {
                self.pid_setup()?;
            }
            LoopDef::StateSpace { .. } => {
                self.state_space_loop()?;
            }
        }
        Ok(())
    }

    /// Number of ticks in `duration_s`.
    pub fn ticks(&self) -> usize {
        (self.duration_s / self.period_s).round() as usize
    }

    pub fn plant_coeffs(&self) -> CliResult<Option<PlantCoeffs>> {
        match &self.plant {
            PlantDef::FirstOrder(_) => Ok(None),
            PlantDef::StateSpace { a, b, c, d } => Ok(Some(PlantCoeffs::new(
                matrix("A", a)?,
                matrix("B", b)?,
                matrix("C", c)?,
                matrix("D", d)?,
            )?)),
        }
    }

    pub fn pid_setup(&self) -> CliResult<PidSetup> {
        let LoopDef::Pid {
            kp,
            ki,
            kd,
            kf,
            range,
            setpoint,
            continuous,
            tolerance,
        } = &self.control
        else {
            return Err(CliError::Config("loop is not a PID loop".into()));
        };
        if range[0] > range[1] {
            return Err(CliError::Config("range minimum exceeds maximum".into()));
        }
        if let Some(c) = continuous
            && c[0] >= c[1]
        {
            return Err(CliError::Config("continuous range is empty".into()));
        }
        // A PID loop drives one input and reads one output.
        if let Some(plant) = self.plant_coeffs()? {
            let dims = plant.dims();
            if dims.inputs != 1 || dims.outputs != 1 {
                return Err(CliError::Config(format!(
                    "PID needs a single-input single-output plant, got {} inputs and {} outputs",
                    dims.inputs, dims.outputs
                )));
            }
        }
        Ok(PidSetup {
            gains: PidGains::new(*kp, *ki, *kd).with_f(*kf),
            range: (range[0], range[1]),
            setpoint: *setpoint,
            continuous: continuous.map(|c| (c[0], c[1])),
            tolerance: *tolerance,
        })
    }

    /// Build the state-space loop and its initial reference vector.
    pub fn state_space_loop(&self) -> CliResult<(PeriodVariantLoop, DVector<f64>)> {
        let LoopDef::StateSpace {
            controller,
            observer,
            reference,
        } = &self.control
        else {
            return Err(CliError::Config("loop is not a state-space loop".into()));
        };
        let Some(plant) = self.plant_coeffs()? else {
            return Err(CliError::Config(
                "a state-space loop needs a state_space plant".into(),
            ));
        };
        let dims: Dims = plant.dims();
        let controller = ControllerCoeffs::new(
            matrix("K", &controller.k)?,
            matrix("Kff", &controller.kff)?,
            DVector::from_vec(controller.u_min.clone()),
            DVector::from_vec(controller.u_max.clone()),
        )?;
        let observer = ObserverCoeffs::new(
            matrix("Q", &observer.q)?,
            matrix("R", &observer.r)?,
            matrix("P_ss", &observer.p_steady)?,
        )?;
        let lp = PeriodVariantLoop::new(plant, controller, observer)?
            .with_nominal_period(self.period_s)?;

        let r = if reference.is_empty() {
            DVector::zeros(dims.states)
        } else if reference.len() == dims.states {
            DVector::from_vec(reference.clone())
        } else {
            return Err(CliError::Config(format!(
                "reference has {} entries, plant has {} states",
                reference.len(),
                dims.states
            )));
        };
        Ok((lp, r))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PID_FILE: &str = r#"
period_s: 0.01
duration_s: 1.0
loop:
  type: pid
  kp: 2.0
  ki: 0.5
  range: [-12.0, 12.0]
plant:
  type: first_order
  tau: 0.2
  gain: 1.0
profile:
  goal: 1.0
  max_velocity: 2.0
  time_to_max_velocity: 0.5
"#;

    const SS_FILE: &str = r#"
period_s: 0.005
duration_s: 2.0
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
  reference: [1.0]
plant:
  type: state_space
  a: [[-1.0]]
  b: [[1.0]]
  c: [[1.0]]
  d: [[0.0]]
"#;

    #[test]
    fn parses_pid_file_with_defaults() {
        let file = parse_loop_file(PID_FILE).unwrap();
        file.validate().unwrap();
        let setup = file.pid_setup().unwrap();
        assert_eq!(setup.gains, PidGains::new(2.0, 0.5, 0.0));
        assert_eq!(setup.range, (-12.0, 12.0));
        assert_eq!(setup.continuous, None);
        assert_eq!(file.ticks(), 100);
        assert!(file.profile.is_some());
    }

    #[test]
    fn parses_state_space_file() {
        let file = parse_loop_file(SS_FILE).unwrap();
        file.validate().unwrap();
        let (lp, r) = file.state_space_loop().unwrap();
        assert_eq!(lp.dims().states, 1);
        assert_eq!(r[0], 1.0);
    }

    #[test]
    fn ragged_matrix_rejected() {
        let err = matrix("A", &[vec![1.0, 2.0], vec![3.0]]).unwrap_err();
        assert!(matches!(err, CliError::Config(_)));
    }

    #[test]
    fn dimension_mismatch_surfaces_before_running() {
        let file = parse_loop_file(&SS_FILE.replace("k: [[5.0]]", "k: [[5.0, 1.0]]")).unwrap();
        assert!(matches!(
            file.validate(),
            Err(CliError::StateSpace(_))
        ));
    }

    #[test]
    fn pid_against_mimo_plant_rejected() {
        let file = parse_loop_file(
            r#"
period_s: 0.01
duration_s: 1.0
loop: { type: pid, kp: 1.0 }
plant:
  type: state_space
  a: [[0.0, 0.0], [0.0, 0.0]]
  b: [[1.0, 0.0], [0.0, 1.0]]
  c: [[1.0, 0.0], [0.0, 1.0]]
  d: [[0.0, 0.0], [0.0, 0.0]]
"#,
        )
        .unwrap();
        assert!(matches!(file.validate(), Err(CliError::Config(_))));
    }

    #[test]
    fn bad_timing_rejected() {
        let file = parse_loop_file(&PID_FILE.replace("period_s: 0.01", "period_s: 0.0")).unwrap();
        assert!(file.validate().is_err());
        let file =
            parse_loop_file(&PID_FILE.replace("duration_s: 1.0", "duration_s: 0.001")).unwrap();
        assert!(file.validate().is_err());
        let file =
            parse_loop_file(&PID_FILE.replace("duration_s: 1.0", "duration_s: 1.0e9")).unwrap();
        assert!(matches!(file.validate(), Err(CliError::Config(_))));
    }

    #[test]
    fn first_order_plant_checked() {
        let file = parse_loop_file(&PID_FILE.replace("tau: 0.2", "tau: 0.0")).unwrap();
        assert!(matches!(file.validate(), Err(CliError::Config(_))));
    }

    #[test]
    fn unknown_loop_type_is_parse_error() {
        let err = parse_loop_file(&PID_FILE.replace("type: pid", "type: bang_bang")).unwrap_err();
        assert!(matches!(err, CliError::Parse(_)));
    }
}

//! Message payloads for running the beam model behind a process or network boundary.
//!
//! A [`Request`] carries everything needed for one evaluation, and [`handle`] turns it into a
//! [`Response`] without touching any shared state. Two encodings are supported:
//!
//! - JSON, via `serde_json`.
//! - A plain-text list of assignments, one `key = value` per line, where values are numbers,
//!   bare words or bracketed arrays of numbers. An array may also be wrapped as
//!   `np.array([...])`:
//!
//! ```text
//! command = solve
//! num_elements = 2
//! E = 1
//! L = 1
//! b = 0.1
//! tip_load = -1
//! h = [1, 0.5]
//! ```
use crate::config::{BeamConfig, Load};
use crate::error::BeamError;
use crate::model::BeamModel;
use eyre::{eyre, WrapErr};
use itertools::Itertools;
use log::info;
use nalgebra::DVectorView;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::Display;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Request {
    /// Solve the state equation and evaluate compliance and volume.
    Solve { config: BeamConfig<f64>, h: Vec<f64> },
    /// Evaluate the residuals of a proposed state and proposed outputs.
    Apply {
        config: BeamConfig<f64>,
        h: Vec<f64>,
        u: Vec<f64>,
        compliance: f64,
        volume: f64,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Response {
    Solved {
        u: Vec<f64>,
        compliance: f64,
        volume: f64,
    },
    Applied {
        u_residuals: Vec<f64>,
        compliance_residual: f64,
        volume_residual: f64,
    },
}

/// Evaluates a single request.
pub fn handle(request: &Request) -> Result<Response, BeamError> {
    match request {
        Request::Solve { config, h } => {
            info!("Handling solve request with {} elements", config.num_elements);
            check_request_shape(config, h, None)?;
            let model = BeamModel::new(config.clone())?;
            let evaluation = model.evaluate_at(DVectorView::from_slice(h, h.len()))?;
            Ok(Response::Solved {
                u: evaluation.state().as_slice().to_vec(),
                compliance: evaluation.compliance(),
                volume: evaluation.volume(),
            })
        }
        Request::Apply {
            config,
            h,
            u,
            compliance,
            volume,
        } => {
            info!("Handling apply request with {} elements", config.num_elements);
            check_request_shape(config, h, Some(u.as_slice()))?;
            let model = BeamModel::new(config.clone())?;
            let heights = DVectorView::from_slice(h, h.len());
            let u_residuals = model.apply_residual(heights, DVectorView::from_slice(u, u.len()))?;
            let num_physical = config.num_physical_dofs();
            let displacements = DVectorView::from_slice(&u[..num_physical], num_physical);
            Ok(Response::Applied {
                u_residuals: u_residuals.as_slice().to_vec(),
                compliance_residual: compliance - model.compliance().compute(displacements),
                volume_residual: volume - model.volume().compute(heights),
            })
        }
    }
}

/// Checks the vector lengths of a request before any storage is sized from `num_elements`.
fn check_request_shape(config: &BeamConfig<f64>, h: &[f64], u: Option<&[f64]>) -> Result<(), BeamError> {
    BeamError::check_len("height vector", config.num_elements, h.len())?;
    config.validate()?;
    if let Some(u) = u {
        BeamError::check_len("state vector", config.system_dim(), u.len())?;
    }
    Ok(())
}

/// Decodes a JSON request, handles it and encodes the response as JSON.
pub fn handle_json(input: &str) -> eyre::Result<String> {
    let request: Request = serde_json::from_str(input).wrap_err("Failed to decode JSON request")?;
    let response = handle(&request)?;
    Ok(serde_json::to_string(&response)?)
}

/// Decodes a request in assignment format, handles it and encodes the response the same way.
pub fn handle_assignments(input: &str) -> eyre::Result<String> {
    let assignments = Assignments::parse(input)?;
    let request = Request::from_assignments(&assignments)?;
    let response = handle(&request)?;
    Ok(response.to_assignments().to_string())
}

/// The right-hand side of an assignment.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Number(f64),
    Array(Vec<f64>),
    Word(String),
}

impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(x) => write!(f, "{}", x),
            Value::Array(values) => write!(f, "[{}]", values.iter().join(", ")),
            Value::Word(word) => write!(f, "{}", word),
        }
    }
}

/// An ordered list of `key = value` assignments with unique keys.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Assignments {
    entries: Vec<(String, Value)>,
}

impl Assignments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses assignments, one per line. Blank lines and lines starting with `#` are ignored.
    pub fn parse(text: &str) -> eyre::Result<Self> {
        let mut assignments = Self::new();
        for (line_index, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let line_number = line_index + 1;
            let (key, value) = line
                .split_once('=')
                .ok_or_else(|| eyre!("Line {}: expected `key = value`, got {:?}", line_number, line))?;
            let key = key.trim();
            if key.is_empty() || key.contains(char::is_whitespace) {
                return Err(eyre!("Line {}: invalid key {:?}", line_number, key));
            }
            let value = parse_value(value.trim()).wrap_err_with(|| format!("Line {}: invalid value", line_number))?;
            if assignments.get(key).is_some() {
                return Err(eyre!("Line {}: duplicate key {:?}", line_number, key));
            }
            assignments.insert(key, value);
        }
        Ok(assignments)
    }

    /// Inserts or replaces an assignment.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn require(&self, key: &str) -> eyre::Result<&Value> {
        self.get(key).ok_or_else(|| eyre!("Missing assignment for {:?}", key))
    }

    pub fn number(&self, key: &str) -> eyre::Result<f64> {
        match self.require(key)? {
            Value::Number(x) => Ok(*x),
            other => Err(eyre!("Expected {:?} to be a number, got {}", key, other)),
        }
    }

    /// Reads the number stored under `key`, falling back to `alias` if `key` is absent.
    pub fn number_or_alias(&self, key: &str, alias: &str) -> eyre::Result<f64> {
        match self.get(key) {
            Some(_) => self.number(key),
            None if self.get(alias).is_some() => self.number(alias),
            None => self.number(key),
        }
    }

    pub fn count(&self, key: &str) -> eyre::Result<usize> {
        let x = self.number(key)?;
        if x >= 0.0 && x.fract() == 0.0 && x <= usize::MAX as f64 {
            Ok(x as usize)
        } else {
            Err(eyre!("Expected {:?} to be a non-negative integer, got {}", key, x))
        }
    }

    pub fn array(&self, key: &str) -> eyre::Result<Vec<f64>> {
        match self.require(key)? {
            Value::Array(values) => Ok(values.clone()),
            other => Err(eyre!("Expected {:?} to be an array, got {}", key, other)),
        }
    }

    pub fn word(&self, key: &str) -> eyre::Result<&str> {
        match self.require(key)? {
            Value::Word(word) => Ok(word),
            other => Err(eyre!("Expected {:?} to be a word, got {}", key, other)),
        }
    }
}

impl Display for Assignments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines = self
            .entries
            .iter()
            .map(|(key, value)| format!("{} = {}", key, value));
        write!(f, "{}", lines.format("\n"))
    }
}

fn parse_value(text: &str) -> eyre::Result<Value> {
    // Arrays written as `np.array([...])` by Python front ends
    if let Some(wrapped) = text
        .strip_prefix("np.array(")
        .or_else(|| text.strip_prefix("array("))
    {
        let inner = wrapped
            .strip_suffix(')')
            .ok_or_else(|| eyre!("Unterminated array {:?}", text))?
            .trim();
        return match parse_value(inner)? {
            Value::Array(values) => Ok(Value::Array(values)),
            _ => Err(eyre!("Expected a bracketed array inside {:?}", text)),
        };
    }

    if let Some(inner) = text.strip_prefix('[') {
        let inner = inner
            .strip_suffix(']')
            .ok_or_else(|| eyre!("Unterminated array {:?}", text))?;
        let values = inner
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(|entry| {
                entry
                    .parse::<f64>()
                    .wrap_err_with(|| format!("Invalid array entry {:?}", entry))
            })
            .collect::<eyre::Result<Vec<_>>>()?;
        Ok(Value::Array(values))
    } else if let Ok(x) = text.parse::<f64>() {
        Ok(Value::Number(x))
    } else if !text.is_empty() && text.chars().all(|c| c.is_alphanumeric() || c == '_') {
        Ok(Value::Word(text.to_string()))
    } else {
        Err(eyre!("Cannot interpret {:?} as a number, array or word", text))
    }
}

fn config_to_assignments(config: &BeamConfig<f64>, assignments: &mut Assignments) {
    assignments.insert("num_elements", Value::Number(config.num_elements as f64));
    assignments.insert("E", Value::Number(config.youngs_modulus));
    assignments.insert("L", Value::Number(config.length));
    assignments.insert("b", Value::Number(config.width));
    match &config.load {
        Load::Tip { magnitude } => assignments.insert("tip_load", Value::Number(*magnitude)),
        Load::Nodal(values) => assignments.insert("load", Value::Array(values.clone())),
    }
}

fn config_from_assignments(assignments: &Assignments) -> eyre::Result<BeamConfig<f64>> {
    let config = BeamConfig::cantilever(
        assignments.count("num_elements")?,
        assignments.number("E")?,
        assignments.number("L")?,
        assignments.number("b")?,
    );
    let load = match (assignments.get("tip_load"), assignments.get("load")) {
        (Some(_), Some(_)) => return Err(eyre!("Only one of `tip_load` and `load` may be given")),
        (Some(_), None) => Load::Tip {
            magnitude: assignments.number("tip_load")?,
        },
        (None, Some(_)) => Load::Nodal(assignments.array("load")?),
        (None, None) => config.load.clone(),
    };
    Ok(config.with_load(load))
}

impl Request {
    pub fn to_assignments(&self) -> Assignments {
        let mut assignments = Assignments::new();
        match self {
            Request::Solve { config, h } => {
                assignments.insert("command", Value::Word("solve".to_string()));
                config_to_assignments(config, &mut assignments);
                assignments.insert("h", Value::Array(h.clone()));
            }
            Request::Apply {
                config,
                h,
                u,
                compliance,
                volume,
            } => {
                assignments.insert("command", Value::Word("apply".to_string()));
                config_to_assignments(config, &mut assignments);
                assignments.insert("h", Value::Array(h.clone()));
                assignments.insert("u", Value::Array(u.clone()));
                assignments.insert("compliance", Value::Number(*compliance));
                assignments.insert("volume", Value::Number(*volume));
            }
        }
        assignments
    }

    /// Reads a request. A missing `command` means `solve`.
    pub fn from_assignments(assignments: &Assignments) -> eyre::Result<Self> {
        let command = match assignments.get("command") {
            Some(_) => assignments.word("command")?,
            None => "solve",
        };
        let config = config_from_assignments(assignments)?;
        let h = assignments.array("h")?;
        match command {
            "solve" => Ok(Request::Solve { config, h }),
            "apply" => Ok(Request::Apply {
                config,
                h,
                u: assignments.array("u")?,
                compliance: assignments.number("compliance")?,
                volume: assignments.number("volume")?,
            }),
            other => Err(eyre!("Unknown command {:?}", other)),
        }
    }
}

impl Response {
    pub fn to_assignments(&self) -> Assignments {
        let mut assignments = Assignments::new();
        match self {
            Response::Solved { u, compliance, volume } => {
                assignments.insert("u", Value::Array(u.clone()));
                assignments.insert("compliance", Value::Number(*compliance));
                assignments.insert("volume", Value::Number(*volume));
            }
            Response::Applied {
                u_residuals,
                compliance_residual,
                volume_residual,
            } => {
                assignments.insert("u_residuals", Value::Array(u_residuals.clone()));
                assignments.insert("compliance_residual", Value::Number(*compliance_residual));
                assignments.insert("volume_residual", Value::Number(*volume_residual));
            }
        }
        assignments
    }

    pub fn from_assignments(assignments: &Assignments) -> eyre::Result<Self> {
        if assignments.get("u_residuals").is_some() {
            Ok(Response::Applied {
                u_residuals: assignments.array("u_residuals")?,
                compliance_residual: assignments.number_or_alias("compliance_residual", "c_residual")?,
                volume_residual: assignments.number_or_alias("volume_residual", "v_residual")?,
            })
        } else {
            Ok(Response::Solved {
                u: assignments.array("u")?,
                compliance: assignments.number("compliance")?,
                volume: assignments.number("volume")?,
            })
        }
    }
}

//! Topology loading: connectivity, weight and threshold matrices.
//!
//! The three input files are plain text, one row per line, comma-separated.
//! Connectivity entries are integers in {-1, 0, 1}; weights and thresholds
//! are floats. Dimensions are fixed by the configured neuron count, and any
//! malformed field is a hard load error rather than a silent zero.

use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use std::fmt::Write as _;
use std::path::Path;

/// Static network wiring loaded at startup
#[derive(Debug, Clone)]
pub struct Topology {
    /// Connectivity matrix: 1 excitatory, -1 inhibitory, 0 absent
    pub connectivity: Array2<i8>,
    /// Initial synaptic weights
    pub weights: Array2<f32>,
    /// Per-neuron sigmoid thresholds
    pub thresholds: Array1<f32>,
}

impl Topology {
    /// Number of neurons
    pub fn len(&self) -> usize {
        self.thresholds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.thresholds.is_empty()
    }

    /// Load a topology from the three input files
    pub fn load<P: AsRef<Path>>(
        connectivity_path: P,
        weights_path: P,
        thresholds_path: P,
        n_neurons: usize,
    ) -> Result<Self, TopologyError> {
        let connectivity = load_connectivity(connectivity_path.as_ref(), n_neurons)?;
        let weights = load_matrix(weights_path.as_ref(), n_neurons)?;
        let thresholds = load_vector(thresholds_path.as_ref(), n_neurons)?;

        Ok(Self {
            connectivity,
            weights,
            thresholds,
        })
    }

    /// Generate a random sparse topology (benches, tests, demo files)
    pub fn generate(n_neurons: usize, connection_probability: f64, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        let connectivity = Array2::from_shape_fn((n_neurons, n_neurons), |(i, j)| {
            if i != j && rng.gen_bool(connection_probability) {
                // One in five generated connections is inhibitory
                if rng.gen_bool(0.2) {
                    -1
                } else {
                    1
                }
            } else {
                0
            }
        });

        let mut weights = Array2::zeros((n_neurons, n_neurons));
        for ((i, j), &c) in connectivity.indexed_iter() {
            if c != 0 {
                weights[[i, j]] = rng.gen_range(0.1..1.0);
            }
        }

        let thresholds = Array1::from_shape_fn(n_neurons, |_| rng.gen_range(0.2..0.8));

        Self {
            connectivity,
            weights,
            thresholds,
        }
    }

    /// Write the weight matrix in the comma-delimited input format,
    /// so a learned state can be fed back into a later run.
    pub fn save_weights<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        std::fs::write(path.as_ref(), matrix_to_csv(&self.weights))
    }

    /// Write the connectivity matrix in the input format
    pub fn save_connectivity<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let n = self.len();
        let mut out = String::new();
        for i in 0..n {
            for j in 0..n {
                if j > 0 {
                    out.push(',');
                }
                let _ = write!(out, "{}", self.connectivity[[i, j]]);
            }
            out.push('\n');
        }
        std::fs::write(path.as_ref(), out)
    }

    /// Write the threshold vector in the input format
    pub fn save_thresholds<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let mut out = String::new();
        for &t in self.thresholds.iter() {
            let _ = writeln!(out, "{}", t);
        }
        std::fs::write(path.as_ref(), out)
    }

    /// Count connections by kind: (excitatory, inhibitory)
    pub fn connection_counts(&self) -> (usize, usize) {
        let mut excitatory = 0;
        let mut inhibitory = 0;
        for &c in self.connectivity.iter() {
            match c {
                1 => excitatory += 1,
                -1 => inhibitory += 1,
                _ => {}
            }
        }
        (excitatory, inhibitory)
    }
}

fn matrix_to_csv(m: &Array2<f32>) -> String {
    let mut out = String::new();
    for row in m.rows() {
        for (j, v) in row.iter().enumerate() {
            if j > 0 {
                out.push(',');
            }
            let _ = write!(out, "{}", v);
        }
        out.push('\n');
    }
    out
}

fn load_connectivity(path: &Path, n: usize) -> Result<Array2<i8>, TopologyError> {
    let contents = std::fs::read_to_string(path).map_err(|e| TopologyError::Io {
        file: path.display().to_string(),
        source: e,
    })?;

    let mut matrix = Array2::zeros((n, n));
    let mut rows = 0usize;

    for (line_no, line) in non_empty_lines(&contents) {
        if rows >= n {
            return Err(dimension_error(path, n, rows + 1, "rows"));
        }
        let mut cols = 0usize;
        for (col_no, field) in line.split(',').enumerate() {
            if cols >= n {
                return Err(dimension_error(path, n, cols + 1, "columns"));
            }
            let value: i8 = field.trim().parse().map_err(|_| TopologyError::Parse {
                file: path.display().to_string(),
                line: line_no,
                column: col_no + 1,
                value: field.trim().to_string(),
            })?;
            if !matches!(value, -1 | 0 | 1) {
                return Err(TopologyError::Parse {
                    file: path.display().to_string(),
                    line: line_no,
                    column: col_no + 1,
                    value: field.trim().to_string(),
                });
            }
            matrix[[rows, cols]] = value;
            cols += 1;
        }
        if cols != n {
            return Err(dimension_error(path, n, cols, "columns"));
        }
        rows += 1;
    }
    if rows != n {
        return Err(dimension_error(path, n, rows, "rows"));
    }
    Ok(matrix)
}

fn load_matrix(path: &Path, n: usize) -> Result<Array2<f32>, TopologyError> {
    let contents = std::fs::read_to_string(path).map_err(|e| TopologyError::Io {
        file: path.display().to_string(),
        source: e,
    })?;

    let mut matrix = Array2::zeros((n, n));
    let mut rows = 0usize;

    for (line_no, line) in non_empty_lines(&contents) {
        if rows >= n {
            return Err(dimension_error(path, n, rows + 1, "rows"));
        }
        let mut cols = 0usize;
        for (col_no, field) in line.split(',').enumerate() {
            if cols >= n {
                return Err(dimension_error(path, n, cols + 1, "columns"));
            }
            let value: f32 = field.trim().parse().map_err(|_| TopologyError::Parse {
                file: path.display().to_string(),
                line: line_no,
                column: col_no + 1,
                value: field.trim().to_string(),
            })?;
            matrix[[rows, cols]] = value;
            cols += 1;
        }
        if cols != n {
            return Err(dimension_error(path, n, cols, "columns"));
        }
        rows += 1;
    }
    if rows != n {
        return Err(dimension_error(path, n, rows, "rows"));
    }
    Ok(matrix)
}

fn load_vector(path: &Path, n: usize) -> Result<Array1<f32>, TopologyError> {
    let contents = std::fs::read_to_string(path).map_err(|e| TopologyError::Io {
        file: path.display().to_string(),
        source: e,
    })?;

    let mut values = Vec::with_capacity(n);
    for (line_no, line) in non_empty_lines(&contents) {
        if values.len() >= n {
            return Err(dimension_error(path, n, values.len() + 1, "rows"));
        }
        // One threshold per row; trailing fields after the first are rejected
        let mut fields = line.split(',');
        let field = fields.next().unwrap_or("");
        let value: f32 = field.trim().parse().map_err(|_| TopologyError::Parse {
            file: path.display().to_string(),
            line: line_no,
            column: 1,
            value: field.trim().to_string(),
        })?;
        if fields.any(|f| !f.trim().is_empty()) {
            return Err(TopologyError::Parse {
                file: path.display().to_string(),
                line: line_no,
                column: 2,
                value: line.to_string(),
            });
        }
        values.push(value);
    }
    if values.len() != n {
        return Err(dimension_error(path, n, values.len(), "rows"));
    }
    Ok(Array1::from_vec(values))
}

fn non_empty_lines(contents: &str) -> impl Iterator<Item = (usize, &str)> {
    contents
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l))
        .filter(|(_, l)| !l.trim().is_empty())
}

fn dimension_error(path: &Path, expected: usize, found: usize, axis: &str) -> TopologyError {
    TopologyError::Dimension {
        file: path.display().to_string(),
        axis: axis.to_string(),
        expected,
        found,
    }
}

/// Errors raised while loading topology files
#[derive(Debug)]
pub enum TopologyError {
    Io {
        file: String,
        source: std::io::Error,
    },
    Parse {
        file: String,
        line: usize,
        column: usize,
        value: String,
    },
    Dimension {
        file: String,
        axis: String,
        expected: usize,
        found: usize,
    },
}

impl std::fmt::Display for TopologyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { file, source } => write!(f, "cannot read {}: {}", file, source),
            Self::Parse {
                file,
                line,
                column,
                value,
            } => write!(
                f,
                "{}:{}: invalid field '{}' at column {}",
                file, line, value, column
            ),
            Self::Dimension {
                file,
                axis,
                expected,
                found,
            } => write!(
                f,
                "{}: expected {} {}, found {}",
                file, expected, axis, found
            ),
        }
    }
}

impl std::error::Error for TopologyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

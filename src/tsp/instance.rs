//! TSPLIB instances and dense symmetric matrices.

use std::path::Path;

use crate::error::InstanceError;

/// A symmetric TSPLIB instance with `EUC_2D` edge weights.
#[derive(Debug, Clone, PartialEq)]
pub struct TspInstance {
    name: String,
    coordinates: Vec<(f64, f64)>,
}

impl TspInstance {
    /// Creates an instance from city coordinates.
    pub fn new(name: impl Into<String>, coordinates: Vec<(f64, f64)>) -> Self {
        Self {
            name: name.into(),
            coordinates,
        }
    }

    /// Reads and parses a TSPLIB file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, InstanceError> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Parses TSPLIB text.
    ///
    /// Header lines are `KEY : VALUE`; only `NAME`, `DIMENSION` and
    /// `EDGE_WEIGHT_TYPE` are interpreted. City lines follow
    /// `NODE_COORD_SECTION` as `index x y` and end at `EOF` or the end of
    /// the text.
    pub fn parse(text: &str) -> Result<Self, InstanceError> {
        let mut name = String::new();
        let mut dimension: Option<usize> = None;
        let mut coordinates = Vec::new();
        let mut in_coords = false;

        for (i, raw) in text.lines().enumerate() {
            let line_no = i + 1;
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            if line == "EOF" {
                break;
            }
            if in_coords {
                coordinates.push(parse_city(line, line_no)?);
                continue;
            }
            if line.starts_with("NODE_COORD_SECTION") {
                in_coords = true;
                continue;
            }

            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();
            match key.trim() {
                "NAME" => name = value.to_string(),
                "DIMENSION" => {
                    let n = value.parse().map_err(|_| InstanceError::Parse {
                        line: line_no,
                        message: format!("invalid dimension `{value}`"),
                    })?;
                    dimension = Some(n);
                }
                "EDGE_WEIGHT_TYPE" if value != "EUC_2D" => {
                    return Err(InstanceError::UnsupportedEdgeWeight(value.to_string()));
                }
                _ => {}
            }
        }

        if let Some(expected) = dimension {
            if expected != coordinates.len() {
                return Err(InstanceError::DimensionMismatch {
                    expected,
                    found: coordinates.len(),
                });
            }
        }
        Ok(Self { name, coordinates })
    }

    /// Instance name from the `NAME` header.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of cities.
    pub fn dimension(&self) -> usize {
        self.coordinates.len()
    }

    /// City coordinates in file order.
    pub fn coordinates(&self) -> &[(f64, f64)] {
        &self.coordinates
    }

    /// Rounded Euclidean distances, as TSPLIB defines `EUC_2D`.
    pub fn distance_matrix(&self) -> Matrix {
        let n = self.dimension();
        let mut m = Matrix::zeros(n);
        for i in 0..n {
            for j in (i + 1)..n {
                let (xi, yi) = self.coordinates[i];
                let (xj, yj) = self.coordinates[j];
                let d = ((xi - xj).powi(2) + (yi - yj).powi(2)).sqrt();
                m.set(i, j, (d + 0.5).floor());
            }
        }
        m
    }
}

fn parse_city(line: &str, line_no: usize) -> Result<(f64, f64), InstanceError> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    let [_, x, y] = fields.as_slice() else {
        return Err(InstanceError::Parse {
            line: line_no,
            message: format!("expected `index x y`, got `{line}`"),
        });
    };
    let coord = |s: &str| {
        s.parse::<f64>().map_err(|_| InstanceError::Parse {
            line: line_no,
            message: format!("invalid coordinate `{s}`"),
        })
    };
    Ok((coord(*x)?, coord(*y)?))
}

/// Dense symmetric matrix with a zero diagonal.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    n: usize,
    values: Vec<f64>,
}

impl Matrix {
    /// All-zero `n x n` matrix.
    pub fn zeros(n: usize) -> Self {
        Self {
            n,
            values: vec![0.0; n * n],
        }
    }

    /// Builds a matrix from square rows. Only the lower triangle is read.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self, InstanceError> {
        let n = rows.len();
        let mut m = Self::zeros(n);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != n {
                return Err(InstanceError::DimensionMismatch {
                    expected: n,
                    found: row.len(),
                });
            }
            for (j, &v) in row.iter().enumerate().take(i) {
                m.set(i, j, v);
            }
        }
        Ok(m)
    }

    /// Number of rows (and columns).
    pub fn dimension(&self) -> usize {
        self.n
    }

    /// Value at `(i, j)`.
    ///
    /// # Panics
    ///
    /// Panics if either index is out of range.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[i * self.n + j]
    }

    /// Sets `(i, j)` and `(j, i)`.
    ///
    /// # Panics
    ///
    /// Panics if either index is out of range.
    pub fn set(&mut self, i: usize, j: usize, value: f64) {
        self.values[i * self.n + j] = value;
        self.values[j * self.n + i] = value;
    }

    /// Length of the closed tour visiting `tour` in order.
    ///
    /// Indices must be in range.
    pub fn tour_length(&self, tour: &[usize]) -> f64 {
        match tour {
            [] | [_] => 0.0,
            [first, .., last] => {
                let open: f64 = tour.windows(2).map(|w| self.get(w[0], w[1])).sum();
                open + self.get(*last, *first)
            }
        }
    }
}

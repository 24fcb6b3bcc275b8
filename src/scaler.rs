//! Z-score standardization: `z = (x - mean) / std` per feature.
//!
//! Uses the population standard deviation (ddof = 0). Constant features get
//! a scale of 1.0 so they map to zero instead of dividing by zero.

use ndarray::{Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl StandardScaler {
    pub fn fit(x: ArrayView2<'_, f64>) -> Result<Self> {
        if x.nrows() == 0 {
            return Err(Error::Training("cannot fit StandardScaler on empty data".into()));
        }
        let mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| Error::Training("cannot fit StandardScaler on empty data".into()))?;
        let std = x.std_axis(Axis(0), 0.0);
        let scale = std.iter().map(|&s| if s == 0.0 { 1.0 } else { s }).collect();

        Ok(Self {
            mean: mean.to_vec(),
            scale,
        })
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    pub fn scale(&self) -> &[f64] {
        &self.scale
    }

    pub fn transform(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        if x.ncols() != self.n_features() {
            return Err(Error::Schema(format!(
                "feature length mismatch: got {}, expected {}",
                x.ncols(),
                self.n_features()
            )));
        }
        let mut out = x.to_owned();
        for (j, mut col) in out.axis_iter_mut(Axis(1)).enumerate() {
            let (m, s) = (self.mean[j], self.scale[j]);
            col.mapv_inplace(|v| (v - m) / s);
        }
        Ok(out)
    }
}

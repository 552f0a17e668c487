// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Confidence bounds for a distinct count sampled at rate theta.
//!
//! The retained count of a theta sketch is binomially distributed at rate
//! theta over the unknown number of distinct items. The bounds here apply the
//! Gaussian approximation on the log scale, which keeps both bounds positive
//! and properly nested across the standard-deviation levels. The zero-count
//! case is handled from the exact miss probability `(1 - theta)^n`.

use crate::common::NumStdDev;

// One-sided Gaussian tail probabilities for 1, 2 and 3 standard deviations.
const TAIL_PROBS: [f64; 3] = [0.158_655_253_9, 0.022_750_131_9, 0.001_349_898_0];

/// Returns the approximate lower bound on the number of distinct items.
///
/// The bound never exceeds the estimate and never drops below the retained
/// count (the true count is at least the number of retained entries).
pub fn lower_bound(num_retained: u64, theta: f64, num_std_dev: NumStdDev) -> f64 {
    if theta >= 1.0 {
        return num_retained as f64;
    }
    if num_retained == 0 {
        return 0.0;
    }
    let retained = num_retained as f64;
    let estimate = retained / theta;
    let kappa = f64::from(num_std_dev.as_u8());
    let relative_error = ((1.0 - theta) / retained).sqrt();
    (estimate * (-kappa * relative_error).exp()).max(retained)
}

/// Returns the approximate upper bound on the number of distinct items.
///
/// An empty sketch bounds to zero. A non-empty sketch that retained nothing
/// below theta is bounded by how many items could have been missed.
pub fn upper_bound(num_retained: u64, theta: f64, num_std_dev: NumStdDev, is_empty: bool) -> f64 {
    if theta >= 1.0 {
        return num_retained as f64;
    }
    if num_retained == 0 {
        if is_empty {
            return 0.0;
        }
        let tail = TAIL_PROBS[(num_std_dev.as_u8() - 1) as usize];
        return tail.ln() / (1.0 - theta).ln();
    }
    let retained = num_retained as f64;
    let estimate = retained / theta;
    let kappa = f64::from(num_std_dev.as_u8());
    let relative_error = ((1.0 - theta) / retained).sqrt();
    estimate * (kappa * relative_error).exp()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_when_theta_is_one() {
        assert_eq!(lower_bound(100, 1.0, NumStdDev::Two), 100.0);
        assert_eq!(upper_bound(100, 1.0, NumStdDev::Two, false), 100.0);
    }

    #[test]
    fn test_bounds_bracket_estimate() {
        let theta = 0.1;
        let retained = 1000u64;
        let estimate = retained as f64 / theta;
        for num_std_dev in [NumStdDev::One, NumStdDev::Two, NumStdDev::Three] {
            assert!(lower_bound(retained, theta, num_std_dev) <= estimate);
            assert!(upper_bound(retained, theta, num_std_dev, false) >= estimate);
        }
    }

    #[test]
    fn test_bounds_widen_with_std_dev() {
        let theta = 0.25;
        let retained = 500u64;
        let lb1 = lower_bound(retained, theta, NumStdDev::One);
        let lb2 = lower_bound(retained, theta, NumStdDev::Two);
        let lb3 = lower_bound(retained, theta, NumStdDev::Three);
        let ub1 = upper_bound(retained, theta, NumStdDev::One, false);
        let ub2 = upper_bound(retained, theta, NumStdDev::Two, false);
        let ub3 = upper_bound(retained, theta, NumStdDev::Three, false);
        assert!(lb3 < lb2 && lb2 < lb1);
        assert!(ub1 < ub2 && ub2 < ub3);
    }

    #[test]
    fn test_lower_bound_clamped_to_retained() {
        // With very few retained entries, the log-scale interval is wide; the
        // bound must still respect the observed count.
        assert!(lower_bound(1, 0.5, NumStdDev::Three) >= 1.0);
    }

    #[test]
    fn test_zero_retained() {
        assert_eq!(lower_bound(0, 0.5, NumStdDev::Two), 0.0);
        assert_eq!(upper_bound(0, 0.5, NumStdDev::Two, true), 0.0);

        // Non-empty with nothing retained: bounded by the miss probability.
        let ub2 = upper_bound(0, 0.5, NumStdDev::Two, false);
        assert!(ub2 > 0.0);
        let ub3 = upper_bound(0, 0.5, NumStdDev::Three, false);
        assert!(ub3 > ub2);
    }
}

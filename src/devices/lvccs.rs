//! Current-limited voltage-controlled current source.
//!
//! The output current follows a soft clamp:
//!
//! ```text
//! I(vi) = CURLIM * tanh(G * vi / CURLIM)
//! ```
//!
//! Linear with slope G near zero, saturating at +/-CURLIM. Each solver
//! iteration linearizes the clamp around the current input estimate and stamps
//! a Norton companion: conductance `beta = dI/dvi` plus an injected current
//! carrying the remainder.

use super::fourterm::ControlledSource;
use crate::netlist::{NetId, NetSet};

/// Knee of the clamp, in units of `G * vi / CURLIM`. Below it the input
/// estimate tracks the solver exactly.
const DAMPING_THRESHOLD: f64 = 0.5;

/// Maximum step of the input estimate per iteration, in volts.
const DAMPING_STEP: f64 = 0.2;

/// Voltage-controlled current source with a soft current limit.
#[derive(Debug, Clone)]
pub struct Lvccs {
    pub core: ControlledSource,
    /// Current limit CURLIM
    pub cur_limit: f64,
    /// Damped estimate of the differential input voltage
    filtered_vi: f64,
}

impl Lvccs {
    pub const DEFAULT_G: f64 = 1.0;
    pub const DEFAULT_RI: f64 = 1e9;
    pub const DEFAULT_CUR_LIMIT: f64 = 1000.0;

    /// Create a new LVCCS.
    pub fn new(name: String, g: f64, ri: f64, cur_limit: f64) -> Self {
        Self {
            core: ControlledSource::new(name, g, ri),
            cur_limit,
            filtered_vi: 0.0,
        }
    }

    /// Damped input estimate used by the last linearization.
    pub fn filtered_vi(&self) -> f64 {
        self.filtered_vi
    }

    pub fn reset(&mut self) {
        self.core.reset();
        self.filtered_vi = 0.0;
    }

    pub fn update(&self, nets: &mut NetSet) -> Option<NetId> {
        self.core.update(nets)
    }

    pub fn update_param(&mut self, nets: &mut NetSet) {
        self.core.update_param(nets);
    }

    /// Relinearize around the latest converged input voltage.
    ///
    /// Returns the gap between the clamp and the new companion at the actual
    /// input voltage, as a fraction of CURLIM. It only reaches zero once the
    /// damped estimate has caught up with the solver.
    pub fn update_terminals(&mut self, nets: &NetSet) -> f64 {
        let mult = self.core.mult();
        let scale = mult / self.cur_limit;
        let vi = self.core.input_voltage(nets);

        if (scale * vi).abs() > DAMPING_THRESHOLD {
            self.filtered_vi += DAMPING_STEP * ((vi - self.filtered_vi) / DAMPING_STEP).tanh();
        } else {
            self.filtered_vi = vi;
        }

        let x = (scale * self.filtered_vi).tanh();
        let beta = mult * (1.0 - x * x);
        let i = self.cur_limit * x - beta * self.filtered_vi;

        self.core.stamp_output(beta, i);

        ((self.cur_limit * (scale * vi).tanh() - (i + beta * vi)) / self.cur_limit).abs()
    }

    /// Output current of the clamp at the current estimate.
    pub fn output_current(&self) -> f64 {
        self.cur_limit * (self.core.mult() / self.cur_limit * self.filtered_vi).tanh()
    }

    /// Set a parameter. Returns false for unknown keys.
    pub fn set_param(&mut self, key: &str, value: f64) -> bool {
        if key.eq_ignore_ascii_case("CURLIM") {
            self.cur_limit = value;
            true
        } else {
            self.core.set_param(key, value)
        }
    }

    /// Read a parameter.
    pub fn param(&self, key: &str) -> Option<f64> {
        if key.eq_ignore_ascii_case("CURLIM") {
            Some(self.cur_limit)
        } else {
            self.core.param(key)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::fourterm::{IN, IP, ON, ON1, OP, OP1};
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    /// Input pair on two rails so the differential input is host-controlled.
    fn driven(g: f64, cur_limit: f64) -> (Lvccs, NetSet, NetId) {
        let mut nets = NetSet::new();
        let vin = nets.add_rail("VIN", 0.0).unwrap();
        let out = nets.add("out");
        let mut dev = Lvccs::new("L1".to_string(), g, 1e9, cur_limit);
        let block = dev.core.terminals_mut();
        block.attach(IP, vin);
        block.attach(IN, NetId::GROUND);
        block.attach(OP, out);
        block.attach(ON, NetId::GROUND);
        block.bind_late("L1").unwrap();
        dev.reset();
        (dev, nets, vin)
    }

    #[test]
    fn test_linear_region_tracks_exactly() {
        let (mut dev, mut nets, vin) = driven(1.0, 1.0);
        for vi in [-0.5, -0.3, 0.0, 0.123456, 0.5] {
            nets.set_rail_voltage(vin, vi);
            dev.update_terminals(&nets);
            assert_eq!(dev.filtered_vi(), vi);
        }
    }

    #[test]
    fn test_damped_region_never_overshoots() {
        let (mut dev, mut nets, vin) = driven(1.0, 1.0);
        let target = 3.0;
        nets.set_rail_voltage(vin, target);

        let mut last = dev.filtered_vi();
        for _ in 0..100 {
            dev.update_terminals(&nets);
            let now = dev.filtered_vi();
            assert!(now >= last - 1e-15);
            assert!(now <= target + 1e-15);
            assert!(now - last <= DAMPING_STEP + 1e-12);
            last = now;
        }
        assert_abs_diff_eq!(last, target, epsilon = 1e-9);
    }

    #[test]
    fn test_damped_region_from_above() {
        let (mut dev, mut nets, vin) = driven(1.0, 1.0);
        nets.set_rail_voltage(vin, 4.0);
        for _ in 0..100 {
            dev.update_terminals(&nets);
        }

        nets.set_rail_voltage(vin, -2.0);
        let mut last = dev.filtered_vi();
        for _ in 0..100 {
            dev.update_terminals(&nets);
            let now = dev.filtered_vi();
            assert!(now <= last + 1e-15);
            assert!(now >= -2.0 - 1e-15);
            last = now;
        }
    }

    #[test]
    fn test_saturation() {
        let cur_limit = 1e-3;
        let (mut dev, mut nets, vin) = driven(1.0, cur_limit);

        for (vi, sign) in [(50.0, 1.0), (-50.0, -1.0)] {
            nets.set_rail_voltage(vin, vi);
            for _ in 0..1000 {
                dev.update_terminals(&nets);
            }
            let op = dev.core.terminals().get(OP).stamp();
            assert_abs_diff_eq!(op.go, 0.0, epsilon = 1e-12);
            assert_abs_diff_eq!(op.idr, sign * cur_limit, epsilon = 1e-12);
            assert_abs_diff_eq!(dev.output_current(), sign * cur_limit, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_companion_stamps_mirror() {
        let (mut dev, mut nets, vin) = driven(2.0, 1.0);
        nets.set_rail_voltage(vin, 0.1);
        dev.update_terminals(&nets);

        let t = dev.core.terminals();
        let (op, op1) = (t.get(OP).stamp(), t.get(OP1).stamp());
        let (on, on1) = (t.get(ON).stamp(), t.get(ON1).stamp());
        assert_eq!(op1.go, -op.go);
        assert_eq!(on.go, -op.go);
        assert_eq!(on1.go, op.go);
        assert_eq!(on.idr, -op.idr);
        assert_eq!(op1.idr, 0.0);

        // Companion reproduces the clamp at the operating point.
        let total = op.go * 0.1 + op.idr;
        assert_abs_diff_eq!(total, (0.2f64).tanh(), epsilon = 1e-12);
    }

    #[test]
    fn test_residual_vanishes_once_caught_up() {
        let (mut dev, mut nets, vin) = driven(1.0, 10.0);
        nets.set_rail_voltage(vin, 0.4);
        assert_abs_diff_eq!(dev.update_terminals(&nets), 0.0, epsilon = 1e-15);

        nets.set_rail_voltage(vin, 50.0);
        assert!(dev.update_terminals(&nets) > 1.0);
        let mut residual = f64::INFINITY;
        for _ in 0..1000 {
            residual = dev.update_terminals(&nets);
        }
        assert_abs_diff_eq!(residual, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_residual_scales_with_current_limit() {
        // Same clamp shape at a millionth of the current
        let (mut big, mut big_nets, big_vin) = driven(1.0, 1.0);
        let (mut small, mut small_nets, small_vin) = driven(1e-6, 1e-6);
        big_nets.set_rail_voltage(big_vin, 3.0);
        small_nets.set_rail_voltage(small_vin, 3.0);

        for _ in 0..5 {
            let r_big = big.update_terminals(&big_nets);
            let r_small = small.update_terminals(&small_nets);
            assert_relative_eq!(r_small, r_big, max_relative = 1e-9);
        }
        assert!(small.update_terminals(&small_nets) > 1e-3);
    }

    #[test]
    fn test_reset_clears_estimate() {
        let (mut dev, mut nets, vin) = driven(1.0, 1.0);
        nets.set_rail_voltage(vin, 0.3);
        dev.update_terminals(&nets);
        dev.reset();
        assert_eq!(dev.filtered_vi(), 0.0);
        assert_eq!(dev.core.terminals().get(OP).stamp().go, 1.0);
    }
}

//! Main simulator interface.

use log::{debug, warn};

use crate::error::{FourtermError, Result};
use crate::netlist::{NetId, Netlist};

use super::mna::{MnaMatrix, RowMap};
use super::{
    NewtonRaphson, DEFAULT_GMIN, DEFAULT_MAX_ITERATIONS, DEFAULT_RESIDUAL_TOLERANCE,
    DEFAULT_TOLERANCE,
};

/// Configuration for the simulator.
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Maximum Newton-Raphson iterations for dynamic devices.
    pub max_iterations: usize,
    /// Convergence tolerance for Newton-Raphson (volts).
    pub tolerance: f64,
    /// Convergence tolerance on companion residuals, relative to each
    /// device's current limit.
    pub residual_tolerance: f64,
    /// Minimum conductance from every free net to ground (siemens).
    pub gmin: f64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            tolerance: DEFAULT_TOLERANCE,
            residual_tolerance: DEFAULT_RESIDUAL_TOLERANCE,
            gmin: DEFAULT_GMIN,
        }
    }
}

impl SimulatorConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum Newton-Raphson iterations.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the convergence tolerance (in volts).
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Set the relative companion residual tolerance.
    pub fn with_residual_tolerance(mut self, residual_tolerance: f64) -> Self {
        self.residual_tolerance = residual_tolerance;
        self
    }

    /// Set the minimum conductance.
    ///
    /// Keeps nets that only see controlled-source couplings solvable. Too
    /// large a value loads high-impedance nets visibly.
    pub fn with_gmin(mut self, gmin: f64) -> Self {
        self.gmin = gmin;
        self
    }
}

/// Drives a finalized netlist: device callbacks, solve scheduling, and the
/// solve itself.
///
/// A step runs in a fixed order: devices on changed rails are told to
/// `update`, then, only if some net was marked dirty, the system is solved
/// and every dirty flag cleared. A solve that runs out of iterations keeps
/// its dirty flags, so the next step picks up where it stopped.
#[derive(Debug)]
pub struct Simulator {
    netlist: Netlist,
    config: SimulatorConfig,
    matrix: MnaMatrix,
    rows: RowMap,
    newton: NewtonRaphson,
    /// Rails changed since the last step
    changed: Vec<NetId>,
    solve_count: usize,
    last_iterations: usize,
}

impl Simulator {
    /// Create a simulator with default configuration.
    pub fn new(netlist: Netlist) -> Self {
        Self::with_config(netlist, SimulatorConfig::default())
    }

    /// Create a simulator with custom configuration.
    pub fn with_config(netlist: Netlist, config: SimulatorConfig) -> Self {
        let rows = RowMap::new(&netlist);
        let matrix = MnaMatrix::new(rows.size());
        let newton = NewtonRaphson::with_config(
            config.max_iterations,
            config.tolerance,
            config.residual_tolerance,
            config.gmin,
        );
        Self {
            netlist,
            config,
            matrix,
            rows,
            newton,
            changed: Vec::new(),
            solve_count: 0,
            last_iterations: 0,
        }
    }

    /// The simulated netlist.
    pub fn netlist(&self) -> &Netlist {
        &self.netlist
    }

    /// The simulated netlist, mutable.
    ///
    /// Callbacks invoked through it (`update`, `update_param`) only mark nets
    /// dirty; the next [`Simulator::step`] performs the solve.
    pub fn netlist_mut(&mut self) -> &mut Netlist {
        &mut self.netlist
    }

    /// Active configuration.
    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Reset every device from its parameters and solve from scratch.
    pub fn reset(&mut self) -> Result<()> {
        self.netlist.reset_devices();
        self.netlist.update_all();
        self.changed.clear();
        self.run_solve()?;
        debug!("simulator reset: {} free nets", self.rows.size());
        Ok(())
    }

    /// Drive a rail to a new voltage. Takes effect at the next step.
    pub fn set_rail(&mut self, name: &str, voltage: f64) -> Result<()> {
        let nets = self.netlist.nets_mut();
        let id = nets.find(name).ok_or_else(|| FourtermError::NetNotFound {
            net: name.to_string(),
        })?;
        if id.is_ground() {
            return Err(FourtermError::InvalidTopology {
                message: "Ground is fixed at 0 V".to_string(),
            });
        }
        if nets.voltage(id) == voltage {
            return Ok(());
        }
        if !nets.set_rail_voltage(id, voltage) {
            return Err(FourtermError::InvalidTopology {
                message: format!("Net '{}' is not a rail", name),
            });
        }
        if !self.changed.contains(&id) {
            self.changed.push(id);
        }
        Ok(())
    }

    /// Change a device parameter; the device requests its own re-solve.
    pub fn set_param(&mut self, device: &str, key: &str, value: f64) -> Result<()> {
        self.netlist.set_param(device, key, value)
    }

    /// Advance one step.
    ///
    /// Returns true if a solve ran.
    pub fn step(&mut self) -> Result<bool> {
        if !self.changed.is_empty() {
            let changed = std::mem::take(&mut self.changed);
            self.netlist.update_touching(&changed);
        }

        if !self.netlist.nets().has_dirty() {
            return Ok(false);
        }

        self.run_solve()?;
        Ok(true)
    }

    fn run_solve(&mut self) -> Result<()> {
        let result = self
            .newton
            .solve(&mut self.netlist, &self.rows, &mut self.matrix);
        match result {
            Ok(iterations) => {
                self.netlist.nets_mut().clear_dirty();
                self.last_iterations = iterations;
                self.solve_count += 1;
                Ok(())
            }
            Err(e @ FourtermError::ConvergenceFailure { .. }) => {
                warn!("solve left pending: {}", e);
                Err(e)
            }
            Err(e) => {
                self.netlist.nets_mut().clear_dirty();
                Err(e)
            }
        }
    }

    /// Voltage of a net by name.
    pub fn net_voltage(&self, name: &str) -> Option<f64> {
        self.netlist.net_voltage(name)
    }

    /// Number of solves run so far.
    pub fn solve_count(&self) -> usize {
        self.solve_count
    }

    /// Iterations used by the last solve.
    pub fn last_iterations(&self) -> usize {
        self.last_iterations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::{Cccs, Device, Lvccs, Resistor, Vccs, Vcvs};
    use crate::netlist::NetlistBuilder;
    use approx::assert_relative_eq;

    fn add(b: &mut NetlistBuilder, device: Device, nets: &[(&str, NetId)]) {
        let id = b.add_device(device).unwrap();
        for (terminal, net) in nets {
            b.connect(id, terminal, *net).unwrap();
        }
    }

    fn resistor(b: &mut NetlistBuilder, name: &str, r: f64, p: NetId, n: NetId) {
        add(
            b,
            Device::Resistor(Resistor::new(name.into(), r)),
            &[("P", p), ("N", n)],
        );
    }

    fn source(b: &mut NetlistBuilder, device: Device, ip: NetId, out: NetId) {
        add(
            b,
            device,
            &[
                ("IP", ip),
                ("IN", NetId::GROUND),
                ("OP", out),
                ("ON", NetId::GROUND),
            ],
        );
    }

    fn vcvs_sim(load: Option<f64>) -> Simulator {
        let mut b = NetlistBuilder::new();
        let vin = b.add_rail("VIN", 0.5).unwrap();
        let out = b.add_net("OUT");
        source(&mut b, Device::Vcvs(Vcvs::new("E1".into(), 10.0, 1e9, 2.0)), vin, out);
        if let Some(r) = load {
            resistor(&mut b, "RL", r, out, NetId::GROUND);
        }
        let mut sim = Simulator::new(b.finalize().unwrap());
        sim.reset().unwrap();
        sim
    }

    #[test]
    fn test_vcvs_open_circuit() {
        let sim = vcvs_sim(None);
        assert_relative_eq!(sim.net_voltage("OUT").unwrap(), 5.0, max_relative = 1e-9);
    }

    #[test]
    fn test_vcvs_loaded_divides_by_ro() {
        let sim = vcvs_sim(Some(8.0));
        // 5 V * 8 / (8 + 2)
        assert_relative_eq!(sim.net_voltage("OUT").unwrap(), 4.0, max_relative = 1e-9);
    }

    #[test]
    fn test_vccs_drives_load() {
        let mut b = NetlistBuilder::new();
        let vin = b.add_rail("VIN", 0.2).unwrap();
        let out = b.add_net("OUT");
        source(&mut b, Device::Vccs(Vccs::new("G1".into(), 1e-3, 1e9)), vin, out);
        resistor(&mut b, "RL", 1e3, out, NetId::GROUND);
        let mut sim = Simulator::new(b.finalize().unwrap());
        sim.reset().unwrap();
        assert_relative_eq!(sim.net_voltage("OUT").unwrap(), 0.2, max_relative = 1e-9);
    }

    #[test]
    fn test_cccs_mirrors_sense_current() {
        let mut b = NetlistBuilder::new();
        let vin = b.add_rail("VIN", 1.0).unwrap();
        let sense = b.add_net("S");
        let out = b.add_net("OUT");
        // 1 V across 9 + 1 ohm: 100 mA through the sense input
        resistor(&mut b, "RS", 9.0, vin, sense);
        source(&mut b, Device::Cccs(Cccs::new("F1".into(), 2.0, 1.0)), sense, out);
        resistor(&mut b, "RL", 10.0, out, NetId::GROUND);
        let mut sim = Simulator::new(b.finalize().unwrap());
        sim.reset().unwrap();

        assert_relative_eq!(sim.net_voltage("S").unwrap(), 0.1, max_relative = 1e-9);
        assert_relative_eq!(sim.net_voltage("OUT").unwrap(), 2.0, max_relative = 1e-9);
    }

    #[test]
    fn test_lvccs_saturates_at_current_limit() {
        let mut b = NetlistBuilder::new();
        let vin = b.add_rail("VIN", 50.0).unwrap();
        let out = b.add_net("OUT");
        source(
            &mut b,
            Device::Lvccs(Lvccs::new("L1".into(), 1.0, 1e9, 1e-3)),
            vin,
            out,
        );
        resistor(&mut b, "RL", 1e3, out, NetId::GROUND);
        let mut sim = Simulator::new(b.finalize().unwrap());
        sim.reset().unwrap();

        // 1 mA limit into 1k
        assert_relative_eq!(sim.net_voltage("OUT").unwrap(), 1.0, max_relative = 1e-6);

        sim.set_rail("VIN", -50.0).unwrap();
        assert!(sim.step().unwrap());
        assert_relative_eq!(sim.net_voltage("OUT").unwrap(), -1.0, max_relative = 1e-6);
    }

    #[test]
    fn test_lvccs_linear_region_matches_vccs() {
        let mut b = NetlistBuilder::new();
        let vin = b.add_rail("VIN", 0.1).unwrap();
        let out = b.add_net("OUT");
        source(
            &mut b,
            Device::Lvccs(Lvccs::new("L1".into(), 1e-3, 1e9, 1.0)),
            vin,
            out,
        );
        resistor(&mut b, "RL", 1e3, out, NetId::GROUND);
        let mut sim = Simulator::new(b.finalize().unwrap());
        sim.reset().unwrap();
        // tanh(1e-4) differs from its argument by ~3e-9 relative
        assert_relative_eq!(sim.net_voltage("OUT").unwrap(), 0.1, max_relative = 1e-6);
    }

    #[test]
    fn test_convergence_failure_reported() {
        let mut b = NetlistBuilder::new();
        let vin = b.add_rail("VIN", 50.0).unwrap();
        let out = b.add_net("OUT");
        // Deep in the damped region but short of saturation
        source(
            &mut b,
            Device::Lvccs(Lvccs::new("L1".into(), 1.0, 1e9, 10.0)),
            vin,
            out,
        );
        resistor(&mut b, "RL", 1.0, out, NetId::GROUND);
        let config = SimulatorConfig::new().with_max_iterations(3);
        let mut sim = Simulator::with_config(b.finalize().unwrap(), config);
        assert!(matches!(
            sim.reset(),
            Err(FourtermError::ConvergenceFailure { iterations: 3, .. })
        ));
        assert!(sim.netlist().nets().has_dirty());
        assert_eq!(sim.solve_count(), 0);

        // The next step retries from the damped estimate instead of idling
        assert!(matches!(
            sim.step(),
            Err(FourtermError::ConvergenceFailure { .. })
        ));
        assert!(sim.netlist().nets().has_dirty());
    }

    fn limiter_sim(g: f64, cur_limit: f64, vin: f64, load: f64) -> Simulator {
        let mut b = NetlistBuilder::new();
        let rail = b.add_rail("VIN", vin).unwrap();
        let out = b.add_net("OUT");
        source(
            &mut b,
            Device::Lvccs(Lvccs::new("L1".into(), g, 1e9, cur_limit)),
            rail,
            out,
        );
        resistor(&mut b, "RL", load, out, NetId::GROUND);
        Simulator::new(b.finalize().unwrap())
    }

    #[test]
    fn test_lvccs_small_current_respects_clamp() {
        // Voltage steps stay far below the tolerance the whole time
        let mut sim = limiter_sim(1e-6, 1e-6, 3.0, 1.0);
        sim.reset().unwrap();

        let expected = 1e-6 * (3.0f64).tanh() * 1.0;
        assert_relative_eq!(sim.net_voltage("OUT").unwrap(), expected, max_relative = 1e-5);
        assert!(sim.last_iterations() > 10);
    }

    #[test]
    fn test_lvccs_large_input_finishes_on_next_step() {
        let mut sim = limiter_sim(1.0, 10.0, 50.0, 1.0);
        assert!(matches!(
            sim.reset(),
            Err(FourtermError::ConvergenceFailure { iterations: 200, .. })
        ));

        assert!(sim.step().unwrap());
        assert_eq!(sim.solve_count(), 1);
        assert!(!sim.netlist().nets().has_dirty());
        let expected = 10.0 * (5.0f64).tanh() * 1.0;
        assert_relative_eq!(sim.net_voltage("OUT").unwrap(), expected, max_relative = 1e-5);
        assert!(sim.net_voltage("OUT").unwrap() < 10.0);

        assert!(!sim.step().unwrap());
    }

    #[test]
    fn test_repeated_updates_solve_once() {
        let mut sim = vcvs_sim(Some(8.0));
        assert_eq!(sim.solve_count(), 1);

        let id = sim.netlist().find_device("E1").unwrap();
        for _ in 0..2 {
            let netlist = sim.netlist_mut();
            let device = netlist.device(id).unwrap().clone();
            device.update(netlist.nets_mut());
        }
        assert!(sim.step().unwrap());
        assert!(!sim.step().unwrap());
        assert_eq!(sim.solve_count(), 2);
    }

    #[test]
    fn test_unchanged_rail_skips_solve() {
        let mut sim = vcvs_sim(Some(8.0));
        sim.set_rail("VIN", 0.5).unwrap();
        assert!(!sim.step().unwrap());
        assert_eq!(sim.solve_count(), 1);

        sim.set_rail("VIN", 1.0).unwrap();
        assert!(sim.step().unwrap());
        assert_relative_eq!(sim.net_voltage("OUT").unwrap(), 8.0, max_relative = 1e-9);
    }

    #[test]
    fn test_set_rail_rejects_free_nets_and_ground() {
        let mut sim = vcvs_sim(None);
        assert!(sim.set_rail("OUT", 1.0).is_err());
        assert!(sim.set_rail("GND", 1.0).is_err());
        assert!(matches!(
            sim.set_rail("NOPE", 1.0),
            Err(FourtermError::NetNotFound { .. })
        ));
    }

    #[test]
    fn test_set_param_triggers_solve() {
        let mut sim = vcvs_sim(None);
        sim.set_param("E1", "G", 2.0).unwrap();
        assert!(sim.step().unwrap());
        assert_relative_eq!(sim.net_voltage("OUT").unwrap(), 1.0, max_relative = 1e-9);
    }

    #[test]
    fn test_all_rail_device_never_schedules() {
        let mut b = NetlistBuilder::new();
        let a = b.add_rail("A", 1.0).unwrap();
        let c = b.add_rail("C", 2.0).unwrap();
        add(
            &mut b,
            Device::Vccs(Vccs::new("G1".into(), 1.0, 1e9)),
            &[("IP", a), ("IN", c), ("OP", a), ("ON", NetId::GROUND)],
        );
        let mut sim = Simulator::new(b.finalize().unwrap());
        sim.reset().unwrap();
        sim.set_rail("A", 3.0).unwrap();
        assert!(!sim.step().unwrap());
        assert_eq!(sim.solve_count(), 1);
    }
}

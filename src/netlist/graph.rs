//! Netlist graph structure and its two-phase construction.
//!
//! Construction happens in two phases. [`NetlistBuilder`] collects nets,
//! devices and terminal connections while topology is still incomplete.
//! [`NetlistBuilder::finalize`] then binds every device's late connections,
//! now that all nets exist, and yields an immutable-topology [`Netlist`].

use std::collections::HashMap;

use log::{debug, info};

use super::net::NetSet;
use super::types::{DeviceId, NetId, TerminalRef};
use crate::devices::{registry, Device};
use crate::dsl::NetlistAst;
use crate::error::{FourtermError, Result};

/// Netlist under construction.
#[derive(Debug, Default)]
pub struct NetlistBuilder {
    nets: NetSet,
    devices: Vec<Device>,
    device_map: HashMap<String, DeviceId>,
    probes: Vec<NetId>,
}

impl NetlistBuilder {
    /// Create an empty builder holding only the ground rail.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a parsed netlist description.
    pub fn from_ast(ast: &NetlistAst) -> Result<Self> {
        let mut builder = Self::new();

        for rail in &ast.rails {
            builder.add_rail(&rail.name, rail.voltage)?;
        }

        for def in &ast.devices {
            let entry = registry::lookup(&def.device_type).ok_or_else(|| {
                FourtermError::UnknownDeviceType {
                    device_type: def.device_type.clone(),
                    line: def.line,
                }
            })?;

            if def.nets.len() != entry.terminals.len() {
                return Err(FourtermError::invalid_device(
                    &def.name,
                    def.line,
                    format!(
                        "{} expects {} nets, got {}",
                        entry.keyword,
                        entry.terminals.len(),
                        def.nets.len()
                    ),
                ));
            }

            let mut device = entry.create(def.name.clone());
            if let Some(value) = def.value {
                let primary = entry.primary_param().ok_or_else(|| {
                    FourtermError::invalid_device(&def.name, def.line, "device takes no value")
                })?;
                device.set_param(primary, value)?;
            }
            for (key, value) in &def.params {
                device.set_param(key, *value)?;
            }

            let id = builder.add_device(device)?;
            for (terminal, net_name) in entry.terminals.iter().zip(&def.nets) {
                let net = builder.add_net(net_name);
                builder.connect(id, terminal, net)?;
            }
        }

        for probe in &ast.probes {
            builder.probe(probe)?;
        }

        Ok(builder)
    }

    /// Get or create a free net.
    pub fn add_net(&mut self, name: &str) -> NetId {
        self.nets.add(name)
    }

    /// Create a rail net at a fixed voltage.
    pub fn add_rail(&mut self, name: &str, voltage: f64) -> Result<NetId> {
        self.nets.add_rail(name, voltage)
    }

    /// Add a device. Names must be unique.
    pub fn add_device(&mut self, device: Device) -> Result<DeviceId> {
        if self.device_map.contains_key(device.name()) {
            return Err(FourtermError::DuplicateDevice {
                name: device.name().to_string(),
            });
        }
        let id = DeviceId(self.devices.len());
        self.device_map.insert(device.name().to_string(), id);
        self.devices.push(device);
        Ok(id)
    }

    /// Connect a device terminal, by name, to a net.
    ///
    /// Reconnecting a terminal moves it to the new net.
    pub fn connect(&mut self, device: DeviceId, terminal: &str, net: NetId) -> Result<()> {
        let dev = &mut self.devices[device.0];
        let slot = dev.terminals().slot_of(terminal).ok_or_else(|| {
            FourtermError::UnknownTerminal {
                device: dev.name().to_string(),
                terminal: terminal.to_string(),
            }
        })?;

        let tref = TerminalRef { device, slot };
        if let Some(old) = dev.terminals().get(slot).net() {
            self.nets.detach(old, tref);
        }
        dev.terminals_mut().attach(slot, net);
        self.nets.attach(net, tref);
        Ok(())
    }

    /// Mark a net for reporting.
    pub fn probe(&mut self, name: &str) -> Result<NetId> {
        let net = self.nets.find(name).ok_or_else(|| FourtermError::NetNotFound {
            net: name.to_string(),
        })?;
        if !self.probes.contains(&net) {
            self.probes.push(net);
        }
        Ok(net)
    }

    /// Find a device by name.
    pub fn find_device(&self, name: &str) -> Option<DeviceId> {
        self.device_map.get(name).copied()
    }

    /// Bind late connections of every device and freeze the topology.
    ///
    /// Fails if a device was already finalized, if a late connection has no
    /// net to join, or if any terminal is left unconnected.
    pub fn finalize(self) -> Result<Netlist> {
        let Self {
            mut nets,
            mut devices,
            device_map,
            probes,
        } = self;

        for (idx, device) in devices.iter_mut().enumerate() {
            let id = DeviceId(idx);
            let name = device.name().to_string();
            let attached = device.terminals_mut().bind_late(&name)?;
            for (slot, net) in attached {
                nets.attach(net, TerminalRef { device: id, slot });
            }
            device.check_topology();
            debug!("finalized {} '{}'", device.type_keyword(), name);
        }

        info!(
            "netlist finalized: {} nets, {} devices",
            nets.len(),
            devices.len()
        );

        Ok(Netlist {
            nets,
            devices: devices.into_iter().map(Some).collect(),
            device_map,
            probes,
        })
    }
}

/// A finalized netlist ready for simulation.
#[derive(Debug)]
pub struct Netlist {
    nets: NetSet,
    /// Removed devices leave a hole so ids stay stable
    devices: Vec<Option<Device>>,
    device_map: HashMap<String, DeviceId>,
    probes: Vec<NetId>,
}

impl Netlist {
    /// Parse-tree to finalized netlist in one go.
    pub fn from_ast(ast: &NetlistAst) -> Result<Self> {
        NetlistBuilder::from_ast(ast)?.finalize()
    }

    /// All nets.
    pub fn nets(&self) -> &NetSet {
        &self.nets
    }

    /// All nets, mutable (rail voltages, solver results).
    pub fn nets_mut(&mut self) -> &mut NetSet {
        &mut self.nets
    }

    /// Nets requested for reporting.
    pub fn probes(&self) -> &[NetId] {
        &self.probes
    }

    /// Get a live device by id.
    pub fn device(&self, id: DeviceId) -> Option<&Device> {
        self.devices.get(id.0).and_then(Option::as_ref)
    }

    /// Find a device by name.
    pub fn find_device(&self, name: &str) -> Option<DeviceId> {
        self.device_map.get(name).copied()
    }

    /// Iterate over live devices.
    pub fn devices(&self) -> impl Iterator<Item = (DeviceId, &Device)> {
        self.devices
            .iter()
            .enumerate()
            .filter_map(|(i, d)| d.as_ref().map(|d| (DeviceId(i), d)))
    }

    /// Number of live devices.
    pub fn device_count(&self) -> usize {
        self.devices.iter().flatten().count()
    }

    /// Check if any device needs relinearizing every solver iteration.
    pub fn has_dynamic(&self) -> bool {
        self.devices.iter().flatten().any(Device::is_dynamic)
    }

    /// Voltage of a net by name.
    pub fn net_voltage(&self, name: &str) -> Option<f64> {
        self.nets.find(name).map(|id| self.nets.voltage(id))
    }

    /// Reset every device.
    pub fn reset_devices(&mut self) {
        for device in self.devices.iter_mut().flatten() {
            device.reset();
        }
    }

    /// Run `update` on every device.
    pub fn update_all(&mut self) {
        for device in self.devices.iter().flatten() {
            device.update(&mut self.nets);
        }
    }

    /// Run `update` on the devices with a terminal on one of `changed`.
    pub fn update_touching(&mut self, changed: &[NetId]) {
        for device in self.devices.iter().flatten() {
            let touches = device
                .terminals()
                .iter()
                .any(|t| t.net().is_some_and(|n| changed.contains(&n)));
            if touches {
                device.update(&mut self.nets);
            }
        }
    }

    /// Relinearize dynamic devices; returns the largest relative companion
    /// residual.
    pub fn update_terminals(&mut self) -> f64 {
        let mut residual = 0.0f64;
        for device in self.devices.iter_mut().flatten() {
            if device.is_dynamic() {
                residual = residual.max(device.update_terminals(&self.nets));
            }
        }
        residual
    }

    /// Change a device parameter at runtime and let the device react.
    pub fn set_param(&mut self, device: &str, key: &str, value: f64) -> Result<()> {
        let id = self
            .find_device(device)
            .ok_or_else(|| FourtermError::DeviceNotFound {
                device: device.to_string(),
            })?;
        let dev = self.devices[id.0]
            .as_mut()
            .ok_or_else(|| FourtermError::DeviceNotFound {
                device: device.to_string(),
            })?;
        dev.set_param(key, value)?;
        dev.update_param(&mut self.nets);
        Ok(())
    }

    /// Remove a device, detaching its terminals from their nets.
    pub fn remove_device(&mut self, name: &str) -> Result<Device> {
        let id = self
            .device_map
            .remove(name)
            .ok_or_else(|| FourtermError::DeviceNotFound {
                device: name.to_string(),
            })?;
        let mut device = self.devices[id.0]
            .take()
            .ok_or_else(|| FourtermError::DeviceNotFound {
                device: name.to_string(),
            })?;
        for (slot, net) in device.terminals_mut().detach_all() {
            self.nets.detach(net, TerminalRef { device: id, slot });
        }
        debug!("removed device '{}'", name);
        Ok(device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::{Vccs, Vcvs, OP1};

    fn vccs_builder() -> (NetlistBuilder, DeviceId) {
        let mut b = NetlistBuilder::new();
        let vin = b.add_rail("VIN", 1.0).unwrap();
        let out = b.add_net("out");
        let id = b
            .add_device(Device::Vccs(Vccs::new("G1".into(), 1.0, 1e9)))
            .unwrap();
        b.connect(id, "IP", vin).unwrap();
        b.connect(id, "IN", NetId::GROUND).unwrap();
        b.connect(id, "OP", out).unwrap();
        b.connect(id, "ON", NetId::GROUND).unwrap();
        (b, id)
    }

    #[test]
    fn test_finalize_attaches_auxiliary_terminals() {
        let (b, id) = vccs_builder();
        let netlist = b.finalize().unwrap();
        let out = netlist.nets().find("out").unwrap();

        let refs = netlist.nets().get(out).terminals();
        assert!(refs.contains(&TerminalRef { device: id, slot: OP1 }));
        assert_eq!(refs.len(), 2);
    }

    #[test]
    fn test_unconnected_terminal_rejected() {
        let mut b = NetlistBuilder::new();
        let out = b.add_net("out");
        let id = b
            .add_device(Device::Vccs(Vccs::new("G1".into(), 1.0, 1e9)))
            .unwrap();
        b.connect(id, "OP", out).unwrap();
        b.connect(id, "ON", NetId::GROUND).unwrap();
        assert!(matches!(
            b.finalize(),
            Err(FourtermError::UnconnectedTerminal { .. })
        ));
    }

    #[test]
    fn test_unknown_terminal_rejected() {
        let (mut b, id) = vccs_builder();
        assert!(matches!(
            b.connect(id, "XX", NetId::GROUND),
            Err(FourtermError::UnknownTerminal { .. })
        ));
    }

    #[test]
    fn test_duplicate_device_rejected() {
        let (mut b, _) = vccs_builder();
        let dup = Device::Vcvs(Vcvs::new("G1".into(), 1.0, 1e9, 1.0));
        assert!(matches!(
            b.add_device(dup),
            Err(FourtermError::DuplicateDevice { .. })
        ));
    }

    #[test]
    fn test_reconnect_moves_back_reference() {
        let (mut b, id) = vccs_builder();
        let other = b.add_net("other");
        let out = b.nets.find("out").unwrap();
        b.connect(id, "OP", other).unwrap();
        assert!(b.nets.get(out).terminals().is_empty());
        assert_eq!(b.nets.get(other).terminals().len(), 1);
    }

    #[test]
    fn test_remove_device_detaches_terminals() {
        let (b, _) = vccs_builder();
        let mut netlist = b.finalize().unwrap();
        let out = netlist.nets().find("out").unwrap();

        let removed = netlist.remove_device("G1").unwrap();
        assert!(removed.terminals().iter().all(|t| t.net().is_none()));
        assert!(netlist.nets().get(out).terminals().is_empty());
        assert!(netlist
            .nets()
            .iter()
            .all(|(_, net)| net.terminals().is_empty()));
        assert_eq!(netlist.device_count(), 0);
        assert!(netlist.remove_device("G1").is_err());
    }

    #[test]
    fn test_finalized_device_cannot_be_finalized_again() {
        let (b, _) = vccs_builder();
        let mut netlist = b.finalize().unwrap();
        let device = netlist.remove_device("G1").unwrap();

        let mut b = NetlistBuilder::new();
        let out = b.add_net("out");
        let id = b.add_device(device).unwrap();
        for terminal in ["IP", "IN", "ON"] {
            b.connect(id, terminal, NetId::GROUND).unwrap();
        }
        b.connect(id, "OP", out).unwrap();
        assert!(matches!(
            b.finalize(),
            Err(FourtermError::AlreadyFinalized { .. })
        ));
    }

    #[test]
    fn test_set_param_schedules_solve() {
        let (b, _) = vccs_builder();
        let mut netlist = b.finalize().unwrap();
        netlist.set_param("G1", "G", 3.0).unwrap();
        let out = netlist.nets().find("out").unwrap();
        assert!(netlist.nets().get(out).is_dirty());
        assert!(netlist.set_param("G9", "G", 3.0).is_err());
        assert!(netlist.set_param("G1", "RO", 3.0).is_err());
    }

    #[test]
    fn test_update_touching_only_connected() {
        let (mut b, _) = vccs_builder();
        let vcc = b.add_rail("VCC", 5.0).unwrap();
        let mut netlist = b.finalize().unwrap();

        netlist.update_touching(&[vcc]);
        assert!(!netlist.nets().has_dirty());

        let vin = netlist.nets().find("VIN").unwrap();
        netlist.update_touching(&[vin]);
        assert_eq!(netlist.nets().dirty_count(), 1);
    }
}

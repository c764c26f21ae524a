//! Netlist validation.

use log::warn;

use crate::error::{FourtermError, Result};

use super::Netlist;

/// Validate a finalized netlist for simulation.
///
/// Checks:
/// - At least one device is present
/// - Every free net has at least one terminal
///
/// Input pairs that share one net are tolerated and only reported at
/// finalize.
pub fn validate_netlist(netlist: &Netlist) -> Result<()> {
    if netlist.device_count() == 0 {
        return Err(FourtermError::InvalidTopology {
            message: "Netlist has no devices".to_string(),
        });
    }

    for (_, net) in netlist.nets().iter() {
        if net.is_rail() {
            if net.terminals().is_empty() && net.name != "0" {
                warn!("rail '{}' drives no terminals", net.name);
            }
            continue;
        }
        if net.terminals().is_empty() {
            return Err(FourtermError::InvalidTopology {
                message: format!("Net '{}' has no terminals", net.name),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::{Device, Resistor};
    use crate::netlist::{NetId, NetlistBuilder};

    #[test]
    fn test_empty_netlist_rejected() {
        let netlist = NetlistBuilder::new().finalize().unwrap();
        assert!(validate_netlist(&netlist).is_err());
    }

    #[test]
    fn test_orphan_net_rejected() {
        let mut b = NetlistBuilder::new();
        let a = b.add_net("a");
        b.add_net("orphan");
        let id = b
            .add_device(Device::Resistor(Resistor::new("R1".into(), 1e3)))
            .unwrap();
        b.connect(id, "P", a).unwrap();
        b.connect(id, "N", NetId::GROUND).unwrap();
        let netlist = b.finalize().unwrap();
        assert!(matches!(
            validate_netlist(&netlist),
            Err(FourtermError::InvalidTopology { .. })
        ));
    }
}

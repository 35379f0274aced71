//! Port selection for mock servers started without an explicit port.

use std::net::TcpListener;
use tracing::{debug, warn};

/// Chooses the port requested from the engine.
///
/// Returning `0` asks the engine to pick a port itself.
pub trait PortAllocator: Send + Sync {
    fn allocate(&self, bind_address: &str) -> u16;
}

/// Asks the OS for a free ephemeral port by binding port 0 and releasing it.
///
/// Falls back to `0` when the probe fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct EphemeralPortAllocator;

impl PortAllocator for EphemeralPortAllocator {
    fn allocate(&self, bind_address: &str) -> u16 {
        let probe = TcpListener::bind((bind_address, 0)).and_then(|listener| listener.local_addr());
        match probe {
            Ok(addr) => {
                debug!("Probed free port {} on {}", addr.port(), bind_address);
                addr.port()
            }
            Err(e) => {
                warn!(
                    "Port probe on {} failed ({}), deferring to engine",
                    bind_address, e
                );
                0
            }
        }
    }
}

/// Always requests port `0` and trusts the engine to allocate one.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineAssignedPortAllocator;

impl PortAllocator for EngineAssignedPortAllocator {
    fn allocate(&self, _bind_address: &str) -> u16 {
        0
    }
}

/// Allocator suited to the target platform.
///
/// The Pact engine on Apple platforms does not pick a port when handed `0`,
/// so those targets probe for one up front.
pub fn default_port_allocator() -> Box<dyn PortAllocator> {
    #[cfg(any(target_os = "macos", target_os = "ios"))]
    {
        Box::new(EphemeralPortAllocator)
    }

    #[cfg(not(any(target_os = "macos", target_os = "ios")))]
    {
        Box::new(EngineAssignedPortAllocator)
    }
}

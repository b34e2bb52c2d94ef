use crate::AvailablePort;
use serial_transport::SerialBackend;
use std::sync::Arc;
use tracing::error;

/// Stateless view of the serial devices a host exposes.
#[derive(Clone)]
pub struct PortRegistry {
    backend: Arc<dyn SerialBackend>,
}

impl PortRegistry {
    pub fn new(backend: Arc<dyn SerialBackend>) -> Self {
        Self { backend }
    }

    /// Enumerate ports. Failures are logged and reported as an empty list.
    pub fn list_ports(&self) -> Vec<AvailablePort> {
        match self.backend.list() {
            Ok(ports) => ports.into_iter().map(AvailablePort::from).collect(),
            Err(e) => {
                error!(error = %e, "error getting ports");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_transport::MockBackend;

    #[test]
    fn test_lists_backend_ports() {
        let backend = MockBackend::with_ports(&["COM1", "COM4"]);
        let registry = PortRegistry::new(Arc::new(backend));
        let ports = registry.list_ports();
        assert_eq!(ports.len(), 2);
        assert_eq!(ports[0].port, "COM1");
        assert_eq!(ports[0].description, "COM1 - Serial Port");
    }

    #[test]
    fn test_enumeration_failure_is_empty() {
        let backend = MockBackend::with_ports(&["COM1"]);
        backend.fail_listing(Some("no access to /sys".into()));
        let registry = PortRegistry::new(Arc::new(backend));
        assert!(registry.list_ports().is_empty());
    }
}

//! Simulation drivers.
//!
//! Software stand-ins for the hardware transport and the host engine, used by
//! the binary's demo mode and by the integration tests.

mod points;
mod transport;

pub use points::{DemoPointSource, DemoProvisioner};
pub use transport::{SimulatedTransport, TransportCall};

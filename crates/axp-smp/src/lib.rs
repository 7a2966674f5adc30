//! `SMPCoordinator`: CPU registry, LL/SC reservation
//! tracking, TLB shoot-down broadcast, and cache coherency event fan-out.

mod coordinator;
mod events;
mod reservation;

pub use coordinator::SMPCoordinator;
pub use events::{CpuTarget, ShootdownOp};
pub use reservation::Reservation;

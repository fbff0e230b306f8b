//! Residue-number-system polynomial arithmetic over `Z_Q[X]/(X^N + 1)`.

pub mod basis;
pub mod errors;
pub mod poly;
pub mod traits;

pub use basis::{NttTable, RnsBasis};
pub use errors::{RingError, RingResult};
pub use poly::RnsPoly;
pub use traits::{PolyRing, PolySampler};

//! The closed hierarchy of topology levels, coarsest to finest.

use serde::{Deserialize, Serialize};

/// One rung of the topology hierarchy. Ordered `System < Package < Die <
/// Numa < L2Cache < Core < Thread`; deeper levels compare greater.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Level {
    System,
    Package,
    Die,
    Numa,
    L2Cache,
    Core,
    Thread,
}

impl Level {
    pub const ALL: [Level; 7] = [
        Level::System,
        Level::Package,
        Level::Die,
        Level::Numa,
        Level::L2Cache,
        Level::Core,
        Level::Thread,
    ];

    pub const LEVEL_COUNT: usize = Level::ALL.len();

    /// Numeric value such that deeper levels are larger.
    pub fn value(self) -> u8 {
        self as u8
    }
}

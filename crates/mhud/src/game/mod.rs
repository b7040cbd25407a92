mod chance;
mod resolver;
mod session;
mod stat;
mod tracker;

pub use chance::{ChanceInputs, ProbabilityModel, ProbabilityState};
pub use resolver::PointerChainResolver;
pub use session::{GameReader, HudSnapshot, StatReading};
pub use stat::{PlayerStat, StatKind};
pub use tracker::{DEFAULT_STAT_WINDOW, StatRecord, StatTracker};

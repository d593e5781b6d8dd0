//! The scanning engine: plans block windows per space, pulls and
//! decodes governance events, correlates proposals with their
//! questions, and drives the whole thing on a cooldown loop.

pub mod directory;
pub mod heartbeat;
pub mod planner;
pub mod registry;
pub mod rpc;
pub mod runner;
pub mod scanner;
pub mod tracker;

pub use registry::SpaceRegistry;
pub use runner::SchedulerLoop;
pub use scanner::EventScanner;
pub use tracker::ProposalTracker;

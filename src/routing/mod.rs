//! Alert routing to responding teams
//!
//! This module decides which team(s) should be notified about a high-severity
//! error, with a confidence score, an escalation level, and notification
//! channels. Routing is infallible: unrecognized categories fall back to a
//! catch-all team.

mod router;
mod teams;

pub use router::{AlertContext, AlertDecision, AlertRouter, AlertRouting};
pub use teams::{PerformanceScoring, ScoringStrategy, Team, TeamPerformance, TeamRegistry};

use crate::events::{ErrorCategory, ErrorSeverity};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[cfg(test)]
use mockall::automock;

/// A responding team that can be assigned to alerts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Team {
    /// Stable identifier used in decisions and configuration
    pub id: String,
    /// Display name for dashboards and notifications
    pub name: String,
}

impl Team {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Historical performance of a team, used for confidence scoring
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TeamPerformance {
    /// Fraction of past alerts this team resolved, in [0, 1]
    pub resolution_rate: f64,
    /// Average time to first response in minutes
    pub avg_response_minutes: u32,
}

impl Default for TeamPerformance {
    fn default() -> Self {
        Self {
            resolution_rate: 0.5,
            avg_response_minutes: 30,
        }
    }
}

/// Pluggable confidence scoring for routing decisions
///
/// Implementations compute how confident the router is that the selected
/// team is the right responder. The returned value is clamped to [0, 1] by
/// the router, so implementations do not need to clamp themselves.
#[cfg_attr(test, automock)]
pub trait ScoringStrategy: Send + Sync {
    fn confidence(
        &self,
        category: ErrorCategory,
        severity: ErrorSeverity,
        performance: Option<TeamPerformance>,
    ) -> f64;
}

/// Default scoring: a category-mapping base adjusted by team track record
///
/// A direct category mapping starts higher than a catch-all fallback, and a
/// team that historically resolves its alerts earns additional confidence.
#[derive(Debug, Default)]
pub struct PerformanceScoring;

impl ScoringStrategy for PerformanceScoring {
    fn confidence(
        &self,
        category: ErrorCategory,
        _severity: ErrorSeverity,
        performance: Option<TeamPerformance>,
    ) -> f64 {
        let base = match category {
            ErrorCategory::Unknown => 0.4,
            _ => 0.75,
        };
        let track_record = performance.map(|p| p.resolution_rate * 0.2).unwrap_or(0.0);
        base + track_record
    }
}

/// Category-to-team mapping with per-team performance history
///
/// Read-mostly configuration: assembled once at startup (or replaced
/// wholesale on reconfiguration) and read concurrently by the router.
#[derive(Debug, Clone)]
pub struct TeamRegistry {
    teams: HashMap<String, Team>,
    primary: HashMap<ErrorCategory, String>,
    secondary: HashMap<ErrorCategory, String>,
    performance: HashMap<String, TeamPerformance>,
    fallback: Team,
}

impl TeamRegistry {
    /// Create an empty registry with only a catch-all fallback team
    pub fn new(fallback: Team) -> Self {
        Self {
            teams: HashMap::new(),
            primary: HashMap::new(),
            secondary: HashMap::new(),
            performance: HashMap::new(),
            fallback,
        }
    }

    /// Registry pre-populated with the default on-call topology
    pub fn with_defaults() -> Self {
        let mut registry = Self::new(Team::new("sre-on-call", "SRE On-Call"));

        registry.add_team(Team::new("platform-infrastructure", "Platform Infrastructure"));
        registry.add_team(Team::new("data-platform", "Data Platform"));
        registry.add_team(Team::new("integrations", "Integrations"));
        registry.add_team(Team::new("app-backend", "Application Backend"));
        registry.add_team(Team::new("identity-security", "Identity & Security"));

        registry.map_category(ErrorCategory::Network, "platform-infrastructure", None);
        registry.map_category(
            ErrorCategory::Database,
            "data-platform",
            Some("platform-infrastructure"),
        );
        registry.map_category(ErrorCategory::ExternalApi, "integrations", Some("app-backend"));
        registry.map_category(ErrorCategory::Validation, "app-backend", None);
        registry.map_category(ErrorCategory::Authentication, "identity-security", None);
        registry.map_category(
            ErrorCategory::Configuration,
            "platform-infrastructure",
            None,
        );

        registry.set_performance(
            "platform-infrastructure",
            TeamPerformance {
                resolution_rate: 0.85,
                avg_response_minutes: 15,
            },
        );
        registry.set_performance(
            "data-platform",
            TeamPerformance {
                resolution_rate: 0.8,
                avg_response_minutes: 20,
            },
        );
        registry.set_performance(
            "integrations",
            TeamPerformance {
                resolution_rate: 0.75,
                avg_response_minutes: 25,
            },
        );
        registry.set_performance(
            "app-backend",
            TeamPerformance {
                resolution_rate: 0.9,
                avg_response_minutes: 30,
            },
        );
        registry.set_performance(
            "identity-security",
            TeamPerformance {
                resolution_rate: 0.8,
                avg_response_minutes: 20,
            },
        );

        registry
    }

    /// Register a team
    pub fn add_team(&mut self, team: Team) {
        self.teams.insert(team.id.clone(), team);
    }

    /// Map a category to a primary team and an optional secondary team
    pub fn map_category(
        &mut self,
        category: ErrorCategory,
        primary_id: &str,
        secondary_id: Option<&str>,
    ) {
        self.primary.insert(category, primary_id.to_string());
        if let Some(secondary_id) = secondary_id {
            self.secondary.insert(category, secondary_id.to_string());
        }
    }

    /// Record performance history for a team
    pub fn set_performance(&mut self, team_id: &str, performance: TeamPerformance) {
        self.performance.insert(team_id.to_string(), performance);
    }

    /// Primary team for a category, if one is mapped
    pub fn primary_for(&self, category: ErrorCategory) -> Option<&Team> {
        self.primary
            .get(&category)
            .and_then(|id| self.teams.get(id))
    }

    /// Secondary team for a category, if one is mapped
    pub fn secondary_for(&self, category: ErrorCategory) -> Option<&Team> {
        self.secondary
            .get(&category)
            .and_then(|id| self.teams.get(id))
    }

    /// Performance history for a team
    pub fn performance_for(&self, team_id: &str) -> Option<&TeamPerformance> {
        self.performance.get(team_id)
    }

    /// The catch-all fallback team
    pub fn fallback(&self) -> &Team {
        &self.fallback
    }

    /// Number of registered teams, not counting the fallback
    pub fn team_count(&self) -> usize {
        self.teams.len()
    }
}

impl Default for TeamRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_maps_all_known_categories() {
        let registry = TeamRegistry::with_defaults();

        for category in ErrorCategory::ALL {
            if category == ErrorCategory::Unknown {
                assert!(registry.primary_for(category).is_none());
            } else {
                assert!(
                    registry.primary_for(category).is_some(),
                    "no primary team for {:?}",
                    category
                );
            }
        }
    }

    #[test]
    fn test_database_routes_to_data_platform_with_infrastructure_secondary() {
        let registry = TeamRegistry::with_defaults();

        let primary = registry.primary_for(ErrorCategory::Database).unwrap();
        assert_eq!(primary.id, "data-platform");

        let secondary = registry.secondary_for(ErrorCategory::Database).unwrap();
        assert_eq!(secondary.id, "platform-infrastructure");
    }

    #[test]
    fn test_fallback_team_available_for_unmapped_category() {
        let registry = TeamRegistry::with_defaults();
        assert!(registry.primary_for(ErrorCategory::Unknown).is_none());
        assert_eq!(registry.fallback().id, "sre-on-call");
    }

    #[test]
    fn test_scoring_strategy_is_mockable() {
        let mut scoring = MockScoringStrategy::new();
        scoring
            .expect_confidence()
            .withf(|_, _, performance| {
                matches!(performance, Some(p) if p.avg_response_minutes == 15)
            })
            .return_const(0.9f64);

        let value = scoring.confidence(
            ErrorCategory::Network,
            ErrorSeverity::High,
            Some(TeamPerformance {
                resolution_rate: 0.85,
                avg_response_minutes: 15,
            }),
        );
        assert_eq!(value, 0.9);
    }

    #[test]
    fn test_performance_scoring_prefers_mapped_categories() {
        let scoring = PerformanceScoring;
        let performance = TeamPerformance {
            resolution_rate: 1.0,
            avg_response_minutes: 10,
        };

        let mapped = scoring.confidence(
            ErrorCategory::Database,
            ErrorSeverity::High,
            Some(performance),
        );
        let unmapped = scoring.confidence(ErrorCategory::Unknown, ErrorSeverity::High, None);

        assert!(mapped > unmapped);
        assert!((0.0..=1.0).contains(&mapped));
        assert!((0.0..=1.0).contains(&unmapped));
    }
}

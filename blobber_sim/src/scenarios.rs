//! Named simulation scenarios.

use serde::Serialize;

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioId {
    /// Independent clients and a repeated run agree bit for bit
    Determinism,

    /// A player joining mid-session catches up from history
    LateJoin,

    /// Game over, countdown, and a fresh session with the same clients
    SessionReset,

    /// Many aggressive bombers; painted tiles stay conserved
    PaintWar,

    /// A client that stops reading is dropped, then reconnects
    SlowReader,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::Determinism,
            ScenarioId::LateJoin,
            ScenarioId::SessionReset,
            ScenarioId::PaintWar,
            ScenarioId::SlowReader,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::Determinism => "determinism",
            ScenarioId::LateJoin => "late_join",
            ScenarioId::SessionReset => "session_reset",
            ScenarioId::PaintWar => "paint_war",
            ScenarioId::SlowReader => "slow_reader",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::Determinism => "4 players, every client and a second run match the oracle",
            ScenarioId::LateJoin => "2 players, a third joins halfway and replays the history",
            ScenarioId::SessionReset => "short session, reset countdown, second session starts at tick 0",
            ScenarioId::PaintWar => "8 bomb-happy players, conservation checked every tick",
            ScenarioId::SlowReader => "a stalled client overflows its queue, is dropped, reconnects",
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "determinism" => Ok(ScenarioId::Determinism),
            "late_join" | "latejoin" => Ok(ScenarioId::LateJoin),
            "session_reset" | "sessionreset" | "reset" => Ok(ScenarioId::SessionReset),
            "paint_war" | "paintwar" => Ok(ScenarioId::PaintWar),
            "slow_reader" | "slowreader" => Ok(ScenarioId::SlowReader),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_parse_back() {
        for scenario in ScenarioId::all() {
            assert_eq!(scenario.name().parse::<ScenarioId>(), Ok(scenario));
        }
        assert_eq!("PaintWar".parse::<ScenarioId>(), Ok(ScenarioId::PaintWar));
        assert!("split_brain".parse::<ScenarioId>().is_err());
    }

    #[test]
    fn test_serializes_as_name() {
        for scenario in ScenarioId::all() {
            let json = serde_json::to_value(scenario).unwrap();
            assert_eq!(json, serde_json::Value::from(scenario.name()));
        }
    }
}

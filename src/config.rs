//! Simulation configuration.
//!
//! A configuration holds the random seed, the stopping conditions of [`Simulation::run`](crate::Simulation::run)
//! and an ordered list of parameter assignments. It is usually loaded from JSON:
//!
//! ```json
//! {
//!     "seed": 42,
//!     "end_time": 1000.0,
//!     "parameters": [
//!         { "pattern": "source.interval", "value": "exponential(2.0)" },
//!         { "pattern": "server*.speed", "value": "2 * base" },
//!         { "pattern": "**.capacity", "value": "default" }
//!     ]
//! }
//! ```

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration text is not valid JSON or does not match the expected structure.
    #[error("Invalid configuration: {0}")]
    Json(#[from] serde_json::Error),

    /// Parameter pattern cannot be compiled.
    #[error("Invalid parameter pattern '{pattern}': {source}")]
    Pattern {
        /// Pattern text.
        pattern: String,
        /// Compilation failure.
        #[source]
        source: regex::Error,
    },
}

/// Simulation configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Seed of the simulation-wide random number generator.
    pub seed: u64,
    /// Time after which [`Simulation::run`](crate::Simulation::run) stops.
    pub end_time: Option<f64>,
    /// Number of processed events after which [`Simulation::run`](crate::Simulation::run) stops.
    pub event_limit: Option<u64>,
    /// Parameter assignments.
    pub parameters: ParAssignments,
}

impl SimulationConfig {
    /// Parses configuration from JSON text.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Single parameter assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParAssignment {
    /// Pattern matched against the parameter full path `<component>.<parameter>`.
    pub pattern: String,
    /// Expression text, or one of the special values `default` and `ask`.
    pub value: String,
}

/// Value assigned to a parameter by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignedValue<'a> {
    /// Use the default value declared for the parameter.
    Default,
    /// Ask the user for the value.
    Ask,
    /// Expression text.
    Expr(&'a str),
}

#[derive(Debug, Clone)]
struct CompiledAssignment {
    assignment: ParAssignment,
    regex: Regex,
}

impl CompiledAssignment {
    fn new(assignment: ParAssignment) -> Result<Self, ConfigError> {
        let regex = Regex::new(&regex_from_pattern(&assignment.pattern)).map_err(|source| ConfigError::Pattern {
            pattern: assignment.pattern.clone(),
            source,
        })?;
        Ok(Self { assignment, regex })
    }
}

/// Ordered list of parameter assignments where the first matching pattern wins.
///
/// In patterns, `?` matches any character except dot, `*` matches any sequence of characters except dot and
/// `**` matches any sequence of characters. Patterns are compiled to regular expressions when added.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<ParAssignment>", into = "Vec<ParAssignment>")]
pub struct ParAssignments(Vec<CompiledAssignment>);

impl ParAssignments {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an assignment with lower precedence than the existing ones.
    pub fn push(&mut self, pattern: &str, value: &str) -> Result<(), ConfigError> {
        self.0.push(CompiledAssignment::new(ParAssignment {
            pattern: pattern.to_owned(),
            value: value.to_owned(),
        })?);
        Ok(())
    }

    /// Returns the number of assignments.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no assignments.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns an iterator over assignments in precedence order.
    pub fn iter(&self) -> impl Iterator<Item = &ParAssignment> {
        self.0.iter().map(|c| &c.assignment)
    }

    /// Returns the value of the first assignment matching the parameter path.
    pub fn lookup(&self, path: &str) -> Option<AssignedValue<'_>> {
        self.0
            .iter()
            .find(|c| c.regex.is_match(path))
            .map(|c| match c.assignment.value.trim() {
                "default" => AssignedValue::Default,
                "ask" => AssignedValue::Ask,
                text => AssignedValue::Expr(text),
            })
    }
}

impl PartialEq for ParAssignments {
    fn eq(&self, other: &Self) -> bool {
        self.iter().eq(other.iter())
    }
}

impl Eq for ParAssignments {}

impl TryFrom<Vec<ParAssignment>> for ParAssignments {
    type Error = ConfigError;

    fn try_from(assignments: Vec<ParAssignment>) -> Result<Self, Self::Error> {
        assignments
            .into_iter()
            .map(CompiledAssignment::new)
            .collect::<Result<_, _>>()
            .map(ParAssignments)
    }
}

impl From<ParAssignments> for Vec<ParAssignment> {
    fn from(assignments: ParAssignments) -> Self {
        assignments.0.into_iter().map(|c| c.assignment).collect()
    }
}

fn regex_from_pattern(pattern: &str) -> String {
    let mut regex = String::from("^");
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                regex.push_str(".*");
            }
            '*' => regex.push_str("[^.]*"),
            '?' => regex.push_str("[^.]"),
            c => regex.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
        }
    }
    regex.push('$');
    regex
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(pattern: &str, path: &str) -> bool {
        let mut assignments = ParAssignments::new();
        assignments.push(pattern, "1").unwrap();
        assignments.lookup(path).is_some()
    }

    #[test]
    fn single_star_stays_within_segment() {
        assert!(matches("*.delay", "proc1.delay"));
        assert!(matches("proc*.delay", "proc12.delay"));
        assert!(!matches("*.delay", "net.proc1.delay"));
        assert!(matches("**.delay", "net.proc1.delay"));
        assert!(matches("**", "anything.at.all"));
        assert!(matches("proc?.delay", "proc1.delay"));
        assert!(!matches("proc?.delay", "proc12.delay"));
        assert!(!matches("proc1.delay", "proc1.delays"));
        assert!(matches("node[0].x+y", "node[0].x+y"));
        assert!(!matches("node[0].x+y", "node0.xxy"));
    }

    #[test]
    fn many_double_stars_match_in_linear_time() {
        let path = "a".repeat(40);
        let started = std::time::Instant::now();
        assert!(!matches("**a**a**a**a**a**a**a**b", &path));
        assert!(matches("**a**a**a**a**a**a**a**a", &path));
        assert!(started.elapsed() < std::time::Duration::from_secs(1));
    }

    #[test]
    fn first_matching_assignment_wins() {
        let mut assignments = ParAssignments::new();
        assignments.push("proc1.delay", "5").unwrap();
        assignments.push("*.delay", "default").unwrap();
        assignments.push("**", "ask").unwrap();
        assert_eq!(assignments.lookup("proc1.delay"), Some(AssignedValue::Expr("5")));
        assert_eq!(assignments.lookup("proc2.delay"), Some(AssignedValue::Default));
        assert_eq!(assignments.lookup("proc2.rate"), Some(AssignedValue::Ask));
    }

    #[test]
    fn config_is_loaded_from_json() {
        let config = SimulationConfig::from_json(
            r#"{
                "seed": 7,
                "end_time": 100.0,
                "parameters": [
                    { "pattern": "src.interval", "value": "exponential(2)" }
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.end_time, Some(100.0));
        assert_eq!(config.event_limit, None);
        assert_eq!(
            config.parameters.lookup("src.interval"),
            Some(AssignedValue::Expr("exponential(2)"))
        );
        assert!(SimulationConfig::from_json("{\"seed\": \"x\"}").is_err());

        let text = serde_json::to_string(&config).unwrap();
        assert_eq!(SimulationConfig::from_json(&text).unwrap(), config);
    }
}

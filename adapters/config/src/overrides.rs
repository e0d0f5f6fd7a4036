//! Per-archetype rule overrides loaded from an optional JSON document.
//!
//! The document maps archetype names to rule lists:
//! `{"Grunt": {"rules": [{"name": "Approach", "weight": 0.8}]}}`.
//! Each archetype entry is validated on its own; a malformed entry is ignored
//! and that archetype keeps its built-in rules.

use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    path::Path,
};

use adaptive_arena_core::{
    Archetype, BlacklistTag, ParameterSet, Rule, WeightBounds, DEFAULT_COOLDOWN_PERIOD,
};
use serde::Deserialize;

const ARCHETYPES: [Archetype; 3] = [Archetype::Grunt, Archetype::Ranged, Archetype::Boss];

#[derive(Debug, Deserialize)]
struct OverrideEntry {
    rules: Vec<OverrideRule>,
}

#[derive(Debug, Deserialize)]
struct OverrideRule {
    name: String,
    weight: f64,
    #[serde(default)]
    cooldown_period: Option<f64>,
    #[serde(default)]
    blacklist: BTreeSet<BlacklistTag>,
}

/// Validated rule lists keyed by archetype.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RuleOverrides {
    entries: BTreeMap<Archetype, ParameterSet>,
}

impl RuleOverrides {
    /// Parses an override document, dropping every entry that fails validation.
    #[must_use]
    pub fn from_json_str(contents: &str, max_rules: usize, bounds: WeightBounds) -> Self {
        let document: BTreeMap<String, serde_json::Value> = match serde_json::from_str(contents) {
            Ok(document) => document,
            Err(err) => {
                tracing::warn!(%err, "rule override document is malformed, ignoring it");
                return Self::default();
            }
        };

        let mut entries = BTreeMap::new();
        for (key, value) in document {
            let Some(archetype) = archetype_named(&key) else {
                tracing::warn!(archetype = %key, "ignoring override for unknown archetype");
                continue;
            };
            match validate_entry(value, max_rules, bounds) {
                Ok(parameters) => {
                    let _ = entries.insert(archetype, parameters);
                }
                Err(reason) => {
                    tracing::warn!(archetype = %key, %reason, "ignoring malformed rule override");
                }
            }
        }
        Self { entries }
    }

    /// Loads overrides from `path`; a missing or unreadable file yields no overrides.
    #[must_use]
    pub fn load(path: Option<&Path>, max_rules: usize, bounds: WeightBounds) -> Self {
        let Some(path) = path else {
            return Self::default();
        };
        match fs::read_to_string(path) {
            Ok(contents) => Self::from_json_str(&contents, max_rules, bounds),
            Err(err) => {
                tracing::warn!(path = %path.display(), %err, "rule overrides unavailable");
                Self::default()
            }
        }
    }

    /// Override for `archetype`, if a valid one was supplied.
    #[must_use]
    pub fn get(&self, archetype: Archetype) -> Option<&ParameterSet> {
        self.entries.get(&archetype)
    }

    /// Rules an actor of `archetype` starts with.
    #[must_use]
    pub fn rules_for(&self, archetype: Archetype) -> ParameterSet {
        self.get(archetype)
            .cloned()
            .unwrap_or_else(|| default_rules(archetype))
    }

    /// Number of archetypes with a valid override.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Reports whether no override was accepted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Built-in rule set for each archetype.
#[must_use]
pub fn default_rules(archetype: Archetype) -> ParameterSet {
    let rules = match archetype {
        Archetype::Grunt => vec![
            Rule::new("Approach", 0.8, 0.15),
            Rule::new("Strafe", 0.2, 0.3),
        ],
        Archetype::Ranged => vec![
            Rule::new("KeepDistance", 0.9, 0.3),
            Rule::new("Strafe", 0.5, 0.3),
            Rule::new("Approach", 0.2, 0.15).with_blacklist(BlacklistTag::ForbiddenWhenClose),
            Rule::new("Feint", 0.3, 0.6),
        ],
        Archetype::Boss => vec![
            Rule::new("Approach", 0.7, 0.15),
            Rule::new("Charge", 0.6, 0.9).with_blacklist(BlacklistTag::ForbiddenWhenClose),
            Rule::new("AreaDeny", 0.5, 1.2).with_blacklist(BlacklistTag::ForbiddenWhenFar),
            Rule::new("Strafe", 0.3, 0.3),
            Rule::new("Feint", 0.2, 0.6),
        ],
    };
    ParameterSet::new(rules)
}

fn archetype_named(key: &str) -> Option<Archetype> {
    let key = key.trim();
    ARCHETYPES
        .into_iter()
        .find(|archetype| archetype.name() == key)
}

fn validate_entry(
    value: serde_json::Value,
    max_rules: usize,
    bounds: WeightBounds,
) -> Result<ParameterSet, String> {
    let entry: OverrideEntry = serde_json::from_value(value).map_err(|err| err.to_string())?;
    if entry.rules.is_empty() {
        return Err("rule list is empty".to_owned());
    }
    if entry.rules.len() > max_rules {
        return Err(format!(
            "{} rules exceed the limit of {max_rules}",
            entry.rules.len()
        ));
    }

    let mut rules = Vec::with_capacity(entry.rules.len());
    for rule in entry.rules {
        if rule.name.trim().is_empty() {
            return Err("rule name is empty".to_owned());
        }
        if !bounds.contains(rule.weight) {
            return Err(format!(
                "weight {} of `{}` lies outside [{}, {}]",
                rule.weight,
                rule.name,
                bounds.floor(),
                bounds.ceiling()
            ));
        }
        let period = rule.cooldown_period.unwrap_or(DEFAULT_COOLDOWN_PERIOD);
        let mut built = Rule::new(rule.name, rule.weight, period);
        for tag in rule.blacklist {
            built = built.with_blacklist(tag);
        }
        rules.push(built);
    }
    Ok(ParameterSet::new(rules))
}

#[cfg(test)]
mod tests {
    use super::*;
    use adaptive_arena_core::RuleKind;

    #[test]
    fn valid_entries_replace_defaults() {
        let overrides = RuleOverrides::from_json_str(
            r#"{
                "Grunt": {"rules": [
                    {"name": "Charge", "weight": 1.2, "cooldown_period": 0.5},
                    {"name": "Approach", "weight": 0.4, "blacklist": ["forbidden-when-close"]}
                ]}
            }"#,
            16,
            WeightBounds::default(),
        );
        let grunt = overrides.rules_for(Archetype::Grunt);
        assert_eq!(grunt.len(), 2);
        assert_eq!(grunt.rules()[0].kind(), RuleKind::Charge);
        assert_eq!(grunt.rules()[0].cooldown_period(), 0.5);
        assert!(grunt.rules()[1].is_blacklisted(BlacklistTag::ForbiddenWhenClose));
        assert_eq!(overrides.rules_for(Archetype::Boss), default_rules(Archetype::Boss));
    }

    #[test]
    fn malformed_entries_are_ignored_individually() {
        let overrides = RuleOverrides::from_json_str(
            r#"{
                "Grunt": {"rules": []},
                "Ranged": {"rules": [{"name": "Strafe", "weight": 9.0}]},
                "Boss": {"rules": [{"name": "Feint", "weight": 0.5}]},
                "Dragon": {"rules": [{"name": "Approach", "weight": 0.5}]}
            }"#,
            16,
            WeightBounds::default(),
        );
        assert_eq!(overrides.len(), 1);
        assert!(overrides.get(Archetype::Grunt).is_none());
        assert!(overrides.get(Archetype::Ranged).is_none());
        assert_eq!(overrides.rules_for(Archetype::Boss).len(), 1);
    }

    #[test]
    fn oversized_rule_lists_are_rejected() {
        let overrides = RuleOverrides::from_json_str(
            r#"{"Grunt": {"rules": [
                {"name": "Approach", "weight": 0.5},
                {"name": "Strafe", "weight": 0.5},
                {"name": "Feint", "weight": 0.5}
            ]}}"#,
            2,
            WeightBounds::default(),
        );
        assert!(overrides.is_empty());
    }

    #[test]
    fn unparsable_documents_yield_no_overrides() {
        assert!(RuleOverrides::from_json_str("[1, 2", 16, WeightBounds::default()).is_empty());
        assert!(RuleOverrides::from_json_str("[]", 16, WeightBounds::default()).is_empty());
    }

    #[test]
    fn defaults_stay_within_the_band() {
        for archetype in ARCHETYPES {
            assert!(default_rules(archetype).within(WeightBounds::default()));
        }
    }
}

//! Rate modifiers, difficulty presets and the policy catalog.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::CommandRejection;

/// Scalar multipliers applied on top of the base epidemic rates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Modifiers {
    pub infection_rate: f64,
    pub cure_speed: f64,
    pub mortality_rate: f64,
    pub point_generation: f64,
}

impl Default for Modifiers {
    fn default() -> Self {
        Self {
            infection_rate: 1.0,
            cure_speed: 1.0,
            mortality_rate: 1.0,
            point_generation: 1.0,
        }
    }
}

impl Modifiers {
    /// Multiplies every factor present in `effect` into the matching field.
    pub fn apply_policy_effect(self, effect: &PolicyEffect) -> Self {
        Self {
            infection_rate: self.infection_rate * effect.infection_rate.unwrap_or(1.0),
            cure_speed: self.cure_speed * effect.cure_speed.unwrap_or(1.0),
            mortality_rate: self.mortality_rate * effect.mortality_rate.unwrap_or(1.0),
            point_generation: self.point_generation * effect.point_generation.unwrap_or(1.0),
        }
    }

    /// Rebuilds modifiers from scratch: the difficulty preset folded with each
    /// unlocked policy in purchase order. Unknown ids are ignored.
    pub fn derive<'a>(
        difficulty: Difficulty,
        unlocked: impl IntoIterator<Item = &'a str>,
        catalog: &PolicyCatalog,
    ) -> Self {
        unlocked
            .into_iter()
            .filter_map(|id| catalog.get(id))
            .fold(difficulty.resolve(), |modifiers, policy| {
                modifiers.apply_policy_effect(&policy.effect)
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    pub fn resolve(self) -> Modifiers {
        match self {
            Difficulty::Easy => Modifiers {
                infection_rate: 0.8,
                cure_speed: 1.5,
                mortality_rate: 0.5,
                point_generation: 1.5,
            },
            Difficulty::Medium => Modifiers::default(),
            Difficulty::Hard => Modifiers {
                infection_rate: 1.5,
                cure_speed: 0.8,
                mortality_rate: 1.5,
                point_generation: 0.8,
            },
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Difficulty::Easy => "EASY",
            Difficulty::Medium => "MEDIUM",
            Difficulty::Hard => "HARD",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Difficulty::Easy => "Containment Protocols",
            Difficulty::Medium => "Real World",
            Difficulty::Hard => "Biological Warfare",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Difficulty {
    type Err = CommandRejection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "EASY" => Ok(Difficulty::Easy),
            "MEDIUM" => Ok(Difficulty::Medium),
            "HARD" => Ok(Difficulty::Hard),
            _ => Err(CommandRejection::UnknownDifficulty(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("policy id '{0}' defined more than once")]
    DuplicateId(String),
    #[error("policy '{0}' must cost at least one point")]
    Free(String),
    #[error("policy '{0}' has a non-positive effect multiplier")]
    BadMultiplier(String),
}

/// Multipliers a policy folds into [`Modifiers`]. Absent fields leave the
/// corresponding rate untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyEffect {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub infection_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cure_speed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mortality_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub point_generation: Option<f64>,
}

impl PolicyEffect {
    fn factors(&self) -> impl Iterator<Item = f64> {
        [
            self.infection_rate,
            self.cure_speed,
            self.mortality_rate,
            self.point_generation,
        ]
        .into_iter()
        .flatten()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub cost: u64,
    pub effect: PolicyEffect,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PolicyCatalog {
    policies: Vec<Policy>,
}

impl Default for PolicyCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

impl PolicyCatalog {
    pub fn new(policies: Vec<Policy>) -> Self {
        Self { policies }
    }

    pub fn standard() -> Self {
        fn policy(
            id: &str,
            name: &str,
            description: &str,
            cost: u64,
            effect: PolicyEffect,
        ) -> Policy {
            Policy {
                id: id.to_string(),
                name: name.to_string(),
                description: description.to_string(),
                cost,
                effect,
            }
        }

        Self::new(vec![
            policy(
                "masks",
                "Mask Mandate",
                "Slows transmission by 20%.",
                50,
                PolicyEffect {
                    infection_rate: Some(0.8),
                    ..PolicyEffect::default()
                },
            ),
            policy(
                "lockdown",
                "National Lockdown",
                "Cuts transmission by 60% but halves point income.",
                150,
                PolicyEffect {
                    infection_rate: Some(0.4),
                    point_generation: Some(0.5),
                    ..PolicyEffect::default()
                },
            ),
            policy(
                "vaccine_research",
                "Vaccine Research I",
                "Cure speed +50%.",
                200,
                PolicyEffect {
                    cure_speed: Some(1.5),
                    ..PolicyEffect::default()
                },
            ),
            policy(
                "vaccine_deploy",
                "Mass Deployment",
                "Cure speed +200%.",
                500,
                PolicyEffect {
                    cure_speed: Some(3.0),
                    ..PolicyEffect::default()
                },
            ),
            policy(
                "borders_closed",
                "Border Closure",
                "Stops nearly all transmission between regions.",
                300,
                PolicyEffect {
                    infection_rate: Some(0.1),
                    ..PolicyEffect::default()
                },
            ),
        ])
    }

    pub fn get(&self, id: &str) -> Option<&Policy> {
        self.policies.iter().find(|policy| policy.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Policy> {
        self.policies.iter()
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    pub fn validate(&self) -> Result<(), CatalogError> {
        let mut seen: Vec<&str> = Vec::with_capacity(self.policies.len());
        for policy in &self.policies {
            if seen.contains(&policy.id.as_str()) {
                return Err(CatalogError::DuplicateId(policy.id.clone()));
            }
            seen.push(&policy.id);
            if policy.cost == 0 {
                return Err(CatalogError::Free(policy.id.clone()));
            }
            if policy.effect.factors().any(|factor| !(factor > 0.0 && factor.is_finite())) {
                return Err(CatalogError::BadMultiplier(policy.id.clone()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_are_complete() {
        assert_eq!(Difficulty::Medium.resolve(), Modifiers::default());
        let easy = Difficulty::Easy.resolve();
        assert_eq!(easy.cure_speed, 1.5);
        assert_eq!(easy.mortality_rate, 0.5);
        let hard = Difficulty::Hard.resolve();
        assert_eq!(hard.infection_rate, 1.5);
        assert_eq!(hard.point_generation, 0.8);
    }

    #[test]
    fn absent_effect_fields_are_untouched() {
        let effect = PolicyEffect {
            infection_rate: Some(0.4),
            point_generation: Some(0.5),
            ..PolicyEffect::default()
        };
        let applied = Difficulty::Hard.resolve().apply_policy_effect(&effect);
        assert!((applied.infection_rate - 0.6).abs() < 1e-12);
        assert!((applied.point_generation - 0.4).abs() < 1e-12);
        assert_eq!(applied.cure_speed, 0.8);
        assert_eq!(applied.mortality_rate, 1.5);
    }

    #[test]
    fn derive_folds_in_purchase_order() {
        let catalog = PolicyCatalog::standard();
        let incremental = Difficulty::Medium
            .resolve()
            .apply_policy_effect(&catalog.get("masks").unwrap().effect)
            .apply_policy_effect(&catalog.get("borders_closed").unwrap().effect);
        let derived = Modifiers::derive(Difficulty::Medium, ["masks", "borders_closed"], &catalog);
        assert_eq!(incremental, derived);
    }

    #[test]
    fn difficulty_keys_parse_case_insensitively() {
        assert_eq!("hard".parse::<Difficulty>().unwrap(), Difficulty::Hard);
        assert_eq!(" EASY ".parse::<Difficulty>().unwrap(), Difficulty::Easy);
        assert!(matches!(
            "nightmare".parse::<Difficulty>(),
            Err(CommandRejection::UnknownDifficulty(_))
        ));
    }

    #[test]
    fn catalog_validation_rejects_bad_entries() {
        assert!(PolicyCatalog::standard().validate().is_ok());

        let mut policies: Vec<Policy> = PolicyCatalog::standard().iter().cloned().collect();
        policies.push(policies[0].clone());
        assert_eq!(
            PolicyCatalog::new(policies).validate(),
            Err(CatalogError::DuplicateId("masks".into()))
        );

        let zero = Policy {
            id: "free".into(),
            name: "Free".into(),
            description: String::new(),
            cost: 10,
            effect: PolicyEffect {
                cure_speed: Some(0.0),
                ..PolicyEffect::default()
            },
        };
        assert_eq!(
            PolicyCatalog::new(vec![zero]).validate(),
            Err(CatalogError::BadMultiplier("free".into()))
        );
    }
}

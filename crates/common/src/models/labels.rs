//! Closed label sets assigned by the classifier
//!
//! A label is either one of these variants or absent (`Option::None`).
//! Classifier output that does not match a label exactly never becomes a
//! default variant.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A label offered to the classifier, optionally with a description
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelChoice {
    pub name: &'static str,
    pub description: Option<&'static str>,
}

/// Research focus of a paper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Focus {
    Offensive,
    Defensive,
    Adversarial,
    Safety,
    Other,
}

impl Focus {
    pub const ALL: [Focus; 5] = [
        Focus::Offensive,
        Focus::Defensive,
        Focus::Adversarial,
        Focus::Safety,
        Focus::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Focus::Offensive => "Offensive",
            Focus::Defensive => "Defensive",
            Focus::Adversarial => "Adversarial",
            Focus::Safety => "Safety",
            Focus::Other => "Other",
        }
    }

    /// Exact match against the label text
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.as_str() == label)
    }

    pub fn choices() -> Vec<LabelChoice> {
        Self::ALL
            .iter()
            .map(|f| LabelChoice {
                name: f.as_str(),
                description: None,
            })
            .collect()
    }
}

impl fmt::Display for Focus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attack category studied by a paper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttackType {
    ModelEvasion,
    ModelExtraction,
    ModelInversion,
    ModelPoisoning,
    PromptInjection,
    Other,
}

impl AttackType {
    pub const ALL: [AttackType; 6] = [
        AttackType::ModelEvasion,
        AttackType::ModelExtraction,
        AttackType::ModelInversion,
        AttackType::ModelPoisoning,
        AttackType::PromptInjection,
        AttackType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AttackType::ModelEvasion => "Model Evasion",
            AttackType::ModelExtraction => "Model Extraction",
            AttackType::ModelInversion => "Model Inversion",
            AttackType::ModelPoisoning => "Model Poisoning",
            AttackType::PromptInjection => "Prompt Injection",
            AttackType::Other => "Other",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            AttackType::ModelEvasion => {
                "Inputs crafted to slip past a model's defenses or push it into wrong \
                 outputs that favor the attacker, without stealing the model or its data."
            }
            AttackType::ModelExtraction => {
                "Querying a model and training on its outputs to build a surrogate that \
                 replicates its behavior."
            }
            AttackType::ModelInversion => {
                "Interrogating a trained model to recover details of the data it was \
                 trained on, up to reconstructing private records."
            }
            AttackType::ModelPoisoning => {
                "Tampering with training data so the resulting model behaves the way \
                 the attacker wants."
            }
            AttackType::PromptInjection => {
                "Inputs to a language model that override or subvert its instructions, \
                 leading to leakage, misinformation or unintended actions."
            }
            AttackType::Other => "None of the above",
        }
    }

    /// Exact match against the label text
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.as_str() == label)
    }

    pub fn choices() -> Vec<LabelChoice> {
        Self::ALL
            .iter()
            .map(|a| LabelChoice {
                name: a.as_str(),
                description: Some(a.description()),
            })
            .collect()
    }
}

impl fmt::Display for AttackType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_focus_exact_match_only() {
        assert_eq!(Focus::from_label("Safety"), Some(Focus::Safety));
        assert_eq!(Focus::from_label("safety"), None);
        assert_eq!(Focus::from_label("Safety."), None);
        assert_eq!(Focus::from_label(""), None);
    }

    #[test]
    fn test_attack_type_labels_round_trip() {
        for attack in AttackType::ALL {
            assert_eq!(AttackType::from_label(attack.as_str()), Some(attack));
        }
        assert_eq!(AttackType::from_label("ModelEvasion"), None);
    }

    #[test]
    fn test_choices_carry_descriptions() {
        assert!(Focus::choices().iter().all(|c| c.description.is_none()));
        assert!(AttackType::choices().iter().all(|c| c.description.is_some()));
        assert_eq!(AttackType::choices().len(), 6);
    }
}

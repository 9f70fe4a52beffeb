//! Engine configuration.
//!
//! Loaded once from a JSON file. Exclusion shortcuts are expanded here into an
//! explicit table; nothing downstream re-parses the shortcut syntax.

use crate::{
    error::{RotaError, RotaResult},
    types::{Modality, Skill},
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillConfig {
    pub slug: String,
    #[serde(default)]
    pub label: Option<String>,
    /// Base weight of one assignment. Required, but kept optional in the file
    /// so a missing value is reported as a configuration error, not a parse error.
    #[serde(default)]
    pub weight: Option<f64>,
    /// Never overflow this skill to generalists, in any modality.
    #[serde(default)]
    pub no_overflow: bool,
    /// Every request for this skill is handled as strict.
    #[serde(default)]
    pub strict: bool,
    /// Skills tried in order when nobody at all fits the requested one.
    #[serde(default)]
    pub fallback: Vec<Skill>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModalityConfig {
    pub slug: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default = "default_factor")]
    pub factor: f64,
    /// Skills that never overflow within this modality.
    #[serde(default)]
    pub no_overflow: Vec<Skill>,
}

fn default_factor() -> f64 {
    1.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightOverride {
    pub skill: Skill,
    pub modality: Modality,
    pub weight: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BalancerConfig {
    /// Specialists below this weighted count are served first.
    #[serde(default)]
    pub min_assignments_per_skill: f64,
    /// Overflow to generalists once specialists are this much (percent) more loaded.
    pub imbalance_threshold_pct: f64,
    #[serde(default)]
    pub shift_start_buffer_minutes: u16,
    #[serde(default)]
    pub shift_end_buffer_minutes: u16,
}

/// Which assignments the worker's global modifier discounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ModifierPolicy {
    #[default]
    AllAssignments,
    WeightedOnly,
}

/// How an intent whose end is not after its start is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OvernightPolicy {
    /// Same-day windows only; anything else is a validation error.
    Reject,
    /// Keep `start..24:00` today and hand `00:00..end` back as carry-over.
    SplitAtMidnight,
}

impl OvernightPolicy {
    /// Overnight splitting arrived with config version 2.
    pub fn for_version(config_version: u32) -> Self {
        if config_version >= 2 {
            Self::SplitAtMidnight
        } else {
            Self::Reject
        }
    }
}

/// One skill an exclusion rule checks, in one modality.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ExclusionTarget {
    pub skill: Skill,
    pub modality: Modality,
}

/// Fully expanded exclusion rules: requests for `(skill, modality)` skip
/// workers who actively hold any of the listed targets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExclusionTable {
    rules: BTreeMap<(Skill, Modality), BTreeSet<ExclusionTarget>>,
}

impl ExclusionTable {
    /// Expand shortcut keys into explicit `(skill, modality)` entries.
    ///
    ///   `skill`          → that skill in every modality
    ///   `modality`       → every skill in that modality
    ///   `skill_modality` → exactly one pair
    ///
    /// List items are `skill` (same modality as the entry) or `skill_modality`.
    pub fn expand(
        shortcuts: &BTreeMap<String, Vec<String>>,
        skills: &[SkillConfig],
        modalities: &[ModalityConfig],
    ) -> RotaResult<Self> {
        let skill_set: BTreeSet<&str> = skills.iter().map(|s| s.slug.as_str()).collect();
        let modality_set: BTreeSet<&str> = modalities.iter().map(|m| m.slug.as_str()).collect();
        let mut rules: BTreeMap<(Skill, Modality), BTreeSet<ExclusionTarget>> = BTreeMap::new();

        for (key, items) in shortcuts {
            let pairs: Vec<(String, String)> = match expand_key(key, &skill_set, &modality_set)? {
                KeyScope::Skill(skill) => modality_set
                    .iter()
                    .map(|m| (skill.clone(), m.to_string()))
                    .collect(),
                KeyScope::Modality(modality) => skill_set
                    .iter()
                    .map(|s| (s.to_string(), modality.clone()))
                    .collect(),
                KeyScope::Pair(skill, modality) => vec![(skill, modality)],
            };

            for (skill, modality) in pairs {
                for item in items {
                    let target = expand_item(item, &modality, &skill_set, &modality_set)?;
                    if target.skill == skill && target.modality == modality {
                        return Err(RotaError::invalid_config(format!(
                            "exclusion rule '{key}' excludes its own skill '{item}'"
                        )));
                    }
                    rules
                        .entry((skill.clone(), modality.clone()))
                        .or_default()
                        .insert(target);
                }
            }
        }
        Ok(Self { rules })
    }

    pub fn targets(&self, skill: &str, modality: &str) -> Option<&BTreeSet<ExclusionTarget>> {
        self.rules.get(&(skill.to_string(), modality.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }
}

enum KeyScope {
    Skill(String),
    Modality(String),
    Pair(String, String),
}

fn expand_key(
    key: &str,
    skills: &BTreeSet<&str>,
    modalities: &BTreeSet<&str>,
) -> RotaResult<KeyScope> {
    let is_skill = skills.contains(key);
    let is_modality = modalities.contains(key);
    match (is_skill, is_modality) {
        (true, true) => Err(RotaError::invalid_config(format!(
            "exclusion key '{key}' names both a skill and a modality"
        ))),
        (true, false) => Ok(KeyScope::Skill(key.to_string())),
        (false, true) => Ok(KeyScope::Modality(key.to_string())),
        (false, false) => split_pair(key, skills, modalities)
            .map(|(s, m)| KeyScope::Pair(s, m))
            .ok_or_else(|| RotaError::invalid_config(format!("unknown exclusion key '{key}'"))),
    }
}

fn expand_item(
    item: &str,
    default_modality: &str,
    skills: &BTreeSet<&str>,
    modalities: &BTreeSet<&str>,
) -> RotaResult<ExclusionTarget> {
    if skills.contains(item) {
        return Ok(ExclusionTarget {
            skill: item.to_string(),
            modality: default_modality.to_string(),
        });
    }
    split_pair(item, skills, modalities)
        .map(|(skill, modality)| ExclusionTarget { skill, modality })
        .ok_or_else(|| RotaError::UnknownSkill {
            skill: item.to_string(),
        })
}

/// Split `skill_modality`; skill slugs may themselves contain underscores.
fn split_pair(
    key: &str,
    skills: &BTreeSet<&str>,
    modalities: &BTreeSet<&str>,
) -> Option<(String, String)> {
    key.match_indices('_').find_map(|(idx, _)| {
        let (skill, modality) = (&key[..idx], &key[idx + 1..]);
        (skills.contains(skill) && modalities.contains(modality))
            .then(|| (skill.to_string(), modality.to_string()))
    })
}

/// On-disk layout of the config file.
#[derive(Debug, Clone, Deserialize)]
struct ConfigFile {
    #[serde(default = "default_version")]
    config_version: u32,
    skills: Vec<SkillConfig>,
    modalities: Vec<ModalityConfig>,
    #[serde(default)]
    weight_overrides: Vec<WeightOverride>,
    balancer: BalancerConfig,
    #[serde(default)]
    exclusion_rules: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    modifier_policy: ModifierPolicy,
    #[serde(default)]
    overnight_policy: Option<OvernightPolicy>,
}

fn default_version() -> u32 {
    1
}

#[derive(Debug, Clone)]
pub struct RotaConfig {
    pub config_version: u32,
    pub skills: Vec<SkillConfig>,
    pub modalities: Vec<ModalityConfig>,
    pub weight_overrides: BTreeMap<(Skill, Modality), f64>,
    pub balancer: BalancerConfig,
    pub exclusions: ExclusionTable,
    pub modifier_policy: ModifierPolicy,
    pub overnight_policy: OvernightPolicy,
}

impl RotaConfig {
    /// Load from a JSON config file.
    /// In tests, use RotaConfig::default_test().
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        Ok(Self::from_json(&content)?)
    }

    pub fn from_json(content: &str) -> RotaResult<Self> {
        let file: ConfigFile = serde_json::from_str(content)?;
        let exclusions = ExclusionTable::expand(&file.exclusion_rules, &file.skills, &file.modalities)?;
        let config = Self {
            config_version: file.config_version,
            overnight_policy: file
                .overnight_policy
                .unwrap_or_else(|| OvernightPolicy::for_version(file.config_version)),
            weight_overrides: file
                .weight_overrides
                .into_iter()
                .map(|w| ((w.skill, w.modality), w.weight))
                .collect(),
            skills: file.skills,
            modalities: file.modalities,
            balancer: file.balancer,
            exclusions,
            modifier_policy: file.modifier_policy,
        };
        config.validate()?;
        log::debug!(
            "Config v{} loaded: {} skills, {} modalities, {} exclusion entries",
            config.config_version,
            config.skills.len(),
            config.modalities.len(),
            config.exclusions.len()
        );
        Ok(config)
    }

    /// Replace the exclusion table from shortcut rules.
    pub fn with_exclusion_rules(mut self, shortcuts: &BTreeMap<String, Vec<String>>) -> RotaResult<Self> {
        self.exclusions = ExclusionTable::expand(shortcuts, &self.skills, &self.modalities)?;
        Ok(self)
    }

    fn validate(&self) -> RotaResult<()> {
        let mut seen = BTreeSet::new();
        for skill in &self.skills {
            if !seen.insert(skill.slug.as_str()) {
                return Err(RotaError::invalid_config(format!("duplicate skill '{}'", skill.slug)));
            }
            match skill.weight {
                Some(w) if w > 0.0 && w.is_finite() => {}
                Some(w) => {
                    return Err(RotaError::invalid_config(format!(
                        "skill '{}' has non-positive weight {w}",
                        skill.slug
                    )))
                }
                None => {}
            }
            for fallback in &skill.fallback {
                self.require_skill(fallback)?;
            }
        }
        let mut seen = BTreeSet::new();
        for modality in &self.modalities {
            if !seen.insert(modality.slug.as_str()) {
                return Err(RotaError::invalid_config(format!(
                    "duplicate modality '{}'",
                    modality.slug
                )));
            }
            for skill in &modality.no_overflow {
                self.require_skill(skill)?;
            }
        }
        for (skill, modality) in self.weight_overrides.keys() {
            self.require_skill(skill)?;
            self.require_modality(modality)?;
        }
        if !(0.0..=100.0).contains(&self.balancer.imbalance_threshold_pct) {
            return Err(RotaError::invalid_config(format!(
                "imbalance_threshold_pct {} outside 0..=100",
                self.balancer.imbalance_threshold_pct
            )));
        }
        Ok(())
    }

    pub fn require_skill(&self, skill: &str) -> RotaResult<&SkillConfig> {
        self.skills
            .iter()
            .find(|s| s.slug == skill)
            .ok_or_else(|| RotaError::UnknownSkill {
                skill: skill.to_string(),
            })
    }

    pub fn require_modality(&self, modality: &str) -> RotaResult<&ModalityConfig> {
        self.modalities
            .iter()
            .find(|m| m.slug == modality)
            .ok_or_else(|| RotaError::UnknownModality {
                modality: modality.to_string(),
            })
    }

    pub fn skill_slugs(&self) -> impl Iterator<Item = &str> {
        self.skills.iter().map(|s| s.slug.as_str())
    }

    /// Weight of one assignment before any worker modifier.
    pub fn base_weight(&self, skill: &str, modality: &str) -> RotaResult<f64> {
        let skill_cfg = self.require_skill(skill)?;
        let modality_cfg = self.require_modality(modality)?;
        if let Some(w) = self.weight_overrides.get(&(skill.to_string(), modality.to_string())) {
            return Ok(*w);
        }
        skill_cfg
            .weight
            .map(|w| w * modality_cfg.factor)
            .ok_or_else(|| RotaError::MissingWeight {
                skill: skill.to_string(),
                modality: modality.to_string(),
            })
    }

    pub fn overflow_allowed(&self, skill: &str, modality: &str) -> RotaResult<bool> {
        let skill_cfg = self.require_skill(skill)?;
        let modality_cfg = self.require_modality(modality)?;
        Ok(!skill_cfg.no_overflow && !modality_cfg.no_overflow.iter().any(|s| s == skill))
    }

    /// Config with hardcoded defaults for use in unit tests.
    pub fn default_test() -> Self {
        let skill = |slug: &str| SkillConfig {
            slug: slug.into(),
            label: None,
            weight: Some(1.0),
            no_overflow: false,
            strict: false,
            fallback: vec![],
        };
        let modality = |slug: &str| ModalityConfig {
            slug: slug.into(),
            label: None,
            factor: 1.0,
            no_overflow: vec![],
        };
        Self {
            config_version: 2,
            skills: vec![skill("normal"), skill("notfall"), skill("cardiac"), skill("msk")],
            modalities: vec![modality("ct"), modality("mr"), modality("xray")],
            weight_overrides: BTreeMap::new(),
            balancer: BalancerConfig {
                min_assignments_per_skill: 0.0,
                imbalance_threshold_pct: 30.0,
                shift_start_buffer_minutes: 0,
                shift_end_buffer_minutes: 0,
            },
            exclusions: ExclusionTable::default(),
            modifier_policy: ModifierPolicy::AllAssignments,
            overnight_policy: OvernightPolicy::SplitAtMidnight,
        }
    }
}

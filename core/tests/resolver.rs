//! Skill resolution precedence.

use proptest::prelude::*;
use rota_core::{
    intent::ShiftIntent,
    resolver::{combine, resolve_level, survives_reload, SkillResolver, SkillSources},
    roster::RosterEntry,
    skill::{SkillLevel, SkillValue},
    types::TimeWindow,
};

fn level() -> impl Strategy<Value = SkillLevel> {
    prop::sample::select(SkillLevel::ALL.to_vec())
}

fn shift() -> ShiftIntent {
    ShiftIntent::new("s1", "ana", "ct", TimeWindow::parse("08:00", "16:00").unwrap())
}

proptest! {
    #[test]
    fn prop_resolution_is_pure(roster in level(), rule in prop::option::of(level()), manual in prop::option::of(level())) {
        let sources = SkillSources { roster, rule_override: rule, manual };
        prop_assert_eq!(resolve_level(sources), resolve_level(sources));
    }

    #[test]
    fn prop_roster_exclusion_holds_without_manual_edit(rule in prop::option::of(level())) {
        let sources = SkillSources { roster: SkillLevel::Excluded, rule_override: rule, manual: None };
        prop_assert_eq!(resolve_level(sources), SkillLevel::Excluded);
    }

    #[test]
    fn prop_manual_edit_always_wins(roster in level(), rule in prop::option::of(level()), manual in level()) {
        let sources = SkillSources { roster, rule_override: rule, manual: Some(manual) };
        prop_assert_eq!(resolve_level(sources), manual);
    }

    #[test]
    fn prop_trainee_needs_a_rule(rule in prop::option::of(level())) {
        let resolved = combine(SkillLevel::Weighted, rule);
        let expected = match rule {
            Some(SkillLevel::Specialist | SkillLevel::Weighted) => SkillLevel::Weighted,
            _ => SkillLevel::Excluded,
        };
        prop_assert_eq!(resolved, expected);
    }

    #[test]
    fn prop_reload_only_drops_over_exclusion(roster in level(), manual in level()) {
        if !survives_reload(roster, manual) {
            prop_assert_eq!(roster, SkillLevel::Excluded);
            prop_assert!(matches!(manual, SkillLevel::Excluded | SkillLevel::Generalist));
        }
    }
}

#[test]
fn unlisted_cells_resolve_to_generalist() {
    let entry = RosterEntry::new("ana");
    let resolver = SkillResolver::new(&entry);
    assert_eq!(resolver.resolve(&shift(), "cardiac").unwrap(), SkillValue::Generalist);
    assert_eq!(
        resolver.sources(&shift(), "cardiac"),
        SkillSources::roster_only(SkillLevel::Generalist)
    );
}

#[test]
fn trainee_with_rule_carries_w_modifier() {
    let entry = RosterEntry::new("ana")
        .with_skill("cardiac", "ct", SkillLevel::Weighted)
        .with_modifiers(1.0, 1.25);
    let resolver = SkillResolver::new(&entry);

    let plain = shift();
    assert_eq!(resolver.resolve(&plain, "cardiac").unwrap(), SkillValue::Excluded);

    let ruled = shift().with_rule("cardiac", SkillLevel::Specialist);
    assert_eq!(
        resolver.resolve(&ruled, "cardiac").unwrap(),
        SkillValue::Weighted { modifier: 1.25 }
    );
}

#[test]
fn rule_cannot_lift_a_roster_exclusion() {
    let entry = RosterEntry::new("ana").with_skill("msk", "ct", SkillLevel::Excluded);
    let resolver = SkillResolver::new(&entry);
    let ruled = shift().with_rule("msk", SkillLevel::Specialist);
    assert_eq!(resolver.resolve(&ruled, "msk").unwrap(), SkillValue::Excluded);

    let edited = ruled.with_manual("msk", SkillLevel::Generalist);
    assert_eq!(resolver.resolve(&edited, "msk").unwrap(), SkillValue::Generalist);
}

#[test]
fn baseline_is_per_modality() {
    let entry = RosterEntry::new("ana").with_skill("cardiac", "mr", SkillLevel::Specialist);
    let resolver = SkillResolver::new(&entry);
    let map = resolver.resolve_shift(&shift(), ["cardiac", "msk"]).unwrap();
    assert_eq!(map["cardiac"], SkillValue::Generalist);
    assert_eq!(map["msk"], SkillValue::Generalist);
}

#[test]
fn prune_drops_only_non_surviving_manual_values() {
    let entry = RosterEntry::new("ana")
        .with_skill("cardiac", "ct", SkillLevel::Excluded)
        .with_skill("msk", "ct", SkillLevel::Excluded);
    let resolver = SkillResolver::new(&entry);
    let mut edited = shift()
        .with_manual("cardiac", SkillLevel::Generalist)
        .with_manual("msk", SkillLevel::Specialist)
        .with_manual("normal", SkillLevel::Excluded);

    let dropped = resolver.prune_for_reload(&mut edited);
    assert_eq!(dropped, vec!["cardiac".to_string()]);
    assert!(edited.manual_overrides.contains_key("msk"));
    assert!(edited.manual_overrides.contains_key("normal"));
}

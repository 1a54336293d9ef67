//! Defaults fill and range clamping for the loaded config.

use serde::Serialize;

use crate::model::*;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigIssue {
    pub path: String,
    pub message: String,
}

/// Bring a parsed config into canonical form. Idempotent: applying this to
/// an already-normalized config changes nothing.
pub fn normalize(cfg: &mut AgentConfig) {
    if cfg.order_board_path.trim().is_empty() {
        cfg.order_board_path = "order_board.json".into();
    } else {
        cfg.order_board_path = cfg.order_board_path.trim().to_string();
    }

    cfg.api.base_url = cfg.api.base_url.trim_end_matches('/').to_string();
    cfg.api.timeout_secs = cfg.api.timeout_secs.clamp(1, 300);

    let t = &mut cfg.bank_travel;
    t.move_seconds_per_tile = t.move_seconds_per_tile.max(1);
    t.item_use_seconds = t.item_use_seconds.max(1);

    for ch in &mut cfg.characters {
        ch.name = ch.name.trim().to_string();
        if ch.refresh_stale_secs == 0 {
            ch.refresh_stale_secs = 30;
        }

        ch.rest.trigger_pct = ch.rest.trigger_pct.clamp(1, 100);
        ch.rest.target_pct = ch.rest.target_pct.clamp(ch.rest.trigger_pct, 100);

        ch.deposit.threshold_pct = ch.deposit.threshold_pct.clamp(10, 100);
        canonicalize_keeps(&mut ch.deposit.keep_by_code);
        canonicalize_codes(&mut ch.deposit.sell_codes);

        ch.expansion.max_gold_pct = ch.expansion.max_gold_pct.clamp(1, 100);
        ch.expansion.check_interval_ms = ch.expansion.check_interval_ms.max(60_000);

        canonicalize_codes(&mut ch.event.events);
        ch.event.min_winrate = ch.event.min_winrate.clamp(0, 100);
        ch.event.max_monster_type = match ch.event.max_monster_type.trim() {
            "" => "elite".to_string(),
            other => other.to_ascii_lowercase(),
        };
    }
}

/// Merge duplicate codes (max quantity wins), drop zero keeps, sort by code.
fn canonicalize_keeps(keeps: &mut Vec<KeepEntry>) {
    let mut merged: Vec<KeepEntry> = Vec::with_capacity(keeps.len());
    for entry in keeps.drain(..) {
        let code = entry.code.trim().to_string();
        if code.is_empty() || entry.quantity == 0 {
            continue;
        }
        match merged.iter_mut().find(|e| e.code == code) {
            Some(existing) => existing.quantity = existing.quantity.max(entry.quantity),
            None => merged.push(KeepEntry {
                code,
                quantity: entry.quantity,
            }),
        }
    }
    merged.sort_by(|a, b| a.code.cmp(&b.code));
    *keeps = merged;
}

fn canonicalize_codes(codes: &mut Vec<String>) {
    let mut cleaned: Vec<String> = codes
        .drain(..)
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect();
    cleaned.sort();
    cleaned.dedup();
    *codes = cleaned;
}

/// Structural checks that cannot be fixed by normalization. Returned rows
/// surface verbatim on the config HTTP endpoint.
pub fn validate(cfg: &AgentConfig) -> Vec<ConfigIssue> {
    let mut issues = Vec::new();

    if cfg.characters.is_empty() {
        issues.push(ConfigIssue {
            path: "characters".into(),
            message: "at least one character is required".into(),
        });
    }
    if cfg.characters.len() > 6 {
        issues.push(ConfigIssue {
            path: "characters".into(),
            message: format!("at most 6 characters are supported, got {}", cfg.characters.len()),
        });
    }

    for (i, ch) in cfg.characters.iter().enumerate() {
        if ch.name.is_empty() {
            issues.push(ConfigIssue {
                path: format!("characters[{i}].name"),
                message: "character name must not be empty".into(),
            });
        }
        if cfg.characters[..i].iter().any(|o| o.name == ch.name) {
            issues.push(ConfigIssue {
                path: format!("characters[{i}].name"),
                message: format!("duplicate character name '{}'", ch.name),
            });
        }
    }

    if cfg.api.base_url.is_empty() {
        issues.push(ConfigIssue {
            path: "api.baseUrl".into(),
            message: "api base url must not be empty".into(),
        });
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn cfg_with_char(name: &str) -> AgentConfig {
        let mut cfg = AgentConfig::default();
        cfg.characters.push(CharacterSettings {
            name: name.into(),
            ..Default::default()
        });
        cfg
    }

    #[test]
    fn normalize_fills_defaults() {
        let mut cfg = cfg_with_char("  Worker  ");
        cfg.order_board_path = "  ".into();
        cfg.characters[0].refresh_stale_secs = 0;

        normalize(&mut cfg);

        assert_eq!(cfg.order_board_path, "order_board.json");
        assert_eq!(cfg.characters[0].name, "Worker");
        assert_eq!(cfg.characters[0].refresh_stale_secs, 30);
    }

    #[test]
    fn rest_target_never_below_trigger() {
        let mut cfg = cfg_with_char("Worker");
        cfg.characters[0].rest.trigger_pct = 70;
        cfg.characters[0].rest.target_pct = 30;

        normalize(&mut cfg);

        assert_eq!(cfg.characters[0].rest.target_pct, 70);
    }

    #[test]
    fn keeps_merge_and_sort() {
        let mut cfg = cfg_with_char("Worker");
        cfg.characters[0].deposit.keep_by_code = vec![
            KeepEntry { code: "small_health_potion".into(), quantity: 10 },
            KeepEntry { code: "air_boost_potion".into(), quantity: 5 },
            KeepEntry { code: "small_health_potion".into(), quantity: 25 },
            KeepEntry { code: "".into(), quantity: 3 },
        ];

        normalize(&mut cfg);

        let keeps = &cfg.characters[0].deposit.keep_by_code;
        assert_eq!(keeps.len(), 2);
        assert_eq!(keeps[0].code, "air_boost_potion");
        assert_eq!(keeps[1].quantity, 25);
    }

    #[test]
    fn validate_flags_duplicates_and_empty() {
        let mut cfg = cfg_with_char("Worker");
        cfg.characters.push(CharacterSettings {
            name: "Worker".into(),
            ..Default::default()
        });
        cfg.characters.push(CharacterSettings::default());

        let issues = validate(&cfg);
        assert!(issues.iter().any(|i| i.path == "characters[1].name"));
        assert!(issues.iter().any(|i| i.message.contains("must not be empty")));
    }

    proptest! {
        #[test]
        fn normalize_is_idempotent(
            trigger in 0u32..200,
            target in 0u32..200,
            threshold in 0u32..200,
            stale in 0u64..100,
            name in "[ A-Za-z]{0,12}",
        ) {
            let mut cfg = AgentConfig::default();
            cfg.characters.push(CharacterSettings {
                name,
                refresh_stale_secs: stale,
                ..Default::default()
            });
            cfg.characters[0].rest.trigger_pct = trigger;
            cfg.characters[0].rest.target_pct = target;
            cfg.characters[0].deposit.threshold_pct = threshold;

            normalize(&mut cfg);
            let once = cfg.clone();
            normalize(&mut cfg);
            prop_assert_eq!(once, cfg);
        }
    }
}

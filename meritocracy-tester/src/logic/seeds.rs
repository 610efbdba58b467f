use anyhow::{Result, bail};
use std::collections::HashMap;

pub const DEFAULT_SEED: u64 = 1337;

/// A resolved seed plus the token it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedInfo {
    pub seed: u64,
    pub token: Option<String>,
}

impl SeedInfo {
    #[must_use]
    pub const fn from_numeric(seed: u64) -> Self {
        Self { seed, token: None }
    }

    #[must_use]
    pub const fn from_token(seed: u64, token: String) -> Self {
        Self {
            seed,
            token: Some(token),
        }
    }
}

/// Resolve CLI seed arguments into canonical seeds.
///
/// Accepts decimal integers (negative values use their magnitude), `0x`
/// hexadecimal literals, and `random`, which draws a fresh seed from entropy.
pub fn resolve_seed_inputs(tokens: &[String]) -> Result<Vec<SeedInfo>> {
    let mut pending: Vec<SeedInfo> = Vec::new();

    for token in tokens {
        if token.is_empty() {
            continue;
        }

        if token.eq_ignore_ascii_case("random") {
            pending.push(SeedInfo::from_token(rand::random(), token.to_lowercase()));
            continue;
        }

        if let Ok(value) = token.parse::<i64>() {
            pending.push(SeedInfo::from_numeric(value.unsigned_abs()));
            continue;
        }

        if let Ok(value) = token.parse::<u64>() {
            pending.push(SeedInfo::from_numeric(value));
            continue;
        }

        if let Some(hex) = token
            .strip_prefix("0x")
            .or_else(|| token.strip_prefix("0X"))
            && let Ok(value) = u64::from_str_radix(hex, 16)
        {
            pending.push(SeedInfo::from_token(value, token.to_lowercase()));
            continue;
        }

        bail!("Unrecognized seed token: {token}");
    }

    let mut deduped: Vec<SeedInfo> = Vec::new();
    let mut index: HashMap<u64, usize> = HashMap::new();

    for info in pending {
        if let Some(&existing) = index.get(&info.seed) {
            if let Some(entry) = deduped.get_mut(existing)
                && entry.token.is_none()
                && info.token.is_some()
            {
                *entry = info;
            }
        } else {
            index.insert(info.seed, deduped.len());
            deduped.push(info);
        }
    }

    if deduped.is_empty() {
        deduped.push(SeedInfo::from_numeric(DEFAULT_SEED));
    }

    Ok(deduped)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(raw: &[&str]) -> Vec<String> {
        raw.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn resolves_numeric_and_hex() {
        let seeds = resolve_seed_inputs(&tokens(&["42", "-7", "0xff"])).unwrap();
        assert_eq!(
            seeds.iter().map(|s| s.seed).collect::<Vec<_>>(),
            vec![42, 7, 255]
        );
        assert_eq!(seeds[2].token.as_deref(), Some("0xff"));
    }

    #[test]
    fn duplicates_keep_first_slot_and_prefer_tokens() {
        let seeds = resolve_seed_inputs(&tokens(&["255", "3", "0xFF", "3"])).unwrap();
        assert_eq!(seeds.len(), 2);
        assert_eq!(seeds[0].seed, 255);
        assert_eq!(seeds[0].token.as_deref(), Some("0xff"));
    }

    #[test]
    fn empty_input_falls_back_to_default() {
        let seeds = resolve_seed_inputs(&[]).unwrap();
        assert_eq!(seeds, vec![SeedInfo::from_numeric(DEFAULT_SEED)]);
    }

    #[test]
    fn rejects_garbage() {
        assert!(resolve_seed_inputs(&tokens(&["CL-ORANGE42"])).is_err());
    }

    #[test]
    fn random_draws_a_seed() {
        let seeds = resolve_seed_inputs(&tokens(&["random"])).unwrap();
        assert_eq!(seeds.len(), 1);
        assert_eq!(seeds[0].token.as_deref(), Some("random"));
    }
}

use anyhow::{Context, Result};
use meritocracy_game::{SettlementConfig, Submission, load_default_config};
use std::{fs, path::Path};

pub fn split_csv(s: &str) -> Vec<String> {
    s.split(',')
        .map(|x| x.trim().to_string())
        .filter(|x| !x.is_empty())
        .collect()
}

/// Read a settlement config file, or the bundled defaults when no path is given.
pub fn load_config(path: Option<&Path>) -> Result<SettlementConfig> {
    let Some(path) = path else {
        return load_default_config().context("bundled settlement config is invalid");
    };
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    SettlementConfig::from_json(&raw).with_context(|| format!("invalid config {}", path.display()))
}

/// Read a JSON array of submissions in arrival order.
pub fn load_submissions(path: &Path) -> Result<Vec<Submission>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read submissions {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse submissions {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file(label: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!(
            "meritocracy-util-{label}-{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        ));
        fs::write(&path, contents).expect("write temp file");
        path
    }

    #[test]
    fn split_csv_trims_and_filters() {
        let parts = split_csv(" smoke, ,ties,  payoffs ");
        assert_eq!(parts, vec!["smoke", "ties", "payoffs"]);
    }

    #[test]
    fn load_config_defaults_without_path() {
        let cfg = load_config(None).unwrap();
        assert_eq!(cfg, SettlementConfig::default());
    }

    #[test]
    fn load_config_reads_partial_file() {
        let path = temp_file("cfg", r#"{ "subgroup_size": 3, "demand_tracked": true }"#);
        let cfg = load_config(Some(&path)).unwrap();
        assert_eq!(cfg.subgroup_size, 3);
        assert!(cfg.demand_tracked);
        assert_eq!(cfg.group_labels.len(), 16);
    }

    #[test]
    fn load_config_rejects_unknown_fields() {
        let path = temp_file("bad-cfg", r#"{ "subgroupSize": 3 }"#);
        let err = load_config(Some(&path)).unwrap_err();
        assert!(format!("{err:#}").contains("invalid config"));
    }

    #[test]
    fn load_submissions_parses_optional_demand() {
        let path = temp_file(
            "subs",
            r#"[{ "player": "a", "contribution": 4 }, { "player": "b", "contribution": 2.5, "demand": 7 }]"#,
        );
        let subs = load_submissions(&path).unwrap();
        assert_eq!(subs.len(), 2);
        assert_eq!(subs[0].demand, None);
        assert_eq!(subs[1].demand, Some(7.0));
    }
}

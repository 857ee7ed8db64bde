//! Tests for profiles, config files and environment resolution.

use std::{collections::HashMap, fs, time::Duration};

use ouros_diff::{
    HarnessConfig, HarnessError, OracleSpec, Profile, SourceMode,
    config::{CONFIG_ENV, PROFILE_ENV},
};
use pretty_assertions::assert_eq;

fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
        .collect();
    move |key| vars.get(key).cloned()
}

#[test]
fn differential_profile_defaults() {
    let config = HarnessConfig::differential();
    assert_eq!(config.primary_timeout(), Duration::from_secs(5));
    assert_eq!(config.oracle_timeout(), Duration::from_secs(10));
    assert_eq!(
        config.oracles,
        [OracleSpec::inline("python3", "python3"), OracleSpec::inline("pypy3", "pypy3")]
    );
    assert_eq!(config.oracles[0].args, ["-c"]);
    assert_eq!(config.dialect_mask, u8::MAX);
    assert_eq!(config.known_gaps, [["getattr".to_owned(), "elems".to_owned()]]);
    assert_eq!(config, HarnessConfig::default());
}

#[test]
fn interactive_profile_defaults() {
    let config = HarnessConfig::interactive();
    assert_eq!(config.primary_timeout(), Duration::from_secs(1));
    assert_eq!(config.oracle_timeout(), Duration::from_secs(5));
    assert_eq!(config.oracles.len(), 1);
    assert_eq!(config.oracles[0].source, SourceMode::TempFile);
    assert!(config.oracles[0].args.is_empty());
    assert_eq!(config.dialect_mask, 0);
}

#[test]
fn profiles_parse_by_name() {
    assert_eq!("differential".parse::<Profile>().unwrap(), Profile::Differential);
    assert_eq!(" interactive\n".parse::<Profile>().unwrap(), Profile::Interactive);
    assert_eq!(Profile::Interactive.to_string(), "interactive");
    let err = "fast".parse::<Profile>().unwrap_err();
    assert!(matches!(err, HarnessError::UnknownProfile(ref name) if name == "fast"), "{err}");
}

#[test]
fn config_file_overrides_only_given_fields() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    fs::write(
        &path,
        r#"{
            "primary_timeout_ms": 250,
            "oracles": [{ "name": "py", "program": "/usr/bin/python3", "source": "temp_file" }],
            "known_gaps": []
        }"#,
    )
    .unwrap();

    let config = HarnessConfig::load(&path).unwrap();
    assert_eq!(config.primary_timeout(), Duration::from_millis(250));
    assert_eq!(config.oracle_timeout(), Duration::from_secs(10));
    assert_eq!(
        config.oracles,
        [OracleSpec::temp_file("py", "/usr/bin/python3")]
    );
    assert!(config.known_gaps.is_empty());
    assert_eq!(config.dialect_mask, u8::MAX);
}

#[test]
fn unknown_fields_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    fs::write(&path, r#"{ "primary_timeout": 250 }"#).unwrap();
    let err = HarnessConfig::load(&path).unwrap_err();
    assert!(matches!(err, HarnessError::ConfigParse { .. }), "{err}");
}

#[test]
fn missing_file_is_a_read_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = HarnessConfig::load(dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, HarnessError::ConfigRead { .. }), "{err}");
    assert!(err.to_string().contains("absent.json"), "{err}");
}

#[test]
fn environment_defaults_to_differential() {
    let config = HarnessConfig::from_lookup(lookup(&[])).unwrap();
    assert_eq!(config, HarnessConfig::differential());
    let config = HarnessConfig::from_lookup(lookup(&[(PROFILE_ENV, "")])).unwrap();
    assert_eq!(config, HarnessConfig::differential());
}

#[test]
fn environment_selects_a_profile() {
    let config = HarnessConfig::from_lookup(lookup(&[(PROFILE_ENV, "interactive")])).unwrap();
    assert_eq!(config, HarnessConfig::interactive());
    let err = HarnessConfig::from_lookup(lookup(&[(PROFILE_ENV, "bogus")])).unwrap_err();
    assert!(matches!(err, HarnessError::UnknownProfile(_)));
}

#[test]
fn config_file_takes_precedence_over_profile() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    fs::write(&path, r#"{ "dialect_mask": 3 }"#).unwrap();
    let path = path.to_str().unwrap();

    let config = HarnessConfig::from_lookup(lookup(&[(CONFIG_ENV, path), (PROFILE_ENV, "interactive")])).unwrap();
    assert_eq!(config.dialect_mask, 3);
    assert_eq!(config.primary_timeout(), Duration::from_secs(5));
}

#[test]
fn oracle_spec_builds_a_command_oracle() {
    use ouros_diff::{Deadline, Oracle, OracleVerdict};

    let spec = OracleSpec {
        name: "shell".to_owned(),
        program: "sh".to_owned(),
        args: vec!["-c".to_owned()],
        source: SourceMode::Inline,
    };
    let oracle = spec.build();
    assert_eq!(oracle.name(), "shell");
    let result = oracle.run(b"exit 4", Deadline::after(Duration::from_secs(10)));
    assert_eq!(result.verdict, OracleVerdict::Rejected { code: Some(4) });
}

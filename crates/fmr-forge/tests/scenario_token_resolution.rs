use fmr_forge::resolve_token;
use std::io::Write;

#[test]
fn scenario_dash_selects_anonymous_mode() {
    assert_eq!(resolve_token("-").unwrap(), None);
}

#[test]
fn scenario_plain_value_is_the_token_itself() {
    assert_eq!(
        resolve_token("ghp_abcdef").unwrap(),
        Some("ghp_abcdef".to_string())
    );
}

#[test]
fn scenario_path_value_reads_and_trims_the_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "  ghp_from_file  ").unwrap();

    let token = resolve_token(file.path().to_str().unwrap()).unwrap();
    assert_eq!(token, Some("ghp_from_file".to_string()));
}

#[test]
fn scenario_missing_or_empty_token_file_is_fatal() {
    assert!(resolve_token("/definitely/not/here/oauth").is_err());

    let file = tempfile::NamedTempFile::new().unwrap();
    let err = resolve_token(file.path().to_str().unwrap()).unwrap_err();
    assert!(err.to_string().contains("empty"));
}

//! Build information injected at compile time.
//!
//! Release pipelines set `RABBITCAT_RELEASE_VERSION`; otherwise the git
//! description emitted by `build.rs` is used, and outside of a git checkout
//! the crate version.

use crate::utils::format_table;

// vergen writes this when a value could not be determined
const PLACEHOLDER: &str = "VERGEN_IDEMPOTENT_OUTPUT";

fn known(value: Option<&'static str>) -> Option<&'static str> {
    value.filter(|v| !v.is_empty() && *v != PLACEHOLDER)
}

pub fn get_version() -> &'static str {
    known(option_env!("RABBITCAT_RELEASE_VERSION"))
        .or(known(option_env!("VERGEN_GIT_DESCRIBE")))
        .unwrap_or(env!("CARGO_PKG_VERSION"))
}

pub fn get_build_date() -> &'static str {
    known(option_env!("VERGEN_BUILD_DATE")).unwrap_or("unknown")
}

/// Target triple of this build.
pub fn get_target_triple() -> String {
    known(option_env!("VERGEN_CARGO_TARGET_TRIPLE")).unwrap_or("unknown").to_owned()
}

pub fn version_table() -> String {
    let mut info = vec![
        ("Version", get_version().to_owned()),
        ("Build Date", get_build_date().to_owned()),
        ("Target", get_target_triple()),
    ];
    if let Some(sha) = known(option_env!("VERGEN_GIT_SHA")) {
        info.push(("Commit", sha.to_owned()));
    }
    if let Some(rustc) = known(option_env!("VERGEN_RUSTC_SEMVER")) {
        info.push(("Rustc", rustc.to_owned()));
    }
    if known(option_env!("VERGEN_CARGO_DEBUG")) == Some("true") {
        info.push(("Profile", "debug".to_owned()));
    }
    format_table(&info)
}

pub fn print_version() {
    print!("rabbitcat {}\n\n{}", get_version(), version_table());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_values_are_ignored() {
        assert_eq!(known(Some(PLACEHOLDER)), None);
        assert_eq!(known(Some("")), None);
        assert_eq!(known(Some("v1.2.0")), Some("v1.2.0"));
    }

    #[test]
    fn version_is_never_empty() {
        assert!(!get_version().is_empty());
        assert!(version_table().contains("Version"));
    }

    #[test]
    fn target_row_shows_the_full_triple() {
        let triple = get_target_triple();
        assert!(!triple.is_empty());
        assert!(version_table().contains(&triple));
    }
}

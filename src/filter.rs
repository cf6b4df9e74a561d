use crate::host::HostInfo;
use crate::types::TestCase;
use tracing::debug;

fn version_supported(case: &TestCase, host: &HostInfo) -> bool {
    match (&case.runtime_version, &host.runtime_version) {
        (None, _) => true,
        (Some(req), Some(version)) => req.matches(version),
        (Some(_), None) => false,
    }
}

fn platform_supported(case: &TestCase, host: &HostInfo) -> bool {
    !case.exclude_platforms.iter().any(|p| p == &host.os)
}

/// Cases applicable to this host, in catalog order. Library-only cases,
/// unsupported runtime versions and excluded platforms are dropped, then
/// `single_test` (if any) keeps only its exact match.
pub fn select_cases<'a>(
    catalog: &'a [TestCase],
    host: &HostInfo,
    single_test: Option<&str>,
) -> Vec<&'a TestCase> {
    catalog
        .iter()
        .filter(|c| !c.only_library)
        .filter(|c| {
            let keep = version_supported(c, host);
            if !keep {
                debug!(test = %c.name, "skipped: runtime version {}", host.runtime_version_text);
            }
            keep
        })
        .filter(|c| {
            let keep = platform_supported(c, host);
            if !keep {
                debug!(test = %c.name, "skipped: platform {}", host.os);
            }
            keep
        })
        .filter(|c| single_test.is_none_or(|name| c.name == name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::parse_version_req;
    use crate::types::{DisplayOptions, Expectation};
    use semver::Version;

    fn case(name: &str) -> TestCase {
        TestCase {
            name: name.into(),
            description: None,
            path1: "d1".into(),
            path2: "d2".into(),
            relative_paths: false,
            options: "-aw".into(),
            option_args: vec!["-aw".into()],
            exit_code: 2,
            expectation: Expectation::ExitCodeOnly,
            display: DisplayOptions::default(),
            only_library: false,
            only_sync: false,
            only_async: false,
            exclude_platforms: vec![],
            runtime_version: None,
        }
    }

    fn host(os: &str, version: Option<Version>) -> HostInfo {
        HostInfo {
            os: os.into(),
            os_release: "6.0".into(),
            runtime_version_text: version
                .as_ref()
                .map(|v| format!("v{v}"))
                .unwrap_or_else(|| "unknown".into()),
            runtime_version: version,
            tool_version: "1.0.0".into(),
        }
    }

    fn names(cases: Vec<&TestCase>) -> Vec<&str> {
        cases.into_iter().map(|c| c.name.as_str()).collect()
    }

    #[test]
    fn drops_excluded_platforms() {
        let mut windows_only_skip = case("test005_50");
        windows_only_skip.exclude_platforms = vec!["win32".into()];
        let catalog = vec![case("test001_1"), windows_only_skip];

        let linux = host("linux", Some(Version::new(18, 0, 0)));
        assert_eq!(names(select_cases(&catalog, &linux, None)), ["test001_1", "test005_50"]);
        let win = host("win32", Some(Version::new(18, 0, 0)));
        assert_eq!(names(select_cases(&catalog, &win, None)), ["test001_1"]);
    }

    #[test]
    fn runs_version_constrained_cases_iff_satisfied() {
        let mut constrained = case("test003_2");
        constrained.runtime_version = Some(parse_version_req(">=2.5.0").unwrap());
        let catalog = vec![constrained];

        let new = host("linux", Some(Version::new(2, 5, 0)));
        assert_eq!(select_cases(&catalog, &new, None).len(), 1);
        let old = host("linux", Some(Version::new(2, 4, 1)));
        assert!(select_cases(&catalog, &old, None).is_empty());
        let unknown = host("linux", None);
        assert!(select_cases(&catalog, &unknown, None).is_empty());
    }

    #[test]
    fn drops_library_only_cases() {
        let mut lib = case("test008_0");
        lib.only_library = true;
        let catalog = vec![lib, case("test008_1")];
        let h = host("linux", None);
        assert_eq!(names(select_cases(&catalog, &h, None)), ["test008_1"]);
    }

    #[test]
    fn single_selector_keeps_exact_match_only() {
        let catalog = vec![case("test001_1"), case("test001_11"), case("test001_12")];
        let h = host("linux", None);
        assert_eq!(names(select_cases(&catalog, &h, Some("test001_1"))), ["test001_1"]);
        assert!(select_cases(&catalog, &h, Some("test999_9")).is_empty());
    }

    #[test]
    fn selector_does_not_revive_filtered_cases() {
        let mut excluded = case("test005_50");
        excluded.exclude_platforms = vec!["linux".into()];
        let catalog = vec![excluded];
        let h = host("linux", None);
        assert!(select_cases(&catalog, &h, Some("test005_50")).is_empty());
    }

    #[test]
    fn preserves_catalog_order() {
        let catalog = vec![case("test010_0"), case("test001_1"), case("test005_3")];
        let h = host("darwin", None);
        assert_eq!(
            names(select_cases(&catalog, &h, None)),
            ["test010_0", "test001_1", "test005_3"]
        );
    }
}

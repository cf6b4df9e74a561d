use regex::Regex;
use std::sync::OnceLock;
use tracing::warn;

/// What the run should do, fixed once arguments are parsed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Use the pre-extracted fixture directory instead of the archive.
    pub unpacked: bool,
    pub single_test: Option<String>,
    /// Print actual/expected output for every invocation.
    pub show_result: bool,
    pub no_report: bool,
}

fn test_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"test\d\d\d_\d").expect("test name regex"))
}

impl RunOptions {
    /// Applies bare tokens such as `unpacked`, `showresult`, `noreport` or
    /// `test001_1`. Tokens match by substring; anything else is ignored.
    pub fn apply_tokens<S: AsRef<str>>(&mut self, tokens: &[S]) {
        for token in tokens {
            let token = token.as_ref();
            let mut known = false;
            if token.contains("unpacked") {
                self.unpacked = true;
                known = true;
            }
            if token.contains("showresult") {
                self.show_result = true;
                known = true;
            }
            if token.contains("noreport") {
                self.no_report = true;
                known = true;
            }
            if test_name_regex().is_match(token) {
                self.single_test = Some(token.to_string());
                known = true;
            }
            if !known {
                warn!("ignoring unknown argument '{token}'");
            }
        }
    }

    pub fn from_tokens<S: AsRef<str>>(tokens: &[S]) -> Self {
        let mut options = Self::default();
        options.apply_tokens(tokens);
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_tokens() {
        let empty: [&str; 0] = [];
        assert_eq!(RunOptions::from_tokens(&empty), RunOptions::default());
    }

    #[test]
    fn recognizes_legacy_tokens() {
        let options = RunOptions::from_tokens(&["unpacked", "test005_1", "showresult", "noreport"]);
        assert!(options.unpacked);
        assert!(options.show_result);
        assert!(options.no_report);
        assert_eq!(options.single_test.as_deref(), Some("test005_1"));
    }

    #[test]
    fn matches_by_substring_and_ignores_unknown() {
        let options = RunOptions::from_tokens(&["--unpacked", "bogus", "skipasync"]);
        assert!(options.unpacked);
        assert!(!options.show_result);
        assert_eq!(options.single_test, None);
    }

    #[test]
    fn keeps_whole_token_as_test_name() {
        let options = RunOptions::from_tokens(&["test005_1_1"]);
        assert_eq!(options.single_test.as_deref(), Some("test005_1_1"));
    }
}

use crate::stats::StatsPredicate;
use crate::types::{DisplayOptions, Expectation, ExpectedOutput, TestCase, USAGE_ERROR_EXIT};
use anyhow::{Context, Result, anyhow, bail};
use indexmap::IndexMap;
use semver::VersionReq;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use walkdir::WalkDir;

pub const DEFAULT_ARCHIVE: &str = "testdir.tar";
pub const DEFAULT_UNPACKED: &str = "testdir";
pub const DEFAULT_EXPECTED: &str = "expected";
pub const DEFAULT_REPORT: &str = "report.txt";
pub const DEFAULT_ASYNC_FLAG: &str = "--async";
/// Seconds per invocation.
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct RawConfig {
    pub tool: String,
    pub runtime: Option<String>,
    pub archive: Option<String>,
    pub unpacked: Option<String>,
    pub expected: Option<String>,
    pub report: Option<String>,
    pub async_flag: Option<String>,
    pub stats_flag: Option<String>,
    pub timeout: Option<u64>,
    pub tool_version: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn into_vec(self) -> Vec<String> {
        match self {
            OneOrMany::One(s) => vec![s.trim().to_string()],
            OneOrMany::Many(v) => v.into_iter().map(|s| s.trim().to_string()).collect(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct RawTest {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub path1: String,
    #[serde(default)]
    pub path2: String,
    #[serde(default, alias = "with_relative_path")]
    pub relative_paths: bool,
    #[serde(default)]
    pub options: String,
    pub exit_code: i32,
    pub expected: Option<String>,
    pub validate: Option<StatsPredicate>,
    #[serde(default)]
    pub display: DisplayOptions,
    #[serde(default)]
    pub only_library: bool,
    #[serde(default)]
    pub only_sync: bool,
    #[serde(default)]
    pub only_async: bool,
    pub exclude_platform: Option<OneOrMany>,
    pub runtime_version: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "PascalCase")]
pub struct RawCatalog {
    pub config: Option<RawConfig>,
    #[serde(default)]
    pub tests: Vec<RawTest>,
}

/// Harness settings with every path resolved.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub tool: PathBuf,
    pub runtime: Option<String>,
    pub archive: PathBuf,
    pub unpacked: PathBuf,
    pub expected: PathBuf,
    pub report: PathBuf,
    pub async_flag: String,
    pub stats_flag: Option<String>,
    pub timeout: Duration,
    pub tool_version: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Catalog {
    pub config: HarnessConfig,
    pub cases: Vec<TestCase>,
}

fn resolve_path_relative_to_yaml(path: &str, yaml_file_path: &Path) -> PathBuf {
    let path_buf = Path::new(path.trim());
    if path_buf.is_absolute() {
        path_buf.to_path_buf()
    } else {
        match yaml_file_path.parent() {
            Some(yaml_dir) => yaml_dir.join(path_buf),
            None => path_buf.to_path_buf(),
        }
    }
}

fn resolve_config(raw: &RawConfig, yaml_file_path: &Path) -> HarnessConfig {
    let resolve = |value: &Option<String>, default: &str| {
        resolve_path_relative_to_yaml(value.as_deref().unwrap_or(default), yaml_file_path)
    };
    HarnessConfig {
        tool: resolve_path_relative_to_yaml(&raw.tool, yaml_file_path),
        runtime: raw.runtime.as_ref().map(|r| r.trim().to_string()),
        archive: resolve(&raw.archive, DEFAULT_ARCHIVE),
        unpacked: resolve(&raw.unpacked, DEFAULT_UNPACKED),
        expected: resolve(&raw.expected, DEFAULT_EXPECTED),
        report: resolve(&raw.report, DEFAULT_REPORT),
        async_flag: raw
            .async_flag
            .clone()
            .unwrap_or_else(|| DEFAULT_ASYNC_FLAG.to_string()),
        stats_flag: raw.stats_flag.clone(),
        timeout: Duration::from_secs(raw.timeout.unwrap_or(DEFAULT_TIMEOUT_SECS)),
        tool_version: raw.tool_version.clone(),
    }
}

/// Reads a runtime version range the way node-semver does: comparators
/// separated by spaces or commas, and a bare version means exactly that
/// version (`2.5.0` is `=2.5.0`, not cargo's `^2.5.0`).
pub fn parse_version_req(text: &str) -> Result<VersionReq> {
    let text = text.trim();
    if text.contains("||") {
        bail!("alternative version ranges are not supported: {text}");
    }
    // Glue bare operators to the version that follows them (">= 1.2").
    let mut comparators: Vec<String> = Vec::new();
    let mut pending_op = String::new();
    for token in text.split(|c: char| c == ',' || c.is_whitespace()) {
        if token.is_empty() {
            continue;
        }
        if token.chars().all(|c| matches!(c, '<' | '>' | '=' | '~' | '^')) {
            pending_op.push_str(token);
            continue;
        }
        let bare = pending_op.is_empty() && token.starts_with(|c: char| c.is_ascii_digit());
        let op = if bare { "=" } else { pending_op.as_str() };
        comparators.push(format!("{op}{token}"));
        pending_op.clear();
    }
    VersionReq::parse(&comparators.join(", "))
        .with_context(|| format!("invalid version requirement '{text}'"))
}

fn build_case(raw: RawTest) -> Result<TestCase> {
    let name = raw.name.trim().to_string();
    if name.is_empty() {
        bail!("test without a name");
    }
    if raw.only_sync && raw.only_async {
        bail!("{name}: only_sync and only_async are mutually exclusive");
    }
    let expectation = match (raw.expected, raw.validate) {
        (Some(_), Some(_)) => bail!("{name}: expected and validate are mutually exclusive"),
        (None, None) if raw.exit_code == USAGE_ERROR_EXIT => Expectation::ExitCodeOnly,
        _ if raw.exit_code == USAGE_ERROR_EXIT => {
            bail!("{name}: cases expecting exit code {USAGE_ERROR_EXIT} cannot compare output")
        }
        (Some(text), None) => Expectation::Output(ExpectedOutput::Literal(text)),
        (None, Some(predicate)) if predicate.is_empty() => {
            bail!("{name}: validate needs at least one clause")
        }
        (None, Some(predicate)) => Expectation::Stats(predicate),
        (None, None) => Expectation::Output(ExpectedOutput::Fixture),
    };
    let option_args = shell_words::split(&raw.options)
        .with_context(|| format!("{name}: cannot split options '{}'", raw.options))?;
    let runtime_version = raw
        .runtime_version
        .as_deref()
        .map(parse_version_req)
        .transpose()
        .with_context(|| format!("{name}: bad runtime_version"))?;

    Ok(TestCase {
        name,
        description: raw.description.map(|d| d.trim().to_string()),
        path1: raw.path1.trim().to_string(),
        path2: raw.path2.trim().to_string(),
        relative_paths: raw.relative_paths,
        options: raw.options,
        option_args,
        exit_code: raw.exit_code,
        expectation,
        display: raw.display,
        only_library: raw.only_library,
        only_sync: raw.only_sync,
        only_async: raw.only_async,
        exclude_platforms: raw.exclude_platform.map(OneOrMany::into_vec).unwrap_or_default(),
        runtime_version,
    })
}

fn catalog_files(path: &Path) -> Result<Vec<PathBuf>> {
    if !path.is_dir() {
        return Ok(vec![path.to_path_buf()]);
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(path).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let file = entry.path();
        if let Some(ext) = file.extension() {
            if ext == "yaml" || ext == "yml" {
                files.push(file.to_path_buf());
            }
        }
    }
    if files.is_empty() {
        bail!("no catalog files under {}", path.display());
    }
    Ok(files)
}

/// Loads a catalog file, or every YAML file below a directory.
pub fn load_catalog(path: &Path) -> Result<Catalog> {
    let mut config = None;
    let mut cases: IndexMap<String, TestCase> = IndexMap::new();
    for file in catalog_files(path)? {
        let content = fs::read_to_string(&file)
            .with_context(|| format!("failed to read catalog {}", file.display()))?;
        let raw: RawCatalog = serde_yaml::from_str(&content)
            .with_context(|| format!("YAML error in {}", file.display()))?;
        if config.is_none() {
            config = raw.config.as_ref().map(|c| resolve_config(c, &file));
        }
        for raw_test in raw.tests {
            let case = build_case(raw_test).with_context(|| format!("in {}", file.display()))?;
            if cases.contains_key(&case.name) {
                bail!("duplicate test name {} in {}", case.name, file.display());
            }
            cases.insert(case.name.clone(), case);
        }
    }
    let config = config.ok_or_else(|| anyhow!("no Config section in {}", path.display()))?;
    Ok(Catalog {
        config,
        cases: cases.into_values().collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_requirements() {
        let req = parse_version_req(">=2.5.0").unwrap();
        assert!(req.matches(&semver::Version::new(2, 5, 0)));
        assert!(!req.matches(&semver::Version::new(2, 4, 9)));
        let req = parse_version_req(">=2.5.0 <3").unwrap();
        assert!(req.matches(&semver::Version::new(2, 9, 0)));
        assert!(!req.matches(&semver::Version::new(3, 0, 0)));
        let req = parse_version_req(">= 10").unwrap();
        assert!(req.matches(&semver::Version::new(18, 0, 0)));
        assert!(parse_version_req("^1 || ^2").is_err());
        assert!(parse_version_req("not a range").is_err());
    }

    #[test]
    fn bare_version_matches_exactly() {
        let req = parse_version_req("2.5.0").unwrap();
        assert!(req.matches(&semver::Version::new(2, 5, 0)));
        assert!(!req.matches(&semver::Version::new(2, 6, 0)));
        let req = parse_version_req("2.5").unwrap();
        assert!(req.matches(&semver::Version::new(2, 5, 7)));
        assert!(!req.matches(&semver::Version::new(2, 6, 0)));
        let req = parse_version_req("^2.5.0").unwrap();
        assert!(req.matches(&semver::Version::new(2, 6, 0)));
        let req = parse_version_req(">=2.5.0, <3").unwrap();
        assert!(req.matches(&semver::Version::new(2, 9, 1)));
    }
}

use crate::catalog::HarnessConfig;
use semver::Version;
use serde::Deserialize;
use std::path::Path;
use std::process::Command;
use tracing::{debug, warn};

/// Facts about the machine and runtime the tool runs on.
#[derive(Debug, Clone)]
pub struct HostInfo {
    /// OS identifier in the runtime's vocabulary (`linux`, `darwin`, `win32`, ...).
    pub os: String,
    pub os_release: String,
    /// Version string as printed by the runtime, e.g. `v18.17.0`.
    pub runtime_version_text: String,
    pub runtime_version: Option<Version>,
    pub tool_version: String,
}

/// Maps Rust's OS names onto the names catalogs use in `exclude_platform`.
pub fn platform_id(rust_os: &str) -> &str {
    match rust_os {
        "windows" => "win32",
        "macos" => "darwin",
        "solaris" | "illumos" => "sunos",
        other => other,
    }
}

/// `v18.17.0` -> 18.17.0
pub fn parse_runtime_version(text: &str) -> Option<Version> {
    let text = text.trim();
    let text = text.strip_prefix('v').unwrap_or(text);
    Version::parse(text).ok()
}

fn command_stdout(program: &str, args: &[&str]) -> Option<String> {
    let out = Command::new(program).args(args).output().ok()?;
    if !out.status.success() {
        return None;
    }
    let text = String::from_utf8_lossy(&out.stdout).trim().to_string();
    (!text.is_empty()).then_some(text)
}

fn os_release() -> String {
    if cfg!(unix) {
        command_stdout("uname", &["-r"]).unwrap_or_else(|| "unknown".to_string())
    } else {
        "unknown".to_string()
    }
}

#[derive(Deserialize)]
struct PackageJson {
    version: Option<String>,
}

/// Looks for the nearest `package.json` above the tool script.
fn package_version(tool: &Path) -> Option<String> {
    for dir in tool.ancestors().skip(1) {
        let manifest = dir.join("package.json");
        if !manifest.is_file() {
            continue;
        }
        let content = std::fs::read_to_string(&manifest).ok()?;
        let pkg: PackageJson = serde_json::from_str(&content).ok()?;
        debug!("tool version from {}", manifest.display());
        return pkg.version;
    }
    None
}

impl HostInfo {
    pub fn detect(config: &HarnessConfig) -> Self {
        let runtime_version_text = match &config.runtime {
            Some(runtime) => command_stdout(runtime, &["--version"]).unwrap_or_else(|| {
                warn!("could not read version of runtime '{runtime}'");
                "unknown".to_string()
            }),
            None => "n/a".to_string(),
        };
        let runtime_version = parse_runtime_version(&runtime_version_text);
        let tool_version = config
            .tool_version
            .clone()
            .or_else(|| package_version(&config.tool))
            .unwrap_or_else(|| "unknown".to_string());
        HostInfo {
            os: platform_id(std::env::consts::OS).to_string(),
            os_release: os_release(),
            runtime_version_text,
            runtime_version,
            tool_version,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_platform_names() {
        assert_eq!(platform_id("windows"), "win32");
        assert_eq!(platform_id("macos"), "darwin");
        assert_eq!(platform_id("linux"), "linux");
        assert_eq!(platform_id("freebsd"), "freebsd");
    }

    #[test]
    fn parses_runtime_versions() {
        assert_eq!(parse_runtime_version("v18.17.0\n"), Some(Version::new(18, 17, 0)));
        assert_eq!(parse_runtime_version("2.5.0"), Some(Version::new(2, 5, 0)));
        assert_eq!(parse_runtime_version("unknown"), None);
    }

    #[test]
    fn reads_version_from_package_json() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("package.json"), r#"{"name":"dir-compare","version":"4.2.0"}"#)
            .unwrap();
        let cli = dir.path().join("build").join("src").join("cli");
        std::fs::create_dir_all(&cli).unwrap();
        let tool = cli.join("dircompare.js");
        assert_eq!(package_version(&tool).as_deref(), Some("4.2.0"));
    }
}

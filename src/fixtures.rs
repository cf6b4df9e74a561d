//! Fixture tree bootstrap. The archive deliberately contains symlink loops,
//! so extraction stores links as links and never walks through one.

use anyhow::{Context, Result, bail};
use std::fs::{self, File};
use std::path::{Component, Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub enum FixtureSource {
    /// Directory prepared ahead of time; used as-is.
    Unpacked(PathBuf),
    /// Tar archive extracted into a fresh temporary directory.
    Archive(PathBuf),
}

/// Root of the fixture tree. Holds the temporary directory (if any) so the
/// tree is removed when the root is dropped.
#[derive(Debug)]
pub struct FixtureRoot {
    path: PathBuf,
    _temp: Option<TempDir>,
}

impl FixtureRoot {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExtractStats {
    pub files: usize,
    pub dirs: usize,
    pub symlinks: usize,
    pub hard_links: usize,
    pub skipped: usize,
}

pub fn bootstrap(source: &FixtureSource) -> Result<FixtureRoot> {
    match source {
        FixtureSource::Unpacked(dir) => {
            if !dir.is_dir() {
                bail!("fixture directory {} does not exist", dir.display());
            }
            // Children run inside the root and get paths below it, so a
            // relative root would be resolved twice.
            let path = fs::canonicalize(dir)
                .with_context(|| format!("cannot resolve fixture directory {}", dir.display()))?;
            info!("using pre-extracted fixtures in {}", path.display());
            Ok(FixtureRoot {
                path,
                _temp: None,
            })
        }
        FixtureSource::Archive(archive) => {
            let temp = tempfile::Builder::new()
                .prefix("dircompare-test")
                .tempdir()
                .context("failed to create temporary fixture directory")?;
            let stats = extract_archive(archive, temp.path())
                .with_context(|| format!("failed to extract {}", archive.display()))?;
            info!(
                files = stats.files,
                dirs = stats.dirs,
                symlinks = stats.symlinks,
                "extracted {} into {}",
                archive.display(),
                temp.path().display()
            );
            Ok(FixtureRoot {
                path: temp.path().to_path_buf(),
                _temp: Some(temp),
            })
        }
    }
}

fn validate_archive_rel_path(path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        bail!("empty archive path");
    }
    if path.is_absolute() {
        bail!("absolute archive paths are not allowed: {path:?}");
    }
    for component in path.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            _ => bail!("archive path escapes the destination: {path:?}"),
        }
    }
    Ok(())
}

/// Refuses destinations that would be reached through a symlink created
/// by an earlier entry.
fn ensure_no_symlink_ancestor(dest_dir: &Path, rel: &Path) -> Result<()> {
    let mut current = dest_dir.to_path_buf();
    let mut components = rel.components().peekable();
    while let Some(component) = components.next() {
        if components.peek().is_none() {
            break;
        }
        current.push(component);
        match fs::symlink_metadata(&current) {
            Ok(meta) if meta.file_type().is_symlink() => {
                bail!("entry {rel:?} traverses symlink {}", current.display());
            }
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e).with_context(|| format!("stat {}", current.display())),
        }
    }
    Ok(())
}

fn create_parent(out_path: &Path) -> Result<()> {
    if let Some(parent) = out_path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create dir: {}", parent.display()))?;
    }
    Ok(())
}

/// Extracts a tar archive into `dest_dir` without following any link.
/// Directory entries are applied last so their timestamps stick.
pub fn extract_archive(archive_path: &Path, dest_dir: &Path) -> Result<ExtractStats> {
    let file = File::open(archive_path)
        .with_context(|| format!("open {}", archive_path.display()))?;
    let mut archive = tar::Archive::new(file);
    archive.set_preserve_mtime(true);
    archive.set_preserve_permissions(true);
    archive.set_overwrite(true);

    let mut stats = ExtractStats::default();
    let mut dirs = Vec::new();
    for entry in archive.entries().context("read tar entries")? {
        let mut entry = entry.context("read tar entry")?;
        let rel = entry.path().context("read tar entry path")?.into_owned();
        validate_archive_rel_path(&rel)?;
        let out_path = dest_dir.join(&rel);
        let entry_type = entry.header().entry_type();

        if entry_type.is_dir() {
            ensure_no_symlink_ancestor(dest_dir, &rel)?;
            if fs::symlink_metadata(&out_path).is_ok_and(|m| m.file_type().is_symlink()) {
                bail!("directory entry {rel:?} collides with a symlink");
            }
            fs::create_dir_all(&out_path)
                .with_context(|| format!("create dir: {}", out_path.display()))?;
            dirs.push(entry);
            continue;
        }

        ensure_no_symlink_ancestor(dest_dir, &rel)?;
        create_parent(&out_path)?;

        if entry_type.is_symlink() {
            let target = entry
                .link_name()
                .context("read symlink target")?
                .map(|t| t.into_owned());
            debug!("symlink {} -> {:?}", rel.display(), target);
            entry
                .unpack(&out_path)
                .with_context(|| format!("unpack symlink {}", out_path.display()))?;
            stats.symlinks += 1;
        } else if entry_type.is_hard_link() {
            let target = entry
                .link_name()
                .context("read hard link target")?
                .map(|t| t.into_owned())
                .with_context(|| format!("hard link {rel:?} without target"))?;
            validate_archive_rel_path(&target)?;
            ensure_no_symlink_ancestor(dest_dir, &target)?;
            let source = dest_dir.join(&target);
            if fs::symlink_metadata(&out_path).is_ok() {
                fs::remove_file(&out_path)
                    .with_context(|| format!("replace {}", out_path.display()))?;
            }
            fs::hard_link(&source, &out_path).with_context(|| {
                format!("link {} -> {}", out_path.display(), source.display())
            })?;
            stats.hard_links += 1;
        } else if entry_type.is_file() || entry_type.is_contiguous() {
            if fs::symlink_metadata(&out_path).is_ok_and(|m| m.file_type().is_symlink()) {
                fs::remove_file(&out_path)
                    .with_context(|| format!("replace {}", out_path.display()))?;
            }
            entry
                .unpack(&out_path)
                .with_context(|| format!("unpack {}", out_path.display()))?;
            stats.files += 1;
        } else if entry_type.is_pax_global_extensions()
            || entry_type.is_pax_local_extensions()
            || entry_type.is_gnu_longname()
            || entry_type.is_gnu_longlink()
        {
            continue;
        } else {
            warn!("skipping unsupported tar entry {:?} ({:?})", rel, entry_type);
            stats.skipped += 1;
        }
    }

    // Reverse order puts children before their parents.
    dirs.sort_by(|a, b| b.path_bytes().cmp(&a.path_bytes()));
    for mut dir in dirs {
        let rel = dir.path().context("read tar entry path")?.into_owned();
        let out_path = dest_dir.join(&rel);
        dir.unpack(&out_path)
            .with_context(|| format!("unpack dir {}", out_path.display()))?;
        stats.dirs += 1;
    }
    Ok(stats)
}

#![cfg(unix)]

use dircompare_conformance::fixtures::{FixtureSource, bootstrap, extract_archive};
use std::fs::{self, File};
use std::path::Path;
use tar::{Builder, EntryType, Header};
use tempfile::tempdir;

fn dir_header() -> Header {
    let mut header = Header::new_gnu();
    header.set_entry_type(EntryType::Directory);
    header.set_size(0);
    header.set_mode(0o755);
    header.set_mtime(1_416_346_359);
    header
}

fn add_dir(builder: &mut Builder<File>, path: &str) {
    let mut header = dir_header();
    builder.append_data(&mut header, path, std::io::empty()).unwrap();
}

fn add_file(builder: &mut Builder<File>, path: &str, contents: &str) {
    let mut header = Header::new_gnu();
    header.set_entry_type(EntryType::Regular);
    header.set_size(contents.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(1_416_346_359);
    builder
        .append_data(&mut header, path, contents.as_bytes())
        .unwrap();
}

fn add_symlink(builder: &mut Builder<File>, path: &str, target: &str) {
    let mut header = Header::new_gnu();
    header.set_entry_type(EntryType::Symlink);
    header.set_size(0);
    header.set_mode(0o777);
    builder.append_link(&mut header, path, target).unwrap();
}

fn write_archive(path: &Path, build: impl FnOnce(&mut Builder<File>)) {
    let mut builder = Builder::new(File::create(path).unwrap());
    build(&mut builder);
    builder.finish().unwrap();
}

#[test]
fn symlink_loops_are_stored_as_links() {
    let work = tempdir().unwrap();
    let archive = work.path().join("testdir.tar");
    write_archive(&archive, |b| {
        add_dir(b, "#16/");
        add_dir(b, "#16/1/");
        add_file(b, "#16/1/a.txt", "a\n");
        // self loop and a loop between two directories
        add_symlink(b, "#16/1/self", ".");
        add_dir(b, "#16/2/");
        add_symlink(b, "#16/1/to2", "../2");
        add_symlink(b, "#16/2/to1", "../1");
        add_symlink(b, "#16/dangling", "missing");
    });

    let dest = work.path().join("out");
    fs::create_dir(&dest).unwrap();
    let stats = extract_archive(&archive, &dest).unwrap();
    assert_eq!(stats.files, 1);
    assert_eq!(stats.dirs, 3);
    assert_eq!(stats.symlinks, 4);

    let root = dest.join("#16");
    assert_eq!(fs::read_to_string(root.join("1/a.txt")).unwrap(), "a\n");
    assert_eq!(fs::read_link(root.join("1/self")).unwrap(), Path::new("."));
    assert_eq!(fs::read_link(root.join("1/to2")).unwrap(), Path::new("../2"));
    assert_eq!(fs::read_link(root.join("2/to1")).unwrap(), Path::new("../1"));
    assert_eq!(fs::read_link(root.join("dangling")).unwrap(), Path::new("missing"));
    assert!(
        fs::symlink_metadata(root.join("1/self"))
            .unwrap()
            .file_type()
            .is_symlink()
    );
}

#[test]
fn entries_below_a_symlink_are_rejected() {
    let work = tempdir().unwrap();
    let outside = work.path().join("outside");
    fs::create_dir(&outside).unwrap();
    let archive = work.path().join("evil.tar");
    write_archive(&archive, |b| {
        add_dir(b, "d1/");
        add_symlink(b, "d1/link", outside.to_str().unwrap());
        add_file(b, "d1/link/escaped.txt", "boom");
    });

    let dest = work.path().join("out");
    fs::create_dir(&dest).unwrap();
    let err = extract_archive(&archive, &dest).unwrap_err();
    assert!(format!("{err:#}").contains("traverses symlink"), "{err:#}");
    assert!(!outside.join("escaped.txt").exists());
}

#[test]
fn archive_bootstrap_is_removed_on_drop() {
    let work = tempdir().unwrap();
    let archive = work.path().join("testdir.tar");
    write_archive(&archive, |b| {
        add_dir(b, "d1/");
        add_file(b, "d1/a.txt", "a");
    });

    let root = bootstrap(&FixtureSource::Archive(archive)).unwrap();
    let path = root.path().to_path_buf();
    assert!(path.join("d1/a.txt").is_file());
    assert!(
        path.file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("dircompare-test")
    );
    drop(root);
    assert!(!path.exists());
}

// Shared helpers for the integration tests
#![allow(dead_code)]

#[path = "../../src/core/testutil.rs"]
mod testutil;

pub use testutil::*;

use std::path::PathBuf;
use tempfile::TempDir;

/// Writes `fixture` into a fresh temp dir; keep the dir alive while reading.
pub fn write_fixture(fixture: &Fixture, file_name: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("temp dir");
    let path = fixture.write_to(dir.path(), file_name);
    (dir, path)
}

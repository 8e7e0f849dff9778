//! Loader error paths against real files: open failures, missing exports,
//! init failure semantics.

mod common;

use std::time::Duration;

use kedge_core::plugin::{PluginError, PluginLoader};
use tempfile::TempDir;

use common::MockPlugin;

fn loader(dir: &TempDir) -> PluginLoader {
    PluginLoader::new(dir.path(), Duration::from_secs(5))
}

#[test]
fn test_open_failure_for_non_library_file() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("bad.module"), b"not a shared object").unwrap();

    let err = loader(&dir).install_candidate("bad.module").unwrap_err();
    match err {
        PluginError::OpenFailure { path, .. } => {
            assert_eq!(path, dir.path().join("bad.module"));
        }
        other => panic!("expected OpenFailure, got {other}"),
    }
}

#[test]
fn test_open_failure_for_missing_relative_path() {
    let dir = TempDir::new().unwrap();
    let err = loader(&dir).install_candidate("nowhere.so").unwrap_err();
    assert!(matches!(err, PluginError::OpenFailure { .. }));
}

/// A real shared library that does not export the plugin symbols must fail
/// symbol lookup, not open. libc is always mapped into the test process,
/// so its on-disk path is a dependable fixture.
#[cfg(target_os = "linux")]
#[test]
fn test_symbol_not_found_in_foreign_library() {
    let maps = std::fs::read_to_string("/proc/self/maps").unwrap();
    let libc_path = maps
        .lines()
        .filter_map(|line| line.split_whitespace().last())
        .find(|path| {
            path.starts_with('/')
                && std::path::Path::new(path)
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with("libc.so") || n.starts_with("libc-"))
        });
    let Some(libc_path) = libc_path else {
        // Statically linked test binary; nothing to assert against.
        return;
    };

    let dir = TempDir::new().unwrap();
    let err = loader(&dir).install_candidate(libc_path).unwrap_err();
    match err {
        PluginError::SymbolNotFound { symbol, .. } => {
            assert_eq!(symbol, "kedge_plugin_abi_version");
        }
        other => panic!("expected SymbolNotFound, got {other}"),
    }
}

#[tokio::test]
async fn test_init_failure_leaves_table_unchanged() {
    let dir = TempDir::new().unwrap();
    let loader = loader(&dir);
    loader.register_builtin("mock", || Box::new(MockPlugin::new("p1").failing_init()));

    let descriptor = loader.install_candidate("mock").unwrap();
    let err = loader.load(&descriptor).await.unwrap_err();

    assert!(matches!(err, PluginError::InitFailure { .. }));
    assert!(!loader.contains("p1"));
    assert!(loader.loaded_ids().is_empty());
}

//! Ensures all workspace crates use `version.workspace = true` and share
//! their dependency versions through `[workspace.dependencies]`.

use std::path::{Path, PathBuf};

const CRATES: [&str; 2] = ["crates/repo-trust", "crates/repo-trust-cli"];

fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .to_path_buf()
}

fn read_toml(path: &Path) -> toml::Value {
    let text = std::fs::read_to_string(path).unwrap();
    text.parse().unwrap()
}

#[test]
fn all_crates_use_workspace_version() {
    let root = workspace_root();
    for krate in CRATES {
        let doc = read_toml(&root.join(krate).join("Cargo.toml"));
        let inherited = doc["package"]["version"]
            .as_table()
            .and_then(|t| t.get("workspace"))
            .and_then(|v| v.as_bool());
        assert_eq!(
            inherited,
            Some(true),
            "{krate} should use version.workspace = true"
        );
    }
}

#[test]
fn workspace_version_matches_cargo_pkg() {
    let doc = read_toml(&workspace_root().join("Cargo.toml"));
    let ws_version = doc["workspace"]["package"]["version"].as_str().unwrap();
    assert_eq!(
        ws_version,
        env!("CARGO_PKG_VERSION"),
        "workspace version should match CARGO_PKG_VERSION"
    );
}

#[test]
fn dependencies_come_from_workspace_table() {
    let root = workspace_root();
    let workspace = read_toml(&root.join("Cargo.toml"));
    let shared = workspace["workspace"]["dependencies"].as_table().unwrap();

    for krate in CRATES {
        let doc = read_toml(&root.join(krate).join("Cargo.toml"));
        for section in ["dependencies", "dev-dependencies"] {
            let Some(deps) = doc.get(section).and_then(|d| d.as_table()) else {
                continue;
            };
            for (name, spec) in deps {
                let inherited = spec
                    .as_table()
                    .and_then(|t| t.get("workspace"))
                    .and_then(|v| v.as_bool())
                    == Some(true);
                assert!(inherited, "{krate}: {section}.{name} should be workspace-inherited");
                assert!(shared.contains_key(name), "{name} missing from workspace table");
            }
        }
    }
}

//! Shared fixtures for repodrop integration tests

#![allow(dead_code)]

use assert_fs::prelude::*;
use assert_fs::TempDir;
use repodrop::{EngineOptions, InMemoryRemote, SyncEngine, SyncRequest};
use std::path::Path;
use std::sync::Arc;

pub const OWNER: &str = "octocat";
pub const REPO: &str = "demo";

/// Build a project tree from `(relative path, content)` pairs
pub fn project(files: &[(&str, &str)]) -> TempDir {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    for (path, content) in files {
        temp_dir
            .child(path)
            .write_str(content)
            .expect("Failed to write fixture file");
    }
    temp_dir
}

/// A small project with an ignore file and an ignored build directory
pub fn sample_project() -> TempDir {
    project(&[
        (".gitignore", "build/\n*.log\n"),
        ("README.md", "# Demo\n"),
        ("src/main.rs", "fn main() {}\n"),
        ("src/lib.rs", "pub fn demo() {}\n"),
        ("build/out.bin", "binary"),
        ("debug.log", "noise"),
    ])
}

pub fn remote() -> Arc<InMemoryRemote> {
    Arc::new(InMemoryRemote::new(OWNER))
}

pub fn engine(remote: &Arc<InMemoryRemote>) -> SyncEngine {
    engine_with(remote, EngineOptions::default())
}

pub fn engine_with(remote: &Arc<InMemoryRemote>, options: EngineOptions) -> SyncEngine {
    SyncEngine::new(remote.clone(), options)
}

pub fn request(project: &TempDir) -> SyncRequest {
    SyncRequest::new(project.path(), REPO)
}

/// Write a zip archive of uncompressed (stored) entries
pub fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
    // DOS date 1980-01-01
    const DOS_DATE: u16 = 0x21;

    fn u16le(out: &mut Vec<u8>, value: u16) {
        out.extend_from_slice(&value.to_le_bytes());
    }
    fn u32le(out: &mut Vec<u8>, value: u32) {
        out.extend_from_slice(&value.to_le_bytes());
    }

    let mut archive = Vec::new();
    let mut central = Vec::new();

    for (name, data) in entries {
        let offset = archive.len() as u32;
        let crc = crc32fast::hash(data);
        let size = data.len() as u32;
        let name_len = name.len() as u16;

        u32le(&mut archive, 0x0403_4b50);
        u16le(&mut archive, 20); // version needed
        u16le(&mut archive, 0); // flags
        u16le(&mut archive, 0); // stored
        u16le(&mut archive, 0); // time
        u16le(&mut archive, DOS_DATE);
        u32le(&mut archive, crc);
        u32le(&mut archive, size);
        u32le(&mut archive, size);
        u16le(&mut archive, name_len);
        u16le(&mut archive, 0); // extra length
        archive.extend_from_slice(name.as_bytes());
        archive.extend_from_slice(data);

        u32le(&mut central, 0x0201_4b50);
        u16le(&mut central, 20); // version made by
        u16le(&mut central, 20); // version needed
        u16le(&mut central, 0);
        u16le(&mut central, 0);
        u16le(&mut central, 0);
        u16le(&mut central, DOS_DATE);
        u32le(&mut central, crc);
        u32le(&mut central, size);
        u32le(&mut central, size);
        u16le(&mut central, name_len);
        u16le(&mut central, 0); // extra length
        u16le(&mut central, 0); // comment length
        u16le(&mut central, 0); // disk number
        u16le(&mut central, 0); // internal attributes
        u32le(&mut central, 0); // external attributes
        u32le(&mut central, offset);
        central.extend_from_slice(name.as_bytes());
    }

    let central_offset = archive.len() as u32;
    let central_size = central.len() as u32;
    let count = entries.len() as u16;
    archive.extend_from_slice(&central);

    u32le(&mut archive, 0x0605_4b50);
    u16le(&mut archive, 0);
    u16le(&mut archive, 0);
    u16le(&mut archive, count);
    u16le(&mut archive, count);
    u32le(&mut archive, central_size);
    u32le(&mut archive, central_offset);
    u16le(&mut archive, 0);

    std::fs::write(path, archive).expect("Failed to write zip fixture");
}

/// Whether the system `unzip` used for archive sources is installed
pub fn unzip_available() -> bool {
    repodrop::github::is_command_available("unzip")
}

/// A GitHub user object as returned by `GET /user`
pub fn user_json(login: &str) -> serde_json::Value {
    let api = format!("https://api.github.com/users/{}", login);
    serde_json::json!({
        "login": login,
        "id": 1,
        "node_id": "MDQ6VXNlcjE=",
        "avatar_url": "https://avatars.githubusercontent.com/u/1",
        "gravatar_id": "",
        "url": api,
        "html_url": format!("https://github.com/{}", login),
        "followers_url": format!("{}/followers", api),
        "following_url": format!("{}/following{{/other_user}}", api),
        "gists_url": format!("{}/gists{{/gist_id}}", api),
        "starred_url": format!("{}/starred{{/owner}}{{/repo}}", api),
        "subscriptions_url": format!("{}/subscriptions", api),
        "organizations_url": format!("{}/orgs", api),
        "repos_url": format!("{}/repos", api),
        "events_url": format!("{}/events{{/privacy}}", api),
        "received_events_url": format!("{}/received_events", api),
        "type": "User",
        "site_admin": false
    })
}

/// A repository object owned by [`OWNER`]
pub fn repository_json(name: &str) -> serde_json::Value {
    serde_json::json!({
        "id": 1,
        "node_id": "R_kgDOAAAAAQ",
        "name": name,
        "full_name": format!("{}/{}", OWNER, name),
        "owner": user_json(OWNER),
        "private": false,
        "html_url": format!("https://github.com/{}/{}", OWNER, name),
        "url": format!("https://api.github.com/repos/{}/{}", OWNER, name),
        "default_branch": "main"
    })
}

/// A GitHub API error body
pub fn github_error(message: &str) -> serde_json::Value {
    serde_json::json!({
        "message": message,
        "documentation_url": "https://docs.github.com/rest"
    })
}

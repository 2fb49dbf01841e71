#![allow(dead_code)]

use std::io::{Cursor, Read};

use disk_bundle::archive::ArchiveFormat;
use disk_bundle::config::BuildConfig;
use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const PUBLIC_KEY: &str = "https://disk.example.com/d/AbCdEf123";
pub const RESOURCES: &str = "/v1/disk/public/resources";

pub fn config_for(server: &MockServer) -> BuildConfig {
    BuildConfig::default().with_api_base_url(format!("{}{}", server.uri(), RESOURCES))
}

fn name_of(p: &str) -> &str {
    p.rsplit('/').next().unwrap_or(p)
}

pub fn dir_payload(p: &str, children: &[(&str, &str)]) -> Value {
    let items: Vec<Value> = children
        .iter()
        .map(|(kind, child)| json!({"type": kind, "name": name_of(child), "path": child}))
        .collect();
    json!({
        "type": "dir",
        "name": name_of(p),
        "path": p,
        "_embedded": {"items": items, "total": children.len()}
    })
}

/// Directory metadata; children are `(type, path)` pairs
pub async fn mount_dir(server: &MockServer, p: &str, children: &[(&str, &str)]) {
    Mock::given(method("GET"))
        .and(path(RESOURCES))
        .and(query_param("public_key", PUBLIC_KEY))
        .and(query_param("path", p))
        .respond_with(ResponseTemplate::new(200).set_body_json(dir_payload(p, children)))
        .mount(server)
        .await;
}

pub async fn mount_file_meta(server: &MockServer, p: &str) {
    Mock::given(method("GET"))
        .and(path(RESOURCES))
        .and(query_param("public_key", PUBLIC_KEY))
        .and(query_param("path", p))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "type": "file",
            "name": name_of(p),
            "path": p,
            "size": 0
        })))
        .mount(server)
        .await;
}

pub async fn mount_download_link(server: &MockServer, p: &str) {
    Mock::given(method("GET"))
        .and(path(format!("{}/download", RESOURCES)))
        .and(query_param("public_key", PUBLIC_KEY))
        .and(query_param("path", p))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "href": format!("{}/files{}", server.uri(), p),
            "method": "GET",
            "templated": false
        })))
        .mount(server)
        .await;
}

/// Metadata, download link and content of one file
pub async fn mount_file(server: &MockServer, p: &str, content: &[u8]) {
    mount_file_meta(server, p).await;
    mount_download_link(server, p).await;
    Mock::given(method("GET"))
        .and(path(format!("/files{}", p)))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(content.to_vec()))
        .mount(server)
        .await;
}

pub async fn mount_status(server: &MockServer, endpoint: &str, p: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(endpoint))
        .and(query_param("path", p))
        .respond_with(ResponseTemplate::new(status).set_body_json(json!({
            "error": "DiskNotFoundError",
            "description": "Resource not found."
        })))
        .mount(server)
        .await;
}

/// `(name, content)` pairs of an archive, sorted by name
pub fn read_entries(format: ArchiveFormat, bytes: &[u8]) -> Vec<(String, Vec<u8>)> {
    let mut entries = Vec::new();
    match format {
        ArchiveFormat::Zip => {
            // Walk local headers so repeated names are all seen
            let mut reader = Cursor::new(bytes);
            while let Some(mut file) = zip::read::read_zipfile_from_stream(&mut reader).unwrap() {
                let mut content = Vec::new();
                file.read_to_end(&mut content).unwrap();
                entries.push((file.name().to_string(), content));
            }
        }
        ArchiveFormat::TarGz => {
            let mut archive = tar::Archive::new(flate2::read::GzDecoder::new(bytes));
            for entry in archive.entries().unwrap() {
                let mut entry = entry.unwrap();
                let mut name = entry.path().unwrap().to_string_lossy().to_string();
                if entry.header().entry_type().is_dir() && !name.ends_with('/') {
                    name.push('/');
                }
                let mut content = Vec::new();
                entry.read_to_end(&mut content).unwrap();
                entries.push((name, content));
            }
        }
    }
    entries.sort();
    entries
}

pub fn names(entries: &[(String, Vec<u8>)]) -> Vec<&str> {
    entries.iter().map(|(name, _)| name.as_str()).collect()
}

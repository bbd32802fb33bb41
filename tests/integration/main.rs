//! Integration tests for k6provider

mod support {
    use std::io::{Read, Write};
    use std::net::{SocketAddr, TcpListener};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    /// Minimal build service: `POST /build` returns an artifact pointing at
    /// `GET /<id>/k6` on the same server, which serves `binary`.
    pub struct FakeBuildService {
        pub addr: SocketAddr,
        pub downloads: Arc<AtomicUsize>,
    }

    impl FakeBuildService {
        pub fn start(id: &'static str, binary: &'static [u8]) -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            let addr = listener.local_addr().unwrap();
            let downloads = Arc::new(AtomicUsize::new(0));

            let counter = Arc::clone(&downloads);
            thread::spawn(move || {
                for stream in listener.incoming() {
                    let Ok(mut stream) = stream else { break };
                    let request = read_request(&mut stream);

                    let (status, body) = if request.starts_with("POST /build") {
                        let artifact = format!(
                            r#"{{"artifact":{{"id":"{id}","url":"http://{addr}/{id}/k6","dependencies":{{"k6":"v0.50.0","k6/x/sql":"v0.4.0"}},"platform":"linux/amd64","checksum":"deadbeef"}}}}"#
                        );
                        (200, artifact.into_bytes())
                    } else if request.starts_with(&format!("GET /{id}/k6")) {
                        counter.fetch_add(1, Ordering::SeqCst);
                        (200, binary.to_vec())
                    } else {
                        (404, b"not found".to_vec())
                    };

                    let head = format!(
                        "HTTP/1.1 {} X\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                        status,
                        body.len()
                    );
                    let _ = stream.write_all(head.as_bytes());
                    let _ = stream.write_all(&body);
                }
            });

            Self { addr, downloads }
        }

        pub fn url(&self) -> String {
            format!("http://{}", self.addr)
        }

        pub fn downloads(&self) -> usize {
            self.downloads.load(Ordering::SeqCst)
        }
    }

    fn read_request(stream: &mut std::net::TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let text = String::from_utf8_lossy(&buf).to_string();
            if let Some(end) = text.find("\r\n\r\n") {
                let content_length = text[..end]
                    .lines()
                    .filter_map(|l| l.split_once(':'))
                    .find(|(k, _)| k.trim().eq_ignore_ascii_case("content-length"))
                    .and_then(|(_, v)| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + content_length {
                    return text;
                }
            }
            match stream.read(&mut chunk) {
                Ok(0) | Err(_) => return String::from_utf8_lossy(&buf).to_string(),
                Ok(n) => buf.extend_from_slice(&chunk[..n]),
            }
        }
    }
}

mod cli_tests {
    use super::support::FakeBuildService;
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use tempfile::TempDir;

    const ENV_VARS: &[&str] = &[
        "K6_BUILD_SERVICE_URL",
        "K6_DOWNLOAD_PROXY",
        "K6_BINARY_CACHE",
        "K6_PROVIDER_CONFIG",
        "HTTP_PROXY",
        "http_proxy",
        "HTTPS_PROXY",
        "https_proxy",
        "ALL_PROXY",
        "all_proxy",
    ];

    fn k6provider(temp: &TempDir) -> Command {
        let mut cmd = cargo_bin_cmd!("k6provider");
        for var in ENV_VARS {
            cmd.env_remove(var);
        }
        cmd.arg("--config")
            .arg(temp.path().join("config.toml"))
            .arg("--bin-dir")
            .arg(temp.path().join("cache"));
        cmd
    }

    #[test]
    fn help_displays() {
        let temp = TempDir::new().unwrap();
        k6provider(&temp)
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("custom k6 binaries"));
    }

    #[test]
    fn version_displays() {
        let temp = TempDir::new().unwrap();
        k6provider(&temp)
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("k6provider"));
    }

    #[test]
    fn cache_path_uses_bin_dir() {
        let temp = TempDir::new().unwrap();
        k6provider(&temp)
            .args(["cache", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("cache"));
    }

    #[test]
    fn cache_list_empty() {
        let temp = TempDir::new().unwrap();
        k6provider(&temp)
            .args(["cache", "list"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No cached binaries"));
    }

    #[test]
    fn cache_gc_dry_run_empty() {
        let temp = TempDir::new().unwrap();
        k6provider(&temp)
            .args(["cache", "gc", "--dry-run"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No binaries older than 30 days"));
    }

    #[test]
    fn config_show() {
        let temp = TempDir::new().unwrap();
        k6provider(&temp)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[cache]"));
    }

    #[test]
    fn config_init_writes_file() {
        let temp = TempDir::new().unwrap();
        k6provider(&temp)
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Configuration initialized"));
        assert!(temp.path().join("config.toml").exists());
    }

    #[test]
    fn binary_requires_build_service_url() {
        let temp = TempDir::new().unwrap();
        k6provider(&temp)
            .args(["binary", "--dep", "k6=>=0.50.0"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("build service URL is required"))
            .stderr(predicate::str::contains("K6_BUILD_SERVICE_URL"));
    }

    #[test]
    fn binary_rejects_invalid_dependency() {
        let temp = TempDir::new().unwrap();
        k6provider(&temp)
            .args(["binary", "--dep", "k6 x>=0.50.0"])
            .args(["--build-service-url", "http://127.0.0.1:9"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("invalid dependency"));
    }

    #[test]
    fn binary_rejects_bad_proxy() {
        let temp = TempDir::new().unwrap();
        k6provider(&temp)
            .args(["binary", "--build-service-url", "http://127.0.0.1:9"])
            .env("K6_DOWNLOAD_PROXY", "::not a url::")
            .assert()
            .failure()
            .stderr(predicate::str::contains("invalid configuration"));
    }

    #[test]
    fn binary_downloads_then_reuses() {
        let temp = TempDir::new().unwrap();
        let service = FakeBuildService::start("abc123", b"#!/bin/sh\necho k6\n");

        k6provider(&temp)
            .args(["binary", "--dep", "k6=>=0.50.0", "--dep", "k6/x/sql"])
            .env("K6_BUILD_SERVICE_URL", service.url())
            .args(["--format", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("abc123"));

        let binary = temp.path().join("cache").join("abc123").join("k6");
        assert!(binary.exists());
        assert_eq!(service.downloads(), 1);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&binary).unwrap().permissions().mode();
            assert_eq!(mode & 0o700, 0o700);
        }

        k6provider(&temp)
            .args(["binary", "--dep", "k6=>=0.50.0", "--dep", "k6/x/sql"])
            .env("K6_BUILD_SERVICE_URL", service.url())
            .args(["--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"checksum\": \"deadbeef\""));

        assert_eq!(service.downloads(), 1);

        k6provider(&temp)
            .args(["cache", "list", "--format", "plain"])
            .assert()
            .success()
            .stdout(predicate::str::contains("abc123"));
    }
}

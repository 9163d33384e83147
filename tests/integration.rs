use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tempfile::TempDir;

use answer_relay::signature::sign;

fn relay_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_relay"))
}

/// Runs the binary in `dir` with a scrubbed environment so no real secrets
/// or `.env` file leak into the test.
fn run_relay(dir: &Path, envs: &[(&str, &str)], args: &[&str]) -> (String, String, bool) {
    let binary = relay_binary();
    let output = Command::new(&binary)
        .current_dir(dir)
        .env_clear()
        .env("PATH", std::env::var("PATH").unwrap_or_default())
        .envs(envs.iter().copied())
        .args(args)
        .stdin(Stdio::null())
        .output()
        .unwrap_or_else(|e| panic!("Failed to run relay binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_serve_fails_fast_without_secrets() {
    let tmp = TempDir::new().unwrap();

    let (stdout, stderr, success) = run_relay(tmp.path(), &[], &["serve"]);
    assert!(!success, "serve started without secrets: {}", stdout);
    assert!(stderr.contains("OPENAI_API_KEY"), "stderr={}", stderr);
    assert!(stderr.contains("OA_CHANNEL_ACCESS_TOKEN"), "stderr={}", stderr);
    assert!(stderr.contains("OA_CHANNEL_SECRET"), "stderr={}", stderr);
}

#[test]
fn test_serve_fails_fast_without_index() {
    let tmp = TempDir::new().unwrap();
    let envs = [
        ("OPENAI_API_KEY", "sk-test"),
        ("OA_CHANNEL_ACCESS_TOKEN", "token"),
        ("OA_CHANNEL_SECRET", "secret"),
    ];

    let (_, stderr, success) = run_relay(tmp.path(), &envs, &["serve"]);
    assert!(!success);
    assert!(stderr.contains("index"), "stderr={}", stderr);
}

#[test]
fn test_secrets_loaded_from_dotenv_file() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join(".env"),
        "OPENAI_API_KEY=sk-test\nOA_CHANNEL_ACCESS_TOKEN=token\nOA_CHANNEL_SECRET=secret\n",
    )
    .unwrap();

    // Secrets resolve, so startup gets as far as opening the (missing) index.
    let (_, stderr, success) = run_relay(tmp.path(), &[], &["serve"]);
    assert!(!success);
    assert!(!stderr.contains("missing required environment variables"));
    assert!(stderr.contains("index"), "stderr={}", stderr);
}

#[test]
fn test_invalid_config_rejected() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("relay.toml");
    fs::write(&config_path, "[index]\ntop_k = 0\n").unwrap();

    let (_, stderr, success) = run_relay(
        tmp.path(),
        &[],
        &["--config", config_path.to_str().unwrap(), "ask", "hello"],
    );
    assert!(!success);
    assert!(stderr.contains("top_k"), "stderr={}", stderr);
}

#[test]
fn test_sign_prints_line_signature() {
    let tmp = TempDir::new().unwrap();
    let payload = br#"{"destination":"Ubot","events":[]}"#;
    let payload_path = tmp.path().join("payload.json");
    fs::write(&payload_path, payload).unwrap();

    let (stdout, stderr, success) = run_relay(
        tmp.path(),
        &[("OA_CHANNEL_SECRET", "secret")],
        &["sign", payload_path.to_str().unwrap()],
    );
    assert!(success, "sign failed: stderr={}", stderr);
    assert_eq!(stdout.trim(), sign(b"secret", payload));
}

#[test]
fn test_sign_requires_channel_secret() {
    let tmp = TempDir::new().unwrap();
    let payload_path = tmp.path().join("payload.json");
    fs::write(&payload_path, "{}").unwrap();

    let (_, stderr, success) =
        run_relay(tmp.path(), &[], &["sign", payload_path.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("OA_CHANNEL_SECRET"), "stderr={}", stderr);
}

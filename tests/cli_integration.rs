use serde_json::Value;
use std::process::Command;

fn run_cli(args: &[&str]) -> std::process::Output {
    let binary_path = assert_cmd::cargo::cargo_bin!("deso-identity");
    Command::new(binary_path)
        .args(args)
        .output()
        .expect("cli run succeeds")
}

fn run_json(args: &[&str]) -> Value {
    let mut full = vec!["--json"];
    full.extend_from_slice(args);
    let output = run_cli(&full);
    assert!(output.status.success(), "cli exited unsuccessfully: {:?}", output);

    let stdout = String::from_utf8(output.stdout).expect("stdout is utf8");
    serde_json::from_str(&stdout).expect("stdout is valid json")
}

#[test]
fn public_key_of_scalar_one() {
    let keys = run_json(&["public-key", "01"]);
    assert_eq!(
        keys["public_key_hex"],
        "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798"
    );
    let public_key = keys["public_key"].as_str().unwrap();
    assert!(public_key.starts_with("BC1YL"), "mainnet prefix: {}", public_key);

    let decoded = run_json(&["base58-decode", public_key]);
    assert_eq!(decoded["prefix_hex"], "cd1400");
    assert_eq!(decoded["payload_hex"], keys["public_key_hex"]);
}

#[test]
fn generated_keys_encrypt_and_decrypt() {
    let alice = run_json(&["generate-key", "--network", "testnet"]);
    let bob = run_json(&["generate-key", "--network", "testnet"]);
    assert!(alice["public_key"].as_str().unwrap().starts_with("tBC"));

    let encrypted = run_json(&[
        "encrypt",
        "--recipient",
        bob["public_key"].as_str().unwrap(),
        "--sender-seed",
        alice["seed_hex"].as_str().unwrap(),
        "--legacy",
        "hello bob",
    ]);

    let decrypted = run_json(&[
        "decrypt",
        "--seed",
        bob["seed_hex"].as_str().unwrap(),
        "--sender",
        alice["public_key"].as_str().unwrap(),
        "--legacy",
        encrypted["ciphertext_hex"].as_str().unwrap(),
    ]);
    assert_eq!(decrypted["message"], "hello bob");
}

#[test]
fn sign_tx_is_deterministic() {
    let first = run_json(&["sign-tx", "--seed", "42", "--tx", "0102030400"]);
    let second = run_json(&["sign-tx", "--seed", "42", "--tx", "0102030400"]);
    assert_eq!(first, second);

    let signed = first["signed_transaction_hex"].as_str().unwrap();
    assert!(signed.starts_with("01020304"));
    // 0x30 opens the DER sequence after the one-byte length
    assert_eq!(&signed[10..12], "30");
}

#[test]
fn decide_reports_login_state() {
    let state = run_json(&["decide", "--height", "10100", "--balance", "1500", "--expiration-block", "10000"]);
    assert_eq!(state["login_state"], "authorized");

    let state = run_json(&["decide", "--height", "10101", "--balance", "1500", "--expiration-block", "10000"]);
    assert_eq!(state["login_state"], "expired_authorization");

    let state = run_json(&["decide", "--height", "1", "--balance", "1499"]);
    assert_eq!(state["login_state"], "insufficient_balance_for_authorization");

    let state = run_json(&["decide", "--height", "1", "--balance", "1500"]);
    assert_eq!(state["login_state"], "not_authorized");
}

#[test]
fn derive_url_carries_callback() {
    let output = run_json(&["derive-url", "--callback-scheme", "com.example.app", "--network", "testnet"]);
    let url = output["url"].as_str().unwrap();
    assert!(url.starts_with("https://identity.deso.org/derive?callback=com.example.app%3A%2F%2F"));
    assert!(url.contains("testnet=true"));
}

#[test]
fn invalid_input_fails() {
    let output = run_cli(&["base58-decode", "0OIl"]);
    assert!(!output.status.success());

    let output = run_cli(&["sign-tx", "--seed", "42", "--tx", "zz"]);
    assert!(!output.status.success());
}

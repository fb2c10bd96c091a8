use clap::{Parser, Subcommand};
use deso_identity::auth::AuthorizationPolicy;
use deso_identity::config::IdentityConfig;
use deso_identity::crypto::{base58, ecies, secp256k1, CipherMode};
use deso_identity::types::{parse_seed_hex, AuthorizationFacts, Network, OnChainDerivedKey};
use deso_identity::{handshake, tx, utils::logging};
use serde_json::json;
use std::error::Error;

/// Offline DeSo identity tooling: keys, signing, message encryption and
/// login-state decisions.
#[derive(Parser)]
#[command(name = "deso-identity", version)]
struct Cli {
    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Log debug output to stderr
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a fresh key
    GenerateKey {
        #[arg(long, default_value = "mainnet", value_parser = parse_network)]
        network: Network,
    },
    /// Public key of a hex seed
    PublicKey {
        seed_hex: String,
        #[arg(long, default_value = "mainnet", value_parser = parse_network)]
        network: Network,
    },
    /// Sign a transaction with a derived seed
    SignTx {
        #[arg(long)]
        seed: String,
        #[arg(long = "tx")]
        transaction_hex: String,
    },
    /// Encrypt a message to a public key (Base58Check or hex)
    Encrypt {
        #[arg(long)]
        recipient: String,
        /// Encrypt over the sender/recipient shared secret
        #[arg(long)]
        sender_seed: Option<String>,
        /// Use the padded pre-v2 cipher
        #[arg(long)]
        legacy: bool,
        message: String,
    },
    /// Decrypt a hex ciphertext
    Decrypt {
        #[arg(long)]
        seed: String,
        /// Sender public key, for messages encrypted over a shared secret
        #[arg(long)]
        sender: Option<String>,
        #[arg(long)]
        legacy: bool,
        ciphertext_hex: String,
    },
    /// Split a Base58Check string into prefix and payload
    Base58Decode {
        input: String,
        #[arg(long, default_value_t = 3)]
        prefix_len: usize,
    },
    /// Decide the login state from authorization facts
    Decide {
        #[arg(long)]
        height: u64,
        #[arg(long)]
        balance: u64,
        /// Expiration block of the on-chain derived key; omit when there is none
        #[arg(long)]
        expiration_block: Option<u64>,
        /// The on-chain record is marked invalid
        #[arg(long)]
        revoked: bool,
        #[arg(long)]
        min_balance: Option<u64>,
        #[arg(long)]
        threshold: Option<u64>,
    },
    /// Print the identity service derive URL
    DeriveUrl {
        #[arg(long)]
        callback_scheme: String,
        #[arg(long, default_value = "mainnet", value_parser = parse_network)]
        network: Network,
        #[arg(long)]
        identity_url: Option<String>,
    },
}

fn parse_network(s: &str) -> Result<Network, String> {
    match s.to_ascii_lowercase().as_str() {
        "mainnet" => Ok(Network::Mainnet),
        "testnet" => Ok(Network::Testnet),
        other => Err(format!("unknown network '{}'", other)),
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    if cli.debug {
        logging::enable_debug();
    }

    let output = run(cli.command)?;
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else if let Some(fields) = output.as_object() {
        for (key, value) in fields {
            match value {
                serde_json::Value::String(s) => println!("{}: {}", key, s),
                other => println!("{}: {}", key, other),
            }
        }
    }
    Ok(())
}

fn run(command: Command) -> Result<serde_json::Value, Box<dyn Error>> {
    let output = match command {
        Command::GenerateKey { network } => {
            let seed = secp256k1::generate_private_key();
            let public_key = secp256k1::compressed_public_key_from_private(seed.as_slice())?;
            json!({
                "seed_hex": hex::encode(seed.as_slice()),
                "public_key": base58::encode_public_key(network, &public_key)?,
                "public_key_hex": hex::encode(public_key),
            })
        }
        Command::PublicKey { seed_hex, network } => {
            let seed = parse_seed_hex(&seed_hex)?;
            let public_key = secp256k1::compressed_public_key_from_private(seed.as_slice())?;
            json!({
                "public_key": base58::encode_public_key(network, &public_key)?,
                "public_key_hex": hex::encode(public_key),
            })
        }
        Command::SignTx { seed, transaction_hex } => {
            json!({ "signed_transaction_hex": tx::sign_transaction(&seed, &transaction_hex)? })
        }
        Command::Encrypt {
            recipient,
            sender_seed,
            legacy,
            message,
        } => {
            let recipient = base58::parse_public_key(&recipient)?;
            let mode = cipher_mode(legacy);
            let ciphertext = match sender_seed {
                Some(seed) => {
                    let sender = parse_seed_hex(&seed)?;
                    ecies::encrypt_shared_with_keys(sender.as_slice(), &recipient, message.as_bytes(), None, None, mode)?
                }
                None => ecies::encrypt(&recipient, message.as_bytes(), None, None, mode)?,
            };
            json!({ "ciphertext_hex": hex::encode(ciphertext) })
        }
        Command::Decrypt {
            seed,
            sender,
            legacy,
            ciphertext_hex,
        } => {
            let seed = parse_seed_hex(&seed)?;
            let ciphertext = hex::decode(ciphertext_hex.trim())?;
            let mode = cipher_mode(legacy);
            let plaintext = match sender {
                Some(sender) => {
                    let sender = base58::parse_public_key(&sender)?;
                    ecies::decrypt_shared_with_keys(seed.as_slice(), &sender, &ciphertext, mode)?
                }
                None => ecies::decrypt(seed.as_slice(), &ciphertext, mode)?,
            };
            json!({ "message": String::from_utf8(plaintext)? })
        }
        Command::Base58Decode { input, prefix_len } => {
            let (prefix, payload) = base58::decode_with_prefix(&input, prefix_len)?;
            json!({
                "prefix_hex": hex::encode(prefix),
                "payload_hex": hex::encode(payload),
            })
        }
        Command::Decide {
            height,
            balance,
            expiration_block,
            revoked,
            min_balance,
            threshold,
        } => {
            let defaults = AuthorizationPolicy::default();
            let policy = AuthorizationPolicy {
                min_balance_nanos: min_balance.unwrap_or(defaults.min_balance_nanos),
                expiration_threshold_blocks: threshold.unwrap_or(defaults.expiration_threshold_blocks),
            };
            let facts = AuthorizationFacts {
                current_block_height: height,
                account_balance_nanos: balance,
                derived_key: expiration_block.map(|expiration_block| OnChainDerivedKey {
                    owner_public_key: String::new(),
                    derived_public_key: String::new(),
                    expiration_block,
                    is_valid: !revoked,
                }),
            };
            json!({ "login_state": policy.decide(&facts) })
        }
        Command::DeriveUrl {
            callback_scheme,
            network,
            identity_url,
        } => {
            let mut config = IdentityConfig::for_network(network);
            if let Some(identity_url) = identity_url {
                config = config.with_identity_url(identity_url);
            }
            let token = handshake::generate_callback_token();
            let url = handshake::derive_url(&config, &callback_scheme, &token)?;
            json!({ "url": url.to_string(), "callback_token": token })
        }
    };
    Ok(output)
}

fn cipher_mode(legacy: bool) -> CipherMode {
    if legacy {
        CipherMode::Legacy
    } else {
        CipherMode::Standard
    }
}

//! FFI Layer for DeSo Identity
//!
//! All C-ABI exports are defined here. Every function follows the same
//! pattern:
//! - Input: JSON string (null-terminated C string)
//! - Output: JSON string (must be freed with `deso_identity_free_string`)
//!
//! Error handling: every response carries a `success` field. On error,
//! `success: false` and the `error` object holds a code and a message.
//!
//! Only the offline operations are exported. Flows that need the node or the
//! handshake run through [`crate::Identity`] inside the host's async runtime.

use std::ffi::{CStr, CString};
use std::os::raw::c_char;

use serde::{Deserialize, Serialize};

use crate::auth::AuthorizationPolicy;
use crate::config::IdentityConfig;
use crate::crypto::{base58, ecies, secp256k1, CipherMode};
use crate::error::{IdentityError, IdentityResult};
use crate::handshake;
use crate::tx;
use crate::types::*;

// =============================================================================
// Memory Management
// =============================================================================

/// Free a string returned by any deso_identity_* function
///
/// # Safety
/// The pointer must have been returned by a deso_identity_* function
#[unsafe(no_mangle)]
pub extern "C" fn deso_identity_free_string(s: *mut c_char) {
    if s.is_null() {
        return;
    }
    unsafe {
        let _ = CString::from_raw(s);
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Convert C string to Rust string, returning error JSON if invalid
fn parse_input<'a>(input: *const c_char) -> Result<&'a str, *mut c_char> {
    if input.is_null() {
        return Err(error_response(IdentityError::InvalidInput("Null input pointer".to_string())));
    }

    let c_str = unsafe { CStr::from_ptr(input) };
    c_str
        .to_str()
        .map_err(|_| error_response(IdentityError::InvalidInput("Invalid UTF-8 string".to_string())))
}

fn parse_request<T: for<'de> Deserialize<'de>>(input: *const c_char) -> Result<T, *mut c_char> {
    let json_str = parse_input(input)?;
    serde_json::from_str(json_str)
        .map_err(|e| error_response(IdentityError::InvalidInput(format!("Invalid JSON: {}", e))))
}

fn respond<T: Serialize>(result: IdentityResult<T>) -> *mut c_char {
    match result {
        Ok(data) => string_to_ptr(ApiResponse::ok(data).to_json()),
        Err(e) => error_response(e),
    }
}

fn error_response(error: IdentityError) -> *mut c_char {
    let response: ApiResponse<()> = ApiResponse::err(error);
    string_to_ptr(response.to_json())
}

fn string_to_ptr(s: String) -> *mut c_char {
    match CString::new(s) {
        Ok(c_str) => c_str.into_raw(),
        Err(_) => c"{\"success\":false,\"error\":{\"code\":\"invalid_input\",\"message\":\"String conversion failed\"}}"
            .to_owned()
            .into_raw(),
    }
}

fn decode_hex_field(name: &str, value: &str) -> IdentityResult<Vec<u8>> {
    hex::decode(value.trim()).map_err(|e| IdentityError::InvalidHex(format!("{}: {}", name, e)))
}

// =============================================================================
// Keys
// =============================================================================

#[derive(Deserialize)]
struct NetworkRequest {
    #[serde(default)]
    network: Network,
}

#[derive(Serialize)]
struct KeyResponse {
    seed_hex: Option<String>,
    public_key: String,
    public_key_hex: String,
}

/// Generate a fresh secp256k1 key
///
/// # Input
/// ```json
/// { "network": "mainnet" }
/// ```
///
/// # Output
/// ```json
/// { "success": true, "data": { "seed_hex": "…", "public_key": "BC1YL…", "public_key_hex": "02…" } }
/// ```
#[unsafe(no_mangle)]
pub extern "C" fn deso_identity_generate_key(input: *const c_char) -> *mut c_char {
    let request: NetworkRequest = match parse_request(input) {
        Ok(r) => r,
        Err(ptr) => return ptr,
    };

    let seed = secp256k1::generate_private_key();
    respond(key_response(request.network, seed.as_slice(), true))
}

/// Public key of a seed
///
/// # Input
/// ```json
/// { "seed_hex": "…", "network": "testnet" }
/// ```
#[unsafe(no_mangle)]
pub extern "C" fn deso_identity_public_key(input: *const c_char) -> *mut c_char {
    #[derive(Deserialize)]
    struct PublicKeyRequest {
        seed_hex: String,
        #[serde(default)]
        network: Network,
    }

    let request: PublicKeyRequest = match parse_request(input) {
        Ok(r) => r,
        Err(ptr) => return ptr,
    };

    respond(parse_seed_hex(&request.seed_hex).and_then(|seed| key_response(request.network, seed.as_slice(), false)))
}

fn key_response(network: Network, seed: &[u8], include_seed: bool) -> IdentityResult<KeyResponse> {
    let public_key = secp256k1::compressed_public_key_from_private(seed)?;
    Ok(KeyResponse {
        seed_hex: include_seed.then(|| hex::encode(seed)),
        public_key: base58::encode_public_key(network, &public_key)?,
        public_key_hex: hex::encode(public_key),
    })
}

/// Decode a Base58Check string
///
/// # Input
/// ```json
/// { "input": "BC1YL…", "prefix_len": 3 }
/// ```
///
/// # Output
/// ```json
/// { "success": true, "data": { "prefix_hex": "cd1400", "payload_hex": "02…" } }
/// ```
#[unsafe(no_mangle)]
pub extern "C" fn deso_identity_base58_decode(input: *const c_char) -> *mut c_char {
    #[derive(Deserialize)]
    struct DecodeRequest {
        input: String,
        #[serde(default = "default_prefix_len")]
        prefix_len: usize,
    }

    #[derive(Serialize)]
    struct DecodeResponse {
        prefix_hex: String,
        payload_hex: String,
    }

    let request: DecodeRequest = match parse_request(input) {
        Ok(r) => r,
        Err(ptr) => return ptr,
    };

    respond(
        base58::decode_with_prefix(&request.input, request.prefix_len).map(|(prefix, payload)| DecodeResponse {
            prefix_hex: hex::encode(prefix),
            payload_hex: hex::encode(payload),
        }),
    )
}

fn default_prefix_len() -> usize {
    IdentityConfig::default().public_key_prefix_len
}

// =============================================================================
// Transactions
// =============================================================================

/// Sign a transaction with a derived seed
///
/// # Input
/// ```json
/// { "seed_hex": "…", "transaction_hex": "…" }
/// ```
///
/// # Output
/// ```json
/// { "success": true, "data": { "signed_transaction_hex": "…" } }
/// ```
#[unsafe(no_mangle)]
pub extern "C" fn deso_identity_sign_transaction(input: *const c_char) -> *mut c_char {
    #[derive(Deserialize)]
    struct SignRequest {
        seed_hex: String,
        transaction_hex: String,
    }

    #[derive(Serialize)]
    struct SignResponse {
        signed_transaction_hex: String,
    }

    let request: SignRequest = match parse_request(input) {
        Ok(r) => r,
        Err(ptr) => return ptr,
    };

    respond(
        tx::sign_transaction(&request.seed_hex, &request.transaction_hex)
            .map(|signed_transaction_hex| SignResponse { signed_transaction_hex }),
    )
}

// =============================================================================
// Messages
// =============================================================================

#[derive(Serialize)]
struct MessageResponse {
    message: String,
}

/// Encrypt a message
///
/// With `sender_seed_hex` the message is encrypted over the sender and
/// recipient's shared secret; without it, directly to the recipient.
///
/// # Input
/// ```json
/// { "recipient_public_key": "BC1YL…", "sender_seed_hex": "…", "message": "hi", "v2": true }
/// ```
///
/// # Output
/// ```json
/// { "success": true, "data": { "ciphertext_hex": "04…" } }
/// ```
#[unsafe(no_mangle)]
pub extern "C" fn deso_identity_encrypt(input: *const c_char) -> *mut c_char {
    #[derive(Deserialize)]
    struct EncryptRequest {
        recipient_public_key: String,
        sender_seed_hex: Option<String>,
        message: String,
        #[serde(default = "default_v2")]
        v2: bool,
    }

    #[derive(Serialize)]
    struct EncryptResponse {
        ciphertext_hex: String,
    }

    let request: EncryptRequest = match parse_request(input) {
        Ok(r) => r,
        Err(ptr) => return ptr,
    };

    let result = (|| -> IdentityResult<EncryptResponse> {
        let recipient = base58::parse_public_key(&request.recipient_public_key)?;
        let mode = CipherMode::from_v2(request.v2);
        let ciphertext = match &request.sender_seed_hex {
            Some(seed_hex) => {
                let sender = parse_seed_hex(seed_hex)?;
                ecies::encrypt_shared_with_keys(sender.as_slice(), &recipient, request.message.as_bytes(), None, None, mode)?
            }
            None => ecies::encrypt(&recipient, request.message.as_bytes(), None, None, mode)?,
        };
        Ok(EncryptResponse {
            ciphertext_hex: hex::encode(ciphertext),
        })
    })();

    respond(result)
}

/// Decrypt a message
///
/// # Input
/// ```json
/// { "seed_hex": "…", "sender_public_key": "BC1YL…", "ciphertext_hex": "04…", "v2": true }
/// ```
#[unsafe(no_mangle)]
pub extern "C" fn deso_identity_decrypt(input: *const c_char) -> *mut c_char {
    #[derive(Deserialize)]
    struct DecryptRequest {
        seed_hex: String,
        sender_public_key: Option<String>,
        ciphertext_hex: String,
        #[serde(default = "default_v2")]
        v2: bool,
    }

    let request: DecryptRequest = match parse_request(input) {
        Ok(r) => r,
        Err(ptr) => return ptr,
    };

    let result = (|| -> IdentityResult<MessageResponse> {
        let seed = parse_seed_hex(&request.seed_hex)?;
        let ciphertext = decode_hex_field("ciphertext_hex", &request.ciphertext_hex)?;
        let mode = CipherMode::from_v2(request.v2);
        let plaintext = match &request.sender_public_key {
            Some(sender) => {
                let sender = base58::parse_public_key(sender)?;
                ecies::decrypt_shared_with_keys(seed.as_slice(), &sender, &ciphertext, mode)?
            }
            None => ecies::decrypt(seed.as_slice(), &ciphertext, mode)?,
        };
        utf8_message(plaintext)
    })();

    respond(result)
}

/// Decrypt a message with a conversation secret from the identity service
///
/// # Input
/// ```json
/// { "shared_secret": "…", "ciphertext_hex": "04…", "v2": true }
/// ```
#[unsafe(no_mangle)]
pub extern "C" fn deso_identity_decrypt_with_shared_secret(input: *const c_char) -> *mut c_char {
    #[derive(Deserialize)]
    struct SharedSecretRequest {
        shared_secret: String,
        ciphertext_hex: String,
        #[serde(default = "default_v2")]
        v2: bool,
    }

    let request: SharedSecretRequest = match parse_request(input) {
        Ok(r) => r,
        Err(ptr) => return ptr,
    };

    respond(
        ecies::decrypt_with_shared_secret(&request.shared_secret, &request.ciphertext_hex, request.v2)
            .and_then(utf8_message),
    )
}

fn utf8_message(plaintext: Vec<u8>) -> IdentityResult<MessageResponse> {
    String::from_utf8(plaintext)
        .map(|message| MessageResponse { message })
        .map_err(|_| IdentityError::InvalidCipherText("Message is not valid UTF-8".to_string()))
}

fn default_v2() -> bool {
    true
}

// =============================================================================
// Authorization
// =============================================================================

/// Decide the login state from authorization facts
///
/// # Input
/// ```json
/// {
///   "current_block_height": 10100,
///   "account_balance_nanos": 5000,
///   "derived_key": { "owner_public_key": "…", "derived_public_key": "…", "expiration_block": 20000, "is_valid": true },
///   "min_balance_nanos": 1500,
///   "expiration_threshold_blocks": 100
/// }
/// ```
///
/// # Output
/// ```json
/// { "success": true, "data": { "login_state": "authorized" } }
/// ```
#[unsafe(no_mangle)]
pub extern "C" fn deso_identity_decide(input: *const c_char) -> *mut c_char {
    #[derive(Deserialize)]
    struct DecideRequest {
        #[serde(flatten)]
        facts: AuthorizationFacts,
        min_balance_nanos: Option<u64>,
        expiration_threshold_blocks: Option<u64>,
    }

    #[derive(Serialize)]
    struct DecideResponse {
        login_state: LoginState,
    }

    let request: DecideRequest = match parse_request(input) {
        Ok(r) => r,
        Err(ptr) => return ptr,
    };

    let defaults = AuthorizationPolicy::default();
    let policy = AuthorizationPolicy {
        min_balance_nanos: request.min_balance_nanos.unwrap_or(defaults.min_balance_nanos),
        expiration_threshold_blocks: request
            .expiration_threshold_blocks
            .unwrap_or(defaults.expiration_threshold_blocks),
    };

    respond(Ok(DecideResponse {
        login_state: policy.decide(&request.facts),
    }))
}

/// Build the identity service derive URL
///
/// # Input
/// ```json
/// { "network": "mainnet", "callback_scheme": "com.example.app", "identity_url": "https://identity.deso.org" }
/// ```
///
/// # Output
/// ```json
/// { "success": true, "data": { "url": "https://identity.deso.org/derive?…", "callback_token": "…" } }
/// ```
#[unsafe(no_mangle)]
pub extern "C" fn deso_identity_derive_url(input: *const c_char) -> *mut c_char {
    #[derive(Deserialize)]
    struct DeriveUrlRequest {
        #[serde(default)]
        network: Network,
        callback_scheme: String,
        identity_url: Option<String>,
    }

    #[derive(Serialize)]
    struct DeriveUrlResponse {
        url: String,
        callback_token: String,
    }

    let request: DeriveUrlRequest = match parse_request(input) {
        Ok(r) => r,
        Err(ptr) => return ptr,
    };

    let mut config = IdentityConfig::for_network(request.network);
    if let Some(identity_url) = request.identity_url {
        config = config.with_identity_url(identity_url);
    }
    let callback_token = handshake::generate_callback_token();

    respond(
        handshake::derive_url(&config, &request.callback_scheme, &callback_token).map(|url| DeriveUrlResponse {
            url: url.to_string(),
            callback_token,
        }),
    )
}

/// Parse the derive callback URL into a `DerivedKeyInfo`
///
/// # Input
/// ```json
/// { "url": "com.example.app://?publicKey=…", "network": "mainnet" }
/// ```
#[unsafe(no_mangle)]
pub extern "C" fn deso_identity_parse_derive_callback(input: *const c_char) -> *mut c_char {
    #[derive(Deserialize)]
    struct CallbackRequest {
        url: String,
        #[serde(default)]
        network: Network,
    }

    let request: CallbackRequest = match parse_request(input) {
        Ok(r) => r,
        Err(ptr) => return ptr,
    };

    let result = url::Url::parse(&request.url)
        .map_err(|e| IdentityError::HandshakeFailed(format!("Invalid callback URL: {}", e)))
        .and_then(|url| handshake::derived_key_from_callback(&url, request.network));
    respond(result)
}

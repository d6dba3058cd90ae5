use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::Rng;
use sha2::Sha256;

// Provably-fair draw: HMAC-SHA256(server_seed, customer_id) -> first 4 bytes
// -> u32 -> float in [0,1). Publishing sha256(server_seed) up front lets a
// customer check their draw once the seed is revealed.

pub type HmacSha256 = Hmac<Sha256>;

pub fn derive_hash_hex(input: &[u8]) -> String {
    use sha2::Digest;
    let mut hasher = Sha256::new();
    hasher.update(input);
    hex::encode(hasher.finalize())
}

/// Maps the first 4 bytes of `bytes` onto `[0, 1)`.
pub fn unit_float(bytes: &[u8; 32]) -> f64 {
    let v = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    (v as f64) / (u32::MAX as f64 + 1.0)
}

/// Source of the uniform number used to pick a winning segment.
pub trait DrawSource: Send + Sync {
    /// Returns a value in `[0, 1)`.
    fn draw(&self, customer_id: &str) -> f64;

    /// Hash of the secret behind the draw, if the source is verifiable.
    fn commitment(&self) -> Option<String> {
        None
    }
}

/// Keyed draw that can be verified after the server seed is revealed.
pub struct ProvablyFairRng {
    server_seed: String, // secret
}

impl ProvablyFairRng {
    pub fn new(server_seed: impl Into<String>) -> Self {
        Self {
            server_seed: server_seed.into(),
        }
    }

    /// Fresh 32-byte hex seed from the operating system RNG.
    pub fn generate_seed() -> String {
        let mut bytes = [0u8; 32];
        OsRng.fill(&mut bytes);
        hex::encode(bytes)
    }

    pub fn server_seed_hash_hex(&self) -> String {
        derive_hash_hex(self.server_seed.as_bytes())
    }

    pub fn hmac_bytes(&self, customer_id: &str) -> [u8; 32] {
        // HMAC accepts keys of any length, so this cannot fail.
        let mut mac = HmacSha256::new_from_slice(self.server_seed.as_bytes())
            .expect("HMAC accepts any key length");
        mac.update(customer_id.as_bytes());
        let res = mac.finalize().into_bytes();
        let mut out = [0u8; 32];
        out.copy_from_slice(&res);
        out
    }
}

impl DrawSource for ProvablyFairRng {
    fn draw(&self, customer_id: &str) -> f64 {
        unit_float(&self.hmac_bytes(customer_id))
    }

    fn commitment(&self) -> Option<String> {
        Some(self.server_seed_hash_hex())
    }
}

/// Recompute a seeded draw and compare it against a published value.
pub fn verify_draw(server_seed: &str, customer_id: &str, expected: f64) -> bool {
    ProvablyFairRng::new(server_seed).draw(customer_id) == expected
}

/// Non-reproducible draw straight from the operating system RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsDraw;

impl DrawSource for OsDraw {
    fn draw(&self, _customer_id: &str) -> f64 {
        OsRng.gen::<f64>()
    }
}

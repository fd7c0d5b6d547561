use rand::Rng;

/// Generates a random, URL-safe opaque token of `len` hex characters.
/// Used for raw API keys; only the SHA-256 hash of the result is ever
/// persisted.
pub fn random_hex_token(len: usize) -> String {
    let mut rng = rand::thread_rng();
    let bytes: Vec<u8> = (0..len.div_ceil(2)).map(|_| rng.gen()).collect();
    let mut s = hex::encode(bytes);
    s.truncate(len);
    s
}

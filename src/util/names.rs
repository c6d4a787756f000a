//! Unique directory name generation for test repositories

use rand::Rng;

/// Digits used for the random suffix (base 32, lowercase)
const SUFFIX_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuv";
const SUFFIX_LEN: usize = 10;

/// Generate a repository directory name
///
/// Format: `<prefix>-<unix millis>-<random base32 suffix>`. Collisions are
/// treated as negligible and not checked.
pub fn generate_repo_name(prefix: &str) -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    repo_name_with(prefix, millis, &mut rand::rng())
}

fn repo_name_with<R: Rng + ?Sized>(prefix: &str, millis: i64, rng: &mut R) -> String {
    let suffix: String = (0..SUFFIX_LEN)
        .map(|_| SUFFIX_ALPHABET[rng.random_range(0..SUFFIX_ALPHABET.len())] as char)
        .collect();
    format!("{prefix}-{millis}-{suffix}")
}

use rand::Rng;

const SUFFIX_MIN: u32 = 1_000_000;
const SUFFIX_MAX: u32 = 9_999_999;
const PREFIX_MIN_LEN: usize = 3;
const PREFIX_MAX_LEN: usize = 6;

/// Source of coupon codes. The engine only sees this trait so tests can
/// script collisions.
pub trait CodeSource: Send + Sync {
    fn next_code(&self, prefix: &str) -> String;
}

/// Uniform 7-digit suffixes from the thread-local RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomCodes;

impl CodeSource for RandomCodes {
    fn next_code(&self, prefix: &str) -> String {
        generate_code(prefix)
    }
}

/// Business prefix + 7 random digits in `[1_000_000, 9_999_999]`.
///
/// Uniqueness is not checked here; the store's unique index on the code
/// column is the authority.
pub fn generate_code(prefix: &str) -> String {
    generate_code_with(&mut rand::thread_rng(), prefix)
}

pub fn generate_code_with<R: Rng + ?Sized>(rng: &mut R, prefix: &str) -> String {
    let suffix = rng.gen_range(SUFFIX_MIN..=SUFFIX_MAX);
    format!("{}{}", normalize_prefix(prefix), suffix)
}

/// Uppercases and strips all whitespace.
pub fn normalize_prefix(prefix: &str) -> String {
    prefix
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect()
}

/// Normalizes and validates a business prefix for issuance.
pub fn validate_prefix(prefix: &str) -> Result<String, CodeError> {
    let normalized = normalize_prefix(prefix);
    let len = normalized.chars().count();

    if !(PREFIX_MIN_LEN..=PREFIX_MAX_LEN).contains(&len) {
        return Err(CodeError::PrefixLength(normalized));
    }
    if !normalized.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(CodeError::PrefixCharacters(normalized));
    }

    Ok(normalized)
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodeError {
    #[error("Business code '{0}' must be 3 to 6 characters long")]
    PrefixLength(String),

    #[error("Business code '{0}' may only contain letters and digits")]
    PrefixCharacters(String),
}

//! Random password generation.

use rand::rngs::OsRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

use passvault_common::{Error, Result};

const LOWER: &str = "abcdefghijklmnopqrstuvwxyz";
const UPPER: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &str = "0123456789";
const SYMBOLS: &str = "!@#$%^&*()_+-=[]{}|;:',.<>/?`~";

/// Characters that are easy to confuse with each other.
pub const LOOK_ALIKES: &str = "Il1O0";

/// Character classes and length of a generated password.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorOptions {
    pub length: usize,
    pub lower: bool,
    pub upper: bool,
    pub digits: bool,
    pub symbols: bool,
    pub exclude_look_alikes: bool,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            length: 16,
            lower: true,
            upper: true,
            digits: true,
            symbols: false,
            exclude_look_alikes: true,
        }
    }
}

impl GeneratorOptions {
    /// Characters a password may be drawn from.
    pub fn pool(&self) -> Vec<char> {
        let classes = [
            (self.lower, LOWER),
            (self.upper, UPPER),
            (self.digits, DIGITS),
            (self.symbols, SYMBOLS),
        ];

        classes
            .iter()
            .filter(|(enabled, _)| *enabled)
            .flat_map(|(_, chars)| chars.chars())
            .filter(|c| !(self.exclude_look_alikes && LOOK_ALIKES.contains(*c)))
            .collect()
    }
}

/// Generate a password from the OS random source.
///
/// Each character is drawn uniformly from the pool.
///
/// # Errors
/// - `length` is zero
/// - No character class is enabled
pub fn generate(options: &GeneratorOptions) -> Result<String> {
    if options.length == 0 {
        return Err(Error::InvalidInput(
            "Password length must be at least 1".to_string(),
        ));
    }

    let pool = options.pool();
    if pool.is_empty() {
        return Err(Error::InvalidInput(
            "At least one character class must be enabled".to_string(),
        ));
    }

    let mut rng = OsRng;
    Ok((0..options.length)
        .map(|_| pool[rng.gen_range(0..pool.len())])
        .collect())
}

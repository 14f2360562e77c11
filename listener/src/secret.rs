use crate::error::ListenerError;
use rand::Rng;
use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

/// Smallest and largest secret handed out by [`allocate`].
pub const MIN_SECRET: u32 = 1;
pub const MAX_SECRET: u32 = 999_998;

/// A decimal `sv_logsecret` value. The server prefixes every forwarded log
/// line with it, which is how datagrams are matched to sessions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Secret(String);

impl Secret {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Secret {
    type Err = ListenerError;

    /// Accepts positive decimal integers. `0` turns secret tagging off on
    /// the server and is rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ListenerError::InvalidSecret(s.to_string()));
        }

        match s.parse::<u32>() {
            Ok(0) | Err(_) => Err(ListenerError::InvalidSecret(s.to_string())),
            Ok(n) => Ok(Secret(n.to_string())),
        }
    }
}

impl From<u32> for Secret {
    fn from(n: u32) -> Self {
        Secret(n.to_string())
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for Secret {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Draws random secrets until one is not `in_use`.
pub fn allocate<F>(mut in_use: F) -> Secret
where
    F: FnMut(&Secret) -> bool,
{
    let mut rng = rand::thread_rng();
    loop {
        let secret = Secret::from(rng.gen_range(MIN_SECRET..=MAX_SECRET));
        if !in_use(&secret) {
            return secret;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_parse_normalizes_digits() {
        assert_eq!("0042".parse::<Secret>().unwrap().as_str(), "42");
        assert_eq!("999998".parse::<Secret>().unwrap(), Secret::from(999_998));
    }

    #[test]
    fn test_parse_rejects_non_numeric() {
        for input in ["", "0", "abc", "-5", "12 3", "99999999999"] {
            assert!(
                matches!(input.parse::<Secret>(), Err(ListenerError::InvalidSecret(_))),
                "{:?} should be rejected",
                input
            );
        }
    }

    #[test]
    fn test_allocate_stays_in_range() {
        for _ in 0..1000 {
            let n: u32 = allocate(|_| false).as_str().parse().unwrap();
            assert!((MIN_SECRET..=MAX_SECRET).contains(&n));
        }
    }

    #[test]
    fn test_allocate_skips_taken_secrets() {
        let mut taken = HashSet::new();
        for _ in 0..500 {
            let secret = allocate(|s| taken.contains(s));
            assert!(taken.insert(secret));
        }
    }

    #[test]
    fn test_allocate_redraws() {
        let mut calls = 0;
        let secret = allocate(|_| {
            calls += 1;
            calls < 3
        });

        assert_eq!(calls, 3);
        assert!(!secret.as_str().is_empty());
    }
}

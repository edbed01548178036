//! API Key Resolution
//!
//! A primary key variable (`PERPLEXITY_API_KEY`) or a numbered pool
//! (`PERPLEXITY_API_KEY_1`, `_2`, ...). The pool is read contiguously from 1
//! and stops at the first missing index. One key is chosen per invocation.

use rand::Rng;
use secrecy::{ExposeSecret, SecretString};

use crate::types::RequestError;

/// Set of API keys available to the process
pub struct ApiKeyPool {
    primary: Option<SecretString>,
    pool: Vec<SecretString>,
}

impl std::fmt::Debug for ApiKeyPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeyPool")
            .field("primary", &self.primary.as_ref().map(|_| "[REDACTED]"))
            .field("pool_size", &self.pool.len())
            .finish()
    }
}

impl ApiKeyPool {
    pub fn new(primary: Option<String>, pool: Vec<String>) -> Self {
        Self {
            primary: primary
                .filter(|k| !k.trim().is_empty())
                .map(SecretString::from),
            pool: pool
                .into_iter()
                .filter(|k| !k.trim().is_empty())
                .map(SecretString::from)
                .collect(),
        }
    }

    /// Read `<var>` and `<var>_1..N` from the environment
    pub fn from_env(var: &str) -> Self {
        Self::from_lookup(var, |name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup
    pub fn from_lookup(var: &str, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let primary = lookup(var);
        let pool = (1..)
            .map_while(|idx| lookup(&format!("{}_{}", var, idx)))
            .collect();
        Self::new(primary, pool)
    }

    pub fn is_empty(&self) -> bool {
        self.primary.is_none() && self.pool.is_empty()
    }

    pub fn pool_size(&self) -> usize {
        self.pool.len()
    }

    /// Primary key if present, otherwise a uniformly random pool key
    pub fn choose(&self) -> Result<SecretString, RequestError> {
        if let Some(primary) = &self.primary {
            return Ok(primary.clone());
        }

        if self.pool.is_empty() {
            return Err(RequestError::Configuration(
                "API key not found. Set PERPLEXITY_API_KEY (or PERPLEXITY_API_KEY_1..N)"
                    .to_string(),
            ));
        }

        let idx = rand::rng().random_range(0..self.pool.len());
        Ok(self.pool[idx].clone())
    }
}

/// Whether a credential is usable at all
pub fn is_blank(key: &SecretString) -> bool {
    key.expose_secret().trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_primary_key_wins() {
        let pool = ApiKeyPool::from_lookup(
            "KEY",
            lookup_from(&[("KEY", "primary"), ("KEY_1", "pooled")]),
        );
        assert_eq!(pool.choose().unwrap().expose_secret(), "primary");
    }

    #[test]
    fn test_pool_used_without_primary() {
        let pool = ApiKeyPool::from_lookup(
            "KEY",
            lookup_from(&[("KEY_1", "a"), ("KEY_2", "b"), ("KEY_4", "skipped")]),
        );
        assert_eq!(pool.pool_size(), 2);

        for _ in 0..20 {
            let key = pool.choose().unwrap();
            assert!(["a", "b"].contains(&key.expose_secret()));
        }
    }

    #[test]
    fn test_empty_pool_is_configuration_error() {
        let pool = ApiKeyPool::from_lookup("KEY", lookup_from(&[("KEY", "   ")]));
        assert!(pool.is_empty());
        assert!(matches!(
            pool.choose(),
            Err(RequestError::Configuration(_))
        ));
    }

    #[test]
    fn test_debug_is_redacted() {
        let pool = ApiKeyPool::new(Some("sk-secret".to_string()), vec![]);
        let rendered = format!("{:?}", pool);
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("REDACTED"));
    }

    #[test]
    fn test_is_blank() {
        assert!(is_blank(&SecretString::from("  ")));
        assert!(!is_blank(&SecretString::from("k")));
    }
}

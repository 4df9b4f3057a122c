// auth.rs - Bearer-token membership check.
//
// The token set is read-only after startup. An empty set means
// authentication is switched off; the daemon warns about that at boot.

use std::collections::HashSet;

use crate::error::FsynError;

const SCHEME: &str = "Bearer";

/// Accepted bearer tokens.
#[derive(Debug, Clone, Default)]
pub struct TokenSet {
    tokens: HashSet<String>,
}

impl TokenSet {
    pub fn new<I, T>(tokens: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            tokens: tokens
                .into_iter()
                .map(Into::into)
                .map(|t: String| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }

    /// True when no tokens are configured (auth disabled).
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn contains(&self, token: &str) -> bool {
        self.tokens.contains(token)
    }

    /// Check a raw `Authorization` header value.
    pub fn authorize(&self, header: Option<&str>) -> Result<(), FsynError> {
        let header = header.map(str::trim).unwrap_or_default();
        if header.is_empty() {
            return Err(FsynError::MissingAuth);
        }

        let Some((scheme, token)) = header.split_once(' ') else {
            return Err(FsynError::BadAuth {
                scheme: header.to_string(),
            });
        };
        if scheme != SCHEME {
            return Err(FsynError::BadAuth {
                scheme: scheme.to_string(),
            });
        }

        let token = token.trim();
        if token.is_empty() {
            return Err(FsynError::BadAuth {
                scheme: scheme.to_string(),
            });
        }
        if !self.contains(token) {
            return Err(FsynError::InvalidToken);
        }
        Ok(())
    }
}

//! Capability tiers carried by API keys.
//!
//! Scopes form a total order: `read < write < admin`. A key satisfies a
//! requirement when its rank is at least the required rank.

use std::{fmt, str::FromStr};

use axum::http::Method;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Read,
    Write,
    Admin,
}

impl Scope {
    pub fn rank(self) -> u8 {
        match self {
            Scope::Read => 1,
            Scope::Write => 2,
            Scope::Admin => 3,
        }
    }

    /// Whether a key holding `self` may perform an operation requiring `required`.
    pub fn satisfies(self, required: Scope) -> bool {
        self.rank() >= required.rank()
    }

    /// Default requirement for a request method: mutating methods need
    /// `write`, everything else `read`.
    pub fn required_for(method: &Method) -> Scope {
        if *method == Method::POST
            || *method == Method::PUT
            || *method == Method::PATCH
            || *method == Method::DELETE
        {
            Scope::Write
        } else {
            Scope::Read
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Scope::Read => "read",
            Scope::Write => "write",
            Scope::Admin => "admin",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "read" => Ok(Scope::Read),
            "write" => Ok(Scope::Write),
            "admin" => Ok(Scope::Admin),
            _ => Err(AppError::InvalidRequest("Invalid scope".to_string())),
        }
    }
}

/// Decodes the `scope` column.
impl TryFrom<String> for Scope {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_is_total() {
        assert!(Scope::Admin.satisfies(Scope::Write));
        assert!(Scope::Admin.satisfies(Scope::Read));
        assert!(Scope::Write.satisfies(Scope::Read));
        assert!(Scope::Write.satisfies(Scope::Write));
        assert!(!Scope::Read.satisfies(Scope::Write));
        assert!(!Scope::Write.satisfies(Scope::Admin));
    }

    #[test]
    fn method_requirements() {
        for method in [Method::POST, Method::PUT, Method::PATCH, Method::DELETE] {
            assert_eq!(Scope::required_for(&method), Scope::Write);
        }
        for method in [Method::GET, Method::HEAD, Method::OPTIONS] {
            assert_eq!(Scope::required_for(&method), Scope::Read);
        }
    }

    #[test]
    fn parsing_normalizes_case_and_whitespace() {
        assert_eq!(" Write ".parse::<Scope>().unwrap(), Scope::Write);
        assert_eq!("ADMIN".parse::<Scope>().unwrap(), Scope::Admin);
        assert!(matches!(
            "superuser".parse::<Scope>(),
            Err(AppError::InvalidRequest(_))
        ));
    }
}

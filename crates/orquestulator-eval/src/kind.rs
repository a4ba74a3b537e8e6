//! Query kinds.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EvalError;

/// The expression language of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryKind {
    /// Orquesta workflow expressions: `<% yaql %>` or `{{ jinja }}` with
    /// workflow functions such as `ctx()` and `task_status()`.
    Orquesta,
    Yaql,
    Jinja2,
}

impl QueryKind {
    pub const ALL: [QueryKind; 3] = [QueryKind::Orquesta, QueryKind::Yaql, QueryKind::Jinja2];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Orquesta => "orquesta",
            Self::Yaql => "yaql",
            Self::Jinja2 => "jinja2",
        }
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueryKind {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "orquesta" => Ok(Self::Orquesta),
            "yaql" => Ok(Self::Yaql),
            "jinja2" => Ok(Self::Jinja2),
            other => Err(EvalError::UnsupportedKind(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_kinds() {
        for kind in QueryKind::ALL {
            assert_eq!(kind.as_str().parse::<QueryKind>().unwrap(), kind);
        }
        assert_eq!(
            "jinja".parse::<QueryKind>(),
            Err(EvalError::UnsupportedKind("jinja".into()))
        );
    }
}

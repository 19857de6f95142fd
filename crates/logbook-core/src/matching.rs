//! Match expressions
//!
//! A [`Match`] is an ordered list of terms mirroring the store's native
//! filter stack. Consecutive field terms are ANDed; several values of one
//! field are ORed; an explicit [`Match::or`] disjoins what follows with
//! everything before it and [`Match::and`] conjoins whole disjunctions.
//!
//! ```
//! use logbook_core::Match;
//!
//! // (_SYSTEMD_UNIT=a.service OR _SYSTEMD_UNIT=b.service) AND PRIORITY=3
//! //   OR SYSLOG_IDENTIFIER=kernel
//! let m = Match::new()
//!     .field("_SYSTEMD_UNIT", ["a.service", "b.service"])
//!     .field("PRIORITY", ["3"])
//!     .or()
//!     .field("SYSLOG_IDENTIFIER", ["kernel"]);
//! assert_eq!(m.terms().len(), 4);
//! ```

use crate::error::{LogbookError, Result};
use crate::fields::to_payload;
use crate::store::Session;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One node of a match expression
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum MatchTerm {
    /// `name` equals any of `values`
    Field { name: String, values: Vec<String> },
    /// Conjunction marker
    And,
    /// Disjunction marker
    Or,
}

/// Native filter operation produced by compiling a [`Match`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterOp {
    /// Raw `NAME=value` equality term
    Term(Vec<u8>),
    Conjunction,
    Disjunction,
}

/// Immutable boolean filter expression, independent of any connection.
///
/// Builder methods consume and return the value, so a finished `Match`
/// never changes and can be applied to any number of connections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    terms: Vec<MatchTerm>,
}

impl Match {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field term matching any of `values`.
    ///
    /// An empty string value matches entries where the field is present
    /// and empty. Absence of a field cannot be expressed.
    pub fn field<I, V>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.terms.push(MatchTerm::Field {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Append a conjunction marker
    pub fn and(mut self) -> Self {
        self.terms.push(MatchTerm::And);
        self
    }

    /// Append a disjunction marker
    pub fn or(mut self) -> Self {
        self.terms.push(MatchTerm::Or);
        self
    }

    pub fn terms(&self) -> &[MatchTerm] {
        &self.terms
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Check the expression can be applied: it must have at least one term
    /// and every field term needs a name and at least one value.
    pub fn validate(&self) -> Result<()> {
        if self.terms.is_empty() {
            return Err(LogbookError::EmptyMatch);
        }

        for term in &self.terms {
            if let MatchTerm::Field { name, values } = term {
                if name.is_empty() {
                    return Err(LogbookError::Validation(
                        "match field name must not be empty".into(),
                    ));
                }
                if name.contains('=') {
                    return Err(LogbookError::Validation(format!(
                        "match field name '{}' must not contain '='",
                        name
                    )));
                }
                if values.is_empty() {
                    return Err(LogbookError::Validation(format!(
                        "match on field '{}' needs at least one value",
                        name
                    )));
                }
            }
        }

        Ok(())
    }

    /// Compile into native filter operations in declaration order
    pub fn compile(&self) -> Result<Vec<FilterOp>> {
        self.validate()?;

        let mut ops = Vec::with_capacity(self.terms.len());
        for term in &self.terms {
            match term {
                MatchTerm::Field { name, values } => {
                    for value in values {
                        ops.push(FilterOp::Term(to_payload(name, value.as_bytes())));
                    }
                }
                MatchTerm::And => ops.push(FilterOp::Conjunction),
                MatchTerm::Or => ops.push(FilterOp::Disjunction),
            }
        }
        Ok(ops)
    }

    /// Push the compiled operations onto a session's filter stack
    pub fn apply(&self, session: &mut dyn Session) -> Result<()> {
        for op in self.compile()? {
            match op {
                FilterOp::Term(term) => session.add_match(&term)?,
                FilterOp::Conjunction => session.add_conjunction()?,
                FilterOp::Disjunction => session.add_disjunction()?,
            }
        }
        Ok(())
    }
}

/// Renders in `journalctl` argument syntax: `A=x A=y B=z + C=w`
impl fmt::Display for Match {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for term in &self.terms {
            let parts: Vec<String> = match term {
                MatchTerm::Field { name, values } => {
                    values.iter().map(|v| format!("{}={}", name, v)).collect()
                }
                MatchTerm::And => vec!["AND".to_string()],
                MatchTerm::Or => vec!["+".to_string()],
            };
            for part in parts {
                if !first {
                    f.write_str(" ")?;
                }
                f.write_str(&part)?;
                first = false;
            }
        }
        Ok(())
    }
}

//! Native match stack
//!
//! Terms accumulate into a conjunction keyed by field: values of one field
//! are ORed, different fields are ANDed. A disjunction closes the current
//! conjunction and ORs it with the next one; a conjunction closes the
//! current disjunction and ANDs it with the next one. The whole stack is
//! therefore an AND of ORs of per-field conjunctions.

use logbook_core::{LogbookError, Result};
use std::collections::BTreeMap;

/// Field name -> accepted raw payloads
type Conjunct = BTreeMap<Vec<u8>, Vec<Vec<u8>>>;

#[derive(Debug, Clone, Default)]
pub struct FilterStack {
    levels: Vec<Vec<Conjunct>>,
    disjunction: Vec<Conjunct>,
    conjunct: Conjunct,
}

impl FilterStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_match(&mut self, term: &[u8]) -> Result<()> {
        let eq = term
            .iter()
            .position(|b| *b == b'=')
            .filter(|eq| *eq > 0)
            .ok_or_else(|| {
                LogbookError::Filter(format!(
                    "invalid match term '{}'",
                    String::from_utf8_lossy(term)
                ))
            })?;

        let values = self.conjunct.entry(term[..eq].to_vec()).or_default();
        if !values.iter().any(|v| v == term) {
            values.push(term.to_vec());
        }
        Ok(())
    }

    pub fn add_disjunction(&mut self) {
        if !self.conjunct.is_empty() {
            self.disjunction.push(std::mem::take(&mut self.conjunct));
        }
    }

    pub fn add_conjunction(&mut self) {
        self.add_disjunction();
        if !self.disjunction.is_empty() {
            self.levels.push(std::mem::take(&mut self.disjunction));
        }
    }

    pub fn flush(&mut self) {
        self.levels.clear();
        self.disjunction.clear();
        self.conjunct.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty() && self.disjunction.is_empty() && self.conjunct.is_empty()
    }

    /// Evaluate against the raw payloads of one record
    pub fn matches(&self, payloads: &[Vec<u8>]) -> bool {
        let open_ok = (self.disjunction.is_empty() && self.conjunct.is_empty())
            || self
                .disjunction
                .iter()
                .chain(std::iter::once(&self.conjunct).filter(|c| !c.is_empty()))
                .any(|conjunct| conjunct_matches(conjunct, payloads));

        open_ok
            && self.levels.iter().all(|level| {
                level
                    .iter()
                    .any(|conjunct| conjunct_matches(conjunct, payloads))
            })
    }
}

fn conjunct_matches(conjunct: &Conjunct, payloads: &[Vec<u8>]) -> bool {
    conjunct
        .values()
        .all(|accepted| payloads.iter().any(|p| accepted.contains(p)))
}

use crate::error::{RbError, RbResult};
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One taxon's observation at one site (§3, §6). `ambiguous` carries a
/// bitset of compatible states when the data is not a single resolved
/// state; `weighted` selects whether those bits also carry per-state
/// weights (§4.E precedence rule: ambiguity-bitset summation takes
/// precedence over weighting only when `weighted` is false).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    pub gap: bool,
    pub state: usize,
    pub ambiguous: Option<Vec<bool>>,
    pub weighted: bool,
    pub weights: Option<Vec<f64>>,
}

impl Character {
    pub fn resolved(state: usize) -> Self {
        Self {
            gap: false,
            state,
            ambiguous: None,
            weighted: false,
            weights: None,
        }
    }

    pub fn gap() -> Self {
        Self {
            gap: true,
            state: 0,
            ambiguous: None,
            weighted: false,
            weights: None,
        }
    }

    /// parses one IUPAC nucleotide ambiguity code (§6 input format) into a
    /// `Character` over the 4-state `{A,C,G,T}` alphabet. This is the one
    /// external-string boundary in this crate, so it reaches for `anyhow`
    /// rather than `RbError`: the failure is "untrusted text doesn't parse",
    /// not an internal invariant violation.
    pub fn from_iupac_code(symbol: char) -> anyhow::Result<Self> {
        let bits = match symbol.to_ascii_uppercase() {
            'A' => [true, false, false, false],
            'C' => [false, true, false, false],
            'G' => [false, false, true, false],
            'T' | 'U' => [false, false, false, true],
            'R' => [true, false, true, false],
            'Y' => [false, true, false, true],
            'S' => [false, true, true, false],
            'W' => [true, false, false, true],
            'K' => [false, false, true, true],
            'M' => [true, true, false, false],
            'B' => [false, true, true, true],
            'D' => [true, false, true, true],
            'H' => [true, true, false, true],
            'V' => [true, true, true, false],
            'N' | '?' => [true, true, true, true],
            '-' => return Ok(Character::gap()),
            other => bail!("'{other}' is not a recognized IUPAC nucleotide code"),
        };
        if bits.iter().filter(|&&b| b).count() == 1 {
            let state = bits
                .iter()
                .position(|&b| b)
                .context("resolved IUPAC code has no set bit")?;
            return Ok(Character::resolved(state));
        }
        Ok(Character {
            gap: false,
            state: 0,
            ambiguous: Some(bits.to_vec()),
            weighted: false,
            weights: None,
        })
    }

    /// the `(c2, weight)` pairs the pruning kernel's tip recurrence sums
    /// over; a resolved state contributes itself with weight 1.
    pub fn contributing_states(&self, num_states: usize) -> Vec<(usize, f64)> {
        match (&self.ambiguous, self.weighted) {
            (Some(bits), true) => {
                let w = self
                    .weights
                    .as_ref()
                    .expect("weighted character is missing its weight vector");
                (0..num_states)
                    .filter(|&i| bits[i])
                    .map(|i| (i, w[i]))
                    .collect()
            }
            (Some(bits), false) => (0..num_states).filter(|&i| bits[i]).map(|i| (i, 1.0)).collect(),
            (None, _) => vec![(self.state, 1.0)],
        }
    }
}

/// A taxon-indexed alignment (§3, §6): one row per taxon, one column per
/// site pattern, with per-pattern multiplicities (site-pattern compression
/// is an external collaborator's concern per §1 — patterns here may simply
/// be uncompressed sites with weight 1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterMatrix {
    pub num_states: usize,
    pub num_patterns: usize,
    pub taxa: Vec<String>,
    pub pattern_weights: Vec<f64>,
    rows: HashMap<String, Vec<Character>>,
}

impl CharacterMatrix {
    pub fn new(
        num_states: usize,
        taxa: Vec<String>,
        rows: HashMap<String, Vec<Character>>,
        pattern_weights: Vec<f64>,
    ) -> RbResult<Self> {
        let num_patterns = pattern_weights.len();
        for taxon in &taxa {
            let row = rows
                .get(taxon)
                .ok_or_else(|| RbError::Validation(format!("no row for taxon {taxon}")))?;
            if row.len() != num_patterns {
                return Err(RbError::Validation(format!(
                    "taxon {taxon} has {} patterns, expected {num_patterns}",
                    row.len()
                )));
            }
            for ch in row {
                if let Some(bits) = &ch.ambiguous {
                    if bits.len() != num_states {
                        return Err(RbError::Validation(format!(
                            "taxon {taxon} ambiguity bitset length {} != num_states {num_states}",
                            bits.len()
                        )));
                    }
                }
                if let Some(w) = &ch.weights {
                    if w.len() != num_states {
                        return Err(RbError::Validation(format!(
                            "taxon {taxon} weight vector length {} != num_states {num_states}",
                            w.len()
                        )));
                    }
                }
            }
        }
        Ok(Self {
            num_states,
            num_patterns,
            taxa,
            pattern_weights,
            rows,
        })
    }

    pub fn get(&self, taxon: &str, site: usize) -> RbResult<&Character> {
        self.rows
            .get(taxon)
            .and_then(|row| row.get(site))
            .ok_or_else(|| RbError::Validation(format!("no character data for {taxon} at site {site}")))
    }

    pub fn num_taxa(&self) -> usize {
        self.taxa.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_taxon_matrix() -> CharacterMatrix {
        let mut rows = HashMap::new();
        rows.insert("A".to_string(), vec![Character::resolved(0), Character::gap()]);
        CharacterMatrix::new(4, vec!["A".to_string()], rows, vec![1.0, 1.0]).unwrap()
    }

    #[test]
    fn resolved_state_contributes_itself_only() {
        let m = single_taxon_matrix();
        let ch = m.get("A", 0).unwrap();
        assert_eq!(ch.contributing_states(4), vec![(0, 1.0)]);
    }

    #[test]
    fn ambiguous_without_weights_contributes_unit_weight_per_bit() {
        let ch = Character {
            gap: false,
            state: 0,
            ambiguous: Some(vec![true, false, true, false]),
            weighted: false,
            weights: None,
        };
        assert_eq!(ch.contributing_states(4), vec![(0, 1.0), (2, 1.0)]);
    }

    #[test]
    fn weighted_ambiguous_carries_per_state_weight() {
        let ch = Character {
            gap: false,
            state: 0,
            ambiguous: Some(vec![true, false, true, false]),
            weighted: true,
            weights: Some(vec![0.25, 0.0, 0.75, 0.0]),
        };
        assert_eq!(ch.contributing_states(4), vec![(0, 0.25), (2, 0.75)]);
    }

    #[test]
    fn iupac_resolved_code_parses_to_a_single_state() {
        let ch = Character::from_iupac_code('g').unwrap();
        assert_eq!(ch.contributing_states(4), vec![(2, 1.0)]);
    }

    #[test]
    fn iupac_ambiguity_code_parses_to_its_bitset() {
        let ch = Character::from_iupac_code('R').unwrap();
        assert_eq!(ch.contributing_states(4), vec![(0, 1.0), (2, 1.0)]);
    }

    #[test]
    fn iupac_gap_and_unknown_code_are_handled() {
        assert!(Character::from_iupac_code('-').unwrap().gap);
        assert_eq!(Character::from_iupac_code('N').unwrap().contributing_states(4).len(), 4);
        assert!(Character::from_iupac_code('Z').is_err());
    }

    #[test]
    fn mismatched_pattern_count_is_rejected() {
        let mut rows = HashMap::new();
        rows.insert("A".to_string(), vec![Character::resolved(0)]);
        let err = CharacterMatrix::new(4, vec!["A".to_string()], rows, vec![1.0, 1.0]);
        assert!(err.is_err());
    }
}

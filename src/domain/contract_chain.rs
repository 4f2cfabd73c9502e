//! Futures contract ids and the backward walk through expiry months.
//!
//! Contract ids look like `CON.F.US.MGC.Z25`: an instrument prefix, a dot,
//! one delivery-month letter and two year digits. The chain walk is plain
//! arithmetic over the month-code table; generated ids are never checked
//! against the exchange.

use crate::domain::error::RollstitchError;
use std::fmt;

/// All twelve delivery-month letters, January through December.
pub const ALL_MONTH_CODES: [char; 12] = ['F', 'G', 'H', 'J', 'K', 'M', 'N', 'Q', 'U', 'V', 'X', 'Z'];

/// Reduced cycle: bi-monthly metals months plus the quarterly months.
pub const CYCLE_MONTH_CODES: [char; 8] = ['G', 'H', 'J', 'M', 'Q', 'U', 'V', 'Z'];

pub fn month_codes(use_all_month_codes: bool) -> &'static [char] {
    if use_all_month_codes {
        &ALL_MONTH_CODES
    } else {
        &CYCLE_MONTH_CODES
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractCode {
    pub prefix: String,
    pub month: char,
    /// Two-digit year, 0..=99.
    pub year: u8,
}

impl ContractCode {
    pub fn parse(id: &str) -> Result<Self, RollstitchError> {
        let malformed = |reason: &str| RollstitchError::MalformedContractId {
            id: id.to_string(),
            reason: reason.to_string(),
        };

        let normalized = id.trim().to_ascii_uppercase();
        let (prefix, suffix) = normalized
            .rsplit_once('.')
            .ok_or_else(|| malformed("missing '.' separator"))?;
        if prefix.is_empty() {
            return Err(malformed("empty instrument prefix"));
        }

        let chars: Vec<char> = suffix.chars().collect();
        if chars.len() != 3 {
            return Err(malformed("expiry must be one month letter and two year digits"));
        }

        let month = chars[0];
        if !ALL_MONTH_CODES.contains(&month) {
            return Err(malformed("unknown month code"));
        }
        let year = match (chars[1].to_digit(10), chars[2].to_digit(10)) {
            (Some(tens), Some(ones)) => (tens * 10 + ones) as u8,
            _ => return Err(malformed("year must be two digits")),
        };

        Ok(Self {
            prefix: prefix.to_string(),
            month,
            year,
        })
    }

    fn month_index(&self) -> usize {
        ALL_MONTH_CODES
            .iter()
            .position(|&c| c == self.month)
            .unwrap_or(0)
    }

    /// The previous contract in `table`, or `None` when stepping back would
    /// cross below year `00`.
    fn previous(&self, table: &[char]) -> Option<Self> {
        let current = self.month_index();
        let earlier_same_year = table.iter().rev().find(|&&code| {
            ALL_MONTH_CODES
                .iter()
                .position(|&c| c == code)
                .is_some_and(|idx| idx < current)
        });

        match earlier_same_year {
            Some(&month) => Some(Self {
                prefix: self.prefix.clone(),
                month,
                year: self.year,
            }),
            None => {
                if self.year == 0 {
                    return None;
                }
                let month = *table.last()?;
                Some(Self {
                    prefix: self.prefix.clone(),
                    month,
                    year: (self.year + 99) % 100,
                })
            }
        }
    }
}

impl fmt::Display for ContractCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}{:02}", self.prefix, self.month, self.year)
    }
}

/// Up to `count` contract ids ending at `reference`, most recent first.
///
/// The reference id is always first. The walk stops early when the next
/// contract's year would be below `min_year`.
pub fn generate_chain(
    reference: &str,
    count: usize,
    use_all_month_codes: bool,
    min_year: u8,
) -> Result<Vec<String>, RollstitchError> {
    let start = ContractCode::parse(reference)?;
    let table = month_codes(use_all_month_codes);

    let mut chain = Vec::with_capacity(count);
    if count == 0 {
        return Ok(chain);
    }
    chain.push(start.to_string());

    let mut current = start;
    while chain.len() < count {
        match current.previous(table) {
            Some(prev) if prev.year >= min_year => {
                chain.push(prev.to_string());
                current = prev;
            }
            _ => break,
        }
    }

    Ok(chain)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_contract_id() {
        let code = ContractCode::parse("CON.F.US.MGC.Z25").unwrap();
        assert_eq!(code.prefix, "CON.F.US.MGC");
        assert_eq!(code.month, 'Z');
        assert_eq!(code.year, 25);
        assert_eq!(code.to_string(), "CON.F.US.MGC.Z25");
    }

    #[test]
    fn lowercase_reference_yields_uppercase_chain() {
        let code = ContractCode::parse(" con.f.us.mgc.z25 ").unwrap();
        assert_eq!(code.prefix, "CON.F.US.MGC");
        let chain = generate_chain("con.f.us.mgc.z25", 2, true, 20).unwrap();
        assert_eq!(chain, vec!["CON.F.US.MGC.Z25", "CON.F.US.MGC.X25"]);
    }

    #[test]
    fn parse_rejects_malformed_ids() {
        for bad in ["MGCZ25", ".Z25", "CON.F.US.MGC.Z2", "CON.F.US.MGC.A25", "CON.F.US.MGC.Z2X", "CON.F.US.MGC.Z250"] {
            assert!(
                matches!(
                    ContractCode::parse(bad),
                    Err(RollstitchError::MalformedContractId { .. })
                ),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn all_months_walks_one_month_at_a_time() {
        let chain = generate_chain("CON.F.US.MGC.Z25", 5, true, 20).unwrap();
        assert_eq!(
            chain,
            vec![
                "CON.F.US.MGC.Z25",
                "CON.F.US.MGC.X25",
                "CON.F.US.MGC.V25",
                "CON.F.US.MGC.U25",
                "CON.F.US.MGC.Q25",
            ]
        );
    }

    #[test]
    fn cycle_months_skip_off_cycle_letters() {
        let chain = generate_chain("CON.F.US.MGC.Z25", 4, false, 20).unwrap();
        assert_eq!(
            chain,
            vec![
                "CON.F.US.MGC.Z25",
                "CON.F.US.MGC.V25",
                "CON.F.US.MGC.U25",
                "CON.F.US.MGC.Q25",
            ]
        );
    }

    #[test]
    fn wraps_into_previous_year() {
        let chain = generate_chain("CON.F.US.MGC.G25", 3, false, 20).unwrap();
        assert_eq!(
            chain,
            vec!["CON.F.US.MGC.G25", "CON.F.US.MGC.Z24", "CON.F.US.MGC.V24"]
        );

        let chain = generate_chain("CON.F.US.MGC.F25", 2, true, 20).unwrap();
        assert_eq!(chain, vec!["CON.F.US.MGC.F25", "CON.F.US.MGC.Z24"]);
    }

    #[test]
    fn off_cycle_reference_steps_to_earlier_cycle_month() {
        let chain = generate_chain("CON.F.US.MGC.X25", 2, false, 20).unwrap();
        assert_eq!(chain, vec!["CON.F.US.MGC.X25", "CON.F.US.MGC.V25"]);

        let chain = generate_chain("CON.F.US.MGC.F25", 2, false, 20).unwrap();
        assert_eq!(chain, vec!["CON.F.US.MGC.F25", "CON.F.US.MGC.Z24"]);
    }

    #[test]
    fn stops_at_min_year() {
        let chain = generate_chain("CON.F.US.MGC.H21", 50, false, 20).unwrap();
        // H21, G21, then all eight 2020 months.
        assert_eq!(chain.len(), 10);
        assert_eq!(chain.last().unwrap(), "CON.F.US.MGC.G20");
    }

    #[test]
    fn never_wraps_below_year_zero() {
        let chain = generate_chain("CON.F.US.MGC.G00", 5, false, 0).unwrap();
        assert_eq!(chain, vec!["CON.F.US.MGC.G00"]);
    }

    #[test]
    fn zero_count_is_empty() {
        assert!(generate_chain("CON.F.US.MGC.Z25", 0, true, 20).unwrap().is_empty());
    }

    #[test]
    fn malformed_reference_is_an_error() {
        assert!(generate_chain("garbage", 3, true, 20).is_err());
    }
}

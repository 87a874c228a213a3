//! Draw response parsing.
//!
//! Body layout: `[header tokens...] [outcome token]*`, whitespace separated.
//! With the default contract a 10-draw body reads
//! `/handle_wish_Starpath 100 10 diamond exp20 ...`: path, cost, echoed count,
//! then one token per outcome. Error bodies start with a known marker, e.g.
//! `/wish_error_text operation_frequent`.

use crate::models::{RawOutcome, ResponseContract, ResponseError};

/// Strict, positional parser for draw response bodies.
#[derive(Debug, Clone, Default)]
pub struct ResponseParser {
    contract: ResponseContract,
}

impl ResponseParser {
    pub fn new(contract: ResponseContract) -> Self {
        Self { contract }
    }

    pub fn contract(&self) -> &ResponseContract {
        &self.contract
    }

    /// Extract the outcomes of one batch, in draw order.
    ///
    /// Never truncates or pads: a body that does not carry exactly
    /// `expected` outcomes after the header is an error.
    pub fn parse(&self, body: &str, expected: u32) -> Result<Vec<RawOutcome>, ResponseError> {
        let tokens: Vec<&str> = body.split_whitespace().collect();

        if let Some(first) = tokens.first()
            && self.contract.error_prefixes.iter().any(|p| p == first)
        {
            let reason = if tokens.len() > 1 {
                tokens[1..].join(" ")
            } else {
                "unspecified".to_string()
            };
            return Err(ResponseError::Rejected { reason });
        }

        let header = self.contract.header_tokens;
        if tokens.len() < header {
            return Err(ResponseError::Truncated {
                expected_header: header,
                found: tokens.len(),
            });
        }

        if let Some(idx) = self.contract.count_field {
            let echoed = tokens.get(idx).copied().ok_or(ResponseError::Truncated {
                expected_header: idx + 1,
                found: tokens.len(),
            })?;
            if echoed.parse::<u32>().ok() != Some(expected) {
                return Err(ResponseError::EchoMismatch {
                    echoed: echoed.to_string(),
                    expected,
                });
            }
        }

        let outcomes = &tokens[header..];
        if outcomes.len() != expected as usize {
            return Err(ResponseError::CountMismatch {
                expected: expected as usize,
                found: outcomes.len(),
            });
        }

        Ok(outcomes.iter().map(|t| RawOutcome::from(*t)).collect())
    }
}

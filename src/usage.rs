//! Token usage tracking for LLM calls.
//!
//! `Usage` is deliberately provider-agnostic: adapters report whatever
//! counts their backend exposes and the core only ever sums them.

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign};

/// Token usage reported by a single LLM call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Tokens in the prompt sent to the model.
    #[serde(default)]
    pub input_tokens: u32,
    /// Tokens in the model's completion.
    #[serde(default)]
    pub output_tokens: u32,
    /// `input_tokens + output_tokens`, tracked separately so partial
    /// reports (some providers omit one side) don't have to be re-derived.
    #[serde(default)]
    pub total_tokens: u32,
}

impl Usage {
    /// Build a usage record from explicit input/output counts.
    #[must_use]
    pub const fn new(input_tokens: u32, output_tokens: u32) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens + output_tokens,
        }
    }

    /// The zero usage record.
    #[must_use]
    pub const fn zero() -> Self {
        Self {
            input_tokens: 0,
            output_tokens: 0,
            total_tokens: 0,
        }
    }

    /// `true` if no tokens were recorded.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.total_tokens == 0
    }
}

impl Add for Usage {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            input_tokens: self.input_tokens + rhs.input_tokens,
            output_tokens: self.output_tokens + rhs.output_tokens,
            total_tokens: self.total_tokens + rhs.total_tokens,
        }
    }
}

impl AddAssign for Usage {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl std::fmt::Display for Usage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Usage(in: {}, out: {}, total: {})",
            self.input_tokens, self.output_tokens, self.total_tokens
        )
    }
}

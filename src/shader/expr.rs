//! Guard Expression Evaluator
//!
//! Resolves a boolean guard expression (`if FEATURE_A or (FEATURE_B and
//! FEATURE_C)`) over a flat token stream into a feature-bit mask.
//!
//! The evaluator does **not** compute a truth table. `and` and `or` both
//! union their operands: the result is the set of every feature bit the
//! guard mentions. Precise combination validity is enforced later, at
//! resolve time, by clamping against the derived allow/forced masks.
//!
//! Implemented as a recursive descent over an immutable slice with an
//! explicitly returned position — callers never share a mutable cursor.
//!
//! # Known quirk
//!
//! A `!` prefix is consumed during parsing but its operand still
//! contributes its bit to the union. Compiled-variant identities baked with
//! this behavior exist in the wild, so it is reproduced here pending
//! product clarification.

use super::token::{structural_flag_for, tok, FeatureRegistry, StructuralFlags};

/// Result of evaluating one guard expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuardScan {
    /// Union of every registered feature bit the guard mentions.
    pub mask: u64,
    /// Index of the first token after the expression. Never exceeds the
    /// stream length, including on malformed input.
    pub next: usize,
}

/// Evaluates the guard expression starting at `tokens[start]`.
///
/// Unregistered leaf tokens idempotently set their structural capability
/// flag in `flags` as a side effect. Malformed input (unterminated group,
/// truncated operand) yields the mask accumulated so far with `next` at the
/// point the scan stopped.
pub fn evaluate_guard(
    registry: &FeatureRegistry,
    flags: &mut StructuralFlags,
    tokens: &[u32],
    start: usize,
) -> GuardScan {
    let mut mask = 0u64;
    let mut cur = start.min(tokens.len());

    while cur < tokens.len() {
        let token = tokens[cur];
        cur += 1;

        if token == tok::LPAREN {
            let group_start = cur;
            let mut depth = 0u32;
            loop {
                if cur >= tokens.len() {
                    // Unterminated group.
                    return GuardScan { mask, next: cur };
                }
                let t = tokens[cur];
                if t == tok::LPAREN {
                    depth += 1;
                } else if t == tok::RPAREN {
                    if depth == 0 {
                        break;
                    }
                    depth -= 1;
                } else if t == tok::SKIP {
                    // End-of-fragment marker inside a group.
                    return GuardScan { mask, next: cur };
                }
                cur += 1;
            }
            let inner = &tokens[group_start..cur];
            cur += 1; // consume ')'
            if !inner.is_empty() {
                mask |= evaluate_guard(registry, flags, inner, 0).mask;
            }
        } else {
            let mut leaf = token;
            if token == tok::NOT {
                if cur >= tokens.len() {
                    break;
                }
                leaf = tokens[cur];
                cur += 1;
                // Quirk: the negated operand still contributes its bit.
            }
            mask |= check_leaf(registry, flags, leaf);
        }

        if cur >= tokens.len() {
            break;
        }
        match tokens[cur] {
            connector @ (tok::AND | tok::OR) => {
                cur += 1;
                // `&&` / `||` lex to two consecutive operator codes.
                if cur < tokens.len() && tokens[cur] == connector {
                    cur += 1;
                }
            }
            _ => break,
        }
    }

    GuardScan { mask, next: cur }
}

/// Contribution of a single leaf token.
///
/// Registered feature → its mask bit. Unregistered builtin → structural
/// flag side effect, zero contribution. Anything else → zero.
fn check_leaf(registry: &FeatureRegistry, flags: &mut StructuralFlags, token: u32) -> u64 {
    if let Some(mask) = registry.mask_of_token(token) {
        return mask;
    }
    if let Some(flag) = structural_flag_for(token) {
        flags.insert(flag);
    }
    0
}

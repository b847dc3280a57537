// SPDX-FileCopyrightText: 2026 Sadhya Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Masking helpers for values written to logs.

/// Masks a phone number, keeping only the last four digits.
///
/// `919876543210` becomes `********3210`. Inputs of four characters or fewer
/// are masked entirely.
pub fn redact_phone(phone: &str) -> String {
    let count = phone.chars().count();
    if count <= 4 {
        return "*".repeat(count);
    }
    let tail: String = phone.chars().skip(count - 4).collect();
    format!("{}{}", "*".repeat(count - 4), tail)
}

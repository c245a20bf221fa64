//! Exact integer proportions for VLV positioning.
//!
//! Everything here is pure integer arithmetic on widened operands so the
//! same inputs give the same position on every platform.

/// `(a * b + c / 2) / c` computed in 64 bits; `None` when `c` is zero or the
/// result does not fit in 32 bits.
#[must_use]
pub const fn mul_div_round(a: u32, b: u32, c: u32) -> Option<u32> {
    if c == 0 {
        return None;
    }

    let wide = (a as u64 * b as u64 + (c as u64) / 2) / c as u64;
    if wide > u32::MAX as u64 {
        None
    } else {
        Some(wide as u32)
    }
}

/// Map a client's "row `last_known_position` of `last_known_count`" onto a
/// container holding `content_count` rows, as a 1-based position clamped to
/// `[1, max(content_count, 1)]`.
///
/// A client count of 0 or 1 carries no proportion and maps to the first row.
#[must_use]
pub fn proportional_position(
    content_count: u32,
    last_known_position: u32,
    last_known_count: u32,
) -> u32 {
    let upper = content_count.max(1);
    if last_known_count <= 1 {
        return 1;
    }

    let offset = mul_div_round(
        content_count.saturating_sub(1),
        last_known_position.saturating_sub(1),
        last_known_count - 1,
    )
    .unwrap_or(u32::MAX);

    offset.saturating_add(1).clamp(1, upper)
}

/// Rescale `numerator / denominator` onto `target` as the denominator.
#[must_use]
pub(crate) fn rescale(numerator: u32, denominator: u32, target: u32) -> u32 {
    if denominator == target {
        return numerator;
    }

    mul_div_round(numerator, target, denominator.max(1)).unwrap_or(target)
}

///
/// TESTS
///

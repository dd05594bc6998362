/// Largest discount a single checkout can receive, in currency units.
pub const MAX_DISCOUNT: i64 = 500;

/// Percentage granted by a discount code, if the code is known.
pub fn code_percentage(code: &str) -> Option<i64> {
    match code {
        "WELCOME10" => Some(10),
        "FARM20" => Some(20),
        _ => None,
    }
}

/// Discount for a whole checkout: percentage of the subtotal, rounded half-up, capped.
pub fn overall_discount(subtotal: i64, code: Option<&str>) -> i64 {
    let Some(percent) = code.and_then(code_percentage) else {
        return 0;
    };
    if subtotal <= 0 {
        return 0;
    }
    let raw = (subtotal as i128 * percent as i128 * 2 + 100) / 200;
    (raw as i64).min(MAX_DISCOUNT)
}

/// Split `total` across `weights` in proportion, as whole units.
///
/// Uses largest-remainder apportionment: every share is the floor of its exact
/// proportion, then the leftover units go to the largest fractional parts (earlier
/// groups win ties). Shares are non-negative and always sum to `total`.
pub fn allocate(total: i64, weights: &[i64]) -> Vec<i64> {
    let sum: i128 = weights.iter().map(|w| (*w).max(0) as i128).sum();
    if total <= 0 || sum == 0 {
        return vec![0; weights.len()];
    }

    let total = total as i128;
    let mut shares = Vec::with_capacity(weights.len());
    let mut remainders = Vec::with_capacity(weights.len());
    for (idx, weight) in weights.iter().enumerate() {
        let numerator = (*weight).max(0) as i128 * total;
        shares.push(numerator / sum);
        remainders.push((numerator % sum, idx));
    }

    let mut leftover = total - shares.iter().sum::<i128>();
    remainders.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
    for (_, idx) in remainders {
        if leftover == 0 {
            break;
        }
        shares[idx] += 1;
        leftover -= 1;
    }

    shares.into_iter().map(|s| s as i64).collect()
}

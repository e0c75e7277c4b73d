pub mod eval;
pub mod index;
pub mod search;

/// Accepted `--output` values; anything else is rejected before any work runs.
pub(crate) fn check_output_format(output: &str) -> bool {
    if matches!(output, "json" | "table") {
        return true;
    }
    eprintln!("Error: Invalid output format: {output}");
    false
}

/// Parse an integer flag restricted to `1..=100`.
pub(crate) fn bounded_count(s: &str) -> Result<usize, String> {
    let n: usize = s.parse().map_err(|_| format!("'{s}' is not a number"))?;
    if (1..=100).contains(&n) {
        Ok(n)
    } else {
        Err(format!("{n} is not in 1..=100"))
    }
}

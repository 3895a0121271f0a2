/// Parse a human readable size such as `10MB`, `2 KiB` or `512` into bytes.
///
/// Units are binary multiples of 1024 and case-insensitive. A fractional
/// number is truncated after scaling.
pub fn parse_size(raw: &str) -> Result<u64, String> {
    let raw = raw.trim();
    let split = raw
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(raw.len());
    let (number, unit) = raw.split_at(split);
    if number.is_empty() {
        return Err(format!("{:?} is not a size", raw));
    }
    let number: f64 = number
        .parse()
        .map_err(|_| format!("{:?} is not a size", raw))?;

    let multiplier: u64 = match unit.trim().to_ascii_uppercase().as_str() {
        "" | "B" => 1,
        "K" | "KB" | "KIB" => 1 << 10,
        "M" | "MB" | "MIB" => 1 << 20,
        "G" | "GB" | "GIB" => 1 << 30,
        "T" | "TB" | "TIB" => 1 << 40,
        other => return Err(format!("unknown size unit {:?}", other)),
    };

    Ok((number * multiplier as f64) as u64)
}

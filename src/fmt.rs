pub const CURRENCY: &str = "₹";

fn group_thousands(int_part: &str) -> String {
    let mut with_commas = String::new();
    for (i, c) in int_part.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            with_commas.push(',');
        }
        with_commas.push(c);
    }
    with_commas.chars().rev().collect()
}

/// Format a float as a rupee amount with thousands separators: ₹1,234.56
pub fn money(val: f64) -> String {
    let cents = format!("{:.2}", val.abs());
    let negative = val < 0.0 && cents != "0.00";
    let (int_part, dec_part) = cents.split_once('.').unwrap_or((cents.as_str(), "00"));
    let with_commas = group_thousands(int_part);

    if negative {
        format!("-{CURRENCY}{with_commas}.{dec_part}")
    } else {
        format!("{CURRENCY}{with_commas}.{dec_part}")
    }
}

/// Whole-number count with thousands separators.
pub fn number(n: usize) -> String {
    group_thousands(&n.to_string())
}

/// Compact axis label: ₹12k, ₹1.5M.
pub fn format_k(val: f64) -> String {
    if val >= 1_000_000.0 {
        let m = val / 1_000_000.0;
        if m == m.floor() {
            format!("{CURRENCY}{}M", m as u64)
        } else {
            format!("{CURRENCY}{:.1}M", m)
        }
    } else if val >= 1000.0 {
        let k = val / 1000.0;
        if k == k.floor() {
            format!("{CURRENCY}{}k", k as u64)
        } else {
            format!("{CURRENCY}{:.1}k", k)
        }
    } else {
        format!("{CURRENCY}{}", val as u64)
    }
}

pub fn percent(ratio: f64) -> String {
    format!("{:.1}%", ratio * 100.0)
}

/// Formats pounds with thousands separators and pence, e.g. `£1,234.50`.
pub fn format_gbp(amount: f64) -> String {
    let negative = amount < 0.0;
    let pence = (amount.abs() * 100.0).round() as u64;
    let pounds = (pence / 100).to_string();
    let mut grouped = String::with_capacity(pounds.len() + pounds.len() / 3);
    for (idx, ch) in pounds.chars().enumerate() {
        if idx > 0 && (pounds.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let sign = if negative { "-" } else { "" };
    format!("{sign}£{grouped}.{:02}", pence % 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_thousands() {
        assert_eq!(format_gbp(0.0), "£0.00");
        assert_eq!(format_gbp(999.999), "£1,000.00");
        assert_eq!(format_gbp(1234567.5), "£1,234,567.50");
        assert_eq!(format_gbp(-42.1), "-£42.10");
    }
}

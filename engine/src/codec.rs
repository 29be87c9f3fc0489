//! Cache entry layout.
//!
//! Key: `"{bank}_{currency}_{YYYY-MM-DD}"`, lowercase.
//! Value: `"{buy},{sell},{multiplier}"` as UTF-8. An absent value is written
//! as an empty field. Legacy entries may spell absence as `None` or omit the
//! multiplier; the multiplier is then re-derived from the date.

use bankrate_common::{constants, denomination_multiplier, CurrencyCode, Rate};
use chrono::NaiveDate;

/// Build the cache key for one quote.
pub fn cache_key(bank_short_name: &str, currency: &str, date: NaiveDate) -> String {
    format!(
        "{}_{}_{}",
        bank_short_name,
        currency,
        date.format(constants::CACHE_DATE_FORMAT)
    )
    .to_lowercase()
}

/// Serialize the cached part of a rate.
pub fn encode_rate(rate: &Rate) -> Vec<u8> {
    let field = |v: Option<f64>| v.map(|v| v.to_string()).unwrap_or_default();
    format!("{},{},{}", field(rate.buy()), field(rate.sell()), rate.multiplier()).into_bytes()
}

/// Rebuild a rate from a cache value; `None` when the value is unreadable.
pub fn decode_rate(
    bank_short_name: &str,
    currency: &CurrencyCode,
    date: NaiveDate,
    value: &[u8],
) -> Option<Rate> {
    let text = std::str::from_utf8(value).ok()?;
    let fields: Vec<&str> = text.trim().split(',').map(str::trim).collect();

    let (buy, sell, multiplier) = match fields.as_slice() {
        [buy, sell] => (*buy, *sell, None),
        [buy, sell, multiplier] => (*buy, *sell, Some(*multiplier)),
        _ => return None,
    };

    let buy = decode_amount(buy)?;
    let sell = decode_amount(sell)?;
    if buy.is_none() && sell.is_none() {
        return None;
    }

    let multiplier = match multiplier {
        Some(m) => m.parse::<u32>().ok().filter(|m| *m >= 1)?,
        None => denomination_multiplier(date),
    };

    Some(
        Rate::new(bank_short_name, currency, currency.as_str(), buy, sell)
            .with_multiplier(multiplier),
    )
}

fn decode_amount(field: &str) -> Option<Option<f64>> {
    if field.is_empty() || field == "None" {
        return Some(None);
    }
    field.parse::<f64>().ok().filter(|v| v.is_finite()).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_cache_key_layout() {
        assert_eq!(cache_key("BGP", "USD", date(2016, 7, 1)), "bgp_usd_2016-07-01");
    }

    #[test]
    fn test_rate_survives_cache_layout() {
        let rate = Rate::new("bgp", &CurrencyCode::usd(), "Доллар", Some(20150.5), Some(20350.0))
            .with_multiplier(10_000);
        let encoded = encode_rate(&rate);
        assert_eq!(encoded, b"20150.5,20350,10000".to_vec());

        let decoded = decode_rate("bgp", &CurrencyCode::usd(), date(2016, 1, 5), &encoded).unwrap();
        assert_eq!(decoded, rate);
        assert_eq!(decoded.bank_short_name(), "bgp");
    }

    #[test]
    fn test_absent_side_written_empty() {
        let rate = Rate::new("nbrb", &CurrencyCode::eur(), "EUR", None, Some(2.3456));
        assert_eq!(encode_rate(&rate), b",2.3456,1".to_vec());

        let decoded = decode_rate("nbrb", &CurrencyCode::eur(), date(2020, 1, 1), b",2.3456,1").unwrap();
        assert_eq!(decoded.buy(), None);
        assert_eq!(decoded.sell(), Some(2.3456));
    }

    #[test]
    fn test_legacy_values() {
        let legacy = decode_rate("bgp", &CurrencyCode::usd(), date(2016, 1, 5), b"None,20350.0").unwrap();
        assert_eq!(legacy.buy(), None);
        assert_eq!(legacy.multiplier(), 10_000);

        let legacy = decode_rate("bgp", &CurrencyCode::usd(), date(2017, 1, 5), b"1.9,2.0").unwrap();
        assert_eq!(legacy.multiplier(), 1);
    }

    #[test]
    fn test_unreadable_values() {
        let usd = CurrencyCode::usd();
        let day = date(2020, 1, 1);
        assert!(decode_rate("bgp", &usd, day, b"").is_none());
        assert!(decode_rate("bgp", &usd, day, b"abc,1,1").is_none());
        assert!(decode_rate("bgp", &usd, day, b"1,2,0").is_none());
        assert!(decode_rate("bgp", &usd, day, b",,1").is_none());
        assert!(decode_rate("bgp", &usd, day, &[0xff, 0xfe]).is_none());
    }
}

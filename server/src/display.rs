//! Display formatting helpers shared by the webhook forwarder and the
//! public donations feed.
//!
//! Everything here is pure string work: amount rendering, donor name
//! derivation, the donation sentence templates, and free-text sanitation.

/// Currencies whose minor unit is the whole unit (no cents division).
///
/// Matches Stripe's documented zero-decimal currency list.
const ZERO_DECIMAL_CURRENCIES: &[&str] = &[
    "BIF", "CLP", "DJF", "GNF", "JPY", "KMF", "KRW", "MGA", "PYG", "RWF",
    "UGX", "VND", "VUV", "XAF", "XOF", "XPF",
];

/// Maximum length of donor-supplied free text carried on a payload.
pub const NOTE_MAX_CHARS: usize = 140;

/// Format a minor-unit amount for display.
///
/// Zero-decimal currencies render whole units ("¥1,000"); everything else
/// divides by 100 and keeps two decimals ("$10.00"). Unknown currency codes
/// fall back to a "CODE " prefix.
pub fn format_amount(minor_units: i64, currency: &str) -> String {
    let code = currency.trim().to_uppercase();
    let symbol = currency_symbol(&code);

    if ZERO_DECIMAL_CURRENCIES.contains(&code.as_str()) {
        format!("{}{}", symbol, group_thousands(minor_units))
    } else {
        let whole = minor_units / 100;
        let cents = (minor_units % 100).abs();
        format!("{}{}.{:02}", symbol, group_thousands(whole), cents)
    }
}

/// Symbol (or "CODE " prefix) for a currency code.
fn currency_symbol(code: &str) -> String {
    match code {
        "USD" => "$".to_string(),
        "EUR" => "\u{20ac}".to_string(),
        "GBP" => "\u{a3}".to_string(),
        "JPY" => "\u{a5}".to_string(),
        _ => format!("{} ", code),
    }
}

/// Insert comma grouping into a whole number.
fn group_thousands(n: i64) -> String {
    let negative = n < 0;
    let digits = n.unsigned_abs().to_string();

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    if negative {
        format!("-{}", grouped)
    } else {
        grouped
    }
}

/// Derive a public-safe display name for a donor.
///
/// Prefers an explicit customer name, then the local part of the email
/// address, then a generic placeholder. Never exposes more than a first
/// name plus a last-initial.
pub fn derive_display_name(name: Option<&str>, email: Option<&str>) -> String {
    if let Some(name) = name {
        let tokens: Vec<&str> = name.split_whitespace().collect();
        if !tokens.is_empty() {
            return abbreviate(&tokens);
        }
    }

    if let Some(email) = email {
        let local = email.split('@').next().unwrap_or("");
        let tokens: Vec<String> = local
            .split(['.', '_', '-', '+'])
            .filter(|t| !t.is_empty())
            .map(title_case)
            .collect();
        if !tokens.is_empty() {
            let refs: Vec<&str> = tokens.iter().map(String::as_str).collect();
            return abbreviate(&refs);
        }
    }

    "Someone".to_string()
}

/// First token verbatim, plus the second token's initial if there is one.
fn abbreviate(tokens: &[&str]) -> String {
    let first = tokens[0];
    match tokens.get(1).and_then(|t| t.chars().next()) {
        Some(initial) => format!("{} {}.", first, initial.to_uppercase()),
        None => first.to_string(),
    }
}

/// Uppercase the first character, lowercase the rest.
fn title_case(token: &str) -> String {
    let mut chars = token.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        None => String::new(),
    }
}

/// Compose the public display sentence for a donation.
pub fn donation_sentence(name: &str, amount_display: &str, recurring: bool) -> String {
    if recurring {
        format!("{} became a Partner ({}/mo)", name, amount_display)
    } else {
        format!("{} just gave {}", name, amount_display)
    }
}

/// Strip control characters and cap donor-supplied free text.
pub fn sanitize_note(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control())
        .take(NOTE_MAX_CHARS)
        .collect()
}

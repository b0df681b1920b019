//! Display-only currency layer. PLN is always the amount of record; every
//! other currency is a presentation of it through a PLN -> target rate.

use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ToSchema)]
pub enum Currency {
    Pln,
    Eur,
    Usd,
    Gbp,
    Czk,
}

pub const SUPPORTED: [Currency; 5] = [
    Currency::Pln,
    Currency::Eur,
    Currency::Usd,
    Currency::Gbp,
    Currency::Czk,
];

/// How a currency is rendered: symbol placement, decimals and separators.
struct Style {
    symbol: &'static str,
    prefix: bool,
    decimals: u32,
    thousands_sep: char,
    decimal_sep: char,
}

impl Currency {
    pub fn from_code(code: &str) -> Option<Self> {
        match code.to_ascii_uppercase().as_str() {
            "PLN" => Some(Currency::Pln),
            "EUR" => Some(Currency::Eur),
            "USD" => Some(Currency::Usd),
            "GBP" => Some(Currency::Gbp),
            "CZK" => Some(Currency::Czk),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Currency::Pln => "PLN",
            Currency::Eur => "EUR",
            Currency::Usd => "USD",
            Currency::Gbp => "GBP",
            Currency::Czk => "CZK",
        }
    }

    /// Approximate PLN -> target rate used when no live quote is available.
    /// Deliberately never 1.0 for a non-PLN currency.
    pub fn fallback_rate(&self) -> f64 {
        match self {
            Currency::Pln => 1.0,
            Currency::Eur => 0.23,
            Currency::Usd => 0.25,
            Currency::Gbp => 0.20,
            Currency::Czk => 5.80,
        }
    }

    /// Initial currency for a detected country code. Unknown countries get
    /// the store default.
    pub fn for_country(country: &str) -> Self {
        match country.to_ascii_uppercase().as_str() {
            "PL" => Currency::Pln,
            "US" => Currency::Usd,
            "GB" => Currency::Gbp,
            "CZ" => Currency::Czk,
            "AT" | "BE" | "DE" | "ES" | "FI" | "FR" | "IE" | "IT" | "NL" | "PT" | "SI" | "SK" => {
                Currency::Eur
            }
            _ => Currency::Pln,
        }
    }

    fn style(&self) -> Style {
        match self {
            Currency::Pln => Style {
                symbol: "zł",
                prefix: false,
                decimals: 2,
                thousands_sep: ' ',
                decimal_sep: ',',
            },
            Currency::Eur => Style {
                symbol: "€",
                prefix: true,
                decimals: 2,
                thousands_sep: ',',
                decimal_sep: '.',
            },
            Currency::Usd => Style {
                symbol: "$",
                prefix: true,
                decimals: 2,
                thousands_sep: ',',
                decimal_sep: '.',
            },
            Currency::Gbp => Style {
                symbol: "£",
                prefix: true,
                decimals: 2,
                thousands_sep: ',',
                decimal_sep: '.',
            },
            Currency::Czk => Style {
                symbol: "Kč",
                prefix: false,
                decimals: 0,
                thousands_sep: ' ',
                decimal_sep: ',',
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    FetchFailed,
    BadPayload,
}

/// A PLN -> target quote tagged with its provenance, so callers can tell a
/// live provider rate from a static guess.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RateQuote {
    Live(f64),
    Fallback(f64, FallbackReason),
    Unknown,
}

impl RateQuote {
    /// The live rate, if any. Fallbacks and unknowns report `None` so API
    /// clients keep using their own static table.
    pub fn rate(&self) -> Option<f64> {
        match self {
            RateQuote::Live(rate) => Some(*rate),
            _ => None,
        }
    }

    /// Best available rate for rendering, degrading to the static table.
    pub fn display_rate(&self, currency: Currency) -> f64 {
        match self {
            RateQuote::Live(rate) | RateQuote::Fallback(rate, _) => *rate,
            RateQuote::Unknown => currency.fallback_rate(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    Uninitialized,
    DetectingCountry,
    Ready,
}

/// Per-session display context. Starts in PLN and only moves off it once a
/// country or an explicit choice arrives; never a process-wide singleton.
#[derive(Debug)]
pub struct CurrencyContext {
    state: ContextState,
    currency: Currency,
    quote: RateQuote,
}

impl Default for CurrencyContext {
    fn default() -> Self {
        Self::new()
    }
}

impl CurrencyContext {
    pub fn new() -> Self {
        Self {
            state: ContextState::Uninitialized,
            currency: Currency::Pln,
            quote: RateQuote::Live(1.0),
        }
    }

    pub fn state(&self) -> ContextState {
        self.state
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn begin_detection(&mut self) {
        if self.state == ContextState::Uninitialized {
            self.state = ContextState::DetectingCountry;
        }
    }

    /// Detection finished. `None` means the lookup failed; the context
    /// stays on the store default (Poland, PLN).
    pub fn country_detected(&mut self, country: Option<&str>) {
        let currency = country.map(Currency::for_country).unwrap_or(Currency::Pln);
        self.switch_to(currency);
    }

    /// Explicit user choice. Unknown codes are ignored, not an error.
    pub fn set_currency(&mut self, code: &str) {
        match Currency::from_code(code) {
            Some(currency) => self.switch_to(currency),
            None => tracing::warn!(code, "ignoring unknown currency code"),
        }
    }

    fn switch_to(&mut self, currency: Currency) {
        self.currency = currency;
        self.quote = if currency == Currency::Pln {
            RateQuote::Live(1.0)
        } else {
            RateQuote::Unknown
        };
        self.state = ContextState::Ready;
    }

    /// Install a fresh quote for the current currency.
    pub fn apply_quote(&mut self, quote: RateQuote) {
        if self.currency != Currency::Pln {
            self.quote = quote;
        }
    }

    /// PLN major-unit price -> display currency. Negative or non-finite
    /// input clamps to 0 rather than rendering garbage.
    pub fn convert_price(&self, price_pln: f64) -> f64 {
        if !price_pln.is_finite() || price_pln <= 0.0 {
            return 0.0;
        }
        price_pln * self.quote.display_rate(self.currency)
    }

    pub fn format_price(&self, price_pln: f64) -> String {
        format_amount(self.currency, self.convert_price(price_pln))
    }
}

/// Render a minor-unit amount already expressed in `currency`, as stored on
/// orders and order items.
pub fn format_minor(currency: Currency, minor: i64) -> String {
    format_amount(currency, minor as f64 / 100.0)
}

/// Render an amount already expressed in `currency`, per that currency's
/// decimals, separators and symbol placement.
pub fn format_amount(currency: Currency, value: f64) -> String {
    let style = currency.style();
    let value = if value.is_finite() { value.max(0.0) } else { 0.0 };
    let scale = 10_i64.pow(style.decimals);
    let scaled = (value * scale as f64).round() as i64;
    let integer = group_thousands(scaled / scale, style.thousands_sep);

    let number = if style.decimals == 0 {
        integer
    } else {
        format!(
            "{integer}{}{:0width$}",
            style.decimal_sep,
            scaled % scale,
            width = style.decimals as usize
        )
    };

    if style.prefix {
        format!("{}{number}", style.symbol)
    } else {
        format!("{number} {}", style.symbol)
    }
}

fn group_thousands(mut n: i64, sep: char) -> String {
    if n < 1000 {
        return n.to_string();
    }
    let mut groups = Vec::new();
    while n >= 1000 {
        groups.push(format!("{:03}", n % 1000));
        n /= 1000;
    }
    let mut out = n.to_string();
    for group in groups.iter().rev() {
        out.push(sep);
        out.push_str(group);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_rates_are_never_identity() {
        for currency in SUPPORTED {
            if currency != Currency::Pln {
                assert_ne!(currency.fallback_rate(), 1.0, "{}", currency.code());
            }
        }
    }

    #[test]
    fn formats_per_currency_conventions() {
        assert_eq!(format_amount(Currency::Pln, 1234.56), "1 234,56 zł");
        assert_eq!(format_amount(Currency::Usd, 1234.56), "$1,234.56");
        assert_eq!(format_amount(Currency::Eur, 0.5), "€0.50");
        assert_eq!(format_amount(Currency::Gbp, 99.99), "£99.99");
        // CZK renders without decimals, rounded.
        assert_eq!(format_amount(Currency::Czk, 1234.56), "1 235 Kč");
    }

    #[test]
    fn minor_units_format_as_major() {
        assert_eq!(format_minor(Currency::Pln, 123_456), "1 234,56 zł");
        assert_eq!(format_minor(Currency::Eur, 50), "€0.50");
    }

    #[test]
    fn new_context_defaults_to_pln() {
        let ctx = CurrencyContext::new();
        assert_eq!(ctx.state(), ContextState::Uninitialized);
        assert_eq!(ctx.currency(), Currency::Pln);
        assert_eq!(ctx.format_price(12.0), "12,00 zł");
    }

    #[test]
    fn failed_detection_falls_back_to_poland() {
        let mut ctx = CurrencyContext::new();
        ctx.begin_detection();
        assert_eq!(ctx.state(), ContextState::DetectingCountry);
        ctx.country_detected(None);
        assert_eq!(ctx.state(), ContextState::Ready);
        assert_eq!(ctx.currency(), Currency::Pln);
    }

    #[test]
    fn detection_picks_country_currency() {
        let mut ctx = CurrencyContext::new();
        ctx.begin_detection();
        ctx.country_detected(Some("DE"));
        assert_eq!(ctx.currency(), Currency::Eur);
        // No quote yet: converting uses the static fallback, not 1.0.
        assert_eq!(ctx.convert_price(100.0), 23.0);
        assert_eq!(ctx.format_price(100.0), "€23.00");
    }

    #[test]
    fn unknown_currency_code_is_a_noop() {
        let mut ctx = CurrencyContext::new();
        ctx.set_currency("XAU");
        assert_eq!(ctx.currency(), Currency::Pln);
        ctx.set_currency("usd");
        assert_eq!(ctx.currency(), Currency::Usd);
    }

    #[test]
    fn live_quote_wins_over_fallback() {
        let mut ctx = CurrencyContext::new();
        ctx.set_currency("EUR");
        ctx.apply_quote(RateQuote::Live(0.21));
        assert_eq!(ctx.convert_price(100.0), 21.0);
    }

    #[test]
    fn convert_clamps_bad_input() {
        let mut ctx = CurrencyContext::new();
        ctx.set_currency("EUR");
        assert_eq!(ctx.convert_price(-5.0), 0.0);
        assert_eq!(ctx.convert_price(f64::NAN), 0.0);
        assert_eq!(ctx.convert_price(f64::INFINITY), 0.0);
    }

    #[test]
    fn quote_provenance_is_visible() {
        let live = RateQuote::Live(0.22);
        let guessed = RateQuote::Fallback(0.23, FallbackReason::FetchFailed);
        assert_eq!(live.rate(), Some(0.22));
        assert_eq!(guessed.rate(), None);
        assert_eq!(RateQuote::Unknown.display_rate(Currency::Eur), 0.23);
    }
}

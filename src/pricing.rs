//! Discount and shipping aggregation over integer minor units (grosze).
//! Pure and synchronous: callers load authoritative prices first and feed
//! the result into the payment session.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

/// One cart line with the authoritative unit price from the products table.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CartLine {
    pub product_id: Uuid,
    /// PLN minor units, must be positive.
    pub unit_price_pln: i64,
    pub quantity: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discount {
    None,
    /// Whole percent of the products subtotal, clamped to 0..=100.
    Percent(i64),
    /// Flat amount in minor units, capped so at least 1 minor unit stays
    /// payable.
    Amount(i64),
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PricedLine {
    pub product_id: Uuid,
    pub quantity: i64,
    /// Unit price before the coupon, minor units.
    pub original_unit_amount: i64,
    /// Total charged for this line after the coupon, minor units. Line
    /// amounts always sum to `products_subtotal - discount_amount`.
    pub discounted_line_amount: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PricingOutcome {
    pub lines: Vec<PricedLine>,
    /// Σ unit_price × quantity before any discount.
    pub products_subtotal: i64,
    pub discount_amount: i64,
    /// Carried verbatim, never discounted.
    pub shipping_cost_pln: i64,
    /// products_subtotal − discount_amount + shipping_cost_pln; equals the
    /// sum of line amounts plus shipping.
    pub total_payable: i64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PricingError {
    #[error("cart is empty")]
    EmptyCart,

    #[error("unit price must be greater than 0")]
    NonPositivePrice,

    #[error("quantity must be greater than 0")]
    NonPositiveQuantity,

    #[error("shipping cost cannot be negative")]
    NegativeShipping,
}

/// `amount * num / den` rounded half-up, widened through i128 so large carts
/// cannot overflow. `den` must be positive.
fn mul_ratio(amount: i64, num: i64, den: i64) -> i64 {
    let scaled = amount as i128 * num as i128;
    ((scaled + den as i128 / 2) / den as i128) as i64
}

/// Price a cart: validate, subtotal, spread the discount over the lines,
/// then append shipping untouched.
///
/// The discounted amount is rounded at line level: each line gets the floor
/// of its exact proportional share, and the leftover minor units go to the
/// lines with the largest remainders. Every line stays within one minor
/// unit of its exact share and the sum is exact, so what the payment
/// session charges equals `total_payable`.
pub fn aggregate(
    lines: &[CartLine],
    discount: Discount,
    shipping_cost_pln: i64,
) -> Result<PricingOutcome, PricingError> {
    if lines.is_empty() {
        return Err(PricingError::EmptyCart);
    }
    if shipping_cost_pln < 0 {
        return Err(PricingError::NegativeShipping);
    }
    for line in lines {
        if line.unit_price_pln <= 0 {
            return Err(PricingError::NonPositivePrice);
        }
        if line.quantity <= 0 {
            return Err(PricingError::NonPositiveQuantity);
        }
    }

    let products_subtotal: i64 = lines
        .iter()
        .map(|l| l.unit_price_pln * l.quantity)
        .sum();

    let discount_amount = match discount {
        Discount::None => 0,
        Discount::Percent(p) => {
            let p = p.clamp(0, 100);
            mul_ratio(products_subtotal, p, 100)
        }
        // At least 1 minor unit must stay payable.
        Discount::Amount(a) => a.max(0).min(products_subtotal - 1),
    };
    let remaining = products_subtotal - discount_amount;

    // Largest-remainder allocation of `remaining` proportional to each
    // line's share of the subtotal.
    let den = products_subtotal as i128;
    let mut shares: Vec<(i64, i128)> = lines
        .iter()
        .map(|line| {
            let scaled = (line.unit_price_pln * line.quantity) as i128 * remaining as i128;
            ((scaled / den) as i64, scaled % den)
        })
        .collect();
    let mut shortfall = remaining - shares.iter().map(|(floor, _)| *floor).sum::<i64>();
    let mut order: Vec<usize> = (0..shares.len()).collect();
    order.sort_by(|&a, &b| shares[b].1.cmp(&shares[a].1));
    for &i in &order {
        if shortfall == 0 {
            break;
        }
        shares[i].0 += 1;
        shortfall -= 1;
    }

    let priced: Vec<PricedLine> = lines
        .iter()
        .zip(shares)
        .map(|(line, (amount, _))| PricedLine {
            product_id: line.product_id,
            quantity: line.quantity,
            original_unit_amount: line.unit_price_pln,
            discounted_line_amount: amount,
        })
        .collect();

    Ok(PricingOutcome {
        lines: priced,
        products_subtotal,
        discount_amount,
        shipping_cost_pln,
        total_payable: remaining + shipping_cost_pln,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(unit: i64, quantity: i64) -> CartLine {
        CartLine {
            product_id: Uuid::new_v4(),
            unit_price_pln: unit,
            quantity,
        }
    }

    #[test]
    fn no_discount_passes_amounts_through() {
        let outcome = aggregate(&[line(5_900, 2)], Discount::None, 1_500).unwrap();
        assert_eq!(outcome.products_subtotal, 11_800);
        assert_eq!(outcome.discount_amount, 0);
        assert_eq!(outcome.lines[0].discounted_line_amount, 11_800);
        assert_eq!(outcome.total_payable, 13_300);
    }

    #[test]
    fn ten_percent_off_two_hundred_pln() {
        // 2 × 100.00 zł, 10% off, 15.00 zł shipping.
        let outcome = aggregate(&[line(10_000, 2)], Discount::Percent(10), 1_500).unwrap();
        assert_eq!(outcome.discount_amount, 2_000);
        assert_eq!(outcome.lines[0].discounted_line_amount, 18_000);
        assert_eq!(outcome.total_payable, 19_500);
    }

    #[test]
    fn half_unit_share_never_overcharges() {
        // 10 × 9.90 zł at 5% leaves 94.05 zł. A per-unit rounding of
        // 94.05 / 10 would charge 94.10; the line amount must be exact.
        let outcome = aggregate(&[line(990, 10)], Discount::Percent(5), 0).unwrap();
        assert_eq!(outcome.discount_amount, 495);
        assert_eq!(outcome.lines[0].discounted_line_amount, 9_405);
        assert_eq!(outcome.total_payable, 9_405);
    }

    #[test]
    fn amount_discount_is_capped_below_subtotal() {
        // The coupon exceeds the cart; 1 minor unit stays payable.
        let outcome = aggregate(&[line(19_999, 1)], Discount::Amount(25_000), 0).unwrap();
        assert_eq!(outcome.discount_amount, 19_998);
        assert_eq!(outcome.lines[0].discounted_line_amount, 1);
        assert_eq!(outcome.total_payable, 1);
    }

    #[test]
    fn negative_amount_discount_clamps_to_zero() {
        let outcome = aggregate(&[line(5_000, 1)], Discount::Amount(-300), 0).unwrap();
        assert_eq!(outcome.discount_amount, 0);
        assert_eq!(outcome.total_payable, 5_000);
    }

    #[test]
    fn percent_is_clamped_to_hundred() {
        let outcome = aggregate(&[line(5_000, 1)], Discount::Percent(250), 0).unwrap();
        assert_eq!(outcome.discount_amount, 5_000);
        assert_eq!(outcome.lines[0].discounted_line_amount, 0);
        assert_eq!(outcome.total_payable, 0);
    }

    #[test]
    fn shipping_is_never_discounted() {
        let outcome = aggregate(&[line(10_000, 1)], Discount::Percent(50), 2_000).unwrap();
        assert_eq!(outcome.shipping_cost_pln, 2_000);
        assert_eq!(outcome.total_payable, 5_000 + 2_000);
    }

    #[test]
    fn allocation_is_exact_and_within_one_unit_per_line() {
        // Odd prices force fractional shares; the sum must still equal the
        // discounted subtotal and each line stay within one minor unit of
        // its exact proportional share.
        let lines = vec![line(3_333, 3), line(777, 5), line(101, 7)];
        let outcome = aggregate(&lines, Discount::Percent(17), 0).unwrap();
        let remaining = outcome.products_subtotal - outcome.discount_amount;

        let charged: i64 = outcome
            .lines
            .iter()
            .map(|l| l.discounted_line_amount)
            .sum();
        assert_eq!(charged, remaining);

        for priced in &outcome.lines {
            let line_subtotal = priced.original_unit_amount * priced.quantity;
            let exact_floor = (line_subtotal as i128 * remaining as i128
                / outcome.products_subtotal as i128) as i64;
            let drift = priced.discounted_line_amount - exact_floor;
            assert!((0..=1).contains(&drift), "drift {drift} for {line_subtotal}");
        }
    }

    #[test]
    fn empty_cart_is_rejected() {
        assert_eq!(
            aggregate(&[], Discount::None, 0).unwrap_err(),
            PricingError::EmptyCart
        );
    }

    #[test]
    fn invalid_lines_are_rejected() {
        assert_eq!(
            aggregate(&[line(0, 1)], Discount::None, 0).unwrap_err(),
            PricingError::NonPositivePrice
        );
        assert_eq!(
            aggregate(&[line(100, 0)], Discount::None, 0).unwrap_err(),
            PricingError::NonPositiveQuantity
        );
    }

    #[test]
    fn negative_shipping_is_rejected() {
        assert_eq!(
            aggregate(&[line(100, 1)], Discount::None, -1).unwrap_err(),
            PricingError::NegativeShipping
        );
    }
}

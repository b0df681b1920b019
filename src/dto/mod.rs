pub mod cart;
pub mod checkout;
pub mod coupons;
pub mod orders;
pub mod products;
pub mod rates;

pub mod booking;
pub mod catalog;
pub mod coupons;
pub mod loyalty;

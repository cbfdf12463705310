pub mod booking;
pub mod coupon;
pub mod loyalty;
pub mod service;

pub use booking::{Booking, BookingStatus, HistoryEntry, NewBooking};
pub use coupon::{Coupon, CouponKind, NewCoupon};
pub use loyalty::Loyalty;
pub use service::{NewService, NewUnit, Service, Unit};

//! Vendor revenue over placed orders.
//!
//! Revenue is the vendor's recorded subtotal (tax excluded) summed across
//! orders, read from each order's `total_data` slice.

use chrono::{DateTime, Datelike, TimeZone, Utc};

use crate::money::Money;
use crate::types::Order;

/// Σ of the vendor's subtotal across `orders`. Unpaid orders are skipped.
pub fn vendor_revenue<'a, I>(orders: I, vendor_id: &str) -> Money
where
    I: IntoIterator<Item = &'a Order>,
{
    orders
        .into_iter()
        .filter(|o| o.is_ordered)
        .map(|o| o.subtotal_for_vendor(vendor_id))
        .sum()
}

/// `[first day of this month 00:00, now]`.
pub fn current_month_window(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = Utc
        .with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(now);
    (start, now)
}

/// `[today 00:00, now]`.
pub fn current_day_window(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = Utc
        .with_ymd_and_hms(now.year(), now.month(), now.day(), 0, 0, 0)
        .single()
        .unwrap_or(now);
    (start, now)
}

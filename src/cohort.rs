//! Subscribed / unsubscribed cohorts and the dashboard headline numbers.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::Conversation;
use crate::renewal::{RenewalWindow, EXPIRING_SOON_DAYS};

/// Aggregate statistics over one conversation set.
///
/// Recomputed from scratch whenever the source collection changes. The
/// cohort lists borrow from that collection and keep its order.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct CohortStats<'a> {
    pub subscribed_count: usize,
    pub unsubscribed_count: usize,
    pub renewing_within_week_count: usize,
    pub conversion_rate_percent: f64,
    pub subscribed: Vec<&'a Conversation>,
    pub unsubscribed: Vec<&'a Conversation>,
}

impl<'a> CohortStats<'a> {
    pub fn compute(conversations: &'a [Conversation], now: DateTime<Utc>) -> Self {
        let (subscribed, unsubscribed): (Vec<&Conversation>, Vec<&Conversation>) =
            conversations.iter().partition(|c| c.is_subscribed());

        let renewing_within_week_count = subscribed
            .iter()
            .filter_map(|c| c.renewal_window(now))
            .filter(|w| w.days_remaining > 0 && w.days_remaining <= EXPIRING_SOON_DAYS)
            .count();

        Self {
            subscribed_count: subscribed.len(),
            unsubscribed_count: unsubscribed.len(),
            renewing_within_week_count,
            conversion_rate_percent: conversion_rate(subscribed.len(), conversations.len()),
            subscribed,
            unsubscribed,
        }
    }

    pub fn total_count(&self) -> usize {
        self.subscribed_count + self.unsubscribed_count
    }

    /// Subscribed conversations paired with their renewal window at `now`.
    pub fn renewal_windows(
        &self,
        now: DateTime<Utc>,
    ) -> impl Iterator<Item = (&'a Conversation, RenewalWindow)> + '_ {
        self.subscribed
            .iter()
            .filter_map(move |c| c.renewal_window(now).map(|w| (*c, w)))
    }
}

// Percentage rounded to one decimal; an empty set converts at 0%
fn conversion_rate(subscribed: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let percent = subscribed as f64 / total as f64 * 100.0;
    (percent * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap()
    }

    fn conversation(id: &str, started_days_ago: Option<i64>) -> Conversation {
        Conversation {
            id: id.to_string(),
            name: format!("Subscriber {}", id),
            subscription_start: started_days_ago.map(|days| now() - Duration::days(days)),
            messages: Vec::new(),
        }
    }

    #[test]
    fn empty_set_has_zero_conversion() {
        let stats = CohortStats::compute(&[], now());
        assert_eq!(stats.total_count(), 0);
        assert_eq!(stats.conversion_rate_percent, 0.0);
        assert_eq!(stats.renewing_within_week_count, 0);
    }

    #[test]
    fn partitions_and_preserves_order() {
        let conversations = vec![
            conversation("1", Some(3)),
            conversation("2", None),
            conversation("3", Some(10)),
            conversation("4", None),
            conversation("5", None),
        ];

        let stats = CohortStats::compute(&conversations, now());
        assert_eq!(stats.subscribed_count, 2);
        assert_eq!(stats.unsubscribed_count, 3);
        assert_eq!(stats.total_count(), conversations.len());

        let subscribed: Vec<&str> = stats.subscribed.iter().map(|c| c.id.as_str()).collect();
        let unsubscribed: Vec<&str> = stats.unsubscribed.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(subscribed, ["1", "3"]);
        assert_eq!(unsubscribed, ["2", "4", "5"]);
    }

    #[test]
    fn conversion_rate_rounds_to_one_decimal() {
        let conversations = vec![
            conversation("1", Some(1)),
            conversation("2", None),
            conversation("3", None),
        ];
        let stats = CohortStats::compute(&conversations, now());
        assert_eq!(stats.conversion_rate_percent, 33.3);

        let conversations = vec![conversation("1", Some(1)), conversation("2", Some(2))];
        let stats = CohortStats::compute(&conversations, now());
        assert_eq!(stats.conversion_rate_percent, 100.0);
    }

    #[test]
    fn renewing_within_week_excludes_expired_and_distant() {
        let conversations = vec![
            conversation("fresh", Some(0)),    // 30 days left
            conversation("soon", Some(25)),    // 5 days left
            conversation("edge", Some(23)),    // 7 days left
            conversation("today", Some(30)),   // 0 days left
            conversation("expired", Some(45)), // -15 days
            conversation("lead", None),
        ];

        let stats = CohortStats::compute(&conversations, now());
        assert_eq!(stats.renewing_within_week_count, 2);
        // Expired subscribers still count as subscribed
        assert_eq!(stats.subscribed_count, 5);
    }

    #[test]
    fn tolerates_conversations_without_messages() {
        let conversations = vec![conversation("1", Some(5)), conversation("2", None)];
        let stats = CohortStats::compute(&conversations, now());
        assert_eq!(stats.total_count(), 2);
        assert!(stats.subscribed[0].last_message().is_none());
    }

    #[test]
    fn recomputation_is_idempotent() {
        let conversations = vec![
            conversation("1", Some(26)),
            conversation("2", None),
            conversation("3", Some(2)),
        ];
        let first = CohortStats::compute(&conversations, now());
        let second = CohortStats::compute(&conversations, now());
        assert_eq!(first, second);
        assert_eq!(
            first.conversion_rate_percent.to_bits(),
            second.conversion_rate_percent.to_bits()
        );
    }

    #[test]
    fn renewal_windows_cover_only_subscribers() {
        let conversations = vec![conversation("1", Some(25)), conversation("2", None)];
        let stats = CohortStats::compute(&conversations, now());
        let windows: Vec<(String, i64)> = stats
            .renewal_windows(now())
            .map(|(c, w)| (c.id.clone(), w.days_remaining))
            .collect();
        assert_eq!(windows, vec![("1".to_string(), 5)]);
    }
}

//! Property-based tests for the shipment state machine and tracking dedup.

use proptest::prelude::*;

use fulfillment_api::models::shipment_event::{dedup_key, TrackingStatus};
use fulfillment_api::models::ShipmentStatus;

fn status_strategy() -> impl Strategy<Value = ShipmentStatus> {
    prop::sample::select(vec![
        ShipmentStatus::Pending,
        ShipmentStatus::CartAdded,
        ShipmentStatus::Purchased,
        ShipmentStatus::Generated,
        ShipmentStatus::Posted,
        ShipmentStatus::InTransit,
        ShipmentStatus::OutForDelivery,
        ShipmentStatus::Delivered,
        ShipmentStatus::Returned,
        ShipmentStatus::Cancelled,
    ])
}

fn tracking_status_strategy() -> impl Strategy<Value = TrackingStatus> {
    prop::sample::select(vec![
        TrackingStatus::Posted,
        TrackingStatus::InTransit,
        TrackingStatus::OutForDelivery,
        TrackingStatus::Delivered,
        TrackingStatus::Returned,
        TrackingStatus::Exception,
    ])
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(512))]

    #[test]
    fn transitions_never_move_rank_backwards(
        from in status_strategy(),
        to in status_strategy(),
    ) {
        if from.can_transition_to(to) {
            match to {
                ShipmentStatus::Cancelled => prop_assert!(from.is_pre_dispatch()),
                ShipmentStatus::Returned => prop_assert!(!from.is_pre_dispatch()),
                _ => {
                    let from_rank = from.rank().expect("non-cancelled source has a rank");
                    let to_rank = to.rank().expect("non-cancelled target has a rank");
                    prop_assert!(to_rank > from_rank);
                }
            }
        }
    }

    #[test]
    fn terminal_states_accept_no_transitions(
        from in status_strategy(),
        to in status_strategy(),
    ) {
        if from.is_terminal() {
            prop_assert!(!from.can_transition_to(to));
        }
    }

    #[test]
    fn no_transition_to_self(status in status_strategy()) {
        prop_assert!(!status.can_transition_to(status));
    }

    #[test]
    fn replaying_any_status_sequence_converges(
        reports in prop::collection::vec(tracking_status_strategy(), 1..20),
    ) {
        // Simulate what ingestion does with an arbitrary report stream:
        // adopt only transitions the machine allows. Whatever the order of
        // reports, the final status must never lose rank along the way.
        let mut current = ShipmentStatus::Generated;
        let mut highest = current.rank().unwrap();
        for report in reports {
            if let Some(target) = ShipmentStatus::from_tracking(report) {
                if current.can_transition_to(target) {
                    current = target;
                }
            }
            let rank = current.rank().expect("tracking never cancels");
            prop_assert!(rank >= highest);
            highest = rank;
        }
    }

    #[test]
    fn exception_reports_never_produce_a_shipment_status(_ in 0u8..1) {
        prop_assert!(ShipmentStatus::from_tracking(TrackingStatus::Exception).is_none());
    }

    #[test]
    fn dedup_key_prefers_code_and_ignores_whitespace(
        code in "[A-Z]{2,4}",
        description in "[a-zA-Z ]{1,40}",
        padding in "\\s{0,4}",
    ) {
        let padded_code = format!("{}{}{}", padding, code, padding);
        prop_assert_eq!(dedup_key(Some(&padded_code), &description), code.clone());

        // Blank code falls back to the description
        let trimmed = description.trim();
        prop_assume!(!trimmed.is_empty());
        prop_assert_eq!(dedup_key(Some("   "), &description), trimmed.to_string());
        prop_assert_eq!(dedup_key(None, &description), trimmed.to_string());
    }
}

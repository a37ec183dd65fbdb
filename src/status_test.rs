use super::*;

#[test]
fn forward_pipeline_walks_to_completed() {
    let mut status = OrderStatus::Pending;
    let mut seen = vec![status];
    while let Some(next) = status.next() {
        status = status.transition(next).unwrap();
        seen.push(status);
    }
    assert_eq!(
        seen,
        vec![OrderStatus::Pending, OrderStatus::Preparing, OrderStatus::Ready, OrderStatus::Completed]
    );
}

#[test]
fn cancel_allowed_from_every_non_terminal_status() {
    for status in [OrderStatus::Pending, OrderStatus::Preparing, OrderStatus::Ready] {
        assert_eq!(status.transition(OrderStatus::Cancelled), Ok(OrderStatus::Cancelled));
    }
}

#[test]
fn terminal_statuses_reject_every_target() {
    for from in [OrderStatus::Completed, OrderStatus::Cancelled] {
        assert!(from.is_terminal());
        assert!(from.next().is_none());
        for to in OrderStatus::ALL {
            assert!(!from.can_transition_to(to), "{from} -> {to} should be rejected");
        }
    }
}

#[test]
fn skipping_a_stage_is_rejected() {
    let err = OrderStatus::Pending
        .transition(OrderStatus::Ready)
        .unwrap_err();
    assert_eq!(err.from, OrderStatus::Pending);
    assert_eq!(err.to, OrderStatus::Ready);
    assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Completed));
    assert!(!OrderStatus::Preparing.can_transition_to(OrderStatus::Completed));
}

#[test]
fn self_transition_is_rejected() {
    for status in OrderStatus::ALL {
        assert!(!status.can_transition_to(status), "{status} -> {status} should be rejected");
    }
}

#[test]
fn moving_backwards_is_rejected() {
    assert!(!OrderStatus::Ready.can_transition_to(OrderStatus::Preparing));
    assert!(!OrderStatus::Preparing.can_transition_to(OrderStatus::Pending));
}

#[test]
fn from_str_accepts_both_cancel_spellings() {
    assert_eq!(OrderStatus::from_str("Cancelled"), Some(OrderStatus::Cancelled));
    assert_eq!(OrderStatus::from_str("canceled"), Some(OrderStatus::Cancelled));
    assert_eq!(OrderStatus::from_str(" READY "), Some(OrderStatus::Ready));
    assert_eq!(OrderStatus::from_str("served"), None);
}

#[test]
fn as_str_matches_serde_name() {
    for status in OrderStatus::ALL {
        let json = serde_json::to_value(status).unwrap();
        assert_eq!(json.as_str(), Some(status.as_str()));
        assert_eq!(OrderStatus::from_str(status.as_str()), Some(status));
    }
}

#[test]
fn transition_error_message_names_both_statuses() {
    let err = OrderStatus::Completed
        .transition(OrderStatus::Pending)
        .unwrap_err();
    assert_eq!(err.to_string(), "invalid status transition: completed -> pending");
}

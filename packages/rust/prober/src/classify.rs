//! Response classification.
//!
//! Status codes that say nothing about the account (429, 401/403/999, 5xx)
//! are handled before the platform's [`ExistencePredicate`] is consulted.

use dossier_registry::ExistencePredicate;

use crate::outcome::{InconclusiveReason, ProbeStatus};

/// LinkedIn's "request denied" status.
const STATUS_DENIED: u16 = 999;

/// Map a response to a probe status.
pub fn classify(predicate: &ExistencePredicate, status: u16, body: Option<&str>) -> ProbeStatus {
    if let Some(status) = classify_transport(status) {
        return status;
    }

    match predicate {
        ExistencePredicate::Status { found, not_found } => {
            if found.contains(&status) {
                ProbeStatus::Found
            } else if not_found.contains(&status) {
                ProbeStatus::NotFound
            } else {
                ProbeStatus::Inconclusive(InconclusiveReason::UnexpectedStatus)
            }
        }
        ExistencePredicate::BodyAbsent { marker } => match (status, body) {
            (404 | 410, _) => ProbeStatus::NotFound,
            (200..=299, Some(body)) if body.contains(marker.as_str()) => ProbeStatus::NotFound,
            (200..=299, Some(_)) => ProbeStatus::Found,
            (200..=299, None) => ProbeStatus::Inconclusive(InconclusiveReason::Unparseable),
            _ => ProbeStatus::Inconclusive(InconclusiveReason::UnexpectedStatus),
        },
        ExistencePredicate::JsonField { pointer, expect } => match (status, body) {
            (404 | 410, _) => ProbeStatus::NotFound,
            (200..=299, Some(body)) => classify_json(body, pointer, expect.as_ref()),
            (200..=299, None) => ProbeStatus::Inconclusive(InconclusiveReason::Unparseable),
            _ => ProbeStatus::Inconclusive(InconclusiveReason::UnexpectedStatus),
        },
    }
}

/// Statuses that are never an answer about the account.
fn classify_transport(status: u16) -> Option<ProbeStatus> {
    match status {
        429 => Some(ProbeStatus::Inconclusive(InconclusiveReason::RateLimited)),
        401 | 403 | STATUS_DENIED => Some(ProbeStatus::Inconclusive(InconclusiveReason::Blocked)),
        500..=599 => Some(ProbeStatus::Inconclusive(InconclusiveReason::ServerError)),
        _ => None,
    }
}

fn classify_json(body: &str, pointer: &str, expect: Option<&serde_json::Value>) -> ProbeStatus {
    let Ok(doc) = serde_json::from_str::<serde_json::Value>(body) else {
        return ProbeStatus::Inconclusive(InconclusiveReason::Unparseable);
    };
    match (doc.pointer(pointer), expect) {
        (None | Some(serde_json::Value::Null), _) => ProbeStatus::NotFound,
        (Some(actual), Some(expected)) if actual != expected => ProbeStatus::NotFound,
        _ => ProbeStatus::Found,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn status_predicate() -> ExistencePredicate {
        ExistencePredicate::Status {
            found: vec![200],
            not_found: vec![404, 410],
        }
    }

    #[test]
    fn status_predicate_codes() {
        let p = status_predicate();
        assert_eq!(classify(&p, 200, None), ProbeStatus::Found);
        assert_eq!(classify(&p, 404, None), ProbeStatus::NotFound);
        assert_eq!(classify(&p, 410, None), ProbeStatus::NotFound);
        assert_eq!(
            classify(&p, 302, None),
            ProbeStatus::Inconclusive(InconclusiveReason::UnexpectedStatus)
        );
    }

    #[test]
    fn transport_statuses_override_predicate() {
        let p = ExistencePredicate::Status {
            found: vec![200, 403, 429, 503],
            not_found: vec![404],
        };
        assert_eq!(
            classify(&p, 429, None),
            ProbeStatus::Inconclusive(InconclusiveReason::RateLimited)
        );
        for code in [401, 403, 999] {
            assert_eq!(
                classify(&p, code, None),
                ProbeStatus::Inconclusive(InconclusiveReason::Blocked)
            );
        }
        assert_eq!(
            classify(&p, 503, None),
            ProbeStatus::Inconclusive(InconclusiveReason::ServerError)
        );
    }

    #[test]
    fn body_absent_marker() {
        let p = ExistencePredicate::BodyAbsent {
            marker: "Page Not Found".into(),
        };
        assert_eq!(classify(&p, 200, Some("<h1>jsmith</h1>")), ProbeStatus::Found);
        assert_eq!(
            classify(&p, 200, Some("<title>Page Not Found</title>")),
            ProbeStatus::NotFound
        );
        assert_eq!(classify(&p, 404, None), ProbeStatus::NotFound);
    }

    #[test]
    fn json_field_pointer() {
        let p = ExistencePredicate::JsonField {
            pointer: "/data/name".into(),
            expect: None,
        };
        assert_eq!(
            classify(&p, 200, Some(r#"{"data":{"name":"jsmith"}}"#)),
            ProbeStatus::Found
        );
        assert_eq!(classify(&p, 200, Some(r#"{"data":{}}"#)), ProbeStatus::NotFound);
        assert_eq!(
            classify(&p, 200, Some(r#"{"data":{"name":null}}"#)),
            ProbeStatus::NotFound
        );
        assert_eq!(
            classify(&p, 200, Some("<html>")),
            ProbeStatus::Inconclusive(InconclusiveReason::Unparseable)
        );
    }

    #[test]
    fn json_field_expected_value() {
        let p = ExistencePredicate::JsonField {
            pointer: "/exists".into(),
            expect: Some(json!(true)),
        };
        assert_eq!(classify(&p, 200, Some(r#"{"exists":true}"#)), ProbeStatus::Found);
        assert_eq!(classify(&p, 200, Some(r#"{"exists":false}"#)), ProbeStatus::NotFound);
    }

    #[test]
    fn empty_result_array_is_not_found() {
        let p = ExistencePredicate::JsonField {
            pointer: "/users/0/id".into(),
            expect: None,
        };
        assert_eq!(classify(&p, 200, Some(r#"{"users":[]}"#)), ProbeStatus::NotFound);
        assert_eq!(
            classify(&p, 200, Some(r#"{"users":[{"id":42}]}"#)),
            ProbeStatus::Found
        );
    }
}

// services/rule_engine.rs
use fancy_regex::Regex;

use crate::models::c2b_payload::C2bResponse;
use crate::models::{C2bPayload, ValidationRule};

pub const BELOW_MINIMUM: &str = "Rejected: amount below minimum";
pub const ABOVE_MAXIMUM: &str = "Rejected: amount above maximum";
pub const BILLREF_REQUIRED: &str = "Rejected: BillRefNumber required";
pub const BILLREF_FORMAT: &str = "Rejected: BillRefNumber format invalid";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub accepted: bool,
    pub message: String,
}

impl Verdict {
    fn accept() -> Self {
        Verdict {
            accepted: true,
            message: C2bResponse::ACCEPTED.to_string(),
        }
    }

    fn reject(message: &str) -> Self {
        Verdict {
            accepted: false,
            message: message.to_string(),
        }
    }
}

/// Outcome of matching a reference against the configured pattern.
#[derive(Debug, PartialEq, Eq)]
pub enum PatternCheck {
    Matches,
    DoesNotMatch,
    /// The stored pattern does not compile, or gave up while matching.
    /// Payments are let through rather than blocked by an operator typo.
    InvalidPattern,
}

/// Matches from the start of `reference`, not necessarily to its end.
///
/// The pattern must compile on its own before it is anchored, otherwise an
/// unbalanced `)` would close the anchoring group and leave later branches
/// free to match anywhere.
pub fn check_reference(pattern: &str, reference: &str) -> PatternCheck {
    if Regex::new(pattern).is_err() {
        return PatternCheck::InvalidPattern;
    }

    let anchored = match Regex::new(&format!(r"\A(?:{})", pattern)) {
        Ok(re) => re,
        Err(_) => return PatternCheck::InvalidPattern,
    };

    match anchored.is_match(reference) {
        Ok(true) => PatternCheck::Matches,
        Ok(false) => PatternCheck::DoesNotMatch,
        Err(_) => PatternCheck::InvalidPattern,
    }
}

/// Applies a merchant's acceptance rule to a validation callback.
///
/// Checks run in a fixed order and the first failure wins: minimum amount,
/// maximum amount, reference presence, reference format. Amount checks are
/// skipped when the amount is missing or unparseable.
pub fn evaluate(rule: Option<&ValidationRule>, payload: &C2bPayload) -> Verdict {
    let Some(rule) = rule else {
        return Verdict::accept();
    };

    if let Some(amount) = payload.amount() {
        if rule.min_amount.is_some_and(|min| amount < min) {
            return Verdict::reject(BELOW_MINIMUM);
        }
        if rule.max_amount.is_some_and(|max| amount > max) {
            return Verdict::reject(ABOVE_MAXIMUM);
        }
    }

    let reference = payload.reference();
    if rule.require_billref && reference.is_none() {
        return Verdict::reject(BILLREF_REQUIRED);
    }

    if let (Some(pattern), Some(reference)) = (rule.billref_regex.as_deref(), reference) {
        if pattern.is_empty() {
            return Verdict::accept();
        }
        match check_reference(pattern, reference) {
            PatternCheck::Matches => {}
            PatternCheck::DoesNotMatch => return Verdict::reject(BILLREF_FORMAT),
            PatternCheck::InvalidPattern => {
                tracing::warn!(
                    merchant_id = %rule.merchant_id,
                    "BillRefNumber pattern does not compile; accepting"
                );
                return Verdict::accept();
            }
        }
    }

    Verdict::accept()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::oid::ObjectId;
    use rust_decimal::Decimal;

    fn rule() -> ValidationRule {
        ValidationRule::new(ObjectId::new())
    }

    fn bounded(min: i64, max: i64) -> ValidationRule {
        ValidationRule {
            min_amount: Some(Decimal::from(min)),
            max_amount: Some(Decimal::from(max)),
            ..rule()
        }
    }

    fn payload(body: &str) -> C2bPayload {
        C2bPayload::parse(body.as_bytes()).unwrap()
    }

    #[test]
    fn no_rule_accepts_anything() {
        for body in [r#"{}"#, r#"{"TransAmount":"-5"}"#, r#"{"BillRefNumber":""}"#] {
            let verdict = evaluate(None, &payload(body));
            assert_eq!(verdict, Verdict::accept());
            assert_eq!(verdict.message, "Accepted");
        }
    }

    #[test]
    fn amount_bounds_are_inclusive() {
        let rule = bounded(100, 1000);
        let check = |amount: &str| evaluate(Some(&rule), &payload(&format!(r#"{{"TransAmount":"{}"}}"#, amount)));

        assert_eq!(check("50").message, BELOW_MINIMUM);
        assert!(!check("50").accepted);
        assert!(check("100").accepted);
        assert!(check("1000").accepted);
        assert!(check("1000.00").accepted);
        assert_eq!(check("1001").message, ABOVE_MAXIMUM);
        assert!(!check("1000.01").accepted);
    }

    #[test]
    fn unparseable_amount_skips_bounds() {
        let rule = bounded(100, 1000);
        assert!(evaluate(Some(&rule), &payload(r#"{"TransAmount":"lots"}"#)).accepted);
        assert!(evaluate(Some(&rule), &payload(r#"{}"#)).accepted);
    }

    #[test]
    fn required_reference() {
        let rule = ValidationRule {
            require_billref: true,
            ..rule()
        };
        let empty = evaluate(Some(&rule), &payload(r#"{"BillRefNumber":""}"#));
        assert_eq!(empty.message, BILLREF_REQUIRED);
        assert!(!evaluate(Some(&rule), &payload(r#"{}"#)).accepted);
        assert!(evaluate(Some(&rule), &payload(r#"{"BillRefNumber":"INV-1"}"#)).accepted);
    }

    #[test]
    fn amount_checks_come_before_reference_checks() {
        let rule = ValidationRule {
            require_billref: true,
            ..bounded(100, 1000)
        };
        let verdict = evaluate(Some(&rule), &payload(r#"{"TransAmount":"5"}"#));
        assert_eq!(verdict.message, BELOW_MINIMUM);
    }

    #[test]
    fn pattern_matches_from_the_start() {
        let rule = ValidationRule {
            billref_regex: Some(r"INV-\d+".into()),
            ..rule()
        };
        assert!(evaluate(Some(&rule), &payload(r#"{"BillRefNumber":"INV-42"}"#)).accepted);
        assert!(evaluate(Some(&rule), &payload(r#"{"BillRefNumber":"INV-42-extra"}"#)).accepted);
        let verdict = evaluate(Some(&rule), &payload(r#"{"BillRefNumber":"X-INV-42"}"#));
        assert_eq!(verdict.message, BILLREF_FORMAT);
    }

    #[test]
    fn pattern_is_ignored_without_reference() {
        let rule = ValidationRule {
            billref_regex: Some(r"INV-\d+".into()),
            ..rule()
        };
        assert!(evaluate(Some(&rule), &payload(r#"{}"#)).accepted);
    }

    #[test]
    fn unbalanced_pattern_cannot_escape_the_anchor() {
        assert_eq!(check_reference("a)|(b", "zzb"), PatternCheck::InvalidPattern);
        assert_eq!(check_reference("a)|(b", "a"), PatternCheck::InvalidPattern);

        let rule = ValidationRule {
            billref_regex: Some("a)|(b".into()),
            ..rule()
        };
        let verdict = evaluate(Some(&rule), &payload(r#"{"BillRefNumber":"zzz"}"#));
        assert_eq!(verdict, Verdict::accept());
    }

    #[test]
    fn alternation_is_anchored_as_a_whole() {
        assert_eq!(check_reference("INV|ACC", "ACC-1"), PatternCheck::Matches);
        assert_eq!(check_reference("INV|ACC", "X-ACC"), PatternCheck::DoesNotMatch);
    }

    #[test]
    fn lookarounds_and_backreferences_are_enforced() {
        assert_eq!(check_reference("(?=INV)", "INV-1"), PatternCheck::Matches);
        assert_eq!(check_reference("(?=INV)", "XXX"), PatternCheck::DoesNotMatch);
        assert_eq!(check_reference(r"(\d)\1", "11-A"), PatternCheck::Matches);
        assert_eq!(check_reference(r"(\d)\1", "12-A"), PatternCheck::DoesNotMatch);

        let rule = ValidationRule {
            billref_regex: Some("(?!TEST)".into()),
            ..rule()
        };
        let verdict = evaluate(Some(&rule), &payload(r#"{"BillRefNumber":"TEST-9"}"#));
        assert_eq!(verdict.message, BILLREF_FORMAT);
        assert!(evaluate(Some(&rule), &payload(r#"{"BillRefNumber":"LIVE-9"}"#)).accepted);
    }

    #[test]
    fn invalid_pattern_fails_open() {
        let rule = ValidationRule {
            billref_regex: Some("([unclosed".into()),
            ..rule()
        };
        assert_eq!(check_reference("([unclosed", "anything"), PatternCheck::InvalidPattern);
        for reference in ["anything", "INV-1", "  "] {
            let body = format!(r#"{{"BillRefNumber":"{}"}}"#, reference);
            assert!(evaluate(Some(&rule), &payload(&body)).accepted);
        }
    }
}

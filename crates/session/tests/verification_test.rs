
use fake::{
    faker::{internet::en::SafeEmail, name::en::Name},
    Fake,
};
use pretty_assertions::assert_eq;
use rstest::rstest;
use test_utils::{backend_after_verify, session_with, session_with_sender, ADDRESS, CODE, NAME};
use visitbook_backend::mock::{MockBackend, MockCodeDelivery};
use visitbook_core::{errors::BookingError, models::slot::SlotsPayload};
use visitbook_session::{CodeIssue, SessionPhase, VerificationPhase};

fn sender_expecting(calls: usize) -> MockCodeDelivery {
    let mut sender = MockCodeDelivery::new();
    sender
        .expect_send_code()
        .withf(|address: &str, code: &str| address == ADDRESS && code == CODE)
        .times(calls)
        .returning(|_, _| Ok(()));
    sender
}

#[test_log::test(tokio::test)]
async fn test_code_is_delivered_once_per_countdown() {
    let mut session = session_with_sender(MockBackend::new(), sender_expecting(1));

    let first = session.request_code(NAME, ADDRESS).await.unwrap();
    assert_eq!(
        first,
        CodeIssue::Issued {
            address: ADDRESS.to_string(),
            code: CODE.to_string()
        }
    );
    assert_eq!(
        session.status(),
        Some("A verification code has been sent to a@x.com. If not received, check spam folder.")
    );

    session.tick();
    let second = session.request_code(NAME, ADDRESS).await.unwrap();
    assert_eq!(second, CodeIssue::Throttled { remaining_secs: 179 });
    assert_eq!(session.phase(), SessionPhase::Verifying);
}

#[test_log::test(tokio::test)]
async fn test_code_can_be_reissued_after_countdown() {
    let mut session = session_with_sender(MockBackend::new(), sender_expecting(2));

    session.request_code(NAME, ADDRESS).await.unwrap();
    while session.verification().countdown_running() {
        session.tick();
    }
    assert_eq!(session.verification().remaining_secs(), 0);

    let issue = session.request_code(NAME, ADDRESS).await.unwrap();
    assert!(matches!(issue, CodeIssue::Issued { .. }));
    assert_eq!(session.verification().remaining_secs(), 180);
}

#[test_log::test(tokio::test)]
async fn test_failed_delivery_still_issues_code() {
    let mut sender = MockCodeDelivery::new();
    sender
        .expect_send_code()
        .times(1)
        .returning(|_, _| Err(eyre::eyre!("mail relay down")));
    let mut session = session_with_sender(MockBackend::new(), sender);

    let issue = session.request_code(NAME, ADDRESS).await.unwrap();

    assert!(matches!(issue, CodeIssue::Issued { .. }));
    assert_eq!(session.verification().phase(), VerificationPhase::CodeIssued);
}

#[rstest]
#[case("", ADDRESS)]
#[case(NAME, "")]
#[case("   ", "  ")]
#[tokio::test]
async fn test_code_requires_name_and_address(#[case] name: &str, #[case] address: &str) {
    let mut sender = MockCodeDelivery::new();
    sender.expect_send_code().never();
    let mut session = session_with_sender(MockBackend::new(), sender);

    let err = session.request_code(name, address).await.unwrap_err();

    assert_eq!(err, BookingError::validation("Name and Email required."));
    assert_eq!(session.status(), Some("Validation error: Name and Email required."));
    assert_eq!(session.phase(), SessionPhase::Unverified);
}

#[test_log::test(tokio::test)]
async fn test_wrong_code_leaves_session_unverified() {
    let mut session = session_with(MockBackend::new());
    session.request_code(NAME, ADDRESS).await.unwrap();

    let err = session.verify("000000").await.unwrap_err();

    assert_eq!(err, BookingError::InvalidCode);
    assert_eq!(session.status(), Some("Invalid verification code"));
    assert_eq!(session.phase(), SessionPhase::Verifying);
    assert!(!session.verification().is_verified());
}

#[test_log::test(tokio::test)]
async fn test_verification_happens_exactly_once() {
    let mut session = session_with(MockBackend::new());
    session.request_code(NAME, ADDRESS).await.unwrap();

    assert_eq!(session.verify_code(CODE), Ok(true));
    assert_eq!(session.status(), Some("Email verified."));
    assert_eq!(session.verify_code(CODE), Ok(false));
    assert_eq!(session.phase(), SessionPhase::Browsing);

    let issue = session.request_code(NAME, ADDRESS).await.unwrap();
    assert_eq!(issue, CodeIssue::AlreadyVerified);
}

#[test_log::test(tokio::test)]
async fn test_address_change_resets_verification() {
    let mut session = session_with(backend_after_verify(SlotsPayload::default(), Default::default()));
    test_utils::verify(&mut session).await;
    assert!(session.verification().is_verified());

    let other: String = SafeEmail().fake();
    let name: String = Name().fake();
    session.set_identity(&name, &other);

    assert_eq!(session.phase(), SessionPhase::Unverified);
    assert_eq!(session.verification().address(), other);
    assert_eq!(session.verification().display_name(), name);
    assert_eq!(session.verification().remaining_secs(), 0);
    assert!(session.verification().state().code_expiry.is_none());
}

#[test_log::test(tokio::test)]
async fn test_same_address_keeps_verification() {
    let mut session = session_with(backend_after_verify(SlotsPayload::default(), Default::default()));
    test_utils::verify(&mut session).await;

    session.set_identity("Ada King", &format!("  {}  ", ADDRESS));

    assert!(session.verification().is_verified());
    assert_eq!(session.verification().display_name(), "Ada King");
}

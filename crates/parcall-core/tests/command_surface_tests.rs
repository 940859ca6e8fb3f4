//! Operator commands executed against a running service

use std::sync::Arc;

use rvoip_parcall_core::commands::run_line;
use rvoip_parcall_core::testing::RecordingCallControl;
use rvoip_parcall_core::{
    MediaDirection, ParCallConfig, ParCallError, ParallelCallHandle, ParallelCallService,
};

fn start_with(config: ParCallConfig) -> (ParallelCallHandle, Arc<RecordingCallControl>) {
    let control = Arc::new(RecordingCallControl::new());
    let identities = Arc::new(config.account_table().unwrap());
    let parcall = ParallelCallService::start(config, control.clone(), identities).unwrap();
    (parcall, control)
}

fn start() -> (ParallelCallHandle, Arc<RecordingCallControl>) {
    start_with(
        ParCallConfig::new()
            .with_account("sip:alice@example.com")
            .with_account("sip:ops@pbx.local:5080"),
    )
}

#[tokio::test]
async fn test_group_lifecycle_messages() {
    let (parcall, _control) = start();

    let outcome = run_line(&parcall, "/mkpar sales").await;
    assert!(outcome.success);

    let outcome = run_line(&parcall, "/mkpar sales").await;
    assert!(!outcome.success);
    assert_eq!(outcome.message, "mkpar: call group sales already exists");

    let outcome = run_line(&parcall, "/rmpar support").await;
    assert_eq!(outcome.message, "rmpar: call group support does not exist");

    let outcome = run_line(&parcall, "/mkpar").await;
    assert!(!outcome.success);
    assert_eq!(outcome.message, "usage: /mkpar <name>");

    let outcome = run_line(&parcall, "clrpar").await;
    assert!(outcome.success);
    assert_eq!(outcome.message, "parcall: cleared parallel call groups");
}

#[tokio::test]
async fn test_paradd_completes_targets() {
    let (parcall, _control) = start();
    run_line(&parcall, "mkpar G").await;

    let outcome = run_line(&parcall, "paradd G bob").await;
    assert!(outcome.success, "{}", outcome);
    let outcome = run_line(&parcall, "paradd G sip:carol@pbx.local").await;
    assert!(outcome.success, "{}", outcome);
    let outcome = run_line(&parcall, "paradd G dave").await;
    assert!(outcome.success, "{}", outcome);
    let outcome = run_line(&parcall, "/paradd G Erin Doe <sip:erin@example.com>").await;
    assert!(outcome.success, "{}", outcome);

    let outcome = run_line(&parcall, "paradd G sip:bob@example.com").await;
    assert!(!outcome.success);
    assert_eq!(outcome.message, "paradd: sip:bob@example.com already a target of G");

    let outcome = run_line(&parcall, "paradd nope bob").await;
    assert_eq!(outcome.message, "paradd: call group nope does not exist");

    let outcome = run_line(&parcall, "paradd G xmpp:bob@example.com").await;
    assert_eq!(outcome.message, "paradd: could not find UA for xmpp:bob@example.com");

    let dump = parcall.debug_dump().await.unwrap();
    assert_eq!(
        dump.groups[0].peers,
        vec![
            "sip:bob@example.com".to_string(),
            "sip:carol@pbx.local".to_string(),
            "sip:dave@example.com".to_string(),
            "\"Erin Doe\" <sip:erin@example.com>".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_paradd_rejects_malformed_targets() {
    let (parcall, _control) = start();
    parcall.create_group("G").await.unwrap();

    for target in ["sip:", "bob:5070", "sip:bob:5070", "sip:bob@"] {
        let err = parcall.add_peer("G", target, None).await.unwrap_err();
        assert!(matches!(err, ParCallError::InvalidTarget { .. }), "{}: {:?}", target, err);
    }

    let outcome = run_line(&parcall, "paradd G sip:").await;
    assert!(!outcome.success);
    assert!(outcome.message.starts_with("paradd: invalid target sip:"), "{}", outcome);

    // An all-digit user is an extension at the account's domain
    assert_eq!(
        parcall.add_peer("G", "sip:5060", None).await.unwrap(),
        "sip:5060@example.com"
    );
    let dump = parcall.debug_dump().await.unwrap();
    assert_eq!(dump.groups[0].peers, vec!["sip:5060@example.com".to_string()]);
}

#[tokio::test]
async fn test_parcall_directions_and_defaults() {
    let (parcall, control) = start_with(
        ParCallConfig::new()
            .with_account("sip:alice@example.com")
            .with_media_defaults(MediaDirection::SendRecv, MediaDirection::Inactive),
    );
    run_line(&parcall, "mkpar G").await;
    run_line(&parcall, "paradd G bob").await;

    let outcome = run_line(&parcall, "parcall G").await;
    assert!(outcome.success);
    assert!(outcome
        .message
        .starts_with("parallel call uri: sip:bob@example.com id: call-1 audio=sendrecv video=inactive"));

    run_line(&parcall, "parcall G recvonly").await;
    run_line(&parcall, "parcall G video=sendonly").await;

    let placed = control.placed();
    assert_eq!(placed.len(), 3);
    assert_eq!(
        (placed[1].audio, placed[1].video),
        (MediaDirection::RecvOnly, MediaDirection::RecvOnly)
    );
    assert_eq!(
        (placed[2].audio, placed[2].video),
        (MediaDirection::SendRecv, MediaDirection::SendOnly)
    );

    let outcome = run_line(&parcall, "parcall G audio=inactive video=inactive").await;
    assert!(!outcome.success);
    assert!(outcome.message.starts_with("usage: /parcall <name>"));
    assert_eq!(control.placed().len(), 3);

    let outcome = run_line(&parcall, "parcall G loudly").await;
    assert!(!outcome.success);

    let outcome = run_line(&parcall, "parcall nope").await;
    assert_eq!(outcome.message, "parcall: call group nope does not exist");
}

#[tokio::test]
async fn test_parhangup_and_pardebug() {
    let (parcall, control) = start();
    run_line(&parcall, "mkpar G").await;
    run_line(&parcall, "paradd G bob").await;
    run_line(&parcall, "paradd G carol").await;
    run_line(&parcall, "parcall G").await;

    let outcome = run_line(&parcall, "pardebug").await;
    assert!(outcome.success);
    assert_eq!(
        outcome.message,
        "Parallel call groups\n\
         Group: G\n  peer: sip:bob@example.com\n  peer: sip:carol@example.com\n\n\
         Active calls\n  call-1 group G peer sip:bob@example.com\n  call-2 group G peer sip:carol@example.com\n\n"
    );

    let outcome = run_line(&parcall, "parhangup G").await;
    assert!(outcome.success);
    assert_eq!(outcome.message, "parhangup: hung up 2 call(s) of G");
    assert_eq!(control.hangups().len(), 2);

    let outcome = run_line(&parcall, "parhangup").await;
    assert_eq!(outcome.message, "usage: /parhangup <name>");
}

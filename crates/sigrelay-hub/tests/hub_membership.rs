//! Authentication, membership commands and connection teardown.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

mod support;

use std::sync::{Arc, Mutex};

use serde_json::{json, Value};

use sigrelay_core::protocol::{Address, MessageType};
use sigrelay_core::RelayError;
use sigrelay_hub::config::{CommandDefault, HubSection};
use sigrelay_hub::{ConnState, Hub};
use support::*;

#[test]
fn auth_failures() {
    let hub = hub();
    let mut anon = connect(&hub);

    let (answer, _) = anon.roundtrip(&hub, auth_envelope("A", "wrong"));
    assert_eq!(error_code(&answer), "AUTH_FAILED");
    let (answer, _) = anon.roundtrip(&hub, auth_envelope("Z", TOKEN));
    assert_eq!(error_code(&answer), "AUTH_FAILED");
    assert_eq!(hub.connection_state(anon.conn), Some(ConnState::Unauthenticated));

    let mut a = login(&hub, "A");
    assert!(hub.is_authenticated(a.conn));
    assert_eq!(hub.user_of(a.conn).as_deref(), Some("A"));

    // id already bound elsewhere
    let (answer, _) = anon.roundtrip(&hub, auth_envelope("A", TOKEN));
    assert_eq!(error_code(&answer), "AUTH_FAILED");

    // connection already authenticated
    let (answer, _) = a.roundtrip(&hub, auth_envelope("B", TOKEN));
    assert_eq!(error_code(&answer), "INVALID");
    assert_eq!(hub.users(), ["A"]);
}

#[test]
fn auth_without_a_policy_is_refused() {
    let hub = Hub::new(HubSection::default());
    let mut peer = connect(&hub);
    let (answer, _) = peer.roundtrip(&hub, auth_envelope("A", TOKEN));
    assert_eq!(error_code(&answer), "AUTH_FAILED");
}

#[test]
fn host_open_and_close_are_idempotent_and_announced() {
    let hub = hub();
    let (mut a, mut b) = (login(&hub, "A"), login(&hub, "B"));

    assert!(hub.open("r"));
    assert!(!hub.open("r"));
    assert!(!hub.open("*"));
    for peer in [&mut a, &mut b] {
        let got = peer.drain();
        assert_eq!(types(&got), ["open"]);
        assert_eq!(got[0].content_str(), Some("r"));
    }

    assert!(hub.close("r"));
    assert!(!hub.close("r"));
    for peer in [&mut a, &mut b] {
        assert_eq!(types(&peer.drain()), ["close"]);
    }
    assert!(hub.channels().is_empty());
}

#[test]
fn open_command_creates_and_joins() {
    let hub = hub();
    let (mut a, mut b) = (login(&hub, "A"), login(&hub, "B"));

    let (answer, others) = a.roundtrip(&hub, a.command(MessageType::Open, "r1"));
    assert!(reply_of(&answer).success);
    assert_eq!(types(&others), ["open", "channel"]);
    assert_eq!(others[1].content(), &json!([]));
    assert_eq!(types(&b.drain()), ["open"]);
    assert_eq!(hub.channel("r1").unwrap().members(), ["A"]);

    let (answer, _) = b.roundtrip(&hub, b.command(MessageType::Open, "r1"));
    assert_eq!(error_code(&answer), "INVALID");
}

#[test]
fn close_command_follows_policy() {
    let hub = hub();
    let mut a = login(&hub, "A");
    hub.open("r1");
    a.drain();

    let (answer, _) = a.roundtrip(&hub, a.command(MessageType::Close, "r1"));
    assert_eq!(error_code(&answer), "INVALID");
    assert!(hub.channel("r1").is_some());

    hub.on("close", |ctx| ctx.accept());
    let (answer, others) = a.roundtrip(&hub, a.command(MessageType::Close, "r1"));
    assert!(reply_of(&answer).success);
    assert_eq!(types(&others), ["close"]);
    assert!(hub.channel("r1").is_none());

    let (answer, _) = a.roundtrip(&hub, a.command(MessageType::Close, "r1"));
    assert_eq!(error_code(&answer), "NON_EXISTENT_CHANNEL");
}

#[test]
fn configured_defaults_apply_to_undecided_commands() {
    let mut cfg = HubSection::default();
    cfg.commands.join = CommandDefault::Deny;
    cfg.commands.close = CommandDefault::Allow;
    let hub = hub_with(cfg);
    let mut a = login(&hub, "A");
    hub.open("r1");

    let (answer, _) = a.roundtrip(&hub, a.command(MessageType::Join, "r1"));
    assert_eq!(error_code(&answer), "INVALID");

    let (answer, _) = a.roundtrip(&hub, a.command(MessageType::Close, "r1"));
    assert!(reply_of(&answer).success);
}

#[test]
fn join_command_edge_cases() {
    let hub = hub();
    let (mut a, mut b) = (login(&hub, "A"), login(&hub, "B"));
    hub.open("room");
    hub.join("B", "room").unwrap();
    drain_all(&mut [&mut a, &mut b]);

    let (answer, _) = a.roundtrip(&hub, a.command(MessageType::Join, "missing"));
    assert_eq!(error_code(&answer), "NON_EXISTENT_CHANNEL");

    // channel named by the envelope instead of the content
    let by_channel = a
        .env(MessageType::Join)
        .with_channel("room")
        .with_receiver(Address::Server);
    let (answer, others) = a.roundtrip(&hub, by_channel);
    assert!(reply_of(&answer).success);
    assert_eq!(types(&others), ["channel"]);
    assert_eq!(types(&b.drain()), ["join"]);

    // second join: success, no announcements
    let (answer, others) = a.roundtrip(&hub, a.command(MessageType::Join, "room"));
    assert!(reply_of(&answer).success);
    assert!(others.is_empty());
    assert!(b.drain().is_empty());

    hub.on("join", |ctx| ctx.reject(RelayError::Invalid("closed for today".into())));
    let mut c = login(&hub, "C");
    let (answer, _) = c.roundtrip(&hub, c.command(MessageType::Join, "room"));
    assert_eq!(error_code(&answer), "INVALID");
    assert_eq!(hub.channel("room").unwrap().members(), ["B", "A"]);
}

#[test]
fn leave_command() {
    let hub = hub();
    let (mut a, mut b) = (login(&hub, "A"), login(&hub, "B"));
    hub.open("room");
    hub.open("other");
    hub.join("A", "room").unwrap();
    hub.join("B", "room").unwrap();
    drain_all(&mut [&mut a, &mut b]);

    let (answer, _) = a.roundtrip(&hub, a.command(MessageType::Leave, "missing"));
    assert_eq!(error_code(&answer), "NON_EXISTENT_CHANNEL");
    let (answer, _) = a.roundtrip(&hub, a.command(MessageType::Leave, "other"));
    assert_eq!(error_code(&answer), "SENDER_NOT_IN_CHANNEL");

    let (answer, others) = a.roundtrip(&hub, a.command(MessageType::Leave, "room"));
    assert!(reply_of(&answer).success);
    assert_eq!(types(&others), ["leave"]);
    assert_eq!(others[0].content_str(), Some("A"));

    let got = b.drain();
    assert_eq!(types(&got), ["leave"]);
    assert_eq!(got[0].content_str(), Some("A"));
    assert_eq!(hub.channel("room").unwrap().members(), ["B"]);
}

#[test]
fn disconnect_emits_leave_to_remaining_members() {
    let hub = hub();
    let (mut a, mut b) = (login(&hub, "A"), login(&hub, "B"));
    hub.open("c1");
    hub.join("A", "c1").unwrap();
    hub.join("B", "c1").unwrap();
    drain_all(&mut [&mut a, &mut b]);

    let gone = Arc::new(Mutex::new(Vec::new()));
    let g = Arc::clone(&gone);
    hub.on("disconnect", move |ctx| {
        g.lock().unwrap().push((ctx.user().map(str::to_string), ctx.channels_of_user()));
    });

    assert_eq!(hub.disconnect(a.conn), Some(ConnState::Closed));
    assert_eq!(hub.disconnect(a.conn), None);

    let got = b.drain();
    assert_eq!(types(&got), ["leave"]);
    assert_eq!(got[0].content_str(), Some("A"));
    assert_eq!(hub.users(), ["B"]);
    assert_eq!(hub.channel("c1").unwrap().members(), ["B"]);
    assert_eq!(hub.connection_state(a.conn), None);
    assert_eq!(*gone.lock().unwrap(), [(Some("A".to_string()), vec!["c1".to_string()])]);

    a.drain();
    assert!(a.is_closed());
}

#[test]
fn transport_failure_is_reported_as_error() {
    let hub = hub();
    let (a, mut b) = (login(&hub, "A"), login(&hub, "B"));
    hub.open("c1");
    hub.join("A", "c1").unwrap();
    hub.join("B", "c1").unwrap();
    b.drain();

    let reasons = Arc::new(Mutex::new(Vec::<Value>::new()));
    let r = Arc::clone(&reasons);
    hub.on("error", move |ctx| r.lock().unwrap().push(ctx.content().clone()));

    assert_eq!(hub.fail(a.conn, "connection reset"), Some(ConnState::Errored));
    assert_eq!(*reasons.lock().unwrap(), [json!("connection reset")]);
    assert_eq!(types(&b.drain()), ["leave"]);
    assert_eq!(hub.connection_count(), 1);
}

#[test]
fn deauth_replies_then_closes() {
    let hub = hub();
    let (mut a, mut b) = (login(&hub, "A"), login(&hub, "B"));
    hub.open("c1");
    hub.join("A", "c1").unwrap();
    hub.join("B", "c1").unwrap();
    drain_all(&mut [&mut a, &mut b]);

    let (answer, others) = a.roundtrip(&hub, a.command(MessageType::Deauth, Value::Null));
    assert!(reply_of(&answer).success);
    assert_eq!(types(&others), ["leave", "deauth"]);
    assert!(a.is_closed());

    assert_eq!(types(&b.drain()), ["leave"]);
    assert!(!hub.is_authenticated(a.conn));
    assert_eq!(hub.connection_state(a.conn), None);

    // the id is free again
    let _a2 = login(&hub, "A");
}

#[test]
fn unauthenticate_twice() {
    let hub = hub();
    let mut b = login(&hub, "B");
    assert!(hub.unauthenticate("B"));
    assert!(!hub.unauthenticate("B"));
    assert_eq!(types(&b.drain()), ["deauth"]);
    assert!(b.is_closed());
}

#[test]
fn host_join_and_leave_errors() {
    let hub = hub();
    let _a = login(&hub, "A");
    hub.open("c1");

    assert_eq!(hub.join("A", "nope").map_err(|e| e.kind().as_str()), Err("NON_EXISTENT_CHANNEL"));
    assert_eq!(hub.join("ghost", "c1").map_err(|e| e.kind().as_str()), Err("NON_EXISTENT_RECEIVER"));
    assert_eq!(hub.join("A", "c1"), Ok(true));
    assert_eq!(hub.join("A", "c1"), Ok(false));
    assert_eq!(hub.leave("A", "c1"), Ok(true));
    assert_eq!(hub.leave("A", "c1"), Ok(false));
    assert_eq!(hub.leave("A", "nope").map_err(|e| e.kind().as_str()), Err("NON_EXISTENT_CHANNEL"));
}

#[test]
fn hubs_are_independent() {
    let (h1, h2) = (hub(), hub());
    let _a = login(&h1, "A");
    let _a_again = login(&h2, "A");
    assert!(h1.open("c1"));
    assert!(h2.open("c1"));
    assert!(h2.channel("c1").is_some());
    h1.close("c1");
    assert!(h1.channel("c1").is_none());
    assert!(h2.channel("c1").is_some());
}

#[test]
fn listeners_can_drive_the_hub() {
    let hub = hub();
    let mut a = login(&hub, "A");
    hub.open("lobby");
    a.drain();

    // auto-join the lobby on a custom request
    hub.on("enter", |ctx| {
        if let Some(user) = ctx.user() {
            let joined = ctx.hub().join(user, "lobby").is_ok();
            ctx.reply(json!({ "joined": joined }));
        }
    });

    let req = a.env("enter").with_receiver(Address::Server);
    let (answer, others) = a.roundtrip(&hub, req);
    assert_eq!(answer.content(), &json!({"joined": true}));
    assert_eq!(types(&others), ["channel"]);
    assert_eq!(hub.channels_of("A"), ["lobby"]);
}

//! Integration tests for saving and resuming established sessions

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

use secure_session_state::error::SessionError;
use secure_session_state::session::{
    load, save, save_to_vec, HkdfKeyDerivation, KeyDerivation, MasterKey, MessageKeys,
    SessionContext, SERIALIZED_SIZE,
};

fn handshake(session_id: u32) -> (SessionContext, SessionContext) {
    let (mut client, init) = SessionContext::client_start(session_id);
    let (mut server, response) = SessionContext::server_accept(&init);
    let confirm = client
        .client_finish(&response)
        .expect("client finish should succeed");
    server
        .server_finish(&confirm)
        .expect("server finish should succeed");
    (client, server)
}

#[test]
fn test_concrete_scenario() {
    let mut session = SessionContext::established(42, true, MasterKey::new([0u8; 32]));
    session.out_seq = 7;
    session.in_seq = 3;

    let required = match save(&session, None) {
        Err(SessionError::BufferTooSmall { required }) => required,
        other => panic!("Expected size query, got {other:?}"),
    };
    let mut buf = vec![0u8; required];
    let written = save(&session, Some(&mut buf)).expect("save should succeed");
    assert_eq!(written, required);

    let mut restored = SessionContext::default();
    load(&mut restored, &buf).expect("load should succeed");

    assert_eq!(restored.out_seq, 7);
    assert_eq!(restored.in_seq, 3);
    assert_eq!(restored.session_id, 42);
    assert!(restored.is_client);
}

#[test]
fn test_size_query_independent_of_session_values() {
    let sessions = [
        SessionContext::established(0, false, MasterKey::new([0u8; 32])),
        SessionContext::established(u32::MAX, true, MasterKey::new([0xFF; 32])),
        {
            let mut s = SessionContext::established(12345, true, MasterKey::new([7; 32]));
            s.out_seq = u32::MAX;
            s.in_seq = 1;
            s
        },
    ];

    for session in &sessions {
        match save(session, None) {
            Err(SessionError::BufferTooSmall { required }) => {
                assert_eq!(required, SERIALIZED_SIZE)
            }
            other => panic!("Expected size query, got {other:?}"),
        }
    }
}

#[test]
fn test_resumed_client_keeps_talking_to_server() {
    let (mut client, mut server) = handshake(500);

    for i in 0..5u8 {
        let sealed = client.seal(&[i; 16]).unwrap();
        assert_eq!(server.open(&sealed).unwrap(), vec![i; 16]);
    }
    let sealed = server.seal(b"ack").unwrap();
    client.open(&sealed).unwrap();

    let blob = save_to_vec(&client).unwrap();
    drop(client);

    let mut resumed = SessionContext::default();
    load(&mut resumed, &blob).unwrap();
    assert_eq!((resumed.out_seq, resumed.in_seq), (5, 1));

    let sealed = resumed.seal(b"after resume").unwrap();
    assert_eq!(server.open(&sealed).unwrap(), b"after resume");

    let sealed = server.seal(b"welcome back").unwrap();
    assert_eq!(resumed.open(&sealed).unwrap(), b"welcome back");
}

#[test]
fn test_both_ends_resume_independently() {
    let (mut client, mut server) = handshake(9);
    let sealed = client.seal(b"one").unwrap();
    server.open(&sealed).unwrap();

    let client_blob = save_to_vec(&client).unwrap();
    let server_blob = save_to_vec(&server).unwrap();

    let mut client = SessionContext::default();
    let mut server = SessionContext::default();
    load(&mut client, &client_blob).unwrap();
    load(&mut server, &server_blob).unwrap();

    assert!(!server.is_client);
    let sealed = client.seal(b"two").unwrap();
    assert_eq!(server.open(&sealed).unwrap(), b"two");
}

#[test]
fn test_restored_keys_equal_direct_derivation() {
    let (client, _server) = handshake(31);
    let blob = save_to_vec(&client).unwrap();

    let mut restored = SessionContext::default();
    load(&mut restored, &blob).unwrap();

    let direct = MessageKeys::derive(client.master_key().as_bytes(), 31, true).unwrap();
    assert_eq!(restored.message_keys().unwrap(), &direct);
    assert_eq!(restored.message_keys(), client.message_keys());
}

#[test]
fn test_stale_snapshot_is_rejected_by_peer() {
    let (mut client, mut server) = handshake(4);
    let snapshot = save_to_vec(&client).unwrap();

    let sealed = client.seal(b"sent after snapshot").unwrap();
    server.open(&sealed).unwrap();

    // Resuming an old snapshot would reuse sequence 0; the peer refuses it
    let mut stale = SessionContext::default();
    load(&mut stale, &snapshot).unwrap();
    let replay = stale.seal(b"reused counter").unwrap();
    assert!(matches!(
        server.open(&replay),
        Err(SessionError::SequenceMismatch {
            expected: 1,
            received: 0
        })
    ));
}

#[test]
fn test_negotiating_session_cannot_be_saved() {
    let (client, init) = SessionContext::client_start(1);
    let (server, _response) = SessionContext::server_accept(&init);

    for session in [&client, &server] {
        let mut buf = vec![0x5Au8; SERIALIZED_SIZE];
        assert!(matches!(
            save(session, Some(&mut buf)),
            Err(SessionError::InvalidParameter(_))
        ));
        assert!(buf.iter().all(|&b| b == 0x5A), "nothing may be written");
        assert!(matches!(
            save(session, None),
            Err(SessionError::InvalidParameter(_))
        ));
    }
}

#[test]
fn test_load_overwrites_previous_destination_state() {
    let (client, _server) = handshake(77);
    let blob = save_to_vec(&client).unwrap();

    let mut dest = SessionContext::established(1, false, MasterKey::new([0x11; 32]));
    HkdfKeyDerivation.derive_message_keys(&mut dest).unwrap();
    dest.out_seq = 1000;
    dest.in_seq = 2000;

    load(&mut dest, &blob).unwrap();

    assert_eq!(dest.session_id, 77);
    assert!(dest.is_client);
    assert_eq!(dest.master_key(), client.master_key());
    assert_eq!((dest.out_seq, dest.in_seq), (0, 0));
}

#[test]
fn test_save_is_deterministic() {
    let (client, _server) = handshake(3);
    let a = save_to_vec(&client).unwrap();
    let b = save_to_vec(&client).unwrap();
    assert_eq!(*a, *b);
}

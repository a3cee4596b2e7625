//! End-to-end file transfers between two endpoints.

#![cfg(feature = "filetransfer")]

mod common;

use common::{Dir, Pair, chunk_session, chunk_slot, pattern};
use microlink::core::TransferError;
use microlink::filetransfer::{
    Command, MemoryStorage, SendFileAck, SendFileRequest, SenderState, Session, StatusReport,
    TransferConfig, TransferParams, TransferStatus,
};
use microlink::link::{Frame, FrameKind};

fn offer(pair: &mut Pair, len: usize, name: &str) -> u8 {
    let seq = pair
        .a
        .transfer
        .send_file(&mut pair.a.link, len as u32, name)
        .unwrap();
    assert_eq!(seq, 1);
    seq
}

fn pair_with_file(len: usize, receiver: MemoryStorage) -> Pair {
    Pair::new(
        TransferConfig::default(),
        MemoryStorage::with_source(pattern(len)),
        TransferConfig::default(),
        receiver,
    )
}

fn receiver_window(pair: &Pair) -> Option<(u32, u32)> {
    match pair.b.transfer.session()? {
        Session::Receiver(rx) => Some((rx.window().base(), rx.window().mask())),
        Session::Sender(_) => None,
    }
}

fn receiver_session(pair: &Pair) -> u16 {
    match pair.b.transfer.session() {
        Some(Session::Receiver(rx)) => rx.session(),
        other => panic!("no receiver session: {other:?}"),
    }
}

fn handshake_ack(pair: &Pair) -> SendFileAck {
    let frame = pair
        .delivered(Dir::BtoA)
        .find(|f| f.kind == FrameKind::Ack && Command::of(&f.payload) == Some(Command::SendFile))
        .expect("handshake ack");
    SendFileAck::from_bytes(&frame.payload).unwrap()
}

#[test]
fn test_full_transfer_with_defaults() {
    let mut pair = pair_with_file(1000, MemoryStorage::new());
    offer(&mut pair, 1000, "a.bin");

    assert!(pair.run_to_end(10_000));
    assert_eq!(pair.a.statuses(), &[TransferStatus::Finished]);
    assert_eq!(pair.b.statuses(), &[TransferStatus::Finished]);

    let ack = handshake_ack(&pair);
    assert_eq!(ack.status, TransferStatus::Ok);
    assert_eq!((ack.mtu, ack.dt_min, ack.dt_max), (250, 7, 10));
    assert_ne!(ack.session, 0);
    assert_eq!(ack.session, receiver_session(&pair));

    let sessions: Vec<u16> = pair.delivered(Dir::AtoB).filter_map(chunk_session).collect();
    assert_eq!(sessions.len(), 4);
    assert!(sessions.iter().all(|s| *s == ack.session));

    let storage = pair.b.transfer.storage();
    assert_eq!(storage.file_name(), Some("a.bin"));
    assert_eq!(storage.received(), pattern(1000).as_slice());

    let progress = pair.a.transfer.progress().unwrap();
    assert!(progress.is_complete());
    assert_eq!(progress.status, TransferStatus::Finished);
    assert!(!pair.a.transfer.is_active());
    assert!(!pair.b.transfer.is_active());
}

#[test]
fn test_rejected_offer_sends_no_data() {
    let mut pair = pair_with_file(1000, MemoryStorage::new().with_max_len(100));
    offer(&mut pair, 1000, "big.bin");

    assert!(pair.run_until(10_000, |p| !p.a.statuses().is_empty()));
    assert_eq!(pair.a.statuses(), &[TransferStatus::Aborted]);
    assert!(pair.b.statuses().is_empty());
    assert_eq!(handshake_ack(&pair).status, TransferStatus::Aborted);
    assert_eq!(pair.log.iter().filter_map(|(_, f, _)| chunk_slot(f)).count(), 0);
    assert!(pair.b.transfer.session().is_none());
}

#[test]
fn test_lost_chunk_is_resent_from_window_report() {
    let mut lost = false;
    let mut pair = Pair::new(
        TransferConfig::default().with_mtu(250),
        MemoryStorage::with_source(pattern(700)),
        TransferConfig::default(),
        MemoryStorage::new(),
    )
    .with_filter(move |dir, frame| {
        if dir == Dir::AtoB && chunk_slot(frame) == Some(1) && !lost {
            lost = true;
            return true;
        }
        false
    });
    offer(&mut pair, 700, "gap.bin");

    // Chunks 0 and 2 arrived, 1 is missing.
    assert!(pair.run_until(1_000, |p| receiver_window(p) == Some((1, 0b10))));
    assert_eq!(pair.b.transfer.progress().unwrap().transferred, 450);

    assert!(pair.run_to_end(10_000));
    assert_eq!(receiver_window(&pair), Some((3, 0)));
    assert_eq!(pair.b.statuses(), &[TransferStatus::Finished]);
    assert_eq!(pair.b.transfer.storage().received(), pattern(700).as_slice());

    let slots: Vec<u32> = pair.log.iter().filter_map(|(_, f, _)| chunk_slot(f)).collect();
    assert_eq!(slots, vec![0, 1, 2, 1]);

    // The report that retargeted the sender.
    let report = pair
        .delivered(Dir::BtoA)
        .filter(|f| f.kind == FrameKind::Sync)
        .map(|f| StatusReport::from_bytes(&f.payload).unwrap())
        .next()
        .unwrap();
    assert_eq!((report.status, report.base, report.mask), (TransferStatus::Ok, 1, 0b10));
}

#[test]
fn test_pacing_backs_off_on_slow_rounds() {
    let mut sender = SenderState::new(1_000_000, TransferParams::default(), 1, 1);
    sender.on_handshake_ack(&SendFileAck {
        status: TransferStatus::Ok,
        mtu: 250,
        dt_min: 10,
        dt_max: 40,
        session: 5,
    });
    let start = sender.dt();
    assert_eq!(start, 17);

    let mut last = start;
    for round in 1..=20u32 {
        let (reply, ended) = sender.on_status_report(&StatusReport {
            session: 5,
            status: TransferStatus::Ok,
            base: round * 4,
            mask: 0,
        });
        assert_eq!(ended, None);
        assert!(reply.dt >= last);
        assert!(reply.dt <= 40);
        last = reply.dt;
    }
    assert_eq!(last, 37);

    // A round acknowledging more than eight chunks speeds back up.
    let (reply, _) = sender.on_status_report(&StatusReport {
        session: 5,
        status: TransferStatus::Ok,
        base: 80 + 9,
        mask: 0,
    });
    assert_eq!(reply.dt, 36);
}

#[test]
fn test_zero_length_file() {
    let mut pair = pair_with_file(0, MemoryStorage::new());
    offer(&mut pair, 0, "empty");

    assert!(pair.run_to_end(1_000));
    assert_eq!(pair.a.statuses(), &[TransferStatus::Finished]);
    assert_eq!(pair.b.statuses(), &[TransferStatus::Finished]);
    assert_eq!(pair.log.iter().filter_map(|(_, f, _)| chunk_slot(f)).count(), 0);
    assert!(pair.b.transfer.storage().received().is_empty());
}

#[test]
fn test_unanswered_offer_aborts() {
    let mut pair =
        pair_with_file(100, MemoryStorage::new()).with_filter(|dir, _| dir == Dir::AtoB);
    offer(&mut pair, 100, "void");

    assert!(pair.run_until(10_000, |p| !p.a.statuses().is_empty()));
    assert_eq!(pair.a.statuses(), &[TransferStatus::Aborted]);
    // Original plus ten retransmissions.
    assert_eq!(pair.log.len(), 11);
    assert!(!pair.a.transfer.is_active());
}

#[test]
fn test_second_offer_refused_while_active() {
    let mut pair = pair_with_file(5000, MemoryStorage::new());
    offer(&mut pair, 5000, "first");
    let started = |p: &Pair| {
        p.b.transfer
            .progress()
            .is_some_and(|progress| progress.transferred > 0)
    };
    assert!(pair.run_until(1_000, started));

    // The sender side refuses locally.
    assert!(matches!(
        pair.a.transfer.send_file(&mut pair.a.link, 10, "again"),
        Err(TransferError::SessionActive)
    ));

    // The receiver answers a fresh offer with Aborted and session 0.
    let request = SendFileRequest {
        file_len: 10,
        mtu: 0,
        dt_min: 0,
        dt_max: 0,
        name: b"second".to_vec(),
    };
    let wire = Frame::new(FrameKind::Sync, 9, request.to_bytes().unwrap())
        .encode()
        .unwrap();
    pair.b.link.on_bytes(&wire, &mut pair.b.transfer);
    let reply = common::drain(&mut pair.b.link)
        .iter()
        .map(|bytes| Frame::decode(bytes).unwrap())
        .find(|f| f.kind == FrameKind::Ack && f.seq == 9)
        .expect("reply to second offer");
    let ack = SendFileAck::from_bytes(&reply.payload).unwrap();
    assert_eq!((ack.status, ack.session), (TransferStatus::Aborted, 0));

    assert!(pair.b.transfer.is_active());
    assert!(pair.run_to_end(100_000));
    assert_eq!(pair.b.transfer.storage().file_name(), Some("first"));
    assert_eq!(pair.b.transfer.storage().received(), pattern(5000).as_slice());
}

#[test]
fn test_lossy_transfer_beyond_one_window() {
    let mut chunks = 0u32;
    let mut statuses = 0u32;
    let mut pair = pair_with_file(12_000, MemoryStorage::new()).with_filter(move |dir, frame| {
        match dir {
            Dir::AtoB if chunk_slot(frame).is_some() => {
                chunks += 1;
                chunks % 5 == 2
            }
            // Lose every fourth status frame, retransmissions included.
            Dir::BtoA if frame.kind == FrameKind::Sync => {
                statuses += 1;
                statuses % 4 == 1
            }
            _ => false,
        }
    });
    offer(&mut pair, 12_000, "big.bin");

    assert!(pair.run_to_end(1_000_000));
    assert_eq!(pair.a.statuses(), &[TransferStatus::Finished]);
    assert_eq!(pair.b.statuses(), &[TransferStatus::Finished]);
    assert_eq!(pair.b.transfer.storage().received(), pattern(12_000).as_slice());

    let highest = pair.log.iter().filter_map(|(_, f, _)| chunk_slot(f)).max();
    assert_eq!(highest, Some(47));
    let progress = pair.a.transfer.progress().unwrap();
    assert_eq!(progress.transferred, 12_000);
}

#[test]
fn test_write_failure_aborts_both_sides() {
    let mut pair = pair_with_file(3000, MemoryStorage::new().with_write_limit(3));
    offer(&mut pair, 3000, "disk.bin");

    assert!(pair.run_to_end(10_000));
    assert_eq!(pair.a.statuses(), &[TransferStatus::Aborted]);
    assert_eq!(pair.b.statuses(), &[TransferStatus::Aborted]);
    assert_eq!(pair.b.transfer.storage().writes(), 3);

    // The receiver told the sender with an Aborted status.
    let report = pair
        .delivered(Dir::BtoA)
        .filter(|f| f.kind == FrameKind::Sync)
        .map(|f| StatusReport::from_bytes(&f.payload).unwrap())
        .last()
        .unwrap();
    assert_eq!(report.status, TransferStatus::Aborted);
    assert_eq!(report.session, receiver_session(&pair));

    assert_eq!(pair.a.transfer.progress().unwrap().status, TransferStatus::Aborted);
    assert!(!pair.a.transfer.is_active());
    assert!(!pair.b.transfer.is_active());
}

#[test]
fn test_sender_gives_up_when_final_status_never_arrives() {
    let mut pair = pair_with_file(1000, MemoryStorage::new()).with_filter(|dir, frame| {
        dir == Dir::BtoA
            && frame.kind == FrameKind::Sync
            && StatusReport::from_bytes(&frame.payload)
                .is_ok_and(|report| report.status == TransferStatus::Finished)
    });
    offer(&mut pair, 1000, "quiet.bin");

    assert!(pair.run_to_end(100_000));
    assert_eq!(pair.b.statuses(), &[TransferStatus::Finished]);
    assert_eq!(pair.b.transfer.storage().received(), pattern(1000).as_slice());
    assert_eq!(pair.a.statuses(), &[TransferStatus::Aborted]);

    // Bounded: no further sender wakeups, no extra chunks.
    assert!(pair.a.transfer.events().wakeup.is_none());
    assert!(!pair.a.transfer.is_active());
    assert_eq!(pair.log.iter().filter_map(|(_, f, _)| chunk_slot(f)).count(), 4);
    assert!(pair.clock.now() < 2_000);
}

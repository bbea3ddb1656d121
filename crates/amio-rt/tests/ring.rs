use amio_rt::ring::{spsc_channel, QueueError};

#[test]
fn push_and_pop() {
    let (mut tx, mut rx) = spsc_channel(2);
    tx.try_send(1usize).unwrap();
    tx.try_send(2usize).unwrap();
    assert_eq!(tx.try_send(3usize), Err(3));
    assert_eq!(rx.try_recv().unwrap(), 1);
    assert_eq!(rx.try_recv().unwrap(), 2);
    assert!(matches!(rx.try_recv(), Err(QueueError::Empty)));
}

#[test]
fn slots_track_free_space() {
    let (mut tx, mut rx) = spsc_channel(4);
    assert_eq!(tx.slots(), 4);
    tx.try_send(0u8).unwrap();
    tx.try_send(1u8).unwrap();
    assert_eq!(tx.slots(), 2);
    rx.try_recv().unwrap();
    assert_eq!(tx.slots(), 3);
}

#[test]
fn fifo_order_survives_wraparound() {
    let (mut tx, mut rx) = spsc_channel(3);
    for round in 0..10u32 {
        tx.try_send(round * 2).unwrap();
        tx.try_send(round * 2 + 1).unwrap();
        assert_eq!(rx.try_recv().unwrap(), round * 2);
        assert_eq!(rx.try_recv().unwrap(), round * 2 + 1);
    }
    assert!(rx.is_empty());
}

#![cfg(loom)]

use braid::pipe::CursorId;
use braid::pipe::CursorSlot;
use braid::pipe::Cursors;
use loom::thread;
use triomphe::Arc;

#[test]
fn concurrent_register_unique_ids() {
  loom::model(|| {
    let cursors: Arc<Cursors> = Arc::new(Cursors::new());

    let t1 = {
      let cursors: Arc<Cursors> = Arc::clone(&cursors);

      thread::spawn(move || cursors.register(0).0)
    };

    let t2 = {
      let cursors: Arc<Cursors> = Arc::clone(&cursors);

      thread::spawn(move || cursors.register(5).0)
    };

    let id1: CursorId = t1.join().unwrap();
    let id2: CursorId = t2.join().unwrap();

    assert_ne!(id1, id2, "Concurrent registers produced same id!");
    assert_eq!(cursors.len(), 2);
    assert_eq!(cursors.min_position(), Some(0));
  });
}

#[test]
fn min_position_never_passes_live_cursor() {
  loom::model(|| {
    let cursors: Arc<Cursors> = Arc::new(Cursors::new());
    let (_, slow): (CursorId, Arc<CursorSlot>) = cursors.register(10);
    let (fast_id, fast): (CursorId, Arc<CursorSlot>) = cursors.register(10);

    let t1 = thread::spawn(move || {
      fast.advance(40);
      fast.advance(30);
      fast.position()
    });

    let t2 = {
      let cursors: Arc<Cursors> = Arc::clone(&cursors);

      thread::spawn(move || cursors.min_position())
    };

    assert_eq!(t1.join().unwrap(), 40, "Cursor position moved backwards!");
    assert_eq!(t2.join().unwrap(), Some(10));

    assert!(cursors.deregister(fast_id));
    assert_eq!(cursors.min_position(), Some(slow.position()));
  });
}

#[test]
fn notify_during_deregister() {
  loom::model(|| {
    let cursors: Arc<Cursors> = Arc::new(Cursors::new());
    let (id, slot): (CursorId, Arc<CursorSlot>) = cursors.register(0);

    let t1 = {
      let cursors: Arc<Cursors> = Arc::clone(&cursors);

      thread::spawn(move || cursors.notify_all())
    };

    let t2 = {
      let cursors: Arc<Cursors> = Arc::clone(&cursors);

      thread::spawn(move || cursors.deregister(id))
    };

    t1.join().unwrap();

    assert!(t2.join().unwrap(), "Deregister lost the cursor!");
    assert!(cursors.is_empty());

    // The slot outlives its registration, so a late wake is harmless.
    slot.signal().set();
    assert!(slot.signal().try_wait());
  });
}

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{self, Receiver, SyncSender},
        Arc,
    },
    thread::{self, JoinHandle},
};

use kvdb_tree::OrderedMap;
use tracing::trace;

use crate::{
    error::{DbError, DbResult},
    iterator::DbIterator,
};

/// Size of the channel buffer between the traversal thread and the iterator. An unbuffered
/// handoff costs two context switches per entry.
const CHANNEL_CAPACITY: usize = 64;

type Entry = (Vec<u8>, Vec<u8>);

/// Iterator over a [super::MemDb] snapshot.
///
/// A producer thread walks the snapshot with the tree's push-style traversal and hands the
/// entries over through a bounded channel, so memory use is bounded by the channel capacity
/// whatever the range size. The producer blocks while the channel is full.
///
/// Reading the channel blocks the calling thread until the producer delivers the next entry.
/// [DbIterator::close] (also run on drop) cancels the producer, drops the channel with
/// whatever it still buffers and joins the thread.
pub struct MemDbIterator {
    start: Option<Vec<u8>>,
    end: Option<Vec<u8>>,
    entries: Option<Receiver<Entry>>,
    cancelled: Arc<AtomicBool>,
    producer: Option<JoinHandle<()>>,
    current: Option<Entry>,
}

impl MemDbIterator {
    pub(crate) fn new(
        tree: OrderedMap,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
        reverse: bool,
    ) -> DbResult<Self> {
        let start = start.map(<[u8]>::to_vec);
        let end = end.map(<[u8]>::to_vec);

        let (sink, entries) = mpsc::sync_channel(CHANNEL_CAPACITY);
        let cancelled = Arc::new(AtomicBool::new(false));

        let producer = thread::Builder::new()
            .name("memdb-iterator".to_string())
            .spawn({
                let (start, end) = (start.clone(), end.clone());
                let cancelled = Arc::clone(&cancelled);
                move || traverse(tree, start, end, reverse, sink, cancelled)
            })
            .map_err(DbError::backend)?;

        let mut itr = MemDbIterator {
            start,
            end,
            entries: Some(entries),
            cancelled,
            producer: Some(producer),
            current: None,
        };

        // Prime the iterator so that `valid` is answerable without a prior `next`.
        itr.current = itr.recv();

        Ok(itr)
    }

    fn recv(&self) -> Option<Entry> {
        self.entries.as_ref().and_then(|entries| entries.recv().ok())
    }

    fn current(&self, op: &str) -> &Entry {
        match &self.current {
            Some(entry) => entry,
            None => panic!("called {op}() on invalid iterator"),
        }
    }
}

/// Walks `tree` over `[start, end)` in the requested direction, sending each entry to `sink`
/// until the range is exhausted, the iterator is cancelled or the receiver is gone.
fn traverse(
    tree: OrderedMap,
    start: Option<Vec<u8>>,
    end: Option<Vec<u8>>,
    reverse: bool,
    sink: SyncSender<Entry>,
    cancelled: Arc<AtomicBool>,
) {
    trace!(reverse, "MemDb iterator producer started");

    // The tree descends over closed ranges: a reverse walk from `end` must skip `end` itself
    // and stop below `start` on its own.
    let mut skip_equal = if reverse { end.as_deref() } else { None };
    let abort_less_than = if reverse { start.as_deref() } else { None };
    let mut sent = 0usize;

    let visitor = |key: &[u8], value: &[u8]| {
        if skip_equal.is_some_and(|skip| skip == key) {
            skip_equal = None;
            return true;
        }
        if abort_less_than.is_some_and(|start| key < start) {
            return false;
        }
        if cancelled.load(Ordering::Acquire) {
            return false;
        }

        sent += 1;
        sink.send((key.to_vec(), value.to_vec())).is_ok()
    };

    match (reverse, start.as_deref(), end.as_deref()) {
        (false, None, None) => tree.ascend(visitor),
        (false, Some(start), None) => tree.ascend_greater_or_equal(start, visitor),
        (false, start, Some(end)) => tree.ascend_range(start.unwrap_or_default(), end, visitor),
        (true, _, None) => tree.descend(visitor),
        (true, _, Some(end)) => tree.descend_less_or_equal(end, visitor),
    }

    trace!(sent, "MemDb iterator producer finished");
}

impl DbIterator for MemDbIterator {
    fn domain(&self) -> (Option<&[u8]>, Option<&[u8]>) {
        (self.start.as_deref(), self.end.as_deref())
    }

    fn valid(&self) -> bool {
        self.current.is_some()
    }

    fn next(&mut self) {
        self.current("next");
        self.current = self.recv();
    }

    fn key(&self) -> &[u8] {
        &self.current("key").0
    }

    fn value(&self) -> &[u8] {
        &self.current("value").1
    }

    fn error(&self) -> Option<&DbError> {
        None
    }

    fn close(&mut self) -> DbResult<()> {
        self.current = None;

        let Some(producer) = self.producer.take() else {
            return Ok(());
        };

        self.cancelled.store(true, Ordering::Release);
        // Dropping the receiver discards the buffered entries and fails the pending send of a
        // producer blocked on a full channel.
        self.entries = None;

        producer.join().map_err(|_| DbError::ProducerPanicked)
    }
}

impl Drop for MemDbIterator {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

//! The on-disk stream-archive worker (spec.md §4.8 "Background worker"):
//! one thread per live disk-cache instance, merging the previous run's
//! write-cache into the read-cache on startup, replaying it into the
//! in-memory library, then appending newly stored blobs until told to
//! stop.
use std::fs::{self, File, OpenOptions};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use memmap2::Mmap;

use crate::cache::library::PipelineLibrary;
use crate::cache::stream::{
    self, read_stream_header, read_stream_records, write_stream_header, RecordType, StreamHeader,
};
use crate::io::Writer;

const FLUSH_INTERVAL: Duration = Duration::from_secs(1);

pub enum WorkerMessage {
    Store {
        hash: u64,
        record_type: RecordType,
        data: Vec<u8>,
    },
    Shutdown,
}

pub struct WorkerHandle {
    sender: Sender<WorkerMessage>,
    cancel: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    pub fn submit(&self, hash: u64, record_type: RecordType, data: Vec<u8>) {
        let _ = self.sender.send(WorkerMessage::Store { hash, record_type, data });
    }

    /// Sets the cancellation flag the worker polls between large units of
    /// work, and blocks until the thread has drained its queue and exited.
    pub fn shutdown(mut self) {
        self.cancel.store(true, Ordering::Relaxed);
        let _ = self.sender.send(WorkerMessage::Shutdown);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

/// Paths the worker operates on: the active write-cache, the stable
/// read-cache, and the scratch file used while merging the two.
pub struct CachePaths {
    pub write_cache: PathBuf,
    pub read_cache: PathBuf,
    pub merge_cache: PathBuf,
}

/// Spawns the background worker described in spec.md §4.8. `header`
/// supplies the vendor/device identity written into the stream-archive
/// header if no existing cache is found.
pub fn spawn<P: Send + Sync + 'static>(
    library: Arc<PipelineLibrary<P>>,
    paths: CachePaths,
    header: StreamHeader,
) -> WorkerHandle {
    let (sender, receiver) = bounded(1024);
    let cancel = Arc::new(AtomicBool::new(false));
    let worker_cancel = Arc::clone(&cancel);

    let join = thread::Builder::new()
        .name("vkshade-pipeline-cache".into())
        .spawn(move || run(library, paths, header, receiver, worker_cancel))
        .expect("failed to spawn pipeline cache worker thread");

    WorkerHandle {
        sender,
        cancel,
        join: Some(join),
    }
}

fn run<P: Send + Sync + 'static>(
    library: Arc<PipelineLibrary<P>>,
    paths: CachePaths,
    header: StreamHeader,
    receiver: Receiver<WorkerMessage>,
    cancel: Arc<AtomicBool>,
) {
    merge_on_boot(&paths, &header, &cancel);
    replay_read_cache(&library, &paths.read_cache);
    if cancel.load(Ordering::Relaxed) {
        return;
    }

    let mut write_file = match open_write_cache(&paths.write_cache, &header) {
        Some(file) => file,
        None => return, // another process owns the write-cache; nothing to do
    };

    let mut dirty = false;
    loop {
        match receiver.recv_timeout(FLUSH_INTERVAL) {
            Ok(WorkerMessage::Store { hash, record_type, data }) => {
                let mut w = Writer::new();
                stream::append_record(&mut w, hash, record_type, &data);
                if write_file.write_all(&w.into_bytes()).is_ok() {
                    dirty = true;
                }
            }
            Ok(WorkerMessage::Shutdown) => break,
            Err(RecvTimeoutError::Timeout) => {
                if dirty {
                    let _ = write_file.flush();
                    let _ = write_file.sync_data();
                    dirty = false;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
        if cancel.load(Ordering::Relaxed) {
            break;
        }
    }

    // drain whatever queued up between the last recv and shutdown
    while let Ok(WorkerMessage::Store { hash, record_type, data }) = receiver.try_recv() {
        let mut w = Writer::new();
        stream::append_record(&mut w, hash, record_type, &data);
        let _ = write_file.write_all(&w.into_bytes());
    }
    let _ = write_file.flush();
}

/// Step 1 of the worker life-cycle: rename the previous write-cache into
/// the merge slot, then fold it and any existing read-cache into a fresh
/// read-cache, de-duplicating by `(hash, type)`.
fn merge_on_boot(paths: &CachePaths, header: &StreamHeader, cancel: &AtomicBool) {
    if fs::rename(&paths.write_cache, &paths.merge_cache).is_err() {
        return; // nothing to merge; this is the first run
    }

    let mut seen = std::collections::HashSet::new();
    let mut merged = Writer::new();
    write_stream_header(&mut merged, header);

    for source in [&paths.read_cache, &paths.merge_cache] {
        if cancel.load(Ordering::Relaxed) {
            break;
        }
        let bytes = match fs::read(source) {
            Ok(bytes) => bytes,
            Err(_) => continue,
        };
        if read_stream_header(&bytes).is_err() {
            continue;
        }
        for record in read_stream_records(&bytes) {
            if cancel.load(Ordering::Relaxed) {
                break;
            }
            let dedup_key = (record.hash, record.record_type);
            if seen.insert(dedup_key) {
                stream::append_record(&mut merged, record.hash, record.record_type, &record.data);
            }
        }
    }

    if !cancel.load(Ordering::Relaxed) {
        if fs::write(&paths.merge_cache, merged.as_bytes()).is_ok() {
            let _ = fs::rename(&paths.merge_cache, &paths.read_cache);
        }
    } else {
        let _ = fs::remove_file(&paths.merge_cache);
    }
}

fn replay_read_cache<P: Send + Sync + 'static>(library: &PipelineLibrary<P>, read_cache: &Path) {
    let file = match File::open(read_cache) {
        Ok(file) => file,
        Err(_) => return,
    };
    let mmap = match unsafe { Mmap::map(&file) } {
        Ok(mmap) => mmap,
        Err(_) => return,
    };
    if read_stream_header(&mmap).is_err() {
        return;
    }
    for record in read_stream_records(&mmap) {
        library.replay_internal_record(record.record_type, record.hash, record.data);
    }
}

fn open_write_cache(path: &Path, header: &StreamHeader) -> Option<File> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .ok()?;
    if file.metadata().ok()?.len() == 0 {
        let mut w = Writer::new();
        write_stream_header(&mut w, header);
        file.write_all(w.as_bytes()).ok()?;
    }
    Some(file)
}

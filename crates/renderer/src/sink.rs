//! Destinations for encoded tiles.
//!
//! The rasterizer hands each tile to a [`TileSink`] as an immutable
//! `(name, bytes)` pair and never looks at it again.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, SyncSender};

use tracing::debug;

use crate::error::{RenderError, RenderResult};

/// Consumer of encoded tiles.
pub trait TileSink {
    fn accept(&mut self, name: String, data: Vec<u8>) -> RenderResult<()>;
}

impl<S: TileSink + ?Sized> TileSink for &mut S {
    fn accept(&mut self, name: String, data: Vec<u8>) -> RenderResult<()> {
        (**self).accept(name, data)
    }
}

/// Writes each tile to `<dir>/<name>`.
#[derive(Debug)]
pub struct DirectorySink {
    dir: PathBuf,
    skip_existing: bool,
    written: usize,
    skipped: usize,
}

impl DirectorySink {
    /// Create the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> RenderResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            skip_existing: false,
            written: 0,
            skipped: 0,
        })
    }

    /// Leave tiles that already exist on disk untouched.
    pub fn skip_existing(mut self, skip: bool) -> Self {
        self.skip_existing = skip;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

impl TileSink for DirectorySink {
    fn accept(&mut self, name: String, data: Vec<u8>) -> RenderResult<()> {
        let path = self.dir.join(&name);
        if self.skip_existing && path.exists() {
            self.skipped += 1;
            return Ok(());
        }
        fs::write(&path, &data)
            .map_err(|e| RenderError::Sink(format!("{}: {}", path.display(), e)))?;
        debug!(tile = %name, bytes = data.len(), "Wrote tile");
        self.written += 1;
        Ok(())
    }
}

/// Keeps tiles in memory, keyed by name.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub tiles: BTreeMap<String, Vec<u8>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tiles.keys().map(String::as_str).collect()
    }
}

impl TileSink for MemorySink {
    fn accept(&mut self, name: String, data: Vec<u8>) -> RenderResult<()> {
        self.tiles.insert(name, data);
        Ok(())
    }
}

/// Message on a tile queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TileMessage {
    Tile { name: String, data: Vec<u8> },
    /// No more tiles; each consumer receives exactly one.
    Shutdown,
}

/// Producer side of a bounded tile queue.
///
/// `accept` blocks while the queue is full, so a slow consumer throttles
/// rendering instead of letting tiles pile up in memory.
#[derive(Debug)]
pub struct QueueSink {
    sender: SyncSender<TileMessage>,
    consumers: usize,
}

impl QueueSink {
    /// A queue holding at most `capacity` tiles, drained by `consumers`
    /// workers sharing the returned receiver.
    pub fn bounded(capacity: usize, consumers: usize) -> (Self, Receiver<TileMessage>) {
        let (sender, receiver) = mpsc::sync_channel(capacity);
        (Self { sender, consumers }, receiver)
    }

    /// Send one `Shutdown` per consumer and close the queue.
    pub fn finish(self) -> RenderResult<()> {
        for _ in 0..self.consumers {
            self.sender
                .send(TileMessage::Shutdown)
                .map_err(|_| RenderError::Sink("tile queue closed".to_string()))?;
        }
        Ok(())
    }
}

impl TileSink for QueueSink {
    fn accept(&mut self, name: String, data: Vec<u8>) -> RenderResult<()> {
        self.sender
            .send(TileMessage::Tile { name, data })
            .map_err(|e| match e.0 {
                TileMessage::Tile { name, .. } => {
                    RenderError::Sink(format!("tile queue closed, dropping {}", name))
                }
                TileMessage::Shutdown => RenderError::Sink("tile queue closed".to_string()),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::thread;

    #[test]
    fn test_directory_sink_skip_existing() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = DirectorySink::new(dir.path().join("tiles")).unwrap();
        sink.accept("a.png".to_string(), vec![1, 2, 3]).unwrap();
        assert_eq!(fs::read(dir.path().join("tiles/a.png")).unwrap(), vec![1, 2, 3]);

        let mut sink = sink.skip_existing(true);
        sink.accept("a.png".to_string(), vec![9]).unwrap();
        assert_eq!(sink.skipped(), 1);
        assert_eq!(fs::read(dir.path().join("tiles/a.png")).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_queue_sink_shutdown_per_consumer() {
        let (mut sink, receiver) = QueueSink::bounded(2, 3);
        let receiver = Arc::new(Mutex::new(receiver));

        let workers: Vec<_> = (0..3)
            .map(|_| {
                let receiver = Arc::clone(&receiver);
                thread::spawn(move || {
                    let mut names = Vec::new();
                    loop {
                        let msg = receiver.lock().unwrap().recv().unwrap();
                        match msg {
                            TileMessage::Tile { name, .. } => names.push(name),
                            TileMessage::Shutdown => return names,
                        }
                    }
                })
            })
            .collect();

        for i in 0..10 {
            sink.accept(format!("t{}.png", i), vec![i as u8]).unwrap();
        }
        sink.finish().unwrap();

        let mut all: Vec<String> = workers
            .into_iter()
            .flat_map(|w| w.join().unwrap())
            .collect();
        all.sort();
        assert_eq!(all.len(), 10);
        assert_eq!(all[0], "t0.png");
    }

    #[test]
    fn test_queue_sink_closed() {
        let (mut sink, receiver) = QueueSink::bounded(1, 1);
        drop(receiver);
        assert!(matches!(
            sink.accept("x.png".to_string(), vec![]),
            Err(RenderError::Sink(_))
        ));
    }
}

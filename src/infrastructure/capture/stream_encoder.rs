//! Timesliced encoder over the capture feed
//!
//! A [`ContainerWriter`] turns drained PCM into container bytes. The
//! encoder drives it from a tokio ticker and forwards every batch to the
//! chunk sink, so the clip grows one timeslice at a time.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::application::ports::{ChunkSink, MediaEncoder, MediaError};

use super::feed::{lock_feed, SharedFeed};

/// Container format fed with 16-bit mono PCM
pub trait ContainerWriter: Send + 'static {
    /// Bytes that open the stream, emitted as the first chunk
    fn begin(&mut self) -> Result<Vec<u8>, MediaError>;

    /// Encode `pcm`, returning whatever container bytes are now complete
    fn append(&mut self, pcm: &[i16]) -> Result<Vec<u8>, MediaError>;

    /// Flush everything still buffered and close the stream
    fn end(&mut self) -> Result<ContainerTail, MediaError>;
}

/// Final output of a [`ContainerWriter`]
#[derive(Debug, Default)]
pub struct ContainerTail {
    pub bytes: Vec<u8>,
    /// Replacement for the opening bytes once the totals are known
    pub header: Option<Vec<u8>>,
}

type SharedWriter = Arc<Mutex<Box<dyn ContainerWriter>>>;

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct StreamEncoder {
    feed: SharedFeed,
    sink: ChunkSink,
    writer: SharedWriter,
    failure: Arc<Mutex<Option<MediaError>>>,
    ticker: Option<JoinHandle<()>>,
    started: bool,
    done: bool,
}

impl StreamEncoder {
    pub fn new(feed: SharedFeed, sink: ChunkSink, writer: Box<dyn ContainerWriter>) -> Self {
        Self {
            feed,
            sink,
            writer: Arc::new(Mutex::new(writer)),
            failure: Arc::new(Mutex::new(None)),
            ticker: None,
            started: false,
            done: false,
        }
    }

    fn stop_ticker(&mut self) -> Option<JoinHandle<()>> {
        let ticker = self.ticker.take();
        if let Some(ticker) = &ticker {
            ticker.abort();
        }
        ticker
    }

    fn flush(&mut self) -> Result<(), MediaError> {
        if let Some(err) = lock(&self.failure).take() {
            return Err(err);
        }
        if !drain(&self.feed, &self.sink, &self.writer)? {
            return Err(MediaError::Internal("chunk sink closed before finish".into()));
        }

        let tail = lock(&self.writer).end()?;
        if !self.sink.push(tail.bytes) {
            return Err(MediaError::Internal("chunk sink closed before finish".into()));
        }
        if let Some(header) = tail.header {
            if !self.sink.overwrite(0, &header) {
                return Err(MediaError::Internal("could not patch container header".into()));
            }
        }
        Ok(())
    }
}

/// Encode pending PCM and move the result into the sink as one chunk.
///
/// The writer lock is held across the push so concurrent drains keep order.
/// Returns `false` once the sink is closed.
fn drain(feed: &SharedFeed, sink: &ChunkSink, writer: &SharedWriter) -> Result<bool, MediaError> {
    let mut writer = lock(writer);
    let pending = lock_feed(feed).take_pending();
    if pending.is_empty() {
        return Ok(!sink.is_closed());
    }
    let bytes = writer.append(&pending)?;
    Ok(sink.push(bytes))
}

#[async_trait]
impl MediaEncoder for StreamEncoder {
    fn start(&mut self, timeslice: Duration) -> Result<(), MediaError> {
        if self.started {
            return Err(MediaError::Internal("encoder already started".into()));
        }
        self.started = true;

        let opening = lock(&self.writer).begin()?;
        if !self.sink.push(opening) {
            return Err(MediaError::Internal("chunk sink is closed".into()));
        }
        lock_feed(&self.feed).set_encoding(true);

        let feed = Arc::clone(&self.feed);
        let sink = self.sink.clone();
        let writer = Arc::clone(&self.writer);
        let failure = Arc::clone(&self.failure);
        self.ticker = Some(tokio::spawn(async move {
            let mut ticker = interval(timeslice);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match drain(&feed, &sink, &writer) {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(e) => {
                        warn!("Encoder stopped: {}", e);
                        lock_feed(&feed).set_encoding(false);
                        *lock(&failure) = Some(e);
                        break;
                    }
                }
            }
        }));

        debug!("Stream encoder started, timeslice {:?}", timeslice);
        Ok(())
    }

    async fn finish(&mut self) -> Result<(), MediaError> {
        if !self.started || self.done {
            return Err(MediaError::Internal("encoder is not running".into()));
        }
        if let Some(ticker) = self.stop_ticker() {
            let _ = ticker.await;
        }

        let flushed = self.flush();
        lock_feed(&self.feed).set_encoding(false);
        self.done = true;
        flushed?;

        debug!("Stream encoder finished with {} bytes", self.sink.byte_len());
        Ok(())
    }

    fn abort(&mut self) {
        self.stop_ticker();
        if !self.done {
            self.done = true;
            lock_feed(&self.feed).set_encoding(false);
        }
    }
}

impl Drop for StreamEncoder {
    fn drop(&mut self) {
        self.abort();
    }
}

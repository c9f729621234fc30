use super::{FileIdentity, LogPosition, PositionChange, TailError};
use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use lobbyscope_types::{LogEncoding, TailerSettings};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};
use tokio::sync::Notify;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;


/// Item delivered by [`LogTailer::next`], in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TailItem {
    /// A complete line with its terminator stripped
    Line(String),
    /// The log was rotated or truncated; reading restarted at the top of the new file
    Rotated,
}

#[derive(Debug, Clone)]
pub struct TailOptions {
    pub poll_interval: Duration,
    pub startup_timeout: Duration,
    pub max_unavailable: Option<Duration>,
    pub watch_filesystem: bool,
    pub encoding: &'static Encoding,
}

impl Default for TailOptions {
    fn default() -> Self {
        Self::from_settings(&TailerSettings::default(), LogEncoding::default())
    }
}

impl TailOptions {
    pub fn from_settings(settings: &TailerSettings, encoding: LogEncoding) -> Self {
        Self {
            poll_interval: settings.poll_interval(),
            startup_timeout: settings.startup_timeout(),
            max_unavailable: settings.max_unavailable(),
            watch_filesystem: settings.watch_filesystem,
            encoding: encoding_for(encoding),
        }
    }
}

pub fn encoding_for(encoding: LogEncoding) -> &'static Encoding {
    match encoding {
        LogEncoding::Utf8 => UTF_8,
        LogEncoding::Windows1252 => WINDOWS_1252,
    }
}

/// Follows a growing log file line by line.
///
/// Survives the file disappearing, being truncated or being replaced, and
/// keeps a partially written last line buffered until its terminator arrives.
/// `next` is not cancellation safe; stop the tailer through its token.
pub struct LogTailer {
    path: PathBuf,
    options: TailOptions,
    position: LogPosition,
    reader: Option<BufReader<File>>,
    buf: Vec<u8>,
    pending_rotation: bool,
    unavailable_since: Option<Instant>,
    cancel: CancellationToken,
    wake: Arc<Notify>,
    watcher: Option<RecommendedWatcher>,
}

impl LogTailer {
    /// Wait (up to `startup_timeout`) for the log file to exist, then prepare to tail it
    /// from the start.
    pub async fn open(
        path: impl Into<PathBuf>,
        options: TailOptions,
        cancel: CancellationToken,
    ) -> Result<Self, TailError> {
        let path = path.into();
        let started = Instant::now();

        loop {
            if cancel.is_cancelled() {
                return Err(TailError::Closed);
            }
            if tokio::fs::metadata(&path)
                .await
                .map(|m| m.is_file())
                .unwrap_or(false)
            {
                break;
            }
            if started.elapsed() >= options.startup_timeout {
                return Err(TailError::NeverAppeared {
                    path,
                    waited: started.elapsed(),
                });
            }
            tokio::select! {
                _ = cancel.cancelled() => return Err(TailError::Closed),
                _ = sleep(options.poll_interval) => {}
            }
        }

        let wake = Arc::new(Notify::new());
        let watcher = if options.watch_filesystem {
            watch_parent(&path, Arc::clone(&wake))
        } else {
            None
        };

        tracing::debug!(path = %path.display(), watching = watcher.is_some(), "Opened log for tailing");

        Ok(Self {
            path,
            options,
            position: LogPosition::default(),
            reader: None,
            buf: Vec::new(),
            pending_rotation: false,
            unavailable_since: None,
            cancel,
            wake,
            watcher,
        })
    }

    /// Resume from a previously obtained position instead of the start of the file.
    pub fn starting_at(mut self, position: LogPosition) -> Self {
        self.position = position;
        self.reader = None;
        self.buf.clear();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn position(&self) -> LogPosition {
        self.position
    }

    /// Wait for the next line (or rotation marker).
    ///
    /// Returns `TailError::Closed` once the cancellation token fires and
    /// `TailError::Unavailable` if the file stays unreadable past `max_unavailable`.
    pub async fn next(&mut self) -> Result<TailItem, TailError> {
        loop {
            if self.cancel.is_cancelled() {
                self.close();
                return Err(TailError::Closed);
            }

            if self.pending_rotation {
                self.pending_rotation = false;
                return Ok(TailItem::Rotated);
            }

            if self.reader.is_none() {
                if !self.reopen().await? {
                    self.wait().await;
                }
                continue;
            }

            match self.read_line().await {
                Ok(Some(line)) => return Ok(TailItem::Line(line)),
                Ok(None) => {
                    if !self.check_rotation().await? {
                        self.wait().await;
                    }
                }
                Err(e) => {
                    self.reader = None;
                    self.unavailable(e)?;
                    self.wait().await;
                }
            }
        }
    }

    /// Release the file handle and filesystem watcher.
    pub fn close(&mut self) {
        self.reader = None;
        self.watcher = None;
        self.buf.clear();
    }

    async fn reopen(&mut self) -> Result<bool, TailError> {
        let file = match File::open(&self.path).await {
            Ok(file) => file,
            Err(e) => return self.unavailable(e).map(|_| false),
        };
        let metadata = match file.metadata().await {
            Ok(metadata) => metadata,
            Err(e) => return self.unavailable(e).map(|_| false),
        };

        let change = self
            .position
            .observe(FileIdentity::of(&metadata), metadata.len());
        if change.is_reset() {
            self.on_reset(change);
        }

        let mut reader = BufReader::new(file);
        if let Err(e) = reader.seek(SeekFrom::Start(self.position.offset())).await {
            return self.unavailable(e).map(|_| false);
        }

        if self.unavailable_since.take().is_some() {
            tracing::info!(path = %self.path.display(), "Log file available again");
        }
        self.reader = Some(reader);
        Ok(true)
    }

    async fn read_line(&mut self) -> std::io::Result<Option<String>> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(None);
        };

        loop {
            let read = reader.read_until(b'\n', &mut self.buf).await?;
            if read == 0 {
                return Ok(None);
            }
            self.position.advance(read as u64);

            // Only emit once the line is complete, otherwise keep the partial data
            if self.buf.last() == Some(&b'\n') {
                let line = decode_line(self.options.encoding, &self.buf);
                self.buf.clear();
                return Ok(Some(line));
            }
        }
    }

    /// At end of data: has the file behind the path been replaced or truncated?
    async fn check_rotation(&mut self) -> Result<bool, TailError> {
        match tokio::fs::metadata(&self.path).await {
            Ok(metadata) => {
                let change = self
                    .position
                    .observe(FileIdentity::of(&metadata), metadata.len());
                if change.is_reset() {
                    self.reader = None;
                    self.on_reset(change);
                    return Ok(true);
                }
                Ok(false)
            }
            Err(e) => {
                // Gone mid-rotation; reopen once it is back
                self.reader = None;
                self.unavailable(e)?;
                Ok(false)
            }
        }
    }

    fn on_reset(&mut self, change: PositionChange) {
        tracing::info!(path = %self.path.display(), ?change, "Log file reset, reading from the start");
        self.buf.clear();
        self.pending_rotation = true;
    }

    fn unavailable(&mut self, source: std::io::Error) -> Result<(), TailError> {
        let since = *self.unavailable_since.get_or_insert_with(Instant::now);
        let waited = since.elapsed();

        if let Some(limit) = self.options.max_unavailable
            && waited >= limit
        {
            return Err(TailError::Unavailable {
                path: self.path.clone(),
                waited,
                source,
            });
        }

        tracing::debug!(path = %self.path.display(), error = %source, "Log file unavailable, retrying");
        Ok(())
    }

    async fn wait(&self) {
        tokio::select! {
            _ = self.cancel.cancelled() => {}
            _ = sleep(self.options.poll_interval) => {}
            _ = self.wake.notified() => {}
        }
    }
}

fn decode_line(encoding: &'static Encoding, raw: &[u8]) -> String {
    let mut bytes = raw;
    if let Some(rest) = bytes.strip_suffix(b"\n") {
        bytes = rest;
    }
    if let Some(rest) = bytes.strip_suffix(b"\r") {
        bytes = rest;
    }
    let (line, _, _) = encoding.decode(bytes);
    line.into_owned()
}

/// Watch the log's directory so writes wake the tailer before the next poll.
fn watch_parent(path: &Path, wake: Arc<Notify>) -> Option<RecommendedWatcher> {
    let file_name = path.file_name()?.to_os_string();
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));

    let watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| {
            if let Ok(event) = res
                && !matches!(event.kind, EventKind::Access(_))
                && event
                    .paths
                    .iter()
                    .any(|p| p.file_name() == Some(file_name.as_os_str()))
            {
                wake.notify_one();
            }
        },
        Config::default(),
    );

    let mut watcher = match watcher {
        Ok(watcher) => watcher,
        Err(e) => {
            tracing::debug!(error = %e, "Filesystem watcher unavailable, polling only");
            return None;
        }
    };

    if let Err(e) = watcher.watch(parent, RecursiveMode::NonRecursive) {
        tracing::debug!(dir = %parent.display(), error = %e, "Failed to watch log directory, polling only");
        return None;
    }

    Some(watcher)
}

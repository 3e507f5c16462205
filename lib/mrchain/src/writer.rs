use crate::constants::{DEFAULT_SINK_FLUSH_BYTES, DEFAULT_SINK_FLUSH_INTERVAL_MS, DEFAULT_SINK_QUEUE_CAP};
use crate::io::open_writer;
use anyhow::{anyhow, Result};
use crossbeam_channel as channel;
use serde::Serialize;
use serde_json::Value;
use std::io::Write;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error};

/// Receives the terminal `(key, value)` pairs of a job.
pub trait Sink<K, V> {
    fn write_pair(&mut self, key: &K, value: &V) -> Result<()>;

    /// Flushes and releases the sink. Errors from background writing surface here.
    fn finish(self) -> Result<()>;

    fn write_all<'a, I>(&mut self, pairs: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a (K, V)>,
        K: 'a,
        V: 'a,
    {
        for (k, v) in pairs {
            self.write_pair(k, v)?;
        }
        Ok(())
    }
}

/// Renders `key: value`. Top-level strings are written bare, everything else as JSON.
pub fn format_line<K: Serialize, V: Serialize>(key: &K, value: &V) -> Result<String> {
    Ok(format!("{}: {}", render(key)?, render(value)?))
}

fn render<T: Serialize>(v: &T) -> Result<String> {
    Ok(match serde_json::to_value(v)? {
        Value::String(s) => s,
        other => other.to_string(),
    })
}

enum WriterMsg {
    Data(Vec<u8>),
    Close,
}

/// Line-oriented file sink. Formatting happens on the caller's thread; a
/// dedicated IO thread batches the bytes and flushes by size or interval.
pub struct TextLineSink {
    tx: channel::Sender<WriterMsg>,
    handle: thread::JoinHandle<Result<u64>>,
    echo: bool,
}

impl TextLineSink {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        Self::with_tuning(
            path,
            DEFAULT_SINK_QUEUE_CAP,
            DEFAULT_SINK_FLUSH_BYTES,
            Duration::from_millis(DEFAULT_SINK_FLUSH_INTERVAL_MS),
        )
    }

    pub fn with_tuning(path: impl AsRef<Path>, queue_cap: usize, flush_bytes: usize, flush_interval: Duration) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut writer = open_writer(&path)?;
        let (tx, rx) = channel::bounded::<WriterMsg>(queue_cap.max(1));
        let handle = thread::Builder::new().name("mrchain-sink".into()).spawn(move || -> Result<u64> {
            let mut buf: Vec<u8> = Vec::with_capacity(flush_bytes);
            let mut written: u64 = 0;
            let mut last_flush = Instant::now();
            loop {
                let timeout = flush_interval.saturating_sub(last_flush.elapsed());
                let closing = match rx.recv_timeout(timeout) {
                    Ok(WriterMsg::Data(bytes)) => {
                        buf.extend_from_slice(&bytes);
                        false
                    }
                    Ok(WriterMsg::Close) => true,
                    Err(channel::RecvTimeoutError::Timeout) => false,
                    // All senders gone without Close: flush what we have.
                    Err(channel::RecvTimeoutError::Disconnected) => true,
                };
                if closing || buf.len() >= flush_bytes || last_flush.elapsed() >= flush_interval {
                    if !buf.is_empty() {
                        writer.write_all(&buf).map_err(|e| {
                            error!("sink write {}: {}", path.display(), e);
                            anyhow!("write {}: {}", path.display(), e)
                        })?;
                        written += buf.len() as u64;
                        buf.clear();
                    }
                    writer.flush()?;
                    last_flush = Instant::now();
                }
                if closing {
                    debug!(path = %path.display(), bytes = written, "sink closed");
                    return Ok(written);
                }
            }
        })?;
        Ok(Self { tx, handle, echo: false })
    }

    /// Also print every line to stdout.
    pub fn echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }
}

impl<K: Serialize, V: Serialize> Sink<K, V> for TextLineSink {
    fn write_pair(&mut self, key: &K, value: &V) -> Result<()> {
        let line = format_line(key, value)?;
        if self.echo {
            println!("{}", line);
        }
        let mut bytes = line.into_bytes();
        bytes.push(b'\n');
        self.tx
            .send(WriterMsg::Data(bytes))
            .map_err(|_| anyhow!("sink writer thread has stopped"))
    }

    fn finish(self) -> Result<()> {
        // A send failure means the thread already exited; join reports why.
        let _ = self.tx.send(WriterMsg::Close);
        match self.handle.join() {
            Ok(res) => res.map(|_| ()),
            Err(_) => Err(anyhow!("sink writer thread panicked")),
        }
    }
}

/// Writes `pairs` to a fresh file at `path` as `key: value` lines.
pub fn write_output<K: Serialize, V: Serialize>(path: impl AsRef<Path>, echo: bool, pairs: &[(K, V)]) -> Result<()> {
    let mut sink = TextLineSink::create(path.as_ref())?.echo(echo);
    Sink::<K, V>::write_all(&mut sink, pairs)?;
    Sink::<K, V>::finish(sink)?;
    debug!(path = %path.as_ref().display(), lines = pairs.len(), "output written");
    Ok(())
}

/// Keeps formatted lines in memory.
#[derive(Default, Debug)]
pub struct VecSink {
    pub lines: Vec<String>,
}

impl<K: Serialize, V: Serialize> Sink<K, V> for VecSink {
    fn write_pair(&mut self, key: &K, value: &V) -> Result<()> {
        self.lines.push(format_line(key, value)?);
        Ok(())
    }

    fn finish(self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_matches_job_output_style() {
        assert_eq!(format_line(&"Frobenius_Norm", &5.0).unwrap(), "Frobenius_Norm: 5.0");
        assert_eq!(format_line(&"2", &vec!["1", "7"]).unwrap(), r#"2: ["1","7"]"#);
        assert_eq!(format_line(&101u32, &"Iris-setosa").unwrap(), "101: Iris-setosa");
    }

    #[test]
    fn text_sink_writes_every_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("result.txt");
        let mut sink = TextLineSink::with_tuning(&path, 2, 8, Duration::from_millis(5)).unwrap();
        let pairs: Vec<(String, u64)> = (0..50).map(|i| (format!("k{}", i), i)).collect();
        Sink::<String, u64>::write_all(&mut sink, &pairs).unwrap();
        Sink::<String, u64>::finish(sink).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 50);
        assert_eq!(lines[0], "k0: 0");
        assert_eq!(lines[49], "k49: 49");
    }
}

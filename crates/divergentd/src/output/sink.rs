use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;

use anyhow::Context;
use anyhow::Result;
use tracing_appender::rolling::RollingFileAppender;
use tracing_appender::rolling::Rotation;

use crate::config::Endpoint;

pub type SharedSink = Arc<Mutex<Sink>>;

/// Line-oriented output for pass-through samples and emitted aggregates.
pub struct Sink {
    writer: Box<dyn Write + Send>,
}

impl Sink {
    pub fn open(endpoint: &Endpoint) -> Result<Self> {
        match endpoint {
            Endpoint::Std => Ok(Self::from_writer(io::stdout())),
            Endpoint::Path(path) => Self::rolling(path),
        }
    }

    pub fn from_writer(writer: impl Write + Send + 'static) -> Self {
        Self {
            writer: Box::new(writer),
        }
    }

    pub fn shared(self) -> SharedSink {
        Arc::new(Mutex::new(self))
    }

    fn rolling(path: &Path) -> Result<Self> {
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let prefix = path
            .file_name()
            .and_then(|name| name.to_str())
            .context("output path has no file name")?;

        let appender = RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix(prefix)
            .max_log_files(3)
            .build(dir)
            .with_context(|| format!("failed to open output file {}", path.display()))?;
        Ok(Self::from_writer(appender))
    }

    /// Writes one line, appending a newline if missing. Empty input is a no-op.
    pub fn write_line(&mut self, line: &str) -> io::Result<()> {
        if line.is_empty() {
            return Ok(());
        }
        self.writer.write_all(line.as_bytes())?;
        if !line.ends_with('\n') {
            self.writer.write_all(b"\n")?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// In-memory writer whose contents stay readable after being moved into a
    /// sink.
    #[derive(Clone, Default)]
    pub(crate) struct SharedBuffer(pub Arc<Mutex<Vec<u8>>>);

    impl SharedBuffer {
        pub(crate) fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_write_line_terminates_lines() {
        let buffer = SharedBuffer::default();
        let mut sink = Sink::from_writer(buffer.clone());
        sink.write_line("a v=1").unwrap();
        sink.write_line("b v=2\n").unwrap();
        sink.write_line("").unwrap();
        sink.flush().unwrap();
        assert_eq!(buffer.contents(), "a v=1\nb v=2\n");
    }

    #[test]
    fn test_rolling_file_sink() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("divergent.lp");
        let mut sink = Sink::open(&Endpoint::Path(path)).unwrap();
        sink.write_line("m v_divergent=1 1").unwrap();
        sink.flush().unwrap();
        drop(sink);

        let written: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect();
        assert_eq!(written.len(), 1);
        let name = written[0].file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("divergent.lp"));
        let content = std::fs::read_to_string(&written[0]).unwrap();
        assert_eq!(content, "m v_divergent=1 1\n");
    }
}

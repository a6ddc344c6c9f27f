use std::{io::Read, path::PathBuf, time::Duration};

use bytes::{Bytes, BytesMut};
use futures::{StreamExt, stream::BoxStream};
use reqwest::Client;
use tokio::runtime::Handle;
use tracing::{debug, instrument};
use url::Url;

use crate::{
    error::TransferError,
    locator::SourceLocator,
    session::{TransferEngine, TransferPoll, TransferSession},
};

/// The default time a pull waits for bytes before checking for cancellation.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// The size of chunks read from local files.
pub const DEFAULT_FILE_CHUNK_SIZE: usize = 64 * 1024;

/// Settings for the HTTP client and for sessions opened by [`HttpEngine`].
#[derive(Debug, Clone)]
pub struct TransferConfig {
    /// Upper bound on a single wait for new bytes.
    pub poll_interval: Duration,
    pub connect_timeout: Duration,
    /// Maximum time between two reads on an open connection.
    pub read_timeout: Duration,
    pub user_agent: String,
    pub file_chunk_size: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            connect_timeout: Duration::from_secs(30),
            read_timeout: Duration::from_secs(5 * 60),
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string(),
            file_chunk_size: DEFAULT_FILE_CHUNK_SIZE,
        }
    }
}

/// Transfer engine for `http`, `https` and `file` locators.
///
/// Sessions are driven from blocking worker threads, the engine keeps a
/// handle to the runtime that performs the actual network I/O.
pub struct HttpEngine {
    client: Client,
    runtime: Handle,
    config: TransferConfig,
}

impl HttpEngine {
    /// Builds the shared HTTP client.
    pub fn new(config: TransferConfig, runtime: Handle) -> Result<Self, TransferError> {
        let client = Client::builder()
            .pool_max_idle_per_host(20)
            .tcp_keepalive(Duration::from_secs(60))
            .user_agent(config.user_agent.clone())
            .connect_timeout(config.connect_timeout)
            .read_timeout(config.read_timeout)
            .build()?;
        Ok(Self::with_client(client, config, runtime))
    }

    /// Uses an already configured client.
    pub fn with_client(client: Client, config: TransferConfig, runtime: Handle) -> Self {
        Self {
            client,
            runtime,
            config,
        }
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    fn open_http(&self, url: &Url) -> Result<HttpSession, TransferError> {
        let response = self
            .runtime
            .block_on(self.client.get(url.clone()).send())?;

        if !response.status().is_success() {
            return Err(TransferError::HttpStatus {
                url: url.clone(),
                status: response.status(),
            });
        }

        let content_length = response.content_length();
        debug!(?content_length, "connected");
        Ok(HttpSession {
            stream: response.bytes_stream().boxed(),
            runtime: self.runtime.clone(),
            content_length,
        })
    }

    fn open_file(&self, url: &Url) -> Result<FileSession, TransferError> {
        let path = url
            .to_file_path()
            .map_err(|()| TransferError::InvalidLocator {
                locator: url.to_string(),
                reason: "not a local file path".to_string(),
            })?;
        FileSession::open(path, self.config.file_chunk_size)
    }
}

impl TransferEngine for HttpEngine {
    type Session = RemoteSession;

    #[instrument(skip(self), fields(url = %locator.url()))]
    fn open(&self, locator: &SourceLocator) -> Result<RemoteSession, TransferError> {
        let url = locator.url();
        match url.scheme() {
            "http" | "https" => self.open_http(url).map(RemoteSession::Http),
            "file" => self.open_file(url).map(RemoteSession::File),
            scheme => Err(TransferError::UnsupportedScheme {
                url: url.clone(),
                scheme: scheme.to_string(),
            }),
        }
    }
}

/// Session opened by [`HttpEngine`].
pub enum RemoteSession {
    Http(HttpSession),
    File(FileSession),
}

impl TransferSession for RemoteSession {
    fn poll_chunk(&mut self, wait: Duration) -> Result<TransferPoll, TransferError> {
        match self {
            RemoteSession::Http(session) => session.poll_chunk(wait),
            RemoteSession::File(session) => session.poll_chunk(wait),
        }
    }

    fn content_length(&self) -> Option<u64> {
        match self {
            RemoteSession::Http(session) => session.content_length(),
            RemoteSession::File(session) => session.content_length(),
        }
    }
}

/// Streams a response body.
pub struct HttpSession {
    stream: BoxStream<'static, reqwest::Result<Bytes>>,
    runtime: Handle,
    content_length: Option<u64>,
}

impl TransferSession for HttpSession {
    fn poll_chunk(&mut self, wait: Duration) -> Result<TransferPoll, TransferError> {
        let next = self
            .runtime
            .block_on(tokio::time::timeout(wait, self.stream.next()));
        match next {
            Err(_elapsed) => Ok(TransferPoll::Idle),
            Ok(None) => Ok(TransferPoll::Finished),
            Ok(Some(Ok(chunk))) => Ok(TransferPoll::Data(chunk)),
            Ok(Some(Err(err))) => Err(err.into()),
        }
    }

    fn content_length(&self) -> Option<u64> {
        self.content_length
    }
}

/// Reads a local file in fixed size chunks.
pub struct FileSession {
    file: fs_err::File,
    chunk_size: usize,
    len: Option<u64>,
}

impl FileSession {
    pub fn open(path: impl Into<PathBuf>, chunk_size: usize) -> Result<Self, TransferError> {
        let file = fs_err::File::open(path.into())?;
        let len = file.metadata().ok().map(|metadata| metadata.len());
        Ok(Self {
            file,
            chunk_size: chunk_size.max(1),
            len,
        })
    }
}

impl TransferSession for FileSession {
    fn poll_chunk(&mut self, _wait: Duration) -> Result<TransferPoll, TransferError> {
        let mut chunk = BytesMut::zeroed(self.chunk_size);
        let read = loop {
            match self.file.read(&mut chunk) {
                Ok(read) => break read,
                Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            }
        };
        if read == 0 {
            return Ok(TransferPoll::Finished);
        }
        chunk.truncate(read);
        Ok(TransferPoll::Data(chunk.freeze()))
    }

    fn content_length(&self) -> Option<u64> {
        self.len
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::{FileSession, TransferPoll, TransferSession};

    #[test]
    fn file_session_reads_in_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        fs_err::write(&path, b"abcdefg").unwrap();

        let mut session = FileSession::open(&path, 3).unwrap();
        assert_eq!(session.content_length(), Some(7));

        let mut chunks = Vec::new();
        loop {
            match session.poll_chunk(Duration::ZERO).unwrap() {
                TransferPoll::Data(chunk) => chunks.push(chunk.to_vec()),
                TransferPoll::Finished => break,
                TransferPoll::Idle => unreachable!("local files are never idle"),
            }
        }
        assert_eq!(chunks, vec![b"abc".to_vec(), b"def".to_vec(), b"g".to_vec()]);
    }

    #[test]
    fn missing_file_fails_to_open() {
        let dir = tempfile::tempdir().unwrap();
        assert!(FileSession::open(dir.path().join("missing.tar"), 16).is_err());
    }
}

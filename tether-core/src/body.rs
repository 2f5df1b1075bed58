//! Outgoing request bodies.

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use parking_lot::Mutex;
use std::fmt;
use std::io;
use std::pin::Pin;
use std::sync::Arc;

/// Boxed byte stream accepted as a request body.
pub type BoxStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send + Sync>>;

/// Request body: nothing, an in-memory buffer, or a one-shot stream.
///
/// Cloning a streaming body shares the underlying stream, which can be
/// consumed once. Call [`Body::buffer`] first when the body must be read
/// more than once.
#[derive(Clone, Default)]
pub enum Body {
    /// No body.
    #[default]
    Empty,
    /// Fully buffered body.
    Bytes(Bytes),
    /// Streaming body of unknown length.
    Stream(SharedStream),
}

/// Take-once handle over a boxed stream.
#[derive(Clone)]
pub struct SharedStream(Arc<Mutex<Option<BoxStream>>>);

impl SharedStream {
    fn new(stream: BoxStream) -> Self {
        Self(Arc::new(Mutex::new(Some(stream))))
    }

    /// Take the stream out, leaving the handle consumed.
    pub fn take(&self) -> Option<BoxStream> {
        self.0.lock().take()
    }

    /// Check if the stream was already taken.
    pub fn is_consumed(&self) -> bool {
        self.0.lock().is_none()
    }
}

impl Body {
    /// Create an empty body.
    pub fn empty() -> Self {
        Self::Empty
    }

    /// Create a body from a byte stream.
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = io::Result<Bytes>> + Send + Sync + 'static,
    {
        Self::Stream(SharedStream::new(Box::pin(stream)))
    }

    /// Known length of the body, `None` for streams.
    pub fn len(&self) -> Option<u64> {
        match self {
            Self::Empty => Some(0),
            Self::Bytes(bytes) => Some(bytes.len() as u64),
            Self::Stream(_) => None,
        }
    }

    /// Check if the body is known to be empty.
    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }

    /// Borrow the buffered bytes, if the body is in memory.
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Self::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Read the whole body into memory.
    ///
    /// Fails if the stream yields an error or was already consumed.
    pub async fn collect(self) -> io::Result<Bytes> {
        match self {
            Self::Empty => Ok(Bytes::new()),
            Self::Bytes(bytes) => Ok(bytes),
            Self::Stream(shared) => {
                let mut stream = shared.take().ok_or_else(|| {
                    io::Error::new(io::ErrorKind::UnexpectedEof, "body stream already consumed")
                })?;
                let mut buf = BytesMut::new();
                while let Some(chunk) = stream.next().await {
                    buf.extend_from_slice(&chunk?);
                }
                Ok(buf.freeze())
            }
        }
    }

    /// Buffer the body in place and return the bytes.
    ///
    /// After this call the body is [`Body::Bytes`] and can be replayed.
    pub async fn buffer(&mut self) -> io::Result<Bytes> {
        let bytes = std::mem::take(self).collect().await?;
        *self = Self::Bytes(bytes.clone());
        Ok(bytes)
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        if bytes.is_empty() {
            Self::Empty
        } else {
            Self::Bytes(bytes)
        }
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Bytes::from(bytes).into()
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Bytes::from(text).into()
    }
}

impl From<&'static str> for Body {
    fn from(text: &'static str) -> Self {
        Bytes::from_static(text.as_bytes()).into()
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("Body::Empty"),
            Self::Bytes(bytes) => f.debug_tuple("Body::Bytes").field(&bytes.len()).finish(),
            Self::Stream(shared) => f
                .debug_struct("Body::Stream")
                .field("consumed", &shared.is_consumed())
                .finish(),
        }
    }
}

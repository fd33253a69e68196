use std::future::Future;
use std::pin::Pin;

use tokio::sync::mpsc;

use super::{Connector, TransportParts, TransportReceiver, TransportSender};
use crate::error::{Error, Result};

/// Connector backed by in-process channels.
///
/// Every [`connect`](Connector::connect) yields a [`MemoryPeer`] on the paired
/// [`MemoryListener`]; the peer plays the server side of that connection.
/// Connecting fails once the listener is dropped.
#[derive(Debug, Clone)]
pub struct MemoryConnector {
	accept_tx: mpsc::UnboundedSender<MemoryPeer>,
}

impl MemoryConnector {
	pub fn new() -> (Self, MemoryListener) {
		let (accept_tx, accept_rx) = mpsc::unbounded_channel();
		(Self { accept_tx }, MemoryListener { accept_rx })
	}
}

impl Connector for MemoryConnector {
	fn connect<'a>(
		&'a self,
		url: &'a str,
	) -> Pin<Box<dyn Future<Output = Result<TransportParts>> + Send + 'a>> {
		Box::pin(async move {
			let (to_server, from_client) = mpsc::unbounded_channel();
			let (to_client, from_server) = mpsc::unbounded_channel();

			let peer = MemoryPeer {
				tx: Some(to_client),
				rx: from_client,
			};
			self.accept_tx
				.send(peer)
				.map_err(|_| Error::Transport(format!("connection to {url} refused")))?;

			Ok(TransportParts {
				sender: Box::new(MemorySender { tx: Some(to_server) }),
				receiver: Box::new(MemoryReceiver { rx: from_server }),
			})
		})
	}
}

/// Accepting side of a [`MemoryConnector`].
#[derive(Debug)]
pub struct MemoryListener {
	accept_rx: mpsc::UnboundedReceiver<MemoryPeer>,
}

impl MemoryListener {
	/// Waits for the next client connection.
	pub async fn accept(&mut self) -> Option<MemoryPeer> {
		self.accept_rx.recv().await
	}
}

/// Server side of one in-memory connection.
#[derive(Debug)]
pub struct MemoryPeer {
	tx: Option<mpsc::UnboundedSender<String>>,
	rx: mpsc::UnboundedReceiver<String>,
}

impl MemoryPeer {
	/// Sends a message to the client. Returns false if the client is gone.
	pub fn send(&self, text: impl Into<String>) -> bool {
		self.tx.as_ref().is_some_and(|tx| tx.send(text.into()).is_ok())
	}

	/// Next message from the client, `None` once the client closed.
	pub async fn recv(&mut self) -> Option<String> {
		self.rx.recv().await
	}

	/// Drops the server-to-client direction; the client observes a close.
	pub fn close(&mut self) {
		self.tx = None;
	}
}

struct MemorySender {
	tx: Option<mpsc::UnboundedSender<String>>,
}

impl TransportSender for MemorySender {
	fn send(&mut self, text: String) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
		Box::pin(async move {
			let tx = self
				.tx
				.as_ref()
				.ok_or_else(|| Error::Transport("send on closed connection".to_string()))?;
			tx.send(text)
				.map_err(|_| Error::Transport("peer went away".to_string()))
		})
	}

	fn close(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
		Box::pin(async move {
			self.tx = None;
			Ok(())
		})
	}
}

struct MemoryReceiver {
	rx: mpsc::UnboundedReceiver<String>,
}

impl TransportReceiver for MemoryReceiver {
	fn recv(&mut self) -> Pin<Box<dyn Future<Output = Option<Result<String>>> + Send + '_>> {
		Box::pin(async move { self.rx.recv().await.map(Ok) })
	}
}

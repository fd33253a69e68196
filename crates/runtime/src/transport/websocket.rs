use std::future::Future;
use std::pin::Pin;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use super::{Connector, TransportParts, TransportReceiver, TransportSender};
use crate::error::{Error, Result};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connects over `ws://` or `wss://` (rustls with webpki roots).
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

impl Connector for WebSocketConnector {
	fn connect<'a>(
		&'a self,
		url: &'a str,
	) -> Pin<Box<dyn Future<Output = Result<TransportParts>> + Send + 'a>> {
		Box::pin(async move {
			tracing::debug!(%url, "Opening websocket");
			let (stream, response) = connect_async(url)
				.await
				.map_err(|e| Error::Transport(format!("connect to {url} failed: {e}")))?;
			tracing::debug!(status = %response.status(), "Websocket upgraded");

			let (sink, stream) = stream.split();
			Ok(TransportParts {
				sender: Box::new(WebSocketSender { sink }),
				receiver: Box::new(WebSocketReceiver { stream }),
			})
		})
	}
}

/// Writing half of a websocket connection.
pub struct WebSocketSender {
	sink: SplitSink<WsStream, Message>,
}

impl TransportSender for WebSocketSender {
	fn send(&mut self, text: String) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
		Box::pin(async move {
			self.sink.send(Message::Text(text)).await?;
			Ok(())
		})
	}

	fn close(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
		Box::pin(async move {
			self.sink.close().await?;
			Ok(())
		})
	}
}

/// Reading half of a websocket connection.
///
/// Control frames are consumed here; pings are answered by tungstenite.
pub struct WebSocketReceiver {
	stream: SplitStream<WsStream>,
}

impl TransportReceiver for WebSocketReceiver {
	fn recv(&mut self) -> Pin<Box<dyn Future<Output = Option<Result<String>>> + Send + '_>> {
		Box::pin(async move {
			loop {
				match self.stream.next().await? {
					Ok(Message::Text(text)) => return Some(Ok(text)),
					Ok(Message::Binary(bytes)) => {
						return Some(Ok(String::from_utf8_lossy(&bytes).into_owned()));
					}
					Ok(Message::Close(frame)) => {
						tracing::debug!(?frame, "Websocket closed by peer");
						return None;
					}
					Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => continue,
					Err(e) => return Some(Err(e.into())),
				}
			}
		})
	}
}

//! WebSocket sessions: one per connected client.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use tracing::{debug, warn};

use crate::engine::Engine;
use crate::multiplexer::ClientHandle;

pub(crate) async fn upgrade(ws: WebSocketUpgrade, State(engine): State<Arc<Engine>>) -> Response {
  ws.on_upgrade(move |socket| run_session(socket, engine))
}

/// Pumps outbound text from the client's handle into the socket and feeds inbound text
/// frames to the control handler until the client goes away.
async fn run_session(socket: WebSocket, engine: Arc<Engine>) {
  let (mut sink, mut stream) = socket.split();
  let (client, mut outbox) = ClientHandle::channel();

  let writer = tokio::spawn(async move {
    while let Some(text) = outbox.recv().await {
      if sink.send(Message::Text(text)).await.is_err() {
        break;
      }
    }
  });

  let handler = engine.handler();
  if let Err(e) = handler.on_connect(&client).await {
    warn!(connection = %client.id(), error = %e, "failed to enroll client");
  }

  while let Some(frame) = stream.next().await {
    match frame {
      Ok(Message::Text(text)) => {
        if let Err(e) = handler.handle_text(&client, &text).await {
          warn!(connection = %client.id(), error = %e, "message handling failed");
        }
      }
      Ok(Message::Close(_)) => break,
      Ok(_) => {}
      Err(e) => {
        debug!(connection = %client.id(), error = %e, "socket error");
        break;
      }
    }
  }

  handler.on_disconnect(&client).await;
  writer.abort();
}

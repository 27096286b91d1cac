//! WebSocket transport for hub sessions

use async_trait::async_trait;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
    routing::get,
    Router,
};
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use tracing::debug;

use crate::error::Result;
use crate::websocket::envelope::UpdateEnvelope;
use crate::websocket::hub::EventHub;
use crate::websocket::session::{EnvelopeSink, Session};

/// Writes envelopes as JSON text frames.
pub struct WsSink {
    sender: SplitSink<WebSocket, Message>,
}

#[async_trait]
impl EnvelopeSink for WsSink {
    async fn deliver(&mut self, envelope: &UpdateEnvelope) -> Result<()> {
        let json = envelope.to_json()?;
        self.sender.send(Message::Text(json)).await?;
        Ok(())
    }

    async fn close(&mut self) {
        let _ = self.sender.close().await;
    }
}

pub fn routes(hub: EventHub) -> Router {
    Router::new()
        .route("/ws", get(handle_connection))
        .with_state(hub)
}

async fn handle_connection(ws: WebSocketUpgrade, State(hub): State<EventHub>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, hub))
}

async fn handle_socket(socket: WebSocket, hub: EventHub) {
    let (sender, mut receiver) = socket.split();

    let session = match Session::open(&hub, WsSink { sender }).await {
        Ok(session) => session,
        Err(e) => {
            debug!("Rejecting websocket client: {}", e);
            return;
        }
    };

    // Inbound frames carry nothing the hub needs; the read half only
    // tells us when the client goes away.
    let client_gone = async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Close(_)) | Err(_) => break,
                Ok(_) => {}
            }
        }
    };

    session.run_until(client_gone).await;
}

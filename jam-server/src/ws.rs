use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    response::Response,
};
use futures_util::{future, SinkExt, StreamExt};
use jam_core::{Client, Frame};
use log::info;

use crate::{auth::Identity, errors::ServerResult, ServerContext};

/// Upgrades to a websocket that receives every notification of a jam.
pub async fn connect(
    Identity(identity): Identity,
    State(context): State<ServerContext>,
    Path(label): Path<String>,
    upgrade: WebSocketUpgrade,
) -> ServerResult<Response> {
    let session = context.session(&label)?;
    let client = session.connect(&identity)?;

    info!("{} subscribed to jam {}", identity, session.label());

    Ok(upgrade.on_upgrade(move |socket| serve(client, socket)))
}

async fn serve(client: Client, socket: WebSocket) {
    let (sink, stream) = socket.split();

    let sink = sink.with(|frame: Frame| future::ready(Ok::<_, axum::Error>(to_message(frame))));
    let stream = stream.filter_map(|message| future::ready(from_message(message)));

    client.run(sink, stream).await;
}

fn to_message(frame: Frame) -> Message {
    match frame {
        Frame::Text(text) => Message::Text(text),
        Frame::Ping(payload) => Message::Ping(payload),
        Frame::Pong(payload) => Message::Pong(payload),
        Frame::Close => Message::Close(None),
    }
}

/// Binary frames carry nothing a jam understands, so they are skipped.
fn from_message(message: Result<Message, axum::Error>) -> Option<Result<Frame, axum::Error>> {
    let frame = match message {
        Ok(Message::Text(text)) => Frame::Text(text),
        Ok(Message::Ping(payload)) => Frame::Ping(payload),
        Ok(Message::Pong(payload)) => Frame::Pong(payload),
        Ok(Message::Close(_)) => Frame::Close,
        Ok(Message::Binary(_)) => return None,
        Err(e) => return Some(Err(e)),
    };

    Some(Ok(frame))
}

#![allow(dead_code)]

use serde::{Serialize, de::DeserializeOwned};
use tabletop_protocol::{JsonCodec, PlayerId, SystemMessage};
use tabletop_room::{GameCatalog, RoomManager, RoomOutbound, SeatRequest};
use tabletop_transport::ConnectionId;
use tokio::sync::mpsc;

pub fn manager() -> RoomManager<JsonCodec> {
    let mut catalog = GameCatalog::new();
    tabletop_games::register_all(&mut catalog);
    RoomManager::new(catalog, JsonCodec)
}

pub fn pid(id: &str) -> PlayerId {
    PlayerId::new(id)
}

pub fn player(id: &str, conn: u64) -> (SeatRequest, mpsc::UnboundedReceiver<RoomOutbound>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let request = SeatRequest {
        player_id: pid(id),
        name: id.to_string(),
        connection: ConnectionId::new(conn),
        sender: tx,
    };
    (request, rx)
}

pub fn encode<T: Serialize>(value: &T) -> Vec<u8> {
    serde_json::to_vec(value).unwrap()
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> T {
    serde_json::from_slice(bytes).unwrap()
}

pub fn drain(rx: &mut mpsc::UnboundedReceiver<RoomOutbound>) -> Vec<RoomOutbound> {
    let mut out = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        out.push(msg);
    }
    out
}

pub fn notices(msgs: &[RoomOutbound]) -> Vec<SystemMessage> {
    msgs.iter()
        .filter_map(|m| match m {
            RoomOutbound::System(sys) => Some(sys.clone()),
            RoomOutbound::Game(_) => None,
        })
        .collect()
}

pub fn events<E: DeserializeOwned>(msgs: &[RoomOutbound]) -> Vec<E> {
    msgs.iter()
        .filter_map(|m| match m {
            RoomOutbound::Game(frame) => Some(decode(&frame.data)),
            RoomOutbound::System(_) => None,
        })
        .collect()
}

pub async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}

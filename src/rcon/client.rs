//! A Squad RCON connection: Source RCON commands plus a background task
//! that collects the chat packets the server streams at us, so no message
//! is lost while the voter sleeps through a listening window.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use lazy_static::lazy_static;
use log::{debug, warn};
use regex::Regex;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};

use crate::error::{Error, Result};
use crate::models::{PlayerChat, PlayerChatMap};
use crate::rcon::packet::{
    Packet, AUTH_FAILED_ID, SERVERDATA_AUTH, SERVERDATA_AUTH_RESPONSE, SERVERDATA_EXECCOMMAND,
    SQUAD_CHAT_STREAM,
};
use crate::rcon::RconClient;

lazy_static! {
    /// A Squad chat line, e.g.
    /// `[ChatAll] [SteamID:76561198012345678] Some Player : hello there`.
    static ref CHAT_LINE: Regex =
        Regex::new(r"\[SteamID:(\w+)\]\s*(.*?)\s*:\s*(.*)").unwrap();
}

pub struct SquadRcon {
    writer: Mutex<OwnedWriteHalf>,
    responses: Mutex<mpsc::UnboundedReceiver<Packet>>,
    player_chat: Arc<Mutex<PlayerChatMap>>,
    next_id: AtomicI32,
}

impl SquadRcon {
    /// Connects to the server, authenticates, and spawns the chat
    /// collector task.
    pub async fn connect(address: &str, password: &str) -> Result<Self> {
        let mut stream = TcpStream::connect(address).await?;
        authenticate(&mut stream, password).await?;

        let (mut read_half, writer) = stream.into_split();
        let (response_tx, response_rx) = mpsc::unbounded_channel();
        let player_chat = Arc::new(Mutex::new(PlayerChatMap::new()));

        let chat_handle = Arc::clone(&player_chat);
        tokio::spawn(async move {
            if let Err(e) = collect_packets(&mut read_half, response_tx, chat_handle).await {
                warn!("RCON reader task stopped: {}", e);
            }
        });

        Ok(Self {
            writer: Mutex::new(writer),
            responses: Mutex::new(response_rx),
            player_chat,
            next_id: AtomicI32::new(1),
        })
    }
}

#[async_trait]
impl RconClient for SquadRcon {
    async fn exec_command(&self, command: &str) -> Result<String> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let packet = Packet::new(id, SERVERDATA_EXECCOMMAND, command);
        self.writer.lock().await.write_all(&packet.encode()).await?;

        // The poll loop only ever has one command in flight, but skip any
        // stale responses just in case.
        let mut responses = self.responses.lock().await;
        loop {
            let response = responses.recv().await.ok_or(Error::ConnectionClosed)?;
            if response.id == id {
                return Ok(response.body);
            }
            debug!("Discarding stale RCON response with id {}", response.id);
        }
    }

    async fn get_player_chat(&self) -> PlayerChatMap {
        self.player_chat.lock().await.clone()
    }

    async fn clear_player_chat(&self) {
        self.player_chat.lock().await.clear();
    }
}

async fn authenticate(stream: &mut TcpStream, password: &str) -> Result<()> {
    let auth = Packet::new(0, SERVERDATA_AUTH, password);
    stream.write_all(&auth.encode()).await?;

    // The server may send an empty response value before the auth
    // response proper; read until we see the latter.
    loop {
        let response = Packet::read_from(stream).await?;
        if response.packet_type == SERVERDATA_AUTH_RESPONSE {
            if response.id == AUTH_FAILED_ID {
                return Err(Error::AuthFailed);
            }
            return Ok(());
        }
    }
}

/// Reads packets forever, accumulating chat-stream packets into the shared
/// chat map and forwarding everything else to the pending command call.
async fn collect_packets(
    reader: &mut OwnedReadHalf,
    response_tx: mpsc::UnboundedSender<Packet>,
    player_chat: Arc<Mutex<PlayerChatMap>>,
) -> Result<()> {
    loop {
        let packet = Packet::read_from(reader).await?;
        if packet.packet_type == SQUAD_CHAT_STREAM {
            match parse_chat_line(&packet.body) {
                Some((player_id, player_name, message)) => {
                    let mut chat = player_chat.lock().await;
                    let entry = chat
                        .entry(player_id)
                        .or_insert_with(|| PlayerChat::new(player_name));
                    entry.messages.push(message);
                }
                None => warn!("Ignoring unparseable chat packet: {:?}", packet.body),
            }
        } else if response_tx.send(packet).is_err() {
            // Client dropped; nobody is listening anymore.
            return Ok(());
        }
    }
}

/// Splits a chat line into player id, display name, and message text.
fn parse_chat_line(body: &str) -> Option<(String, String, String)> {
    let captures = CHAT_LINE.captures(body)?;
    Some((
        captures[1].to_string(),
        captures[2].to_string(),
        captures[3].to_string(),
    ))
}

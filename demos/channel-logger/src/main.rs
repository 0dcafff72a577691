//! Joins a chat channel and logs everything said in it, plus whispers and
//! channel notices, until Ctrl-C.
//!
//! ```text
//! channel-logger [ADDR] [CHANNEL] [PASSWORD]
//! ```
//!
//! `EMBERLINK_CONFIG` may point at a JSON [`ClientConfig`].

use emberlink::prelude::*;
use emberlink::systems::chat::Notification;
use futures_util::StreamExt;
use tracing::{info, warn};

const DEFAULT_ADDR: &str = "127.0.0.1:8085";
const DEFAULT_CHANNEL: &str = "world";

// ---------------------------------------------------------------------------
// Arguments
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq)]
struct Args {
    addr: String,
    channel: String,
    password: String,
}

impl Args {
    fn parse(mut args: impl Iterator<Item = String>) -> Self {
        Self {
            addr: args.next().unwrap_or_else(|| DEFAULT_ADDR.to_string()),
            channel: args.next().unwrap_or_else(|| DEFAULT_CHANNEL.to_string()),
            password: args.next().unwrap_or_default(),
        }
    }
}

fn load_config() -> Result<ClientConfig, Box<dyn std::error::Error>> {
    match std::env::var("EMBERLINK_CONFIG") {
        Ok(path) => Ok(ClientConfig::from_json(&std::fs::read_to_string(path)?)?),
        Err(_) => Ok(ClientConfig::default()),
    }
}

// ---------------------------------------------------------------------------
// Formatting
// ---------------------------------------------------------------------------

fn format_line(line: &ChatLine) -> String {
    let who = match &line.sender_name {
        Some(name) => name.clone(),
        None => line.sender.to_string(),
    };
    match (&line.channel, line.chat_type) {
        (Some(channel), _) => format!("[{channel}] {who}: {}", line.text),
        (None, ChatType::Whisper) => format!("{who} whispers: {}", line.text),
        (None, chat_type) => format!("[{chat_type:?}] {who}: {}", line.text),
    }
}

fn format_notification(notification: &Notification) -> String {
    let channel = notification.channel.as_deref().unwrap_or("-");
    format!("{:?} {channel}: {}", notification.kind, notification.text)
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

async fn run<T: Transport>(client: &Client<T>, args: &Args) -> Result<(), EmberlinkError> {
    let chat = client.chat();
    let mut lines = Box::pin(chat.messages());
    let mut notices = Box::pin(chat.notifications());
    let mut errors = Box::pin(chat.errors());

    let cancel = CancellationToken::new();
    chat.join_channel(&args.channel, &args.password, &cancel).await?;
    info!(channel = %args.channel, "joining");

    loop {
        tokio::select! {
            Some(received) = lines.next() => println!("{}", format_line(&received.line)),
            Some(notice) = notices.next() => println!("{}", format_notification(&notice)),
            Some(error) = errors.next() => warn!(error = ?error, "chat error"),
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
            else => break,
        }
    }

    if chat.is_in_channel(&args.channel) {
        chat.leave_channel(&args.channel, &cancel).await?;
    }
    client.dispose();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    emberlink::init_tracing();

    let args = Args::parse(std::env::args().skip(1));
    let config = load_config()?;
    info!(addr = %args.addr, player = config.player, "connecting");

    let client = ClientBuilder::new().config(config).connect(&args.addr).await?;
    run(&client, &args).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use emberlink::protocol::{opcodes, ServerPacket};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    #[test]
    fn test_args_defaults() {
        let args = Args::parse(std::iter::empty());
        assert_eq!(args.addr, DEFAULT_ADDR);
        assert_eq!(args.channel, DEFAULT_CHANNEL);
        assert!(args.password.is_empty());
    }

    #[test]
    fn test_args_positional() {
        let args = Args::parse(["10.0.0.1:3724", "Trade", "pw"].map(String::from).into_iter());
        assert_eq!(
            args,
            Args {
                addr: "10.0.0.1:3724".into(),
                channel: "Trade".into(),
                password: "pw".into(),
            }
        );
    }

    #[test]
    fn test_format_channel_line() {
        let mut line = ChatLine::new(ChatType::Channel, Guid(5), "wts sword");
        line.channel = Some("Trade".into());
        line.sender_name = Some("Bob".into());
        assert_eq!(format_line(&line), "[Trade] Bob: wts sword");
    }

    #[test]
    fn test_format_whisper_without_name() {
        let line = ChatLine::new(ChatType::Whisper, Guid(5), "psst");
        assert_eq!(format_line(&line), format!("{} whispers: psst", Guid(5)));
    }

    #[tokio::test]
    async fn test_join_goes_out_and_lines_come_back() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let client = ClientBuilder::new().player(Guid(1)).connect(&addr).await.unwrap();
        let (mut server, _) = listener.accept().await.unwrap();
        let mut lines = Box::pin(client.chat().messages());

        client
            .chat()
            .join_channel("world", "", &CancellationToken::new())
            .await
            .unwrap();

        // client → server: u16 size (BE) | u32 opcode (LE) | payload
        let size = server.read_u16().await.unwrap();
        let opcode = server.read_u32_le().await.unwrap();
        let mut payload = vec![0; usize::from(size) - 4];
        server.read_exact(&mut payload).await.unwrap();
        assert_eq!(opcode, u32::from(opcodes::CMSG_JOIN_CHANNEL.0));

        let mut line = ChatLine::new(ChatType::Channel, Guid(9), "hello world");
        line.channel = Some("world".into());
        let body = line.encode();
        server.write_u16(2 + body.len() as u16).await.unwrap();
        server.write_u16_le(opcodes::SMSG_MESSAGECHAT.0).await.unwrap();
        server.write_all(&body).await.unwrap();

        let received = tokio::time::timeout(Duration::from_secs(5), lines.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received.line.text, "hello world");
        assert_eq!(received.line.channel.as_deref(), Some("world"));
    }
}

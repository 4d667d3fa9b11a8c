// Interactive client: login handshake, listener task, menu loop
//
// The client side of the rendezvous: it creates and owns its outbound
// channel (named after the user), writes requests to the broker's
// shared inbound channel, and runs two concurrent tasks after login,
// one listening for pushed messages and one driving the menu. The
// broker never depends on any of this; it is glue around the wire
// protocol.

use crate::cli::DEFAULT_INBOUND;
use crate::protocol::{self, LOGIN_OK, LOGOUT_SENTINEL, SEPARATOR};
use crate::registry::outbound_channel_name;
use crate::transport::{LineReader, SharedTransport};
use anyhow::{Context, Result};
use std::io::Write as _;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::mpsc;
use uuid::Uuid;

const LOGIN_ATTEMPTS: u32 = 3;

type StdinLines = Lines<BufReader<Stdin>>;

/// Run the interactive client until logout or server shutdown.
pub async fn run(transport: SharedTransport, username: &str) -> Result<()> {
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    let channel = outbound_channel_name(username);
    transport
        .create(&channel)
        .await
        .with_context(|| format!("failed to create channel {:?}", channel))?;
    let mut reader = transport
        .open_reader(&channel)
        .await
        .with_context(|| format!("failed to open channel {:?}", channel))?;

    if !login(&transport, username, &mut reader, &mut stdin).await? {
        transport.destroy(&channel).await?;
        println!("Access denied.");
        return Ok(());
    }

    // Listener task: renders pushed messages and turns the logout
    // sentinel into a terminate signal for the menu loop.
    let (exit_tx, mut exit_rx) = mpsc::unbounded_channel();
    let listener_transport = transport.clone();
    let listener_channel = channel.clone();
    let listener = tokio::spawn(async move {
        listen(listener_transport, listener_channel, reader, exit_tx).await;
    });

    menu_loop(&transport, username, &mut stdin, &mut exit_rx).await?;

    listener
        .await
        .context("listener task failed")?;
    Ok(())
}

/// Password prompt with up to three attempts, as in the original
/// client. Returns whether a session was established.
async fn login(
    transport: &SharedTransport,
    username: &str,
    reader: &mut Box<dyn LineReader>,
    stdin: &mut StdinLines,
) -> Result<bool> {
    for _ in 0..LOGIN_ATTEMPTS {
        let password = prompt(stdin, "Password: ").await?;

        send_request(transport, &protocol::login_request(username, &password)).await?;

        let reply = reader
            .read_line()
            .await?
            .context("broker closed the channel during login")?;

        if reply == LOGIN_OK {
            println!("Login OK.");
            return Ok(true);
        }
        println!("{reply}");
        println!("Try again.");
    }
    Ok(false)
}

/// Read the user's own channel until the logout sentinel arrives.
async fn listen(
    transport: SharedTransport,
    channel: String,
    mut reader: Box<dyn LineReader>,
    exit_tx: mpsc::UnboundedSender<()>,
) {
    loop {
        match reader.read_line().await {
            Ok(Some(line)) if line == LOGOUT_SENTINEL => {
                println!("Exiting...");
                break;
            }
            Ok(Some(line)) => {
                println!("{line}");
            }
            Ok(None) => break,
            Err(e) => {
                tracing::error!("error reading channel {:?}: {}", channel, e);
                break;
            }
        }
    }

    // The channel belongs to this client, so it cleans it up.
    if let Err(e) = transport.destroy(&channel).await {
        tracing::warn!("failed to remove channel {:?}: {}", channel, e);
    }
    let _ = exit_tx.send(());
}

async fn menu_loop(
    transport: &SharedTransport,
    username: &str,
    stdin: &mut StdinLines,
    exit_rx: &mut mpsc::UnboundedReceiver<()>,
) -> Result<()> {
    loop {
        println!("Choose an option (Press [1-3]):");
        println!("1 - Display online users");
        println!("2 - Send message to username");
        println!("3 - Quit");

        let choice = tokio::select! {
            line = stdin.next_line() => {
                match line.context("failed to read stdin")? {
                    Some(line) => line,
                    None => {
                        // stdin closed: leave cleanly.
                        send_request(transport, &protocol::logout_request(username)).await?;
                        break;
                    }
                }
            }
            _ = exit_rx.recv() => break,
        };

        match choice.trim() {
            "1" => query_online(transport).await?,
            "2" => query_send_message(transport, username, stdin).await?,
            "3" => {
                send_request(transport, &protocol::logout_request(username)).await?;
                // Wait for the sentinel to come back through the listener.
                let _ = exit_rx.recv().await;
                break;
            }
            _ => println!("Bad option"),
        }
    }
    Ok(())
}

/// Ask for the online-user list through an ephemeral reply channel
/// this client creates, reads once, and destroys.
async fn query_online(transport: &SharedTransport) -> Result<()> {
    let reply_channel = format!("list-{}", Uuid::new_v4());
    transport
        .create(&reply_channel)
        .await
        .with_context(|| format!("failed to create reply channel {:?}", reply_channel))?;
    let mut reader = transport.open_reader(&reply_channel).await?;

    send_request(transport, &protocol::list_request(&reply_channel)).await?;

    if let Some(reply) = reader.read_line().await? {
        for entry in reply.split(SEPARATOR) {
            println!("{entry}");
        }
    }

    drop(reader);
    transport.destroy(&reply_channel).await?;
    Ok(())
}

async fn query_send_message(
    transport: &SharedTransport,
    username: &str,
    stdin: &mut StdinLines,
) -> Result<()> {
    let to = prompt(stdin, "Message send to (write username): ").await?;
    let body = prompt(stdin, "Write message: ").await?;
    send_request(transport, &protocol::message_request(username, &to, &body)).await
}

/// Write one request line to the broker's inbound channel.
async fn send_request(transport: &SharedTransport, line: &str) -> Result<()> {
    let mut writer = transport
        .open_writer(DEFAULT_INBOUND)
        .await
        .context("failed to reach the broker (is it running?)")?;
    writer.write(line).await?;
    Ok(())
}

/// Print a prompt and read one stdin line.
pub async fn prompt(stdin: &mut StdinLines, text: &str) -> Result<String> {
    print!("{text}");
    std::io::stdout().flush().context("failed to flush stdout")?;
    let line = stdin
        .next_line()
        .await
        .context("failed to read stdin")?
        .context("stdin closed")?;
    Ok(line.trim().to_string())
}

//! Interactive console for driving a running node.
//!
//! Commands, one per line, case-insensitive:
//!
//! ```text
//! JOIN <node-id>        join the ring via the named node (your own
//!                       id founds a new ring)
//! LEAVE                 leave the ring (hand neighbours to each other)
//! RINGSTATE             start a diagnostic ring walk
//! INFO                  print the local ring pointers
//! PING <node-id> <msg>  send a liveness probe
//! QUIT                  leave the ring and exit
//! ```

use strand_ring::{NodeHandle, RingError};
use strand_types::NodeId;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

/// Read commands from stdin until EOF or `QUIT`.
pub async fn run(handle: &NodeHandle) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match dispatch(handle, line.trim()).await {
            Ok(Verdict::Continue) => {}
            Ok(Verdict::Quit) => break,
            Err(e) => warn!(%e, "command failed"),
        }
    }
    Ok(())
}

enum Verdict {
    Continue,
    Quit,
}

async fn dispatch(handle: &NodeHandle, line: &str) -> Result<Verdict, RingError> {
    if line.is_empty() {
        return Ok(Verdict::Continue);
    }
    let mut parts = line.splitn(3, char::is_whitespace);
    let command = parts.next().unwrap_or_default().to_ascii_uppercase();
    match command.as_str() {
        "JOIN" => match parts.next() {
            // Joining yourself means founding the ring.
            Some(bootstrap) if bootstrap == handle.id().as_str() => {
                handle.create_ring().await?;
            }
            Some(bootstrap) => handle.join(NodeId::from(bootstrap)).await?,
            None => warn!("usage: JOIN <node-id>"),
        },
        "LEAVE" => handle.leave().await?,
        "RINGSTATE" => handle.ring_walk().await?,
        "INFO" => {
            let snapshot = handle.info().await?;
            info!(
                node = %snapshot.myself.id,
                digest = %snapshot.myself.digest,
                predecessor = %snapshot.predecessor.id,
                successor = %snapshot.successor.id,
                "ring pointers"
            );
        }
        "PING" => match (parts.next(), parts.next()) {
            (Some(dest), Some(text)) => {
                handle.send_ping(NodeId::from(dest), text.to_string()).await?;
            }
            _ => warn!("usage: PING <node-id> <message>"),
        },
        "QUIT" => {
            handle.leave().await?;
            return Ok(Verdict::Quit);
        }
        other => warn!(command = other, "unknown command"),
    }
    Ok(Verdict::Continue)
}

//! Raw-protocol smoke client: joins the server, prints every line it
//! receives, and answers each question with its first option. Useful for
//! poking a running server without the real client.

use futures::{SinkExt, StreamExt};
use shared::{LineCodec, ServerMessage};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::sleep;
use tokio_util::codec::Framed;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let server = std::env::args()
        .nth(1)
        .unwrap_or_else(|| format!("127.0.0.1:{}", shared::DEFAULT_PORT));
    let name = std::env::args()
        .nth(2)
        .unwrap_or_else(|| "smoketest".to_string());

    println!("Connecting to {}", server);
    let socket = TcpStream::connect(&server).await?;
    let mut wire = Framed::new(socket, LineCodec);

    println!("Joining as {}", name);
    wire.send(format!("join:{}", name)).await?;

    while let Some(line) = wire.next().await {
        let line = line?;
        println!("<< {}", line);

        match ServerMessage::parse(&line) {
            Some(ServerMessage::Question { prompt, options }) => {
                // Not trying to be right, just exercising the answer path.
                if let Some(choice) = options.first() {
                    sleep(Duration::from_millis(200)).await;
                    println!(">> answer:{} (for {:?})", choice, prompt);
                    wire.send(format!("answer:{}", choice)).await?;
                }
            }
            Some(ServerMessage::QuizOver(_)) => {
                println!("Quiz over, disconnecting");
                break;
            }
            Some(ServerMessage::Error(reason)) => {
                println!("Rejected by server: {}", reason);
                break;
            }
            Some(_) => {}
            None => println!("(unrecognized line)"),
        }
    }

    println!("Test client finished");
    Ok(())
}

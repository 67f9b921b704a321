//! Interactive question loop.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use baggage_retrieval::RetrievalOrchestrator;

const QUIT_COMMANDS: [&str; 3] = ["quit", "exit", "bye"];

/// How a chat session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatOutcome {
    /// The user typed a quit command.
    Quit,
    /// Input was closed.
    EndOfInput,
}

/// Whether `line` asks to leave the chat.
pub fn is_quit_command(line: &str) -> bool {
    let line = line.trim();
    QUIT_COMMANDS
        .iter()
        .any(|command| line.eq_ignore_ascii_case(command))
}

/// Read questions from `input` and write answers to `output` until the
/// user quits or input ends. Blank lines are ignored.
pub async fn chat_loop<R, W>(
    assistant: &RetrievalOrchestrator,
    input: R,
    mut output: W,
) -> std::io::Result<ChatOutcome>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    output
        .write_all(b"\nAirline Baggage Policy Assistant (type 'quit' to exit)\n")
        .await?;

    let mut lines = input.lines();
    loop {
        output.write_all(b"\nYou: ").await?;
        output.flush().await?;

        let Some(line) = lines.next_line().await? else {
            debug!("Chat input closed");
            return Ok(ChatOutcome::EndOfInput);
        };
        let question = line.trim();
        if is_quit_command(question) {
            return Ok(ChatOutcome::Quit);
        }
        if question.is_empty() {
            continue;
        }

        let answer = assistant.answer(question).await;
        output
            .write_all(format!("Assistant: {answer}\n").as_bytes())
            .await?;
    }
}

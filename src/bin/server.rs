//! Topic chat HTTP server.
//! Run with: cargo run --bin topic-chat-server

use std::process::ExitCode;

use topic_chat::start;

fn main() -> ExitCode {
    start::run()
}

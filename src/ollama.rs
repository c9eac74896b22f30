use reqwest::Client;
use serde::{Deserialize, Serialize};
use anyhow::{Result, anyhow};

use crate::conversation::Turn;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Turn],
    stream: bool,
}

#[derive(Deserialize)]
pub struct ChatChunk {
    #[serde(default)]
    pub message: Option<ChunkMessage>,
    #[serde(default)]
    pub done: bool,
}

#[derive(Deserialize)]
pub struct ChunkMessage {
    pub content: String,
}

#[derive(Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
}

impl OllamaClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.to_string(),
        }
    }

    /// Open one streaming chat request carrying the full conversation.
    /// The caller consumes the response body as NDJSON chunks.
    pub async fn chat_stream(&self, model: &str, turns: &[Turn]) -> Result<reqwest::Response> {
        let url = format!("{}/api/chat", self.base_url);

        let request = ChatRequest {
            model,
            messages: turns,
            stream: true,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "Ollama request failed with status: {}. Make sure Ollama is running with: ollama serve",
                response.status()
            ));
        }

        Ok(response)
    }
}

/// Buffers raw response bytes and yields complete NDJSON lines. Chunk
/// boundaries from the transport land anywhere, including mid-line or in
/// the middle of a multi-byte UTF-8 scalar, so bytes stay buffered as bytes
/// and only complete lines are decoded.
#[derive(Default)]
pub struct LineDecoder {
    buffer: Vec<u8>,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = &line[..line.len() - 1];
            if !line.is_empty() {
                lines.push(String::from_utf8_lossy(line).into_owned());
            }
        }
        lines
    }
}

pub fn parse_chunk(line: &str) -> Result<ChatChunk> {
    let chunk: ChatChunk = serde_json::from_str(line)
        .map_err(|e| anyhow!("malformed chunk from Ollama: {}", e))?;
    Ok(chunk)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Conversation;

    #[test]
    fn request_payload_is_the_snapshot_verbatim() {
        let mut conv = Conversation::new();
        conv.append_user("2+2?");
        conv.append_assistant("4");
        conv.append_user("why?");

        let snapshot = conv.snapshot();
        let request = ChatRequest {
            model: "openhermes:7b-mistral-v2.5-q6_K",
            messages: &snapshot,
            stream: true,
        };
        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&request).unwrap()).unwrap();

        assert_eq!(json["stream"], true);
        let messages = json["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0]["role"], "user");
        assert_eq!(messages[1]["role"], "assistant");
        assert_eq!(messages[2]["content"], "why?");
    }

    #[test]
    fn decoder_handles_split_lines() {
        let mut decoder = LineDecoder::new();
        assert!(decoder.feed(b"{\"done\":fal").is_empty());
        let lines = decoder.feed(b"se}\n{\"done\":true}\n");
        assert_eq!(lines, vec!["{\"done\":false}", "{\"done\":true}"]);
    }

    #[test]
    fn decoder_keeps_codepoints_split_across_chunks_intact() {
        let line = r#"{"message":{"role":"assistant","content":"café"},"done":false}"#;
        let bytes = line.as_bytes();
        // Split inside the two-byte encoding of 'é'
        let cut = line.find('é').unwrap() + 1;

        let mut decoder = LineDecoder::new();
        assert!(decoder.feed(&bytes[..cut]).is_empty());
        let mut rest = bytes[cut..].to_vec();
        rest.push(b'\n');
        let lines = decoder.feed(&rest);
        assert_eq!(lines, vec![line.to_string()]);

        let chunk = parse_chunk(&lines[0]).unwrap();
        assert_eq!(chunk.message.unwrap().content, "café");
    }

    #[test]
    fn decoder_skips_blank_lines_and_keeps_tail() {
        let mut decoder = LineDecoder::new();
        let lines = decoder.feed(b"\n{\"done\":true}\n{\"partial");
        assert_eq!(lines, vec!["{\"done\":true}"]);
        assert_eq!(decoder.feed(b"\":1}\n"), vec!["{\"partial\":1}"]);
    }

    #[test]
    fn parses_content_and_done_chunks() {
        let chunk =
            parse_chunk(r#"{"message":{"role":"assistant","content":"Hel"},"done":false}"#)
                .unwrap();
        assert_eq!(chunk.message.unwrap().content, "Hel");
        assert!(!chunk.done);

        let last = parse_chunk(r#"{"done":true}"#).unwrap();
        assert!(last.message.is_none());
        assert!(last.done);
    }

    #[test]
    fn garbage_lines_are_errors() {
        assert!(parse_chunk("not json").is_err());
    }
}

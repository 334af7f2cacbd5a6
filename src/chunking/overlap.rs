//! Greedy character-budget chunking with carried overlap.

use super::{Chunk, ChunkingConfig};
use crate::transcript::Transcript;
use tracing::debug;

/// Text buffer being accumulated into the next chunk.
struct PendingChunk {
    text: String,
    chars: usize,
    start: f64,
    end: f64,
}

impl PendingChunk {
    fn empty() -> Self {
        Self {
            text: String::new(),
            chars: 0,
            start: 0.0,
            end: 0.0,
        }
    }

    fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Split a transcript into overlapping chunks.
///
/// Segments are appended to a buffer until the next one would push it past
/// `max_chars`; the buffer is then emitted and a new one is seeded with its
/// trailing `overlap_chars` characters. A lone segment longer than `max_chars`
/// is kept whole. Chunk ids are assigned `0..N` in temporal order.
pub fn segment(transcript: &Transcript, config: &ChunkingConfig) -> Vec<Chunk> {
    let mut emitted: Vec<(String, f64, f64)> = Vec::new();
    let mut pending = PendingChunk::empty();

    for seg in &transcript.segments {
        let text = seg.text.trim();
        if text.is_empty() {
            continue;
        }
        let text_chars = text.chars().count();

        if pending.is_empty() {
            pending.text.push_str(text);
            pending.chars = text_chars;
            pending.start = seg.start;
            pending.end = seg.end;
            continue;
        }

        if pending.chars + 1 + text_chars <= config.max_chars {
            pending.text.push(' ');
            pending.text.push_str(text);
            pending.chars += 1 + text_chars;
            pending.end = pending.end.max(seg.end);
            continue;
        }

        let flushed_start = pending.start;
        let flushed_end = pending.end;
        let seeded = join_trimmed(tail_chars(&pending.text, config.overlap_chars), text);
        emitted.push((
            std::mem::take(&mut pending.text),
            flushed_start,
            flushed_end,
        ));

        // Never step back before the chunk just emitted.
        let start = (flushed_end - config.overlap_lookback_seconds)
            .max(flushed_start)
            .max(0.0);

        pending.chars = seeded.chars().count();
        pending.text = seeded;
        pending.start = start;
        pending.end = seg.end.max(start);
    }

    if !pending.is_empty() {
        emitted.push((pending.text, pending.start, pending.end));
    }

    let chunks: Vec<Chunk> = emitted
        .into_iter()
        .enumerate()
        .map(|(i, (text, ts_start, ts_end))| Chunk {
            episode_id: transcript.episode_id.clone(),
            chunk_id: i as u32,
            text,
            ts_start,
            ts_end,
        })
        .collect();

    debug!(
        "Segmented {} into {} chunks ({} segments)",
        transcript.episode_id,
        chunks.len(),
        transcript.segments.len()
    );

    chunks
}

/// The last `n` characters of `text`, or all of it when shorter.
fn tail_chars(text: &str, n: usize) -> &str {
    if n == 0 {
        return "";
    }
    let total = text.chars().count();
    if total <= n {
        return text;
    }
    match text.char_indices().nth(total - n) {
        Some((idx, _)) => &text[idx..],
        None => text,
    }
}

fn join_trimmed(head: &str, tail: &str) -> String {
    let head = head.trim();
    if head.is_empty() {
        tail.trim().to_string()
    } else {
        format!("{} {}", head, tail.trim())
    }
}

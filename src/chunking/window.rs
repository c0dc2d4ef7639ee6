//! Overlapping line windows with a hard character cap.
//!
//! Windows cover the file with no gaps. Each window holds at most
//! `chunk_lines` lines and `max_chars` characters (lines joined with `\n`).
//! A window closes at the furthest structural boundary it contains, else at
//! its line or character budget. Consecutive windows share up to
//! `overlap_lines` lines; the overlap shrinks one line at a time until the
//! next window reaches past the previous one. A single line longer than
//! `max_chars` becomes a run of character pieces with no overlap.

use super::ChunkOutput;
use crate::config::ChunkingConfig;

struct Line<'a> {
    text: &'a str,
    offset: usize,
    chars: usize,
}

fn split_lines(content: &str) -> Vec<Line<'_>> {
    let mut lines = Vec::new();
    let mut offset = 0;
    for raw in content.split_inclusive('\n') {
        let text = raw.strip_suffix('\n').unwrap_or(raw);
        let text = text.strip_suffix('\r').unwrap_or(text);
        lines.push(Line {
            text,
            offset,
            chars: text.chars().count(),
        });
        offset += raw.len();
    }
    lines
}

/// Split `content` into windows. `boundaries` holds sorted exclusive end
/// indices (0-based line index + 1) where a chunk may preferably close.
pub fn split_windows(
    content: &str,
    boundaries: &[usize],
    config: &ChunkingConfig,
) -> Vec<ChunkOutput> {
    let lines = split_lines(content);
    let n = lines.len();
    let chunk_lines = config.chunk_lines.max(1);
    let max_chars = config.max_chars.max(1);

    let mut chunks = Vec::new();
    let mut start = 0usize;
    // Exclusive end of the last emitted chunk
    let mut covered = 0usize;

    while start < n {
        if lines[start].chars > max_chars {
            split_long_line(&lines[start], start, max_chars, &mut chunks);
            start += 1;
            covered = start;
            continue;
        }

        let mut hard_end = start + 1;
        let mut chars = lines[start].chars;
        while hard_end < n && hard_end - start < chunk_lines {
            let next = chars + 1 + lines[hard_end].chars;
            if next > max_chars {
                break;
            }
            chars = next;
            hard_end += 1;
        }

        if hard_end <= covered {
            // No progress within budget: give up one line of overlap
            start += 1;
            continue;
        }

        let end = if hard_end < n {
            let floor = (start + config.overlap_lines).max(covered);
            boundaries
                .iter()
                .rev()
                .find(|&&b| b > floor && b <= hard_end)
                .copied()
                .unwrap_or(hard_end)
        } else {
            hard_end
        };

        chunks.push(make_chunk(&lines, start, end));
        covered = end;
        if end >= n {
            break;
        }

        let overlap = config.overlap_lines.min(end - start - 1);
        start = end - overlap;
    }

    chunks
}

fn split_long_line(line: &Line<'_>, index: usize, max_chars: usize, chunks: &mut Vec<ChunkOutput>) {
    let mut piece_start = 0usize;
    let mut count = 0usize;
    for (byte_idx, _) in line.text.char_indices() {
        if count == max_chars {
            chunks.push(line_piece(line, index, piece_start, byte_idx));
            piece_start = byte_idx;
            count = 0;
        }
        count += 1;
    }
    if piece_start < line.text.len() {
        chunks.push(line_piece(line, index, piece_start, line.text.len()));
    }
}

fn line_piece(line: &Line<'_>, index: usize, from: usize, to: usize) -> ChunkOutput {
    ChunkOutput {
        content: line.text[from..to].to_string(),
        start_line: index + 1,
        end_line: index + 1,
        byte_offset: line.offset + from,
    }
}

/// Build a ChunkOutput from the half-open line range `start..end`.
fn make_chunk(lines: &[Line<'_>], start: usize, end: usize) -> ChunkOutput {
    let content = lines[start..end]
        .iter()
        .map(|l| l.text)
        .collect::<Vec<&str>>()
        .join("\n");

    ChunkOutput {
        content,
        start_line: start + 1, // 1-based
        end_line: end,         // 1-based, inclusive
        byte_offset: lines[start].offset,
    }
}

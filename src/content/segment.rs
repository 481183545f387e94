use crate::content::{BlockBody, BlockKind, ContentBlock};

/// Fallback segmenter: turn raw text into slide-sized content blocks.
///
/// This is the plan of last resort, used when no external content plan is
/// available. It must succeed on any non-blank input: text is split on
/// paragraph breaks, long paragraphs on sentence boundaries, and sentences
/// with no punctuation purely by word count. The resulting slide count is
/// clamped to `[3, max_slides]`.

/// Upper slide-count clamp when the caller does not override it.
pub const DEFAULT_MAX_SLIDES: usize = 15;

/// Lower slide-count clamp.
pub(crate) const MIN_SLIDES: usize = 3;

/// Words a chunk aims for; chunks close once they reach this.
pub(crate) const TARGET_WORDS_PER_SLIDE: usize = 150;

/// Words above which a paragraph is broken into sentence-packed chunks.
pub(crate) const MAX_WORDS_PER_SLIDE: usize = 180;

/// Word cap for the title slide's supporting text.
const TITLE_BODY_WORD_CAP: usize = 60;

/// Segment raw text into between `MIN_SLIDES` and `max_slides` blocks.
///
/// Blank input yields no blocks; the engine rejects that case before
/// segmentation. For everything else this function never fails.
pub fn segment(raw_text: &str, max_slides: usize) -> Vec<ContentBlock> {
    let text = raw_text.trim();
    if text.is_empty() {
        return Vec::new();
    }
    let max_slides = max_slides.max(MIN_SLIDES);

    let mut chunks: Vec<Vec<String>> = Vec::new();
    for paragraph in split_paragraphs(text) {
        let sentences = split_sentences(&paragraph);
        if word_count_all(&sentences) <= MAX_WORDS_PER_SLIDE {
            chunks.push(sentences);
        } else {
            pack_sentences(sentences, &mut chunks);
        }
    }

    // Clamp high: merge the lightest adjacent pair until within range.
    while chunks.len() > max_slides {
        let i = lightest_adjacent_pair(&chunks);
        let tail = chunks.remove(i + 1);
        chunks[i].extend(tail);
    }

    // Clamp low: split the heaviest chunk. Input too small to split any
    // further repeats its final chunk so the count contract still holds.
    while chunks.len() < MIN_SLIDES {
        let i = heaviest_chunk(&chunks);
        match split_chunk(&chunks[i]) {
            Some((head, tail)) => {
                chunks[i] = head;
                chunks.insert(i + 1, tail);
            },
            None => {
                let repeat = chunks[chunks.len() - 1].clone();
                chunks.push(repeat);
            },
        }
    }

    log::debug!("fallback segmenter produced {} blocks", chunks.len());
    build_blocks(chunks)
}

/// Split on blank-line runs; a text without them is one paragraph.
fn split_paragraphs(text: &str) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.trim().is_empty() {
                paragraphs.push(std::mem::take(&mut current));
            }
            current.clear();
        } else {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(line.trim());
        }
    }
    if !current.trim().is_empty() {
        paragraphs.push(current);
    }
    paragraphs
}

/// Split a paragraph into sentences on `.`, `!` and `?` boundaries.
///
/// Sentences that are themselves longer than a slide are split purely by
/// word count, so punctuation-free input still segments.
fn split_sentences(paragraph: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    for ch in paragraph.chars() {
        current.push(ch);
        if matches!(ch, '.' | '!' | '?') {
            let s = current.trim();
            if !s.is_empty() {
                sentences.push(s.to_string());
            }
            current.clear();
        }
    }
    let s = current.trim();
    if !s.is_empty() {
        sentences.push(s.to_string());
    }

    sentences
        .into_iter()
        .flat_map(|s| {
            if s.split_whitespace().count() > MAX_WORDS_PER_SLIDE {
                split_by_words(&s, TARGET_WORDS_PER_SLIDE)
            } else {
                vec![s]
            }
        })
        .collect()
}

/// Break a run of words into pieces of at most `words_per_piece` words.
fn split_by_words(text: &str, words_per_piece: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    words
        .chunks(words_per_piece.max(1))
        .map(|piece| piece.join(" "))
        .collect()
}

/// Pack a sentence list into chunks of roughly the target word count.
fn pack_sentences(sentences: Vec<String>, chunks: &mut Vec<Vec<String>>) {
    let mut current: Vec<String> = Vec::new();
    let mut current_words = 0usize;
    for sentence in sentences {
        let words = sentence.split_whitespace().count();
        if current_words + words > TARGET_WORDS_PER_SLIDE && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_words = 0;
        }
        current_words += words;
        current.push(sentence);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
}

fn word_count_all(sentences: &[String]) -> usize {
    sentences.iter().map(|s| s.split_whitespace().count()).sum()
}

fn heaviest_chunk(chunks: &[Vec<String>]) -> usize {
    let mut best = 0;
    let mut best_words = 0;
    for (i, chunk) in chunks.iter().enumerate() {
        let words = word_count_all(chunk);
        if words > best_words {
            best = i;
            best_words = words;
        }
    }
    best
}

fn lightest_adjacent_pair(chunks: &[Vec<String>]) -> usize {
    let mut best = 0;
    let mut best_words = usize::MAX;
    for i in 0..chunks.len() - 1 {
        let words = word_count_all(&chunks[i]) + word_count_all(&chunks[i + 1]);
        if words < best_words {
            best = i;
            best_words = words;
        }
    }
    best
}

/// Split a chunk roughly in half: at a sentence boundary when it has
/// several sentences, otherwise by words. Single-word chunks cannot split.
fn split_chunk(chunk: &[String]) -> Option<(Vec<String>, Vec<String>)> {
    if chunk.len() >= 2 {
        let mid = chunk.len() / 2;
        return Some((chunk[..mid].to_vec(), chunk[mid..].to_vec()));
    }
    let only = chunk.first()?;
    let words: Vec<&str> = only.split_whitespace().collect();
    if words.len() < 2 {
        return None;
    }
    let mid = words.len() / 2;
    Some((
        vec![words[..mid].join(" ")],
        vec![words[mid..].join(" ")],
    ))
}

/// First chunk becomes the title slide; the rest become bullet slides
/// whose bullets are the chunk's sentences.
fn build_blocks(chunks: Vec<Vec<String>>) -> Vec<ContentBlock> {
    let mut blocks = Vec::with_capacity(chunks.len());
    for (i, chunk) in chunks.into_iter().enumerate() {
        if i == 0 {
            let title = chunk
                .first()
                .map(|s| s.trim_end_matches(['.', '!', '?']).to_string())
                .unwrap_or_default();
            let remainder = chunk[1.min(chunk.len())..].join(" ");
            let body = cap_words(&remainder, TITLE_BODY_WORD_CAP);
            blocks.push(ContentBlock {
                title,
                body: BlockBody::Narrative(body),
                kind: BlockKind::TitleSlide,
                speaker_notes: None,
            });
        } else {
            blocks.push(ContentBlock {
                title: "Key Points".to_string(),
                body: BlockBody::Bullets(chunk),
                kind: BlockKind::Bulleted,
                speaker_notes: None,
            });
        }
    }
    blocks
}

/// Truncate text to a word budget with a visible ellipsis.
fn cap_words(text: &str, cap: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= cap {
        return words.join(" ");
    }
    let mut out = words[..cap].join(" ");
    out.push('…');
    out
}

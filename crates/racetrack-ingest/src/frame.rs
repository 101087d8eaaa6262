//! Splitting a reader's byte stream into tag frames.

use bytes::{Buf as _, BytesMut};
use racetrack_core::participant::normalize_tag;

use crate::config::Framing;

/// A line is longer than the configured limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FrameTooLong;

pub(crate) struct FrameDecoder {
  framing: Framing,
  max_len: usize,
  /// Unterminated tail of the stream (line mode only).
  pending: BytesMut,
}

impl FrameDecoder {
  pub fn new(framing: Framing, max_len: usize) -> Self {
    Self {
      framing,
      max_len,
      pending: BytesMut::new(),
    }
  }

  /// Feed one transport read; returns the tags it completes, in order.
  /// Frames that are empty after trimming are skipped.
  pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<String>, FrameTooLong> {
    match self.framing {
      Framing::Chunk => Ok(decode_tag(chunk).into_iter().collect()),
      Framing::Line => {
        self.pending.extend_from_slice(chunk);
        let mut tags = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
          if pos > self.max_len {
            return Err(FrameTooLong);
          }
          let line = self.pending.split_to(pos);
          self.pending.advance(1);
          tags.extend(decode_tag(&line));
        }
        if self.pending.len() > self.max_len {
          return Err(FrameTooLong);
        }
        Ok(tags)
      }
    }
  }

  /// Flush whatever is left when the peer closes. In line mode an
  /// unterminated last line still counts as a frame.
  pub fn finish(&mut self) -> Option<String> {
    let rest = self.pending.split();
    decode_tag(&rest)
  }
}

/// Turn raw frame bytes into a tag: lossy UTF-8, then the same
/// normalisation registration applies to stored tags.
pub(crate) fn decode_tag(raw: &[u8]) -> Option<String> {
  normalize_tag(&String::from_utf8_lossy(raw)).map(str::to_owned)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn decode_strips_trailing_control_bytes() {
    assert_eq!(decode_tag(b"TAG1\r\n").as_deref(), Some("TAG1"));
    assert_eq!(decode_tag(b"TAG1\0").as_deref(), Some("TAG1"));
    assert_eq!(decode_tag(b"  TAG1\t").as_deref(), Some("TAG1"));
  }

  #[test]
  fn decode_keeps_case_and_inner_spaces() {
    assert_eq!(decode_tag(b"Tag 1a").as_deref(), Some("Tag 1a"));
  }

  #[test]
  fn blank_frames_are_skipped() {
    assert_eq!(decode_tag(b""), None);
    assert_eq!(decode_tag(b"\r\n"), None);
    assert_eq!(decode_tag(b" \0 "), None);
  }

  #[test]
  fn chunk_mode_treats_each_read_as_one_tag() {
    let mut d = FrameDecoder::new(Framing::Chunk, 1024);
    assert_eq!(d.push(b"TAG1\n").unwrap(), ["TAG1"]);
    // Embedded newlines are not delimiters in chunk mode.
    assert_eq!(d.push(b"A\nB").unwrap(), ["A\nB"]);
    assert_eq!(d.push(b"\n").unwrap(), Vec::<String>::new());
    assert_eq!(d.finish(), None);
  }

  #[test]
  fn line_mode_splits_and_reassembles() {
    let mut d = FrameDecoder::new(Framing::Line, 1024);
    assert_eq!(d.push(b"TAG1\nTA").unwrap(), ["TAG1"]);
    assert_eq!(d.push(b"G2\r\n\nTAG3\n").unwrap(), ["TAG2", "TAG3"]);
    assert_eq!(d.finish(), None);
  }

  #[test]
  fn line_mode_flushes_unterminated_tail() {
    let mut d = FrameDecoder::new(Framing::Line, 1024);
    assert!(d.push(b"TAG1").unwrap().is_empty());
    assert_eq!(d.finish().as_deref(), Some("TAG1"));
  }

  #[test]
  fn line_mode_rejects_overlong_line() {
    let mut d = FrameDecoder::new(Framing::Line, 8);
    assert!(d.push(b"12345").unwrap().is_empty());
    assert_eq!(d.push(b"67890"), Err(FrameTooLong));
  }

  #[test]
  fn line_mode_rejects_overlong_line_completed_in_a_later_read() {
    let mut d = FrameDecoder::new(Framing::Line, 8);
    assert!(d.push(b"12345678").unwrap().is_empty());
    assert_eq!(d.push(b"9012\n"), Err(FrameTooLong));
  }

  #[test]
  fn line_mode_accepts_line_at_the_limit() {
    let mut d = FrameDecoder::new(Framing::Line, 8);
    assert!(d.push(b"1234").unwrap().is_empty());
    assert_eq!(d.push(b"5678\nAB\n").unwrap(), ["12345678", "AB"]);
  }
}

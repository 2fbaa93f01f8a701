//! Incremental decoding of `Transfer-Encoding: chunked` bodies.

use crate::parser::error::Error;

// Longest chunk-size or trailer line accepted before the line is terminated.
const MAX_LINE_LEN: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Size,
    Data(usize),
    DataEnd,
    Trailer,
    Done,
}

/// Decodes a chunked body as it arrives.
///
/// Input may be split at any byte boundary; bytes the decoder cannot use yet
/// stay in the input buffer until more data is appended. Chunk extensions and
/// trailer fields are accepted and discarded.
#[derive(Debug)]
pub struct ChunkedDecoder {
    state: State,
}

impl ChunkedDecoder {
    /// Create a decoder positioned at the first chunk-size line.
    pub fn new() -> Self {
        Self { state: State::Size }
    }

    /// Returns true once the terminating chunk and trailers have been consumed.
    pub fn is_done(&self) -> bool {
        self.state == State::Done
    }

    /// Consume as much of `input` as possible, appending chunk data to `out`.
    ///
    /// Consumed bytes are drained from the front of `input`.
    ///
    /// # Returns
    ///
    /// `true` when the body is complete, `false` if more input is needed
    pub fn decode(&mut self, input: &mut Vec<u8>, out: &mut Vec<u8>) -> Result<bool, Error> {
        let mut pos = 0;

        loop {
            match self.state {
                State::Size => {
                    let Some(line) = take_line(&input[pos..])? else { break };
                    let size = parse_chunk_size(&input[pos..pos + line])?;
                    pos += line + 2;
                    self.state = if size == 0 { State::Trailer } else { State::Data(size) };
                }
                State::Data(remaining) => {
                    let available = remaining.min(input.len() - pos);
                    out.extend_from_slice(&input[pos..pos + available]);
                    pos += available;
                    if available < remaining {
                        self.state = State::Data(remaining - available);
                        break;
                    }
                    self.state = State::DataEnd;
                }
                State::DataEnd => {
                    if input.len() - pos < 2 {
                        break;
                    }
                    if &input[pos..pos + 2] != b"\r\n" {
                        return Err(Error::InvalidChunk("missing CRLF after chunk data".to_string()));
                    }
                    pos += 2;
                    self.state = State::Size;
                }
                State::Trailer => {
                    let Some(line) = take_line(&input[pos..])? else { break };
                    pos += line + 2;
                    if line == 0 {
                        self.state = State::Done;
                    }
                }
                State::Done => break,
            }
        }

        input.drain(..pos);
        Ok(self.is_done())
    }
}

impl Default for ChunkedDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Length of the CRLF-terminated line at the start of `buf`, excluding the CRLF.
fn take_line(buf: &[u8]) -> Result<Option<usize>, Error> {
    match buf.windows(2).position(|w| w == b"\r\n") {
        Some(len) if len <= MAX_LINE_LEN => Ok(Some(len)),
        Some(_) => Err(Error::InvalidChunk("line too long".to_string())),
        None if buf.len() > MAX_LINE_LEN => Err(Error::InvalidChunk("line too long".to_string())),
        None => Ok(None),
    }
}

fn parse_chunk_size(line: &[u8]) -> Result<usize, Error> {
    let text = String::from_utf8_lossy(line);
    let size = text.split(';').next().unwrap_or_default().trim();
    if size.is_empty() || !size.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(Error::InvalidChunk(format!("invalid chunk size: {text}")));
    }
    usize::from_str_radix(size, 16)
        .map_err(|_| Error::InvalidChunk(format!("chunk size out of range: {size}")))
}

//! Title extraction from `.torrent` metainfo.
//!
//! Only the path to `info.name` is decoded; every other bencoded value is
//! skipped without allocation.

/// Deepest list/dict nesting accepted before the data is treated as corrupt.
const MAX_DEPTH: usize = 64;

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    fn expect(&mut self, byte: u8) -> Option<()> {
        if self.peek()? == byte {
            self.pos += 1;
            Some(())
        } else {
            None
        }
    }

    /// `<len>:<bytes>`
    fn bytes(&mut self) -> Option<&'a [u8]> {
        let colon = self.data[self.pos..].iter().position(|&b| b == b':')? + self.pos;
        let len: usize = std::str::from_utf8(&self.data[self.pos..colon]).ok()?.parse().ok()?;
        let start = colon + 1;
        let end = start.checked_add(len)?;
        let slice = self.data.get(start..end)?;
        self.pos = end;
        Some(slice)
    }

    fn skip(&mut self, depth: usize) -> Option<()> {
        if depth > MAX_DEPTH {
            return None;
        }
        match self.peek()? {
            b'i' => {
                let end = self.data[self.pos..].iter().position(|&b| b == b'e')?;
                self.pos += end + 1;
            }
            b'l' => {
                self.pos += 1;
                while self.peek()? != b'e' {
                    self.skip(depth + 1)?;
                }
                self.pos += 1;
            }
            b'd' => {
                self.pos += 1;
                while self.peek()? != b'e' {
                    self.bytes()?;
                    self.skip(depth + 1)?;
                }
                self.pos += 1;
            }
            b'0'..=b'9' => {
                self.bytes()?;
            }
            _ => return None,
        }
        Some(())
    }

    fn info_name(&mut self) -> Option<String> {
        self.expect(b'd')?;
        let mut name = None;
        while self.peek()? != b'e' {
            match self.bytes()? {
                b"name.utf-8" => return decode_name(self.bytes()?),
                b"name" => name = Some(self.bytes()?),
                _ => self.skip(2)?,
            }
        }
        name.and_then(decode_name)
    }
}

fn decode_name(raw: &[u8]) -> Option<String> {
    let name = String::from_utf8_lossy(raw).trim().to_string();
    (!name.is_empty()).then_some(name)
}

/// Returns the torrent's `info.name`, or `None` if `data` is not valid metainfo.
pub fn torrent_title(data: &[u8]) -> Option<String> {
    let mut cursor = Cursor { data, pos: 0 };
    cursor.expect(b'd')?;
    while cursor.peek()? != b'e' {
        if cursor.bytes()? == b"info" {
            return cursor.info_name();
        }
        cursor.skip(1)?;
    }
    None
}

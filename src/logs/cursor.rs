use super::log_line::{Field, Reason};

/// Walks a log line from left to right and hands out the text between
/// fixed delimiters.
///
/// Every delimiter is searched for starting at the current position only,
/// so field content that happens to contain an earlier delimiter is never
/// split twice.
pub(super) struct Cursor<'a> {
    line: &'a str,
    pos: usize,
    /// Byte offset where the field currently being read starts
    field_start: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(line: &'a str) -> Self {
        Cursor {
            line,
            pos: 0,
            field_start: 0,
        }
    }

    /// Byte offset of the field that was read last (or failed to be read).
    pub fn field_start(&self) -> usize {
        self.field_start
    }

    fn rest(&self) -> &'a str {
        &self.line[self.pos..]
    }

    /// Return everything up to the next `delimiter` and move past it.
    pub fn take_until(&mut self, delimiter: &'static str, field: Field) -> Result<&'a str, Reason> {
        self.field_start = self.pos;
        let rest = self.rest();
        let end = rest
            .find(delimiter)
            .ok_or(Reason::MissingDelimiter { field, delimiter })?;
        self.pos += end + delimiter.len();
        Ok(&rest[..end])
    }

    /// Move past `prefix`, which has to start at the current position.
    pub fn expect(&mut self, prefix: &'static str, field: Field) -> Result<(), Reason> {
        self.field_start = self.pos;
        if !self.rest().starts_with(prefix) {
            return Err(Reason::MissingQuote(field));
        }
        self.pos += prefix.len();
        Ok(())
    }

    /// The whole line has to be consumed.
    pub fn finish(&mut self) -> Result<(), Reason> {
        self.field_start = self.pos;
        match self.rest().is_empty() {
            true => Ok(()),
            false => Err(Reason::TrailingGarbage),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_until_moves_past_delimiter() {
        let mut cursor = Cursor::new("a - b [c");
        assert_eq!(cursor.take_until(" - ", Field::RemoteAddr), Ok("a"));
        assert_eq!(cursor.take_until(" [", Field::RemoteUser), Ok("b"));
        assert_eq!(cursor.field_start(), 4);
        assert_eq!(
            cursor.take_until("] ", Field::TimeLocal),
            Err(Reason::MissingDelimiter {
                field: Field::TimeLocal,
                delimiter: "] ",
            })
        );
        assert_eq!(cursor.field_start(), 7);
    }

    #[test]
    fn finish_rejects_leftovers() {
        let mut cursor = Cursor::new("\"ua\"x");
        cursor.expect("\"", Field::UserAgent).unwrap();
        assert_eq!(cursor.take_until("\"", Field::UserAgent), Ok("ua"));
        assert_eq!(cursor.finish(), Err(Reason::TrailingGarbage));
    }
}

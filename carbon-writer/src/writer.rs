use std::fmt::Write as _;

/// Writes metric lines into a single payload in the Carbon plaintext format.
///
/// Each line has the form `<path> <value> <timestamp>\n`, where the value is always written with six fractional
/// digits and the timestamp is written as whole seconds. Lines are newline terminated, so payloads can be concatenated
/// on the wire as-is.
#[derive(Debug, Default)]
pub(crate) struct PayloadWriter {
    buf: String,
    lines: usize,
}

impl PayloadWriter {
    /// Creates an empty `PayloadWriter`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes a single metric line.
    pub fn write_line(&mut self, path: &str, value: f64, timestamp: u64) {
        self.buf.push_str(path);
        self.buf.push(' ');

        // Writing to a `String` cannot fail.
        let _ = write!(self.buf, "{value:.6}");

        let mut int_writer = itoa::Buffer::new();
        self.buf.push(' ');
        self.buf.push_str(int_writer.format(timestamp));
        self.buf.push('\n');

        self.lines += 1;
    }

    /// Returns the number of lines written.
    pub fn len(&self) -> usize {
        self.lines
    }

    /// Returns `true` if no lines have been written.
    pub fn is_empty(&self) -> bool {
        self.lines == 0
    }

    /// Returns the payload written so far.
    pub fn as_bytes(&self) -> &[u8] {
        self.buf.as_bytes()
    }
}

/// Formats a single metric line, without the trailing newline.
pub fn format_line(path: &str, value: f64, timestamp: u64) -> String {
    let mut writer = PayloadWriter::new();
    writer.write_line(path, value, timestamp);
    writer.buf.pop();
    writer.buf
}

/// Parses a single metric line into its path, value, and timestamp.
///
/// A trailing newline is accepted. Returns `None` if the line is not made up of exactly three space-separated fields,
/// or if the value or timestamp cannot be parsed.
pub fn parse_line(line: &str) -> Option<(&str, f64, u64)> {
    let line = line.strip_suffix('\n').unwrap_or(line);

    let mut fields = line.split(' ');
    let path = fields.next().filter(|path| !path.is_empty())?;
    let value = fields.next()?.parse::<f64>().ok()?;
    let timestamp = fields.next()?.parse::<u64>().ok()?;
    if fields.next().is_some() {
        return None;
    }

    Some((path, value, timestamp))
}

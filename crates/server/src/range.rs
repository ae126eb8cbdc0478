#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    pub fn content_range(&self, size: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, size)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeError {
    Invalid,
    Unsatisfiable,
}

/// A syntactically valid `Range` header, not yet checked against an object size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeSpec {
    From { start: u64, end: Option<u64> },
    Suffix(u64),
}

impl RangeSpec {
    pub fn parse(value: &str) -> Result<Self, RangeError> {
        let value = value.trim();
        let Some(range) = value.strip_prefix("bytes=") else {
            return Err(RangeError::Invalid);
        };
        if range.contains(',') {
            return Err(RangeError::Invalid);
        }

        if let Some(suffix) = range.strip_prefix('-') {
            if suffix.is_empty() {
                return Err(RangeError::Invalid);
            }
            let suffix: u64 = suffix.trim().parse().map_err(|_| RangeError::Invalid)?;
            return Ok(RangeSpec::Suffix(suffix));
        }

        let Some((start_str, end_str)) = range.split_once('-') else {
            return Err(RangeError::Invalid);
        };
        let start_str = start_str.trim();
        let end_str = end_str.trim();
        if start_str.is_empty() {
            return Err(RangeError::Invalid);
        }
        let start: u64 = start_str.parse().map_err(|_| RangeError::Invalid)?;
        let end = if end_str.is_empty() {
            None
        } else {
            let end: u64 = end_str.parse().map_err(|_| RangeError::Invalid)?;
            if end < start {
                return Err(RangeError::Invalid);
            }
            Some(end)
        };
        Ok(RangeSpec::From { start, end })
    }

    /// Resolves against the object size. The end is clamped to the last byte.
    pub fn resolve(self, size: u64) -> Result<ByteRange, RangeError> {
        if size == 0 {
            return Err(RangeError::Unsatisfiable);
        }
        match self {
            RangeSpec::Suffix(0) => Err(RangeError::Unsatisfiable),
            RangeSpec::Suffix(suffix) => {
                let start = size.saturating_sub(suffix);
                Ok(ByteRange {
                    start,
                    end: size - 1,
                })
            }
            RangeSpec::From { start, .. } if start >= size => Err(RangeError::Unsatisfiable),
            RangeSpec::From { start, end } => {
                let end = match end {
                    Some(end) if end < size => end,
                    _ => size - 1,
                };
                Ok(ByteRange { start, end })
            }
        }
    }
}

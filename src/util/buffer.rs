//! Shared byte buffers for compressed frames

use bytes::Bytes;

/// A reference-counted, immutable byte buffer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Buffer {
    data: Bytes,
}

impl Buffer {
    pub fn new(data: Bytes) -> Self {
        Buffer { data }
    }

    /// Take ownership of a vector without copying
    pub fn from_vec(vec: Vec<u8>) -> Self {
        Buffer {
            data: Bytes::from(vec),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Clone the bytes (cheap, reference counted)
    pub fn clone_bytes(&self) -> Bytes {
        self.data.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_shares_bytes() {
        let buf = Buffer::from_vec(vec![1, 2, 3, 4]);
        assert_eq!(buf.len(), 4);
        assert_eq!(buf.as_slice(), &[1, 2, 3, 4]);

        let shared = Buffer::new(buf.clone_bytes());
        assert_eq!(shared, buf);
        assert!(Buffer::default().is_empty());
    }
}

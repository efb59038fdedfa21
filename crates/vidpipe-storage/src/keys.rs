//! Object key layout: `{kind}/{code}/{filename}`.

use std::fmt;

/// Top-level object namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Hls,
    HlsH264,
    Gallery,
    Audio,
    Subs,
    Reels,
    Uploads,
}

impl ObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Hls => "hls",
            ObjectKind::HlsH264 => "hls-h264",
            ObjectKind::Gallery => "gallery",
            ObjectKind::Audio => "audio",
            ObjectKind::Subs => "subs",
            ObjectKind::Reels => "reels",
            ObjectKind::Uploads => "uploads",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Build the key for one object.
pub fn object_key(kind: ObjectKind, code: &str, filename: &str) -> String {
    format!("{}/{}/{}", kind, code, filename)
}

/// Prefix covering every object of one kind for one video code.
pub fn folder_prefix(kind: ObjectKind, code: &str) -> String {
    format!("{}/{}/", kind, code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        assert_eq!(
            object_key(ObjectKind::Hls, "abc123xy", "master.m3u8"),
            "hls/abc123xy/master.m3u8"
        );
        assert_eq!(folder_prefix(ObjectKind::Reels, "abc123xy"), "reels/abc123xy/");
    }
}

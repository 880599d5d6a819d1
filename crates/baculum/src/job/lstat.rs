//! Decoding of Bacula's `File.LStat` attribute strings.
//!
//! The catalog stores `stat(2)` output as space separated numbers, each
//! encoded in Bacula's own base64 digit order (`A-Z a-z 0-9 + /`, most
//! significant digit first, optional leading `-`).

use serde::Serialize;

const DIGITS: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Decoded file attributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FileStat {
    pub dev: i64,
    pub inode: i64,
    pub mode: i64,
    /// `ls -l` style permission string, e.g. `-rw-r--r--`.
    pub mode_str: String,
    pub nlink: i64,
    pub uid: i64,
    pub gid: i64,
    pub rdev: i64,
    pub size: i64,
    pub blocksize: i64,
    pub blocks: i64,
    pub atime: i64,
    pub mtime: i64,
    pub ctime: i64,
    pub linkfi: i64,
    pub flags: i64,
    pub data_stream: i64,
}

fn digit(b: u8) -> Option<i64> {
    DIGITS.iter().position(|d| *d == b).map(|p| p as i64)
}

/// Decodes one base64 number. Returns `None` on a foreign character.
pub fn decode_number(field: &str) -> Option<i64> {
    let (negative, digits) = match field.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, field),
    };
    let mut value: i64 = 0;
    for b in digits.bytes() {
        value = value.wrapping_shl(6).wrapping_add(digit(b)?);
    }
    Some(if negative { value.wrapping_neg() } else { value })
}

/// Decodes a full lstat string. Missing trailing fields decode as 0 and
/// undecodable fields make the whole string invalid.
pub fn decode(lstat: &str) -> Option<FileStat> {
    let values: Vec<i64> = lstat
        .split_whitespace()
        .map(decode_number)
        .collect::<Option<Vec<_>>>()?;
    if values.is_empty() {
        return None;
    }
    let at = |i: usize| values.get(i).copied().unwrap_or(0);
    Some(FileStat {
        dev: at(0),
        inode: at(1),
        mode: at(2),
        mode_str: mode_string(at(2)),
        nlink: at(3),
        uid: at(4),
        gid: at(5),
        rdev: at(6),
        size: at(7),
        blocksize: at(8),
        blocks: at(9),
        atime: at(10),
        mtime: at(11),
        ctime: at(12),
        linkfi: at(13),
        flags: at(14),
        data_stream: at(15),
    })
}

/// Renders `st_mode` the way `ls -l` does.
pub fn mode_string(mode: i64) -> String {
    let kind = match mode & 0o170000 {
        0o040000 => 'd',
        0o120000 => 'l',
        0o020000 => 'c',
        0o060000 => 'b',
        0o010000 => 'p',
        0o140000 => 's',
        _ => '-',
    };
    let mut s = String::with_capacity(10);
    s.push(kind);
    let perms = [
        (0o400, 'r'),
        (0o200, 'w'),
        (0o100, 'x'),
        (0o040, 'r'),
        (0o020, 'w'),
        (0o010, 'x'),
        (0o004, 'r'),
        (0o002, 'w'),
        (0o001, 'x'),
    ];
    for (bit, ch) in perms {
        s.push(if mode & bit != 0 { ch } else { '-' });
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_number() {
        assert_eq!(decode_number("A"), Some(0));
        assert_eq!(decode_number("B"), Some(1));
        assert_eq!(decode_number("BA"), Some(64));
        assert_eq!(decode_number("IGk"), Some(33188));
        assert_eq!(decode_number("-B"), Some(-1));
        assert_eq!(decode_number("*"), None);
    }

    #[test]
    fn test_decode_regular_file() {
        // dev=2049 ino=1234 mode=0100644 nlink=1 uid=0 gid=0 size=1024
        let stat = decode("gB TS IGk B A A A QA BAA C BlS9mN BlS9mN BlS9mN A A C").unwrap();
        assert_eq!(stat.dev, 2049);
        assert_eq!(stat.inode, 1234);
        assert_eq!(stat.mode, 0o100644);
        assert_eq!(stat.mode_str, "-rw-r--r--");
        assert_eq!(stat.nlink, 1);
        assert_eq!(stat.size, 1024);
        assert_eq!(stat.blocksize, 4096);
        assert_eq!(stat.blocks, 2);
        assert_eq!(stat.data_stream, 2);
    }

    #[test]
    fn test_decode_number_wraps_long_fields() {
        // 8 * 64^10 == 2^63
        assert_eq!(decode_number("IAAAAAAAAAA"), Some(i64::MIN));
        assert_eq!(decode_number("-IAAAAAAAAAA"), Some(i64::MIN));
        assert!(decode("-IAAAAAAAAAA -//////////// A").is_some());
    }

    #[test]
    fn test_decode_invalid() {
        assert!(decode("").is_none());
        assert!(decode("A B ?").is_none());
    }

    #[test]
    fn test_mode_string() {
        assert_eq!(mode_string(0o040755), "drwxr-xr-x");
        assert_eq!(mode_string(0o120777), "lrwxrwxrwx");
    }
}

//! Values a rapid-upload create needs, computed from local content.

use std::io::{self, Read, Seek, SeekFrom};

use base16ct::upper::encode_string;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use md5::Md5;
use sha1::{Digest, Sha1};

/// How much of the file the pre-hash covers.
pub const PRE_HASH_LEN: u64 = 1024;

const PROOF_LEN: u64 = 8;

/// Upper-case hex SHA-1 of everything `reader` yields.
pub fn content_hash<R: Read>(mut reader: R) -> io::Result<String> {
    let mut hasher = Sha1::new();
    io::copy(&mut reader, &mut hasher)?;
    Ok(encode_string(&hasher.finalize()))
}

/// Content hash of the first [`PRE_HASH_LEN`] bytes only.
pub fn pre_hash<R: Read>(reader: R) -> io::Result<String> {
    content_hash(reader.take(PRE_HASH_LEN))
}

/// Proof of possession, version 1.
///
/// The first 8 bytes of `md5(access_token)`, read as a big-endian integer
/// modulo `size`, select an offset into the file. The proof is the base64 of
/// up to 8 bytes starting there. Empty files have an empty proof.
pub fn proof_code_v1<R: Read + Seek>(access_token: &str, mut file: R, size: u64) -> io::Result<String> {
    if size == 0 {
        return Ok(String::new());
    }
    let digest = Md5::digest(access_token.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    let offset = u64::from_be_bytes(prefix) % size;
    let len = PROOF_LEN.min(size - offset);

    let mut buf = vec![0u8; len as usize];
    file.seek(SeekFrom::Start(offset))?;
    file.read_exact(&mut buf)?;
    Ok(STANDARD.encode(buf))
}

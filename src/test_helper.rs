use rand::Rng;
use std::{collections::HashMap, io::Write};
use tempfile::NamedTempFile;

use crate::{
    datasource::DataSource,
    hasher::{HashType, MultiHasher}
};

pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 253) as u8).collect()
}

pub fn temp_with(data: &[u8]) -> NamedTempFile {
    let mut temp = NamedTempFile::new().unwrap();
    temp.write_all(data).unwrap();
    temp.flush().unwrap();
    temp
}

/// Hashes `src` to exhaustion, optionally with a random read size each time.
pub fn do_hash<S: DataSource + ?Sized>(
    src: &mut S,
    random_buf_size: bool
) -> HashMap<HashType, String>
{
    let mut hasher = MultiHasher::from([
        HashType::MD5,
        HashType::SHA1,
        HashType::SHA256
    ]);

    let mut buf: Vec<u8> = vec![0; 65536];
    let mut total = 0;

    loop {
        let buf_size = if random_buf_size {
            rand::rng().random_range(1..buf.len())
        }
        else {
            buf.len()
        };

        let read = src.read(&mut buf[..buf_size]);

        if read == 0 {
            break;
        }

        hasher.update(&buf[..read]);

        total += read as u64;
    }

    assert_eq!(total, src.size());

    hasher.finalize_hex()
}

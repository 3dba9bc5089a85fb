use digest::{Digest, DynDigest};
use md5::Md5;
use sha1::Sha1;
use sha2::{Sha256, Sha512};

use std::{
    collections::HashMap,
    fmt,
    str::FromStr
};

use crate::datasource::DataSource;

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum HashType {
    MD5,
    SHA1,
    SHA256,
    SHA512
}

impl HashType {
    pub const ALL: [HashType; 4] = [
        HashType::MD5,
        HashType::SHA1,
        HashType::SHA256,
        HashType::SHA512
    ];

    pub fn hasher(self) -> (Self, Box<dyn DynDigest>) {
        (
            self,
            match self {
                HashType::MD5 => Box::new(Md5::new()),
                HashType::SHA1 => Box::new(Sha1::new()),
                HashType::SHA256 => Box::new(Sha256::new()),
                HashType::SHA512 => Box::new(Sha512::new())
            }
        )
    }
}

impl fmt::Display for HashType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashType::MD5 => write!(f, "MD5"),
            HashType::SHA1 => write!(f, "SHA1"),
            HashType::SHA256 => write!(f, "SHA256"),
            HashType::SHA512 => write!(f, "SHA512")
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("Unknown hash type")]
pub struct HashTypeError;

impl FromStr for HashType {
    type Err = HashTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_ref() {
            "MD5" => Ok(HashType::MD5),
            "SHA1" => Ok(HashType::SHA1),
            "SHA256" => Ok(HashType::SHA256),
            "SHA512" => Ok(HashType::SHA512),
            _ => Err(HashTypeError)
        }
    }
}

pub struct MultiHasher {
    hashers: HashMap<HashType, Box<dyn DynDigest>>
}

impl MultiHasher {
    pub fn update(
        &mut self,
        buf: &[u8]
    )
    {
        self.hashers.values_mut().for_each(|h| h.update(buf));
    }

    pub fn finalize(
        self
    ) -> HashMap<HashType, Box<[u8]>>
    {
        self.hashers
            .into_iter()
            .map(|(k, v)| (k, v.finalize()))
            .collect()
    }

    pub fn finalize_hex(self) -> HashMap<HashType, String> {
        self.finalize()
            .into_iter()
            .map(|(k, v)| (k, hex::encode(v)))
            .collect()
    }
}

impl<T: IntoIterator<Item = HashType>> From<T> for MultiHasher {
    fn from(htypes: T) -> Self {
        Self {
            hashers: HashMap::from_iter(
                htypes.into_iter().map(HashType::hasher)
            )
        }
    }
}

/// Hashes `src` from its current position until a read comes back empty.
///
/// Returns the digests and the number of bytes hashed.
pub fn digest_source<S, T>(
    src: &mut S,
    htypes: T,
    chunk_size: usize
) -> (HashMap<HashType, String>, u64)
where
    S: DataSource + ?Sized,
    T: IntoIterator<Item = HashType>
{
    let mut hasher = MultiHasher::from(htypes);
    let mut buf = vec![0; chunk_size.max(1)];
    let mut total = 0;

    loop {
        let read = src.read(&mut buf);
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
        total += read as u64;
    }

    (hasher.finalize_hex(), total)
}

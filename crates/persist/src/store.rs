//! File-backed slot storage.
//!
//! Layout:
//! ```text
//! saves/
//!   save_{n}.sav        - manual slots
//!   auto_save.sav       - the automatic slot
//!   global_data.json    - cross-playthrough data
//! screenshots/
//!   save_{n}.png, auto_save.png
//! ```
//!
//! A slot file is `NVSV`, a little-endian `u32` header length, the CBOR header,
//! then the zstd-compressed CBOR archive. The header carries the slot metadata
//! and the SHA-256 of the archive bytes, so listing slots never touches archives.
//!
//! Every write goes to `<target>.tmp`, is synced, then renamed over the target.

use crate::archive::{ArchiveData, SaveSlotMeta};
use crate::config::PersistConfig;
use crate::error::PersistError;
use novella_common::SlotId;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

pub const SLOT_MAGIC: &[u8; 4] = b"NVSV";
pub const SLOT_SCHEMA_VERSION: u32 = 1;

const SLOT_EXTENSION: &str = "sav";
const SCREENSHOT_EXTENSION: &str = "png";
const GLOBAL_FILE: &str = "global_data.json";
const PREFIX_LEN: usize = 8;
/// Upper bound on a header; anything larger is treated as corruption.
const MAX_HEADER_LEN: u32 = 1 << 20;

/// Header segment of a slot file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotHeader {
    pub schema_version: u32,
    pub meta: SaveSlotMeta,
    pub archive_len: u64,
    pub archive_sha256: String,
}

/// Paths and codecs for slot files. Cheap to clone; holds no open handles.
#[derive(Debug, Clone)]
pub struct SlotStore {
    save_dir: PathBuf,
    screenshot_dir: PathBuf,
}

impl SlotStore {
    /// Create the save and screenshot directories if needed.
    pub fn open(config: &PersistConfig) -> Result<Self, PersistError> {
        std::fs::create_dir_all(&config.save_dir)?;
        std::fs::create_dir_all(&config.screenshot_dir)?;
        Ok(Self {
            save_dir: config.save_dir.clone(),
            screenshot_dir: config.screenshot_dir.clone(),
        })
    }

    pub fn save_dir(&self) -> &Path {
        &self.save_dir
    }

    pub fn screenshot_dir(&self) -> &Path {
        &self.screenshot_dir
    }

    pub fn slot_path(&self, slot: SlotId) -> PathBuf {
        self.save_dir
            .join(format!("{}.{SLOT_EXTENSION}", slot.file_stem()))
    }

    pub fn screenshot_name(slot: SlotId) -> String {
        format!("{}.{SCREENSHOT_EXTENSION}", slot.file_stem())
    }

    pub fn screenshot_path(&self, slot: SlotId) -> PathBuf {
        self.screenshot_dir.join(Self::screenshot_name(slot))
    }

    pub fn global_path(&self) -> PathBuf {
        self.save_dir.join(GLOBAL_FILE)
    }

    pub fn exists(&self, slot: SlotId) -> bool {
        self.slot_path(slot).is_file()
    }

    /// Encode and atomically write a slot.
    pub fn write_slot(
        &self,
        meta: &SaveSlotMeta,
        archive: &ArchiveData,
    ) -> Result<(), PersistError> {
        let bytes = encode_slot(meta, archive)?;
        write_atomic(&self.slot_path(meta.slot), &bytes)
    }

    /// Read and verify a whole slot.
    pub fn read_slot(&self, slot: SlotId) -> Result<(SaveSlotMeta, ArchiveData), PersistError> {
        let path = self.slot_path(slot);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(PersistError::SlotEmpty(slot));
            }
            Err(e) => return Err(e.into()),
        };
        decode_slot(&bytes).map_err(|e| with_path(e, &path))
    }

    /// Read only the header of a slot. Missing slots yield an empty-flagged meta.
    pub fn read_meta(&self, slot: SlotId) -> Result<SaveSlotMeta, PersistError> {
        let path = self.slot_path(slot);
        let mut file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(SaveSlotMeta::empty(slot));
            }
            Err(e) => return Err(e.into()),
        };

        let mut prefix = [0u8; PREFIX_LEN];
        if file.read_exact(&mut prefix).is_err() {
            return Err(PersistError::corrupt(&path, "truncated prefix"));
        }
        let header_len = parse_prefix(&prefix).map_err(|e| with_path(e, &path))?;
        let mut header_bytes = Vec::with_capacity(header_len as usize);
        file.take(u64::from(header_len))
            .read_to_end(&mut header_bytes)?;
        if header_bytes.len() != header_len as usize {
            return Err(PersistError::corrupt(&path, "truncated header"));
        }
        let header = decode_header(&header_bytes).map_err(|e| with_path(e, &path))?;
        Ok(header.meta)
    }

    /// Remove a slot and its screenshot. Returns whether a save file existed.
    pub fn delete(&self, slot: SlotId) -> Result<bool, PersistError> {
        let existed = remove_if_present(&self.slot_path(slot))?;
        remove_if_present(&self.screenshot_path(slot))?;
        Ok(existed)
    }

    /// Atomically write a screenshot. Returns its file name.
    pub fn write_screenshot(&self, slot: SlotId, png: &[u8]) -> Result<String, PersistError> {
        write_atomic(&self.screenshot_path(slot), png)?;
        Ok(Self::screenshot_name(slot))
    }
}

/// Serialize a slot into its on-disk bytes.
pub fn encode_slot(meta: &SaveSlotMeta, archive: &ArchiveData) -> Result<Vec<u8>, PersistError> {
    let archive_bytes = zstd_compress(&cbor_serialize(archive)?)?;
    let header = SlotHeader {
        schema_version: SLOT_SCHEMA_VERSION,
        meta: meta.clone(),
        archive_len: archive_bytes.len() as u64,
        archive_sha256: sha256_hex(&archive_bytes),
    };
    let header_bytes = cbor_serialize(&header)?;
    let header_len = u32::try_from(header_bytes.len())
        .map_err(|_| PersistError::Encode("header too large".into()))?;

    let mut out = Vec::with_capacity(PREFIX_LEN + header_bytes.len() + archive_bytes.len());
    out.extend_from_slice(SLOT_MAGIC);
    out.extend_from_slice(&header_len.to_le_bytes());
    out.extend_from_slice(&header_bytes);
    out.extend_from_slice(&archive_bytes);
    Ok(out)
}

/// Parse and verify slot bytes. Nothing is returned unless the archive hash matches.
pub fn decode_slot(bytes: &[u8]) -> Result<(SaveSlotMeta, ArchiveData), PersistError> {
    let prefix: &[u8; PREFIX_LEN] = bytes
        .get(..PREFIX_LEN)
        .and_then(|p| p.try_into().ok())
        .ok_or_else(|| PersistError::corrupt("", "truncated prefix"))?;
    let header_len = parse_prefix(prefix)? as usize;
    let header_end = PREFIX_LEN + header_len;
    let header_bytes = bytes
        .get(PREFIX_LEN..header_end)
        .ok_or_else(|| PersistError::corrupt("", "truncated header"))?;
    let header = decode_header(header_bytes)?;

    let archive_bytes = &bytes[header_end..];
    if archive_bytes.len() as u64 != header.archive_len {
        return Err(PersistError::corrupt(
            "",
            format!(
                "archive is {} bytes, header says {}",
                archive_bytes.len(),
                header.archive_len
            ),
        ));
    }
    let actual = sha256_hex(archive_bytes);
    if actual != header.archive_sha256 {
        return Err(PersistError::corrupt(
            "",
            format!(
                "archive hash mismatch: expected {}, got {actual}",
                header.archive_sha256
            ),
        ));
    }

    let archive = zstd_decompress(archive_bytes)
        .map_err(|e| PersistError::corrupt("", format!("archive decompression failed: {e}")))
        .and_then(|raw| cbor_deserialize(&raw))?;
    Ok((header.meta, archive))
}

fn parse_prefix(prefix: &[u8; PREFIX_LEN]) -> Result<u32, PersistError> {
    if &prefix[..4] != SLOT_MAGIC {
        return Err(PersistError::corrupt("", "not a save file (bad magic)"));
    }
    let header_len = u32::from_le_bytes([prefix[4], prefix[5], prefix[6], prefix[7]]);
    if header_len == 0 || header_len > MAX_HEADER_LEN {
        return Err(PersistError::corrupt(
            "",
            format!("implausible header length {header_len}"),
        ));
    }
    Ok(header_len)
}

fn decode_header(bytes: &[u8]) -> Result<SlotHeader, PersistError> {
    let header: SlotHeader = cbor_deserialize(bytes)?;
    if header.schema_version != SLOT_SCHEMA_VERSION {
        return Err(PersistError::SchemaMismatch {
            file_version: header.schema_version,
            expected_version: SLOT_SCHEMA_VERSION,
        });
    }
    Ok(header)
}

/// Fill in the path on corruption errors raised by the pure codec.
fn with_path(error: PersistError, path: &Path) -> PersistError {
    match error {
        PersistError::CorruptSave { reason, .. } => PersistError::corrupt(path, reason),
        other => other,
    }
}

fn remove_if_present(path: &Path) -> Result<bool, PersistError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Temporary sibling used while writing `path`.
pub fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Write `bytes` next to `path` and sync them. The committed file is untouched.
pub fn stage_temp(path: &Path, bytes: &[u8]) -> Result<PathBuf, PersistError> {
    let tmp = temp_path(path);
    let write = || -> std::io::Result<()> {
        let mut file = File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()
    };
    if let Err(source) = write() {
        let _ = std::fs::remove_file(&tmp);
        return Err(PersistError::WriteFailure { path: tmp, source });
    }
    Ok(tmp)
}

/// Promote a staged temp file over `path`.
pub fn commit(tmp: &Path, path: &Path) -> Result<(), PersistError> {
    std::fs::rename(tmp, path).map_err(|source| {
        let _ = std::fs::remove_file(tmp);
        PersistError::WriteFailure {
            path: path.to_path_buf(),
            source,
        }
    })
}

/// Stage then commit. Either the old or the new contents are visible at `path`.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), PersistError> {
    let tmp = stage_temp(path, bytes)?;
    commit(&tmp, path)
}

fn cbor_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, PersistError> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|e| PersistError::Encode(e.to_string()))?;
    Ok(buf)
}

fn cbor_deserialize<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, PersistError> {
    ciborium::from_reader(data)
        .map_err(|e| PersistError::corrupt("", format!("CBOR decode failed: {e}")))
}

fn zstd_compress(data: &[u8]) -> Result<Vec<u8>, PersistError> {
    let mut encoder = zstd::Encoder::new(Vec::new(), 3)?;
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

fn zstd_decompress(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut decoder = zstd::Decoder::new(data)?;
    let mut buf = Vec::new();
    decoder.read_to_end(&mut buf)?;
    Ok(buf)
}

fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

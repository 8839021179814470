//! Binary module codec - reads and writes `.rmod` files.
//!
//! On-disk envelope, all integers little-endian:
//! - 4 byte magic `RMOD`
//! - u32 format version
//! - u64 payload length
//! - bincode payload ([`Module`])
//! - 32 byte blake3 checksum of the payload
//! - optional 32 byte keyed-blake3 signature of the payload

use crate::module::Module;
use crate::resolver::ModuleResolver;
use crate::{Error, Result};
use std::path::Path;

/// File extension for binary modules.
pub const MODULE_EXTENSION: &str = "rmod";

const MAGIC: &[u8; 4] = b"RMOD";
const FORMAT_VERSION: u32 = 1;
const CHECKSUM_LEN: usize = 32;
const SIGNATURE_LEN: usize = 32;
const HEADER_LEN: usize = MAGIC.len() + 4 + 8;
const SIGNING_CONTEXT: &str = "remod 2026-08-24 module signing key";

/// Load a module and verify that every module it references can be
/// located through `resolver`.
pub fn load(path: &Path, resolver: &ModuleResolver) -> Result<Module> {
    let module = read_module(path)?;
    for reference in &module.references {
        if resolver.resolve(&reference.name).is_none() {
            return Err(Error::ModuleNotFound(reference.name.clone()));
        }
    }
    Ok(module)
}

/// Write an unsigned module file.
pub fn write(module: &Module, path: &Path) -> Result<()> {
    write_with(module, path, None)
}

/// Write a module file with a keyed signature trailer.
pub fn write_signed(module: &Module, path: &Path, key: &[u8; 32]) -> Result<()> {
    write_with(module, path, Some(key))
}

/// Derive a 32-byte signing key from raw key-file bytes.
pub fn signing_key(key_material: &[u8]) -> [u8; 32] {
    blake3::derive_key(SIGNING_CONTEXT, key_material)
}

/// Check a module file's signature trailer against a key. An unsigned
/// file verifies as false.
pub fn verify_signature(path: &Path, key: &[u8; 32]) -> Result<bool> {
    let bytes = read_bytes(path)?;
    let envelope = split_envelope(path, &bytes)?;
    Ok(envelope
        .signature
        .map(|signature| blake3::keyed_hash(key, envelope.payload) == signature)
        .unwrap_or(false))
}

fn read_module(path: &Path) -> Result<Module> {
    let bytes = read_bytes(path)?;
    let envelope = split_envelope(path, &bytes)?;
    Ok(bincode::deserialize(envelope.payload)?)
}

fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|err| match err.kind() {
        std::io::ErrorKind::NotFound => Error::ModuleNotFound(path.display().to_string()),
        _ => Error::Io(err),
    })
}

fn write_with(module: &Module, path: &Path, key: Option<&[u8; 32]>) -> Result<()> {
    let payload = bincode::serialize(module)?;
    let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len() + CHECKSUM_LEN + SIGNATURE_LEN);
    bytes.extend_from_slice(MAGIC);
    bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    bytes.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    bytes.extend_from_slice(&payload);
    bytes.extend_from_slice(blake3::hash(&payload).as_bytes());
    if let Some(key) = key {
        bytes.extend_from_slice(blake3::keyed_hash(key, &payload).as_bytes());
    }
    std::fs::write(path, bytes)?;
    Ok(())
}

struct Envelope<'a> {
    payload: &'a [u8],
    signature: Option<[u8; SIGNATURE_LEN]>,
}

fn split_envelope<'a>(path: &Path, bytes: &'a [u8]) -> Result<Envelope<'a>> {
    let invalid = |reason: String| Error::InvalidModule(format!("{}: {reason}", path.display()));

    if bytes.len() < HEADER_LEN {
        return Err(invalid("truncated header".to_string()));
    }
    let (magic, rest) = bytes.split_at(MAGIC.len());
    if magic != MAGIC.as_slice() {
        return Err(invalid("bad magic".to_string()));
    }

    let (version_bytes, rest) = rest.split_at(4);
    let mut version = [0u8; 4];
    version.copy_from_slice(version_bytes);
    let version = u32::from_le_bytes(version);
    if version != FORMAT_VERSION {
        return Err(invalid(format!("unsupported format version {version}")));
    }

    let (len_bytes, rest) = rest.split_at(8);
    let mut len = [0u8; 8];
    len.copy_from_slice(len_bytes);
    // a corrupt length field can sit near u64::MAX; the add must not wrap
    let payload_len = u64::from_le_bytes(len) as usize;
    if payload_len
        .checked_add(CHECKSUM_LEN)
        .is_none_or(|needed| rest.len() < needed)
    {
        return Err(invalid("truncated payload".to_string()));
    }

    let (payload, trailer) = rest.split_at(payload_len);
    let (checksum_bytes, signature_bytes) = trailer.split_at(CHECKSUM_LEN);
    let mut checksum = [0u8; CHECKSUM_LEN];
    checksum.copy_from_slice(checksum_bytes);
    if blake3::hash(payload) != checksum {
        return Err(invalid("payload checksum mismatch".to_string()));
    }

    let signature = match signature_bytes.len() {
        0 => None,
        SIGNATURE_LEN => {
            let mut signature = [0u8; SIGNATURE_LEN];
            signature.copy_from_slice(signature_bytes);
            Some(signature)
        }
        _ => return Err(invalid("malformed signature trailer".to_string())),
    };

    Ok(Envelope { payload, signature })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{Instruction, MemberRef, Method, MethodBody, TypeDef, TypeRef, TypeSpec};
    use tempfile::TempDir;

    fn sample_module() -> Module {
        let mut module = Module::new("Acme", "Acme Client");
        let row = module.add_type_ref(TypeRef::new("Acme", "Base"));
        let mut ty = TypeDef::new("Acme", "Widget");
        ty.base = Some(TypeSpec::Named(row));
        let mut method = Method::new("run");
        method.body = Some(MethodBody {
            locals: vec![TypeSpec::Named(row)],
            instructions: vec![
                Instruction::LoadString("Acme.Widget".to_string()),
                Instruction::Call {
                    method: MemberRef::new("Acme.Util.Log", TypeSpec::Named(row)),
                    generic_args: vec![TypeSpec::Array(Box::new(TypeSpec::Named(row)))],
                },
                Instruction::Return,
            ],
        });
        ty.methods.push(method);
        module.types.push(ty);
        module
    }

    #[test]
    fn test_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Acme.rmod");
        let module = sample_module();
        write(&module, &path).unwrap();

        let loaded = load(&path, &ModuleResolver::new(Vec::new())).unwrap();
        assert_eq!(loaded, module);
    }

    #[test]
    fn test_load_verifies_references() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Acme.rmod");
        let mut module = sample_module();
        module.add_reference("AcmeCore");
        write(&module, &path).unwrap();

        let empty = ModuleResolver::new(Vec::new());
        let err = load(&path, &empty).unwrap_err();
        assert!(matches!(err, Error::ModuleNotFound(name) if name == "AcmeCore"));

        write(&Module::new("AcmeCore", "Core"), &dir.path().join("AcmeCore.rmod")).unwrap();
        let resolver = ModuleResolver::new(vec![dir.path().to_path_buf()]);
        assert!(load(&path, &resolver).is_ok());
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = load(
            &dir.path().join("Ghost.rmod"),
            &ModuleResolver::new(Vec::new()),
        )
        .unwrap_err();
        assert!(matches!(err, Error::ModuleNotFound(_)));
    }

    #[test]
    fn test_rejects_bad_magic() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Acme.rmod");
        write(&sample_module(), &path).unwrap();

        let mut bytes = std::fs::read(&path).unwrap();
        bytes[0] = b'X';
        std::fs::write(&path, bytes).unwrap();

        let err = load(&path, &ModuleResolver::new(Vec::new())).unwrap_err();
        assert!(matches!(err, Error::InvalidModule(reason) if reason.contains("bad magic")));
    }

    #[test]
    fn test_rejects_unsupported_version() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Acme.rmod");
        write(&sample_module(), &path).unwrap();

        let mut bytes = std::fs::read(&path).unwrap();
        bytes[4] = 9;
        std::fs::write(&path, bytes).unwrap();

        let err = load(&path, &ModuleResolver::new(Vec::new())).unwrap_err();
        assert!(
            matches!(err, Error::InvalidModule(reason) if reason.contains("format version"))
        );
    }

    #[test]
    fn test_rejects_corrupt_payload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Acme.rmod");
        write(&sample_module(), &path).unwrap();

        let mut bytes = std::fs::read(&path).unwrap();
        let index = HEADER_LEN + 2;
        bytes[index] ^= 0xff;
        std::fs::write(&path, bytes).unwrap();

        let err = load(&path, &ModuleResolver::new(Vec::new())).unwrap_err();
        assert!(matches!(err, Error::InvalidModule(reason) if reason.contains("checksum")));
    }

    #[test]
    fn test_rejects_truncated_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Acme.rmod");
        write(&sample_module(), &path).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() - 8]).unwrap();

        let err = load(&path, &ModuleResolver::new(Vec::new())).unwrap_err();
        assert!(matches!(err, Error::InvalidModule(reason) if reason.contains("truncated")));
    }

    #[test]
    fn test_rejects_oversized_length_field() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Acme.rmod");
        write(&sample_module(), &path).unwrap();

        let mut bytes = std::fs::read(&path).unwrap();
        bytes[8..16].copy_from_slice(&(u64::MAX - 10).to_le_bytes());
        std::fs::write(&path, bytes).unwrap();

        let err = load(&path, &ModuleResolver::new(Vec::new())).unwrap_err();
        assert!(matches!(err, Error::InvalidModule(reason) if reason.contains("truncated")));
    }

    #[test]
    fn test_signature_verifies_with_matching_key() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Acme.rmod");
        let key = signing_key(b"key material");
        write_signed(&sample_module(), &path, &key).unwrap();

        assert!(verify_signature(&path, &key).unwrap());
        let wrong = signing_key(b"other material");
        assert!(!verify_signature(&path, &wrong).unwrap());

        // a signed module still loads like an unsigned one
        assert!(load(&path, &ModuleResolver::new(Vec::new())).is_ok());
    }

    #[test]
    fn test_unsigned_file_verifies_as_false() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Acme.rmod");
        write(&sample_module(), &path).unwrap();

        let key = signing_key(b"key material");
        assert!(!verify_signature(&path, &key).unwrap());
    }
}

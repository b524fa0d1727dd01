use std::rc::Rc;

use bincode::{Decode, Encode};
use snafu::{ResultExt, Snafu, ensure};
use tracing::debug;

use super::FileWrapper;

const SNAPSHOT_FORMAT_VERSION: u32 = 1;
const SNAPSHOT_COMPRESSION_LEVEL: i32 = 3;

#[derive(Debug, Encode, Decode)]
struct Snapshot {
    version: u32,
    root: SnapshotNode,
}

#[derive(Debug, Encode, Decode)]
enum SnapshotNode {
    Regular(Vec<u8>),
    Directory(Vec<(String, SnapshotNode)>),
}

impl From<&FileWrapper> for SnapshotNode {
    fn from(wrapper: &FileWrapper) -> Self {
        match wrapper {
            FileWrapper::Regular { contents } => SnapshotNode::Regular(contents.clone()),
            FileWrapper::Directory { entries } => SnapshotNode::Directory(
                entries
                    .iter()
                    .map(|(name, entry)| (name.clone(), SnapshotNode::from(entry.as_ref())))
                    .collect(),
            ),
        }
    }
}

impl From<SnapshotNode> for FileWrapper {
    fn from(node: SnapshotNode) -> Self {
        match node {
            SnapshotNode::Regular(contents) => FileWrapper::regular(contents),
            SnapshotNode::Directory(entries) => FileWrapper::directory(
                entries
                    .into_iter()
                    .map(|(name, entry)| (name, Rc::new(FileWrapper::from(entry)))),
            ),
        }
    }
}

impl FileWrapper {
    /// Serializes the whole tree into a compressed, self-contained blob.
    pub fn serialized_representation(&self) -> Result<Vec<u8>, SnapshotError> {
        let snapshot = Snapshot {
            version: SNAPSHOT_FORMAT_VERSION,
            root: SnapshotNode::from(self),
        };
        let encoded = bincode::encode_to_vec(&snapshot, bincode::config::standard())
            .context(EncodeSnafu)?;
        let compressed = zstd::encode_all(encoded.as_slice(), SNAPSHOT_COMPRESSION_LEVEL)
            .context(CompressSnafu)?;
        debug!(
            "Serialized {} files into {} bytes ({} uncompressed)",
            self.file_count(),
            compressed.len(),
            encoded.len()
        );
        Ok(compressed)
    }

    pub fn from_serialized_representation(bytes: &[u8]) -> Result<Self, SnapshotError> {
        let decompressed = zstd::decode_all(bytes).context(DecompressSnafu)?;
        let (snapshot, _): (Snapshot, usize) =
            bincode::decode_from_slice(&decompressed, bincode::config::standard())
                .context(DecodeSnafu)?;
        ensure!(
            snapshot.version == SNAPSHOT_FORMAT_VERSION,
            UnsupportedVersionSnafu {
                version: snapshot.version
            }
        );
        Ok(snapshot.root.into())
    }
}

#[derive(Debug, Snafu)]
pub enum SnapshotError {
    #[snafu(display("Failed to encode the snapshot"))]
    EncodeError { source: bincode::error::EncodeError },
    #[snafu(display("Failed to compress the snapshot"))]
    CompressError { source: std::io::Error },
    #[snafu(display("Failed to decompress the snapshot"))]
    DecompressError { source: std::io::Error },
    #[snafu(display("Failed to decode the snapshot"))]
    DecodeError { source: bincode::error::DecodeError },
    #[snafu(display("Unsupported snapshot format version {}", version))]
    UnsupportedVersion { version: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_restores_contents_and_entry_order() {
        let wrapper = FileWrapper::try_from_files([
            ("zeta.hs", b"z".to_vec()),
            ("alpha/Main.hs", b"main = pure ()".to_vec()),
            ("empty.txt", Vec::new()),
        ])
        .unwrap();

        let bytes = wrapper.serialized_representation().unwrap();
        let restored = FileWrapper::from_serialized_representation(&bytes).unwrap();

        assert_eq!(restored, wrapper);
        assert_eq!(
            restored.entry_names().collect::<Vec<_>>(),
            vec!["zeta.hs", "alpha", "empty.txt"]
        );
    }

    #[test]
    fn snapshot_rejects_garbage() {
        let result = FileWrapper::from_serialized_representation(b"definitely not zstd");
        assert!(matches!(result, Err(SnapshotError::DecompressError { .. })));
    }

    #[test]
    fn snapshot_rejects_unknown_versions() {
        let snapshot = Snapshot {
            version: SNAPSHOT_FORMAT_VERSION + 1,
            root: SnapshotNode::Directory(Vec::new()),
        };
        let encoded = bincode::encode_to_vec(&snapshot, bincode::config::standard()).unwrap();
        let bytes = zstd::encode_all(encoded.as_slice(), SNAPSHOT_COMPRESSION_LEVEL).unwrap();

        let result = FileWrapper::from_serialized_representation(&bytes);
        assert!(matches!(
            result,
            Err(SnapshotError::UnsupportedVersion { version }) if version == SNAPSHOT_FORMAT_VERSION + 1
        ));
    }
}

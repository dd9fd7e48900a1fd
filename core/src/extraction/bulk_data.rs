//! Bulk data resolution for raw SR content trees
//!
//! Any value of a naturalized tree may be stored out of line as
//! `{"BulkDataURI": "..."}`. Resolution replaces every such object with the
//! retrieved payload decoded as little-endian 32-bit floats.

use crate::error::{Result, SrcatError};
use crate::types::SrDocument;
use async_trait::async_trait;
use futures::future::{join_all, BoxFuture, FutureExt};
use log::{debug, error};
use serde_json::Value;
use std::path::{Component, Path, PathBuf};

/// Key under which naturalized JSON stores out-of-line values
pub const BULK_DATA_URI: &str = "BulkDataURI";

/// Identity of the instance a bulk data URI belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceUids {
    pub study_instance_uid: String,
    pub series_instance_uid: String,
    pub sop_instance_uid: String,
}

impl InstanceUids {
    pub fn of(document: &SrDocument) -> Self {
        Self {
            study_instance_uid: document.study_instance_uid.clone(),
            series_instance_uid: document.series_instance_uid.clone(),
            sop_instance_uid: document.sop_instance_uid.clone(),
        }
    }

    fn request(&self, uri: &str) -> BulkDataRequest {
        BulkDataRequest {
            bulk_data_uri: uri.to_string(),
            study_instance_uid: self.study_instance_uid.clone(),
            series_instance_uid: self.series_instance_uid.clone(),
            sop_instance_uid: self.sop_instance_uid.clone(),
        }
    }
}

/// One bulk data fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkDataRequest {
    pub bulk_data_uri: String,
    pub study_instance_uid: String,
    pub series_instance_uid: String,
    pub sop_instance_uid: String,
}

/// Fetches out-of-line payloads
#[async_trait]
pub trait BulkDataRetriever: Send + Sync {
    /// Returns the raw bytes behind a bulk data URI
    async fn retrieve(&self, request: &BulkDataRequest) -> Result<Vec<u8>>;
}

/// Resolves every bulk data reference of a raw content tree in place
///
/// Siblings are fetched concurrently and every branch runs to completion even
/// when another one fails, so a failure never hides the state of its
/// neighbours. The first failure in tree order is returned.
///
/// # Arguments
///
/// * `tree` - Raw content sequence (or any subtree of it)
/// * `retriever` - Source of the payloads
/// * `uids` - Instance the tree belongs to, passed along with every request
///
/// # Returns
///
/// The number of references replaced
///
/// # Errors
///
/// Returns [`SrcatError::BulkData`] carrying the URI and tree path of the
/// failing branch.
pub async fn resolve_bulk_data(
    tree: &mut Value,
    retriever: &dyn BulkDataRetriever,
    uids: &InstanceUids,
) -> Result<usize> {
    resolve_node(tree, String::from("$"), retriever, uids).await
}

fn resolve_node<'a>(
    node: &'a mut Value,
    path: String,
    retriever: &'a dyn BulkDataRetriever,
    uids: &'a InstanceUids,
) -> BoxFuture<'a, Result<usize>> {
    async move {
        if let Some(uri) = bulk_data_uri(node) {
            let bytes = retriever
                .retrieve(&uids.request(&uri))
                .await
                .map_err(|e| bulk_data_error(&uri, &path, e.to_string()))?;
            *node = floats_from_bytes(&bytes).map_err(|reason| bulk_data_error(&uri, &path, reason))?;
            debug!("Resolved bulk data {} at {} ({} bytes)", uri, path, bytes.len());
            return Ok(1);
        }

        let branches: Vec<_> = match node {
            Value::Array(items) => items
                .iter_mut()
                .enumerate()
                .map(|(index, child)| {
                    resolve_node(child, format!("{}[{}]", path, index), retriever, uids)
                })
                .collect(),
            Value::Object(fields) => fields
                .iter_mut()
                .map(|(key, child)| resolve_node(child, format!("{}.{}", path, key), retriever, uids))
                .collect(),
            _ => return Ok(0),
        };

        let mut resolved = 0;
        let mut first_error = None;
        for result in join_all(branches).await {
            match result {
                Ok(count) => resolved += count,
                Err(e) => {
                    error!("{}", e);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(resolved),
        }
    }
    .boxed()
}

fn bulk_data_uri(node: &Value) -> Option<String> {
    node.as_object()?
        .get(BULK_DATA_URI)?
        .as_str()
        .map(str::to_string)
}

fn bulk_data_error(uri: &str, path: &str, reason: String) -> SrcatError {
    SrcatError::BulkData {
        uri: uri.to_string(),
        path: path.to_string(),
        reason,
    }
}

/// Decodes a payload as little-endian 32-bit floats
///
/// Non-finite values become `null`, which content normalization reads back as NaN.
fn floats_from_bytes(bytes: &[u8]) -> std::result::Result<Value, String> {
    if bytes.len() % 4 != 0 {
        return Err(format!(
            "payload of {} bytes is not a whole number of 32-bit floats",
            bytes.len()
        ));
    }
    Ok(Value::Array(
        bytes
            .chunks_exact(4)
            .map(|chunk| {
                let value = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
                Value::from(f64::from(value))
            })
            .collect(),
    ))
}

/// Reads bulk data from the local filesystem
///
/// URIs are paths relative to the root directory. Absolute paths, URI schemes
/// and `..` components are rejected, so nothing outside the root is read.
#[derive(Debug, Clone)]
pub struct FileBulkDataRetriever {
    root: PathBuf,
}

impl FileBulkDataRetriever {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Maps a bulk data URI to a file path under the root
    ///
    /// # Errors
    ///
    /// Returns [`SrcatError::InvalidValue`] for URIs that would leave the root
    pub fn path_for(&self, uri: &str) -> Result<PathBuf> {
        let path = Path::new(uri);
        let contained = !uri.contains("://")
            && path
                .components()
                .all(|component| matches!(component, Component::Normal(_) | Component::CurDir));
        if !contained || uri.is_empty() {
            return Err(SrcatError::InvalidValue(format!(
                "Bulk data URI {} is outside {}",
                uri,
                self.root.display()
            )));
        }
        Ok(self.root.join(path))
    }
}

#[async_trait]
impl BulkDataRetriever for FileBulkDataRetriever {
    async fn retrieve(&self, request: &BulkDataRequest) -> Result<Vec<u8>> {
        let path = self.path_for(&request.bulk_data_uri)?;
        Ok(tokio::fs::read(&path).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Serves payloads from memory and records every request
    struct MockRetriever {
        payloads: HashMap<String, Vec<u8>>,
        calls: AtomicUsize,
        requests: Mutex<Vec<BulkDataRequest>>,
    }

    impl MockRetriever {
        fn new(payloads: &[(&str, Vec<f32>)]) -> Self {
            Self {
                payloads: payloads
                    .iter()
                    .map(|(uri, values)| {
                        let bytes = values.iter().flat_map(|v| v.to_le_bytes()).collect();
                        (uri.to_string(), bytes)
                    })
                    .collect(),
                calls: AtomicUsize::new(0),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl BulkDataRetriever for MockRetriever {
        async fn retrieve(&self, request: &BulkDataRequest) -> Result<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().unwrap().push(request.clone());
            tokio::task::yield_now().await;
            self.payloads
                .get(&request.bulk_data_uri)
                .cloned()
                .ok_or_else(|| SrcatError::from(format!("no payload for {}", request.bulk_data_uri)))
        }
    }

    fn uids() -> InstanceUids {
        InstanceUids {
            study_instance_uid: "1.2".to_string(),
            series_instance_uid: "1.2.3".to_string(),
            sop_instance_uid: "1.2.3.4".to_string(),
        }
    }

    #[tokio::test]
    async fn test_replaces_nested_references() {
        let retriever = MockRetriever::new(&[("bulk/1", vec![1.0, 2.0]), ("bulk/2", vec![3.5, 4.5, 5.5])]);
        let mut tree = json!([
            {
                "ValueType": "CONTAINER",
                "ContentSequence": [
                    {"ValueType": "SCOORD", "GraphicData": {"BulkDataURI": "bulk/1"}},
                    {
                        "ValueType": "NUM",
                        "ContentSequence": {
                            "ValueType": "SCOORD3D",
                            "GraphicData": {"BulkDataURI": "bulk/2"}
                        }
                    }
                ]
            }
        ]);

        let resolved = resolve_bulk_data(&mut tree, &retriever, &uids()).await.unwrap();

        assert_eq!(resolved, 2);
        assert_eq!(tree[0]["ContentSequence"][0]["GraphicData"], json!([1.0, 2.0]));
        assert_eq!(
            tree[0]["ContentSequence"][1]["ContentSequence"]["GraphicData"],
            json!([3.5, 4.5, 5.5])
        );

        let requests = retriever.requests.lock().unwrap();
        assert!(requests.iter().all(|r| r.sop_instance_uid == "1.2.3.4"));
    }

    #[tokio::test]
    async fn test_tree_without_references_is_untouched() {
        let retriever = MockRetriever::new(&[]);
        let mut tree = json!([{"ValueType": "TEXT", "TextValue": "BulkDataURI"}]);
        let before = tree.clone();

        assert_eq!(resolve_bulk_data(&mut tree, &retriever, &uids()).await.unwrap(), 0);
        assert_eq!(tree, before);
        assert_eq!(retriever.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failed_branch_does_not_block_siblings() {
        let retriever = MockRetriever::new(&[("bulk/ok", vec![7.0])]);
        let mut tree = json!([
            {"GraphicData": {"BulkDataURI": "bulk/missing"}},
            {"GraphicData": {"BulkDataURI": "bulk/ok"}}
        ]);

        let err = resolve_bulk_data(&mut tree, &retriever, &uids()).await.unwrap_err();

        match err {
            SrcatError::BulkData { uri, path, .. } => {
                assert_eq!(uri, "bulk/missing");
                assert_eq!(path, "$[0].GraphicData");
            }
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(tree[1]["GraphicData"], json!([7.0]));
        assert_eq!(retriever.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_truncated_payload_is_an_error() {
        let mut retriever = MockRetriever::new(&[]);
        retriever.payloads.insert("bulk/odd".to_string(), vec![0, 0, 128]);
        let mut tree = json!({"GraphicData": {"BulkDataURI": "bulk/odd"}});

        let err = resolve_bulk_data(&mut tree, &retriever, &uids()).await.unwrap_err();
        assert!(matches!(err, SrcatError::BulkData { .. }));
    }

    #[tokio::test]
    async fn test_file_retriever_reads_relative_to_root() {
        let dir = tempfile::tempdir().unwrap();
        let bytes: Vec<u8> = [1.25f32, -2.0].iter().flat_map(|v| v.to_le_bytes()).collect();
        std::fs::write(dir.path().join("graphic.raw"), &bytes).unwrap();

        let retriever = FileBulkDataRetriever::new(dir.path());
        let mut tree = json!({"GraphicData": {"BulkDataURI": "graphic.raw"}});
        resolve_bulk_data(&mut tree, &retriever, &uids()).await.unwrap();

        assert_eq!(tree["GraphicData"], json!([1.25, -2.0]));
    }

    #[test]
    fn test_file_retriever_paths() {
        let retriever = FileBulkDataRetriever::new("/data/bulk");
        assert_eq!(retriever.path_for("a/b.raw").unwrap(), PathBuf::from("/data/bulk/a/b.raw"));
        assert_eq!(retriever.path_for("./c.raw").unwrap(), PathBuf::from("/data/bulk/c.raw"));
    }

    #[test]
    fn test_file_retriever_rejects_paths_outside_root() {
        let retriever = FileBulkDataRetriever::new("/data/bulk");
        for uri in ["/etc/passwd", "file:///etc/passwd", "../secret.raw", "a/../../b.raw", ""] {
            assert!(
                matches!(retriever.path_for(uri), Err(SrcatError::InvalidValue(_))),
                "{} was accepted",
                uri
            );
        }
    }

    #[tokio::test]
    async fn test_file_retriever_does_not_read_outside_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("bulk");
        std::fs::create_dir(&root).unwrap();
        let outside = dir.path().join("outside.raw");
        std::fs::write(&outside, 1.0f32.to_le_bytes()).unwrap();

        let retriever = FileBulkDataRetriever::new(&root);
        let mut tree = json!({"GraphicData": {"BulkDataURI": outside.to_str().unwrap()}});
        let result = resolve_bulk_data(&mut tree, &retriever, &uids()).await;

        assert!(matches!(result, Err(SrcatError::BulkData { .. })));
    }
}

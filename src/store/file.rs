// Copyright 2025 dentsusoken
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Directory-backed table shared by processes on one host (or one shared
//! filesystem with working advisory locks).
//!
//! Each item lives in `<root>/<table>/<digest>.json`, where `<digest>` is the
//! hex SHA-256 of the item key. The document carries the full key attributes
//! and reads check them. A conditional mutation takes an exclusive advisory
//! lock on the sibling `<digest>.guard` file, reads the current document,
//! evaluates the condition and then either renames a freshly written
//! temporary file over the document or removes it.
//! Guard files are never deleted: removing one while another process waits on
//! it would let two writers hold different inodes at the same time.

use crate::locking::cancellation::CancellationToken;
use crate::store::{
    AttributeValue, DeleteItemRequest, Item, ItemKey, LockStore, PutItemRequest, StoreError,
    StoreErrorKind,
};
use log::{trace, warn};
use sha2::{Digest, Sha256};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

const DOCUMENT_EXTENSION: &str = "json";
const GUARD_EXTENSION: &str = "guard";
const KEY_SEPARATOR: u8 = 0x1f;

#[derive(Debug, Clone)]
pub struct FileLockStore {
    root: PathBuf,
}

impl FileLockStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn table_dir(&self, table_name: &str) -> Result<PathBuf, StoreError> {
        if !is_valid_table_name(table_name) {
            return Err(StoreError::other(format!(
                "table name '{table_name}' is not a valid directory-safe table name"
            )));
        }
        Ok(self.root.join(table_name))
    }

    fn document_path(dir: &Path, key: &ItemKey) -> PathBuf {
        dir.join(format!("{}.{DOCUMENT_EXTENSION}", storage_id(key)))
    }

    fn guard_path(dir: &Path, key: &ItemKey) -> PathBuf {
        dir.join(format!("{}.{GUARD_EXTENSION}", storage_id(key)))
    }

    /// Runs `op` while holding the exclusive guard for `key`.
    fn with_item_guard<T>(
        &self,
        table_name: &str,
        key: &ItemKey,
        op: impl FnOnce(&Path, &Path) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let dir = self.table_dir(table_name)?;
        fs::create_dir_all(&dir)
            .map_err(|err| io_error(&format!("creating {}", dir.display()), err))?;

        let guard_path = Self::guard_path(&dir, key);
        let guard = open_guard(&guard_path)
            .map_err(|err| io_error(&format!("opening {}", guard_path.display()), err))?;
        guard
            .lock()
            .map_err(|err| io_error(&format!("locking {}", guard_path.display()), err))?;

        let document = Self::document_path(&dir, key);
        let result = op(&dir, &document);

        if let Err(err) = guard.unlock() {
            warn!("Failed to unlock item guard {}: {err}", guard_path.display());
        }
        result
    }
}

impl LockStore for FileLockStore {
    fn put_item(
        &self,
        request: &PutItemRequest,
        cancel: &CancellationToken,
    ) -> Result<(), StoreError> {
        self.with_item_guard(&request.table_name, &request.key, |dir, document| {
            if cancel.is_cancelled() {
                return Err(StoreError::cancelled());
            }

            let current = read_document(document, &request.key)?;
            if !request
                .condition
                .evaluate(current.as_ref(), &request.expression_values)?
            {
                trace!("Put rejected for {}: {}", request.key, request.condition);
                return Err(StoreError::conditional_check_failed(format!(
                    "put on {} did not satisfy {}",
                    request.key, request.condition
                )));
            }

            write_document(dir, document, &request.item)
        })
    }

    fn delete_item(
        &self,
        request: &DeleteItemRequest,
        cancel: &CancellationToken,
    ) -> Result<(), StoreError> {
        self.with_item_guard(&request.table_name, &request.key, |_, document| {
            if cancel.is_cancelled() {
                return Err(StoreError::cancelled());
            }

            let current = read_document(document, &request.key)?;
            if !request
                .condition
                .evaluate(current.as_ref(), &request.expression_values)?
            {
                trace!("Delete rejected for {}: {}", request.key, request.condition);
                return Err(StoreError::conditional_check_failed(format!(
                    "delete on {} did not satisfy {}",
                    request.key, request.condition
                )));
            }

            match fs::remove_file(document) {
                Ok(()) => Ok(()),
                Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
                Err(err) => Err(io_error(
                    &format!("removing {}", document.display()),
                    err,
                )),
            }
        })
    }

    fn get_item(&self, table_name: &str, key: &ItemKey) -> Result<Option<Item>, StoreError> {
        let dir = self.table_dir(table_name)?;
        read_document(&Self::document_path(&dir, key), key)
    }
}

/// Table names follow the usual table-service alphabet, which is also safe as
/// a single path component.
pub fn is_valid_table_name(name: &str) -> bool {
    (3..=255).contains(&name.len())
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        && !name.chars().all(|c| c == '.')
}

/// Fixed-length file stem for `key`, independent of the resource id length.
fn storage_id(key: &ItemKey) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.partition_value.as_bytes());
    hasher.update([KEY_SEPARATOR]);
    hasher.update(key.sort_value.as_bytes());
    hex::encode(hasher.finalize())
}

fn holds_key(item: &Item, key: &ItemKey) -> bool {
    let attribute_is = |name: &str, expected: &str| {
        item.get(name).and_then(AttributeValue::as_str) == Some(expected)
    };
    attribute_is(&key.partition_attribute, &key.partition_value)
        && attribute_is(&key.sort_attribute, &key.sort_value)
}

fn open_guard(path: &Path) -> io::Result<File> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
}

fn read_document(path: &Path, key: &ItemKey) -> Result<Option<Item>, StoreError> {
    let item: Item = match fs::read(path) {
        Ok(bytes) => serde_json::from_slice(&bytes).map_err(|err| {
            StoreError::other(format!("item document {} is corrupt: {err}", path.display()))
        })?,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(io_error(&format!("reading {}", path.display()), err)),
    };

    if !holds_key(&item, key) {
        return Err(StoreError::other(format!(
            "item document {} does not belong to {key}",
            path.display()
        )));
    }
    Ok(Some(item))
}

fn write_document(dir: &Path, path: &Path, item: &Item) -> Result<(), StoreError> {
    let payload = serde_json::to_vec_pretty(item)
        .map_err(|err| StoreError::other(format!("encoding item: {err}")))?;

    let mut staging = NamedTempFile::new_in(dir)
        .map_err(|err| io_error(&format!("staging in {}", dir.display()), err))?;
    staging
        .write_all(&payload)
        .and_then(|()| staging.as_file().sync_all())
        .map_err(|err| io_error("writing staged item", err))?;
    staging
        .persist(path)
        .map_err(|err| io_error(&format!("replacing {}", path.display()), err.error))?;
    Ok(())
}

fn io_error(context: &str, err: io::Error) -> StoreError {
    let kind = match err.kind() {
        io::ErrorKind::Interrupted | io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => {
            StoreErrorKind::TransientServerError
        }
        _ => StoreErrorKind::Other,
    };
    StoreError::new(kind, format!("{context}: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Condition, ExpressionValues};
    use std::sync::Arc;
    use std::thread;
    use tempfile::TempDir;

    fn key(resource: &str) -> ItemKey {
        ItemKey::new("pk", format!("lock#{resource}"), "sk", "metadata#lock")
    }

    fn claim(resource: &str, owner: &str) -> PutItemRequest {
        let mut item = key(resource).to_item();
        item.insert("ownerId".to_string(), AttributeValue::string(owner));
        PutItemRequest {
            table_name: "locks".to_string(),
            key: key(resource),
            item,
            condition: Condition::attribute_not_exists("pk"),
            expression_values: ExpressionValues::new(),
        }
    }

    #[test]
    fn put_then_get_round_trips_through_disk() {
        let temp = TempDir::new().unwrap();
        let store = FileLockStore::new(temp.path());
        store
            .put_item(&claim("job/1", "alice"), &CancellationToken::new())
            .unwrap();

        let reopened = FileLockStore::new(temp.path());
        let item = reopened.get_item("locks", &key("job/1")).unwrap().unwrap();
        assert_eq!(item.get("ownerId"), Some(&AttributeValue::string("alice")));
    }

    #[test]
    fn second_claim_is_rejected() {
        let temp = TempDir::new().unwrap();
        let store = FileLockStore::new(temp.path());
        let cancel = CancellationToken::new();
        store.put_item(&claim("job", "alice"), &cancel).unwrap();

        let err = store.put_item(&claim("job", "bob"), &cancel).unwrap_err();
        assert!(err.is_conditional_check_failed());
    }

    #[test]
    fn delete_removes_document_but_keeps_guard() {
        let temp = TempDir::new().unwrap();
        let store = FileLockStore::new(temp.path());
        let cancel = CancellationToken::new();
        store.put_item(&claim("job", "alice"), &cancel).unwrap();

        let mut values = ExpressionValues::new();
        values.insert(":owner".to_string(), AttributeValue::string("alice"));
        let request = DeleteItemRequest {
            table_name: "locks".to_string(),
            key: key("job"),
            condition: Condition::equals("ownerId", ":owner"),
            expression_values: values,
        };
        store.delete_item(&request, &cancel).unwrap();

        assert!(store.get_item("locks", &key("job")).unwrap().is_none());
        let remaining: Vec<_> = fs::read_dir(temp.path().join("locks"))
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect();
        assert_eq!(remaining.len(), 1);
        assert_eq!(
            remaining[0].extension().and_then(|ext| ext.to_str()),
            Some(GUARD_EXTENSION)
        );
    }

    #[test]
    fn corrupt_document_is_reported() {
        let temp = TempDir::new().unwrap();
        let store = FileLockStore::new(temp.path());
        let dir = temp.path().join("locks");
        fs::create_dir_all(&dir).unwrap();
        fs::write(FileLockStore::document_path(&dir, &key("job")), b"{not json").unwrap();

        let err = store.get_item("locks", &key("job")).unwrap_err();
        assert_eq!(err.kind(), StoreErrorKind::Other);
        assert!(err.message().contains("corrupt"));
    }

    #[test]
    fn file_names_have_fixed_length() {
        let short = storage_id(&key("a"));
        let long = storage_id(&key(&"r".repeat(4096)));
        assert_eq!(short.len(), 64);
        assert_eq!(long.len(), 64);
        assert_ne!(short, long);
    }

    #[test]
    fn document_for_another_key_is_rejected() {
        let temp = TempDir::new().unwrap();
        let store = FileLockStore::new(temp.path());
        store
            .put_item(&claim("job", "alice"), &CancellationToken::new())
            .unwrap();

        let dir = temp.path().join("locks");
        fs::copy(
            FileLockStore::document_path(&dir, &key("job")),
            FileLockStore::document_path(&dir, &key("other")),
        )
        .unwrap();

        let err = store.get_item("locks", &key("other")).unwrap_err();
        assert_eq!(err.kind(), StoreErrorKind::Other);
        assert!(err.message().contains("does not belong"));
    }

    #[test]
    fn rejects_path_like_table_names() {
        assert!(is_valid_table_name("locks"));
        assert!(is_valid_table_name("team.locks-v2"));
        assert!(!is_valid_table_name("../etc"));
        assert!(!is_valid_table_name("..."));
        assert!(!is_valid_table_name("ab"));
        assert!(!is_valid_table_name("a/b/c"));

        let temp = TempDir::new().unwrap();
        let store = FileLockStore::new(temp.path());
        let err = store.get_item("a/b/c", &key("job")).unwrap_err();
        assert_eq!(err.kind(), StoreErrorKind::Other);
    }

    #[test]
    fn concurrent_claims_admit_exactly_one_writer() {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(FileLockStore::new(temp.path()));

        let workers: Vec<_> = (0..8)
            .map(|idx| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    store
                        .put_item(&claim("shared", &format!("owner-{idx}")), &CancellationToken::new())
                        .is_ok()
                })
            })
            .collect();

        let winners = workers
            .into_iter()
            .map(|worker| worker.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }
}

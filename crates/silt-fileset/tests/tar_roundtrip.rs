//! Ingest a tar archive into a file set, export it, and re-ingest the
//! export: the second export must be byte-identical to the first.

use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use silt_core::id::FilesetId;
use silt_core::path::clean_tar_path;
use silt_core::storage::MemoryBackend;
use silt_fileset::{FilesetStorage, TarFileWriter, write_tar_stream};

const TTL: Duration = Duration::from_secs(600);

fn source_archive() -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());

    let mut header = tar::Header::new_gnu();
    header.set_entry_type(tar::EntryType::Regular);
    header.set_mode(0o644);
    header.set_size(11);
    builder
        .append_data(&mut header, "a.txt", &b"hello world"[..])
        .unwrap();

    let mut header = tar::Header::new_gnu();
    header.set_entry_type(tar::EntryType::Directory);
    header.set_mode(0o755);
    header.set_size(0);
    builder
        .append_data(&mut header, "d/", std::io::empty())
        .unwrap();

    let mut header = tar::Header::new_gnu();
    header.set_entry_type(tar::EntryType::Regular);
    header.set_mode(0o644);
    header.set_size(600);
    builder
        .append_data(&mut header, "d/inner.bin", &[42_u8; 600][..])
        .unwrap();

    builder.into_inner().unwrap()
}

async fn ingest(storage: &FilesetStorage, tar_bytes: &[u8]) -> FilesetId {
    let mut writer = storage.new_writer(TTL);
    let mut archive = tar::Archive::new(tar_bytes);
    for entry in archive.entries().unwrap() {
        let mut entry = entry.unwrap();
        let header = entry.header().clone();
        let name = entry.path().unwrap().to_string_lossy().into_owned();
        let path = clean_tar_path(&name, header.entry_type().is_dir());
        let mut content = Vec::new();
        entry.read_to_end(&mut content).unwrap();

        let mut tar_writer = TarFileWriter::new(writer.create(&path), &header)
            .await
            .unwrap();
        tar_writer.write(&content).await.unwrap();
        tar_writer.close().await.unwrap();
    }
    writer.close().await.unwrap()
}

async fn export(storage: &FilesetStorage, id: FilesetId) -> Vec<u8> {
    let fileset = storage.open(id).await.unwrap();
    let mut out = Vec::new();
    write_tar_stream(
        storage.chunk_store(),
        &mut out,
        Arc::new(fileset),
        &CancellationToken::new(),
    )
    .await
    .unwrap();
    out
}

#[tokio::test]
async fn export_reingest_export_is_stable() {
    let storage = FilesetStorage::new(Arc::new(MemoryBackend::new()));

    let first_id = ingest(&storage, &source_archive()).await;
    let first_export = export(&storage, first_id).await;

    let second_id = ingest(&storage, &first_export).await;
    let second_export = export(&storage, second_id).await;

    assert_eq!(first_export, second_export);
}

#[tokio::test]
async fn exported_archive_preserves_entry_contents() {
    let storage = FilesetStorage::new(Arc::new(MemoryBackend::new()));
    let id = ingest(&storage, &source_archive()).await;
    let exported = export(&storage, id).await;

    let mut archive = tar::Archive::new(exported.as_slice());
    let mut seen = Vec::new();
    for entry in archive.entries().unwrap() {
        let mut entry = entry.unwrap();
        let path = entry.path().unwrap().to_string_lossy().into_owned();
        let size = entry.header().size().unwrap();
        let mut content = Vec::new();
        entry.read_to_end(&mut content).unwrap();
        seen.push((path, size, content));
    }

    assert_eq!(seen.len(), 3);
    assert_eq!(seen[0], ("a.txt".into(), 11, b"hello world".to_vec()));
    assert_eq!(seen[1].0, "d/");
    assert_eq!(seen[1].1, 0);
    assert_eq!(seen[2], ("d/inner.bin".into(), 600, vec![42_u8; 600]));
}

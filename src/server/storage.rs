//! 本地对象存储
//!
//! 上传的文件按扩展名归类到不同前缀下，小文件整块写入，
//! 大文件按分片并发写入同一个目标文件的不同偏移，每个分片单独上报进度

use crate::server::hub::ProgressPublisher;
use crate::server::tracker::ProgressTracker;
use crate::uploader::chunk::Part;
use axum::body::Bytes;
use futures::stream::{self, TryStreamExt};
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, info};

/// 每次写入的字节数，也是进度统计的粒度
const WRITE_SLICE: usize = 64 * 1024;

/// 按扩展名选择对象键前缀
pub fn key_prefix(file_name: &str) -> &'static str {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "csv" | "xlsx" => "spreadsheets",
        "jpg" | "jpeg" | "png" => "images",
        "pdf" => "pdfs",
        "gif" => "gifs",
        "mp4" | "avi" | "m4a" | "mkv" => "videos",
        "mp3" | "wav" | "ogg" => "musics",
        _ => "misc",
    }
}

/// 生成对象键：`{前缀}/{文件名}`
///
/// 只保留文件名的最后一段，防止路径穿越；无法得到合法文件名时返回 None
pub fn object_key(file_name: &str) -> Option<String> {
    let name = Path::new(file_name).file_name()?.to_str()?;
    if name.is_empty() || name == "." || name == ".." {
        return None;
    }
    Some(format!("{}/{}", key_prefix(name), name))
}

/// 校验客户端给出的对象键，只接受 `object_key` 能生成的形式
pub fn parse_object_key(key: &str) -> Option<String> {
    let (_, name) = key.split_once('/')?;
    object_key(name).filter(|expected| expected == key)
}

/// 对象的下载地址
pub fn file_url(key: &str) -> String {
    let encoded: Vec<String> = key
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect();
    format!("/files/{}", encoded.join("/"))
}

/// 本地目录存储
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
    /// 分片并发写入数
    concurrency: usize,
    /// 进度推送步长（百分比）
    progress_step: f64,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>, concurrency: usize, progress_step: f64) -> Self {
        Self {
            root: root.into(),
            concurrency: concurrency.max(1),
            progress_step,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 对象在磁盘上的路径
    pub fn path_of(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    async fn prepare(&self, key: &str) -> std::io::Result<PathBuf> {
        let path = self.path_of(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(path)
    }

    /// 读取对象，不存在时返回 None
    pub async fn get(&self, key: &str) -> std::io::Result<Option<Vec<u8>>> {
        match fs::read(self.path_of(key)).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// 删除对象，返回是否真的删除了文件
    pub async fn delete(&self, key: &str) -> std::io::Result<bool> {
        match fs::remove_file(self.path_of(key)).await {
            Ok(()) => {
                info!("对象已删除: key={}", key);
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("对象不存在，无需删除: key={}", key);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// 整块写入（单分片）
    pub async fn put_single(
        &self,
        key: &str,
        data: Bytes,
        publisher: &ProgressPublisher,
    ) -> std::io::Result<u32> {
        let path = self.prepare(key).await?;
        let mut file = fs::File::create(&path).await?;
        let part = Part {
            part_number: 1,
            range: 0..data.len() as u64,
            expected_end: true,
        };
        write_part(&mut file, &part, &data, self.progress_step, publisher).await?;
        file.flush().await?;

        info!("单分片写入完成: key={}, size={}", key, data.len());
        Ok(1)
    }

    /// 分片并发写入，返回写入的分片数
    pub async fn put_multipart(
        &self,
        key: &str,
        data: Bytes,
        parts: Vec<Part>,
        publisher: &ProgressPublisher,
    ) -> std::io::Result<u32> {
        let path = self.prepare(key).await?;
        {
            // 先创建并撑开目标文件，各分片再按偏移写入
            let file = fs::File::create(&path).await?;
            file.set_len(data.len() as u64).await?;
        }

        let count = parts.len() as u32;
        stream::iter(parts.into_iter().map(Ok::<Part, std::io::Error>))
            .try_for_each_concurrent(self.concurrency, |part| {
                let path = path.clone();
                let data = data.clone();
                let publisher = publisher.clone();
                let step = self.progress_step;
                async move {
                    let mut file = OpenOptions::new().write(true).open(&path).await?;
                    file.seek(SeekFrom::Start(part.range.start)).await?;
                    let slice = part.slice(&data).ok_or_else(|| {
                        std::io::Error::new(
                            std::io::ErrorKind::InvalidInput,
                            format!("分片超出数据范围: part={}", part.part_number),
                        )
                    })?;
                    write_part(&mut file, &part, slice, step, &publisher).await?;
                    file.flush().await?;
                    debug!("分片写入完成: key={}, part={}", path.display(), part.part_number);
                    Ok(())
                }
            })
            .await?;

        info!(
            "分片写入完成: key={}, size={}, parts={}",
            key,
            data.len(),
            count
        );
        Ok(count)
    }
}

/// 按固定粒度写入一个分片并上报进度
async fn write_part(
    file: &mut fs::File,
    part: &Part,
    data: &[u8],
    step: f64,
    publisher: &ProgressPublisher,
) -> std::io::Result<()> {
    let mut tracker = ProgressTracker::new(part.part_number, part.size(), step);
    for slice in data.chunks(WRITE_SLICE) {
        file.write_all(slice).await?;
        if let Some(message) = tracker.advance(slice.len() as u64) {
            publisher.publish(message);
        }
    }
    if let Some(message) = tracker.finish() {
        publisher.publish(message);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::hub::ProgressHub;
    use crate::uploader::chunk::split_parts;
    use std::collections::HashMap;

    #[test]
    fn test_key_prefix() {
        assert_eq!(key_prefix("report.CSV"), "spreadsheets");
        assert_eq!(key_prefix("book.xlsx"), "spreadsheets");
        assert_eq!(key_prefix("cat.jpeg"), "images");
        assert_eq!(key_prefix("doc.pdf"), "pdfs");
        assert_eq!(key_prefix("anim.gif"), "gifs");
        assert_eq!(key_prefix("clip.m4a"), "videos");
        assert_eq!(key_prefix("song.ogg"), "musics");
        assert_eq!(key_prefix("README"), "misc");
    }

    #[test]
    fn test_object_key_strips_directories() {
        assert_eq!(object_key("../../etc/passwd").as_deref(), Some("misc/passwd"));
        assert_eq!(object_key("a/b/photo.png").as_deref(), Some("images/photo.png"));
        assert_eq!(object_key(".."), None);
        assert_eq!(object_key(""), None);
    }

    #[test]
    fn test_parse_object_key() {
        assert_eq!(
            parse_object_key("videos/clip.mkv").as_deref(),
            Some("videos/clip.mkv")
        );
        // 前缀必须与扩展名一致，且不能带目录
        assert_eq!(parse_object_key("images/clip.mkv"), None);
        assert_eq!(parse_object_key("misc/../secret"), None);
        assert_eq!(parse_object_key("misc/.."), None);
        assert_eq!(parse_object_key("passwd"), None);
    }

    #[test]
    fn test_file_url_encodes_name() {
        assert_eq!(file_url("videos/clip.mkv"), "/files/videos/clip.mkv");
        assert_eq!(file_url("misc/a b#1"), "/files/misc/a%20b%231");
    }

    #[tokio::test]
    async fn test_get_and_delete() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(temp_dir.path(), 1, 5.0);
        let hub = ProgressHub::new();
        let publisher = hub.publisher("note.txt");
        store
            .put_single("misc/note.txt", Bytes::from_static(b"hello"), &publisher)
            .await
            .unwrap();

        assert_eq!(
            store.get("misc/note.txt").await.unwrap().as_deref(),
            Some(&b"hello"[..])
        );
        assert!(store.delete("misc/note.txt").await.unwrap());
        assert!(!store.delete("misc/note.txt").await.unwrap());
        assert_eq!(store.get("misc/note.txt").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_put_single() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(temp_dir.path(), 2, 5.0);
        let hub = ProgressHub::new();
        let (_, mut rx) = hub.subscribe("a.txt");
        let publisher = hub.publisher("a.txt");

        let data = Bytes::from(vec![1u8; 300 * 1024]);
        let parts = store.put_single("misc/a.txt", data, &publisher).await.unwrap();
        assert_eq!(parts, 1);
        assert_eq!(
            fs::metadata(store.path_of("misc/a.txt")).await.unwrap().len(),
            300 * 1024
        );

        let slot_id = publisher.slot_id();
        drop(publisher);
        hub.finish("a.txt", slot_id);
        let mut last = None;
        while let Some(msg) = rx.recv().await {
            assert_eq!(msg.part_number, 1);
            last = Some(msg.percentage);
        }
        assert_eq!(last, Some(100.0));
    }

    #[tokio::test]
    async fn test_put_multipart() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(temp_dir.path(), 2, 25.0);
        let hub = ProgressHub::new();
        let (_, mut rx) = hub.subscribe("big.bin");
        let publisher = hub.publisher("big.bin");

        let size = 2 * 1024 * 1024 + 100;
        let content: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
        let parts = split_parts(size as u64, 1024 * 1024);
        assert_eq!(parts.len(), 3);

        let count = store
            .put_multipart("misc/big.bin", Bytes::from(content.clone()), parts, &publisher)
            .await
            .unwrap();
        assert_eq!(count, 3);

        let written = fs::read(store.path_of("misc/big.bin")).await.unwrap();
        assert_eq!(written, content);

        let slot_id = publisher.slot_id();
        drop(publisher);
        hub.finish("big.bin", slot_id);
        let mut finals = HashMap::new();
        while let Some(msg) = rx.recv().await {
            finals.insert(msg.part_number, msg.percentage);
        }
        assert_eq!(finals.len(), 3);
        assert!(finals.values().all(|p| *p == 100.0));
    }
}

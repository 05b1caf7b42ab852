//! File-backed accessors built on `tokio::fs`.
use std::{io::SeekFrom, path::Path, sync::Arc};

use async_trait::async_trait;
use tokio::{
    fs::{File, OpenOptions},
    io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt},
    sync::Mutex,
};
use tokio_util::sync::CancellationToken;

use crate::{
    error::{RiffError, RiffResult},
    io::{
        address_range, buffer_len, ReadAccessor, SharedReadAccessor, SharedWriteAccessor,
        WriteAccessor,
    },
    log,
};

/// File handle shared by a top-level file accessor and all of its views.
#[derive(Debug)]
struct FileShared {
    file: Mutex<Option<File>>,
    closed: CancellationToken,
}

impl FileShared {
    fn new(file: File) -> Self {
        FileShared {
            file: Mutex::new(Some(file)),
            closed: CancellationToken::new(),
        }
    }

    /// Races `op` against the caller's cancellation and the handle being closed.
    async fn guarded<T, F>(&self, cancel: &CancellationToken, op: F) -> RiffResult<T>
    where
        F: std::future::Future<Output = RiffResult<T>>,
    {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(RiffError::OperationCancelled),
            _ = self.closed.cancelled() => Err(RiffError::IOError("File closed.".into())),
            res = op => res,
        }
    }

    fn ensure_open(&self) -> RiffResult<()> {
        match self.closed.is_cancelled() {
            true => Err(RiffError::IOError(
                "The accessor was already ended.".into(),
            )),
            false => Ok(()),
        }
    }

    async fn close(&self, toplevel: bool) -> RiffResult<()> {
        if !toplevel {
            return Err(RiffError::InvalidOperation(
                "Not top-level accessor.".into(),
            ));
        }
        if self.closed.is_cancelled() {
            return Err(RiffError::InvalidOperation(
                "The accessor was already ended.".into(),
            ));
        }
        // Wake pending operations first so they release the handle.
        self.closed.cancel();
        let mut file = self.file.lock().await;
        if let Some(mut f) = file.take() {
            f.flush().await?;
        }
        Ok(())
    }
}

async fn open_with<F>(cancel: &CancellationToken, open: F) -> RiffResult<File>
where
    F: std::future::Future<Output = std::io::Result<File>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(RiffError::OperationCancelled),
        res = open => Ok(res?),
    }
}

/// Read accessor over a file opened read-only.
#[derive(Debug)]
pub struct FileReadAccessor {
    shared: Arc<FileShared>,
    offset: u64,
    toplevel: bool,
}

impl FileReadAccessor {
    pub async fn open<P: AsRef<Path>>(path: P, cancel: &CancellationToken) -> RiffResult<Self> {
        let file = open_with(cancel, File::open(path.as_ref())).await?;
        log!(log::Level::Debug, "Opened {} for reading", path.as_ref().display());
        Ok(FileReadAccessor {
            shared: Arc::new(FileShared::new(file)),
            offset: 0,
            toplevel: true,
        })
    }

    /// Size of the file in bytes, as seen from address 0 of this view.
    pub async fn size(&self) -> RiffResult<u64> {
        self.shared.ensure_open()?;
        let file = self.shared.file.lock().await;
        let file = file
            .as_ref()
            .ok_or_else(|| RiffError::IOError("File closed.".into()))?;
        let len = file.metadata().await?.len();
        Ok(len.saturating_sub(self.offset))
    }

    pub fn is_ended(&self) -> bool {
        self.shared.closed.is_cancelled()
    }

    /// Closes the file. Only the top-level accessor may do this; every view stops working.
    pub async fn end(&self) -> RiffResult<()> {
        self.shared.close(self.toplevel).await
    }
}

#[async_trait]
impl ReadAccessor for FileReadAccessor {
    async fn read(
        &self,
        address: u64,
        length: u64,
        cancel: &CancellationToken,
    ) -> RiffResult<Vec<u8>> {
        if length == 0 {
            return Ok(Vec::new());
        }
        self.shared.ensure_open()?;
        let (begin, _) = address_range(self.offset, address, length)?;
        let mut buf = vec![0; buffer_len(length)?];

        self.shared
            .guarded(cancel, async {
                let mut file = self.shared.file.lock().await;
                let file = file
                    .as_mut()
                    .ok_or_else(|| RiffError::IOError("File closed.".into()))?;
                file.seek(SeekFrom::Start(begin)).await?;
                match file.read_exact(&mut buf).await {
                    Ok(_) => Ok(()),
                    Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                        Err(RiffError::IOError("Address overflow.".into()))
                    }
                    Err(e) => Err(e.into()),
                }
            })
            .await?;
        Ok(buf)
    }

    fn sub(&self, offset: u64) -> SharedReadAccessor {
        Arc::new(FileReadAccessor {
            shared: Arc::clone(&self.shared),
            offset: self.offset.saturating_add(offset),
            toplevel: false,
        })
    }
}

/// Write accessor over a file created (or truncated) for writing.
#[derive(Debug)]
pub struct FileWriteAccessor {
    shared: Arc<FileShared>,
    offset: u64,
    toplevel: bool,
}

impl FileWriteAccessor {
    pub async fn create<P: AsRef<Path>>(path: P, cancel: &CancellationToken) -> RiffResult<Self> {
        let file = open_with(
            cancel,
            OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(path.as_ref()),
        )
        .await?;
        log!(log::Level::Debug, "Opened {} for writing", path.as_ref().display());
        Ok(FileWriteAccessor {
            shared: Arc::new(FileShared::new(file)),
            offset: 0,
            toplevel: true,
        })
    }

    pub fn is_ended(&self) -> bool {
        self.shared.closed.is_cancelled()
    }

    /// Flushes and closes the file. Only the top-level accessor may do this.
    pub async fn end(&self) -> RiffResult<()> {
        self.shared.close(self.toplevel).await
    }
}

#[async_trait]
impl WriteAccessor for FileWriteAccessor {
    async fn write(&self, address: u64, data: &[u8], cancel: &CancellationToken) -> RiffResult<()> {
        if data.is_empty() {
            return Ok(());
        }
        self.shared.ensure_open()?;
        let (begin, _) = address_range(self.offset, address, data.len() as u64)?;

        self.shared
            .guarded(cancel, async {
                let mut file = self.shared.file.lock().await;
                let file = file
                    .as_mut()
                    .ok_or_else(|| RiffError::IOError("File closed.".into()))?;
                file.seek(SeekFrom::Start(begin)).await?;
                file.write_all(data).await?;
                Ok(())
            })
            .await
    }

    fn sub(&self, offset: u64) -> SharedWriteAccessor {
        Arc::new(FileWriteAccessor {
            shared: Arc::clone(&self.shared),
            offset: self.offset.saturating_add(offset),
            toplevel: false,
        })
    }
}

#[cfg(test)]
mod file_tests {
    use std::path::PathBuf;

    use super::*;

    const TEST_OUTPUT: &str = "./test_resources/tmp/";

    fn tmp_path(name: &str) -> PathBuf {
        std::fs::create_dir_all(TEST_OUTPUT).unwrap();
        PathBuf::from(TEST_OUTPUT).join(name)
    }

    #[tokio::test]
    async fn write_then_read_back() {
        let path = tmp_path("file_accessor_round_trip.bin");
        let cancel = CancellationToken::new();

        let writer = FileWriteAccessor::create(&path, &cancel).await.unwrap();
        writer.write(0, b"RIFF", &cancel).await.unwrap();
        writer.sub(8).write(0, b"WAVE", &cancel).await.unwrap();
        writer.write(4, &[1, 0, 0, 0], &cancel).await.unwrap();
        writer.end().await.unwrap();

        let reader = FileReadAccessor::open(&path, &cancel).await.unwrap();
        assert_eq!(reader.size().await.unwrap(), 12);
        assert_eq!(
            reader.read(0, 12, &cancel).await.unwrap(),
            b"RIFF\x01\x00\x00\x00WAVE"
        );
        assert_eq!(reader.sub(8).read(0, 4, &cancel).await.unwrap(), b"WAVE");

        let err = reader.read(10, 4, &cancel).await.unwrap_err();
        assert!(matches!(err, RiffError::IOError(_)));

        reader.end().await.unwrap();
        std::fs::remove_file(&path).unwrap();
    }

    #[tokio::test]
    async fn ended_file_rejects_views() {
        let path = tmp_path("file_accessor_ended.bin");
        let cancel = CancellationToken::new();
        std::fs::write(&path, b"0123456789").unwrap();

        let reader = FileReadAccessor::open(&path, &cancel).await.unwrap();
        let view = reader.sub(2);
        assert_eq!(view.read(0, 2, &cancel).await.unwrap(), b"23");

        reader.end().await.unwrap();
        assert!(reader.is_ended());
        let err = view.read(0, 2, &cancel).await.unwrap_err();
        assert!(matches!(err, RiffError::IOError(_)));
        assert!(matches!(
            reader.end().await,
            Err(RiffError::InvalidOperation(_))
        ));
        std::fs::remove_file(&path).unwrap();
    }

    #[tokio::test]
    async fn cancelled_open() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = FileReadAccessor::open("./does/not/matter.wav", &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, RiffError::OperationCancelled));
    }

    #[tokio::test]
    async fn missing_file_is_io_kind() {
        let err = FileReadAccessor::open("./test_resources/missing.wav", &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::IO);
    }
}

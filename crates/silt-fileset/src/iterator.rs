//! An explicit pull cursor over a file set.
//!
//! Bridges the push-style [`FileSet::iterate`] producer to imperative
//! consumer code: production runs on its own tokio task, handing files to
//! the consumer through a rendezvous channel of capacity 1, with at most
//! one error carried through a separate single-slot channel. The producer
//! observes cancellation before every handoff, so abandoning the iterator
//! early never leaks the production task.

use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use silt_core::Error as CoreError;

use crate::error::{Error, Result};
use crate::file::File;
use crate::fileset::FileSet;

/// A pull-style cursor with one-file lookahead.
pub struct FileSetIterator {
    peeked: Option<File>,
    file_rx: mpsc::Receiver<File>,
    err_rx: mpsc::Receiver<Error>,
}

impl FileSetIterator {
    /// Starts iterating `fileset`, producing files on a background task.
    ///
    /// Cancel `token` to release the producer if the iterator is dropped
    /// before exhaustion.
    #[must_use]
    pub fn new(token: CancellationToken, fileset: Arc<dyn FileSet>) -> Self {
        let (file_tx, file_rx) = mpsc::channel::<File>(1);
        let (err_tx, err_rx) = mpsc::channel::<Error>(1);

        let producer_token = token.clone();
        tokio::spawn(async move {
            let mut visit = {
                let token = producer_token.clone();
                move |file: File| -> BoxFuture<'static, Result<()>> {
                    let token = token.clone();
                    let tx = file_tx.clone();
                    Box::pin(async move {
                        tokio::select! {
                            () = token.cancelled() => {
                                Err(CoreError::Canceled("file set iteration".into()).into())
                            }
                            sent = tx.send(file) => sent.map_err(|_| {
                                // Consumer dropped the iterator; stop producing.
                                CoreError::Canceled("file set iterator dropped".into()).into()
                            }),
                        }
                    })
                }
            };
            if let Err(err) = fileset.iterate(&producer_token, &mut visit).await {
                // The error slot has capacity 1 and at most one error is
                // produced; a send failure means the consumer is gone.
                let _ = err_tx.send(err).await;
            }
        });

        Self {
            peeked: None,
            file_rx,
            err_rx,
        }
    }

    /// Returns the next file without consuming it.
    ///
    /// Idempotent: repeated calls without an intervening [`next`] return
    /// the same file and do not advance the cursor. Returns `None` at end
    /// of stream.
    ///
    /// [`next`]: Self::next
    pub async fn peek(&mut self) -> Result<Option<&File>> {
        if self.peeked.is_none() {
            self.peeked = self.pull().await?;
        }
        Ok(self.peeked.as_ref())
    }

    /// Consumes and returns the next file, or `None` when exhausted.
    pub async fn next(&mut self) -> Result<Option<File>> {
        if let Some(file) = self.peeked.take() {
            return Ok(Some(file));
        }
        self.pull().await
    }

    async fn pull(&mut self) -> Result<Option<File>> {
        match self.file_rx.recv().await {
            Some(file) => Ok(Some(file)),
            // The file channel closes only after the producer finished; any
            // error it hit is already buffered in the error slot.
            None => match self.err_rx.try_recv() {
                Ok(err) => Err(err),
                Err(_) => Ok(None),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fileset::IndexFileSet;
    use crate::index::Index;
    use silt_core::chunk::{DataOp, OpTag};

    fn fileset_of(paths: &[&str]) -> Arc<dyn FileSet> {
        let mut index = Index::new();
        for path in paths {
            index.insert((*path).into(), vec![DataOp::new(OpTag::Header)]);
        }
        Arc::new(IndexFileSet::new(index))
    }

    #[tokio::test]
    async fn next_drains_in_path_order() {
        let mut iter = FileSetIterator::new(CancellationToken::new(), fileset_of(&["/b", "/a"]));
        assert_eq!(iter.next().await.unwrap().unwrap().path, "/a");
        assert_eq!(iter.next().await.unwrap().unwrap().path, "/b");
        assert!(iter.next().await.unwrap().is_none());
        // Exhaustion is stable.
        assert!(iter.next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn peek_is_idempotent() {
        let mut iter = FileSetIterator::new(CancellationToken::new(), fileset_of(&["/a", "/b"]));
        for _ in 0..3 {
            assert_eq!(iter.peek().await.unwrap().unwrap().path, "/a");
        }
        assert_eq!(iter.next().await.unwrap().unwrap().path, "/a");
        assert_eq!(iter.peek().await.unwrap().unwrap().path, "/b");
    }

    #[tokio::test]
    async fn peek_at_end_returns_none() {
        let mut iter = FileSetIterator::new(CancellationToken::new(), fileset_of(&[]));
        assert!(iter.peek().await.unwrap().is_none());
        assert!(iter.next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn cancellation_releases_abandoned_producer() {
        let token = CancellationToken::new();
        let mut iter = FileSetIterator::new(token.clone(), fileset_of(&["/a", "/b", "/c"]));
        // Consume one file, then abandon the iterator.
        assert_eq!(iter.next().await.unwrap().unwrap().path, "/a");
        token.cancel();
        drop(iter);
        // The producer observes the token before its next handoff and
        // terminates rather than blocking forever; nothing to assert
        // beyond not hanging.
        tokio::task::yield_now().await;
    }
}

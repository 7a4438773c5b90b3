//! FIFO serializer giving exclusive, ordered access to the one open
//! connection backing a document file.
//!
//! A worker thread owns the `rusqlite::Connection`; units of work are boxed
//! closures admitted strictly in channel order and executed one at a time.
//! Reads and writes share the same discipline — the embedded engine's
//! single-file locking makes unmanaged concurrent access unsafe, so there
//! is deliberately no reader/writer distinction. Once dequeued, a unit runs
//! to completion; there is no mid-flight cancellation.

use crate::error::{DocbaseError, Result};
use crossbeam_channel::{bounded, unbounded, Sender};
use rusqlite::{Connection, Transaction};
use std::thread::{self, JoinHandle};

type Unit = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

pub struct OperationQueue {
    tx: Option<Sender<Unit>>,
    worker: Option<JoinHandle<()>>,
}

impl OperationQueue {
    /// Take exclusive ownership of an open connection and start serving
    /// units. The connection moves onto the worker thread and no other
    /// code may touch it (or open a second writer to the same file).
    pub fn start(conn: Connection) -> Result<Self> {
        let (tx, rx) = unbounded::<Unit>();
        let worker = thread::Builder::new()
            .name("docbase-operations".into())
            .spawn(move || {
                let mut conn = conn;
                for unit in rx {
                    unit(&mut conn);
                }
            })?;

        Ok(OperationQueue {
            tx: Some(tx),
            worker: Some(worker),
        })
    }

    /// Submit an auto-commit unit and block until it has executed.
    ///
    /// Units enqueued earlier have fully committed (or rolled back) before
    /// this unit starts; units enqueued later wait for it to finish.
    pub fn submit<R, F>(&self, unit: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<R> + Send + 'static,
    {
        let (reply_tx, reply_rx) = bounded(1);
        let tx = self.tx.as_ref().ok_or(DocbaseError::QueueClosed)?;
        tx.send(Box::new(move |conn: &mut Connection| {
            let _ = reply_tx.send(unit(conn));
        }))
        .map_err(|_| DocbaseError::QueueClosed)?;
        reply_rx.recv().map_err(|_| DocbaseError::QueueClosed)?
    }

    /// Submit a unit wrapped in one transaction: commits only if every step
    /// succeeded, rolls back entirely otherwise. Used by read-then-write
    /// operations whose return value must be consistent with the mutation.
    pub fn submit_txn<R, F>(&self, unit: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce(&Transaction) -> Result<R> + Send + 'static,
    {
        self.submit(move |conn| {
            let txn = conn.transaction()?;
            let out = unit(&txn)?;
            txn.commit()?;
            Ok(out)
        })
    }
}

impl Drop for OperationQueue {
    fn drop(&mut self) {
        // Closing the channel lets the worker drain and exit.
        self.tx.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

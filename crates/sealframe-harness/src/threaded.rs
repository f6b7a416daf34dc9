//! Cluster with one dispatch thread per node.
//!
//! Each node's inbound frames arrive on a tokio unbounded channel drained by
//! a dedicated OS thread, while test or application threads call the engine
//! API concurrently. This is the deployment shape the blocking waits are
//! designed for.

#![allow(clippy::disallowed_types, reason = "Synchronous locking operations only")]

use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    thread::{self, JoinHandle},
};

use sealframe_core::{
    BroadcastError, Environment, FrameSink, FramedBroadcast, NodeId, VaultConfig, VaultEngine,
    VaultError,
};
use sealframe_proto::Frame;
use tokio::sync::mpsc;

use crate::cluster::NodeError;

/// Engine type used by threaded nodes.
pub type ThreadedEngine<E> = VaultEngine<FramedBroadcast<ThreadedSink>, E>;

type Inboxes = Option<Vec<mpsc::UnboundedSender<Vec<u8>>>>;

/// Fan-out sink shared by all nodes of a [`ThreadedCluster`].
///
/// Every frame is encoded once and queued for every node, the sender
/// included.
#[derive(Clone)]
pub struct ThreadedSink {
    inboxes: Arc<Mutex<Inboxes>>,
}

impl ThreadedSink {
    fn inboxes(&self) -> MutexGuard<'_, Inboxes> {
        self.inboxes.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl FrameSink for ThreadedSink {
    fn send_frame(&self, frame: Frame) -> Result<(), BroadcastError> {
        let bytes = frame.to_vec()?;
        let inboxes = self.inboxes();
        let Some(senders) = inboxes.as_ref() else {
            return Err(BroadcastError::Closed);
        };
        for sender in senders {
            // A closed receiver means that node has shut down
            let _ = sender.send(bytes.clone());
        }
        Ok(())
    }
}

/// Running cluster of engines with per-node dispatch threads.
///
/// Node `i` has identity `NodeId(i + 1)`. Dropping the cluster stops and
/// joins every dispatch thread.
pub struct ThreadedCluster<E: Environment> {
    nodes: Vec<Arc<ThreadedEngine<E>>>,
    sink: ThreadedSink,
    errors: Arc<Mutex<Vec<NodeError>>>,
    workers: Vec<(NodeId, JoinHandle<()>)>,
}

impl<E: Environment> ThreadedCluster<E> {
    /// Start `num_nodes` engines sharing `env`.
    pub fn start(num_nodes: usize, env: &E, config: &VaultConfig) -> Result<Self, VaultError> {
        let mut senders = Vec::with_capacity(num_nodes);
        let mut receivers = Vec::with_capacity(num_nodes);
        for _ in 0..num_nodes {
            let (tx, rx) = mpsc::unbounded_channel();
            senders.push(tx);
            receivers.push(rx);
        }

        let sink = ThreadedSink { inboxes: Arc::new(Mutex::new(Some(senders))) };
        let errors = Arc::new(Mutex::new(Vec::new()));
        let mut nodes = Vec::with_capacity(num_nodes);
        let mut workers = Vec::with_capacity(num_nodes);

        for (i, mut rx) in receivers.into_iter().enumerate() {
            let node_id = NodeId(i as u64 + 1);
            let broadcast = FramedBroadcast::new(node_id, sink.clone());
            let engine =
                Arc::new(VaultEngine::new(node_id, broadcast, env.clone(), config.clone())?);

            let worker_engine = Arc::clone(&engine);
            let worker_errors = Arc::clone(&errors);
            let worker = thread::spawn(move || {
                while let Some(bytes) = rx.blocking_recv() {
                    let result = Frame::decode(&bytes)
                        .map_err(VaultError::from)
                        .and_then(|frame| worker_engine.handle_frame(&frame));
                    if let Err(error) = result {
                        tracing::debug!(node = %node_id, error = %error, "Dispatch failed");
                        worker_errors
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .push(NodeError { node: node_id, error });
                    }
                }
                tracing::debug!(node = %node_id, "Dispatch thread stopped");
            });
            workers.push((node_id, worker));
            nodes.push(engine);
        }

        Ok(Self { nodes, sink, errors, workers })
    }

    /// Engine at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    pub fn node(&self, index: usize) -> &Arc<ThreadedEngine<E>> {
        &self.nodes[index]
    }

    /// All engines.
    pub fn nodes(&self) -> &[Arc<ThreadedEngine<E>>] {
        &self.nodes
    }

    /// Errors reported by dispatch threads so far.
    pub fn errors(&self) -> Vec<NodeError> {
        self.errors.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Close every inbox and join the dispatch threads. Frames already queued
    /// are still delivered. Later broadcasts fail with
    /// `BroadcastError::Closed`.
    ///
    /// Returns the nodes whose dispatch thread panicked.
    pub fn shutdown(&mut self) -> Vec<NodeId> {
        self.sink.inboxes().take();

        let mut panicked = Vec::new();
        for (node_id, worker) in self.workers.drain(..) {
            if worker.join().is_err() {
                tracing::error!(node = %node_id, "Dispatch thread panicked");
                panicked.push(node_id);
            }
        }
        panicked
    }
}

impl<E: Environment> Drop for ThreadedCluster<E> {
    fn drop(&mut self) {
        let panicked = self.shutdown();
        if !panicked.is_empty() {
            tracing::error!(?panicked, "Cluster dropped with panicked dispatch threads");
        }
    }
}
